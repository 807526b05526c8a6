//! onionshot main entry point
//!
//! This is the command-line interface for the proxied document and snapshot scanner.

use anyhow::Context;
use clap::Parser;
use onionshot::config::{load_config, validate, ScanConfig};
use onionshot::output::{ArtifactRecord, OutputLayout};
use onionshot::scanner::run_scan;
use onionshot::targets::load_targets;
use onionshot::ScanError;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// onionshot: fetch documents and snapshots through an anonymizing proxy
///
/// Every target in the list is fetched through the SOCKS proxy and saved
/// under `<output>/html/`. With screenshots enabled, a headless browser
/// routed through the same proxy renders each saved target into
/// `<output>/screenshots/`. Every event lands in the run log.
#[derive(Parser, Debug)]
#[command(name = "onionshot")]
#[command(version)]
#[command(about = "Proxied document and snapshot scanner", long_about = None)]
struct Cli {
    /// Optional TOML configuration file; flags override its values
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Target list file
    #[arg(long, value_name = "FILE")]
    targets: Option<PathBuf>,

    /// Tor SOCKS5 address (Tor Browser: 127.0.0.1:9150)
    #[arg(long, value_name = "HOST:PORT")]
    socks: Option<String>,

    /// Take screenshots for successful targets
    #[arg(long, value_name = "BOOL", num_args = 0..=1, default_missing_value = "true")]
    shots: Option<bool>,

    /// Disable screenshots
    #[arg(long, conflicts_with = "shots")]
    no_shots: bool,

    /// Browser executable used for screenshots
    #[arg(long, value_name = "PATH")]
    chrome: Option<PathBuf>,

    /// Root directory for html/ and screenshots/
    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Run log path (truncated on every run)
    #[arg(long, value_name = "FILE")]
    log: Option<PathBuf>,

    /// Targets processed at once
    #[arg(short, long)]
    workers: Option<usize>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Show what would be scanned without touching the network
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let config = match build_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{}", e);
            return Ok(ExitCode::from(e.exit_code()));
        }
    };

    if cli.dry_run {
        return handle_dry_run(&config);
    }

    match run_scan(&config).await {
        Ok(tally) => {
            println!("[DONE] {}", tally);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            tracing::error!("Scan aborted: {}", e);
            Ok(ExitCode::from(e.exit_code()))
        }
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("onionshot=info,warn"),
            1 => EnvFilter::new("onionshot=debug,info"),
            2 => EnvFilter::new("onionshot=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Loads the optional config file, applies flag overrides, validates the result
fn build_config(cli: &Cli) -> Result<ScanConfig, ScanError> {
    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            load_config(path)?
        }
        None => ScanConfig::default(),
    };

    if let Some(targets) = &cli.targets {
        config.input.targets = targets.clone();
    }
    if let Some(socks) = &cli.socks {
        config.proxy.socks = socks.clone();
    }
    if let Some(shots) = cli.shots {
        config.capture.enabled = shots;
    }
    if cli.no_shots {
        config.capture.enabled = false;
    }
    if let Some(chrome) = &cli.chrome {
        config.capture.chrome_path = Some(chrome.clone());
    }
    if let Some(dir) = &cli.output_dir {
        config.output.dir = dir.clone();
    }
    if let Some(log) = &cli.log {
        config.output.log = log.clone();
    }
    if let Some(workers) = cli.workers {
        config.runner.workers = workers;
    }

    validate(&config)?;
    Ok(config)
}

/// Handles the --dry-run mode: shows targets and their artifact names
fn handle_dry_run(config: &ScanConfig) -> anyhow::Result<ExitCode> {
    let targets = match load_targets(&config.input.targets) {
        Ok(targets) => targets,
        Err(e) => {
            tracing::error!("{}", e);
            return Ok(ExitCode::from(e.exit_code()));
        }
    };

    let layout = OutputLayout::new(&config.output.dir);
    let mut out = std::io::stdout().lock();

    writeln!(out, "=== onionshot Dry Run ===\n")?;
    writeln!(out, "Proxy: socks5h://{}", config.proxy.socks)?;
    writeln!(
        out,
        "Screenshots: {}",
        if config.capture.enabled { "enabled" } else { "disabled" }
    )?;
    writeln!(out, "Workers: {}", config.runner.workers)?;
    writeln!(out, "Run log: {}", config.output.log.display())?;
    writeln!(out, "\nTargets ({}):", targets.len())?;

    for target in &targets {
        let record = ArtifactRecord::for_target(&layout, target);
        writeln!(out, "  - {}", target)?;
        writeln!(out, "    html: {}", record.html_path.display())?;
        if config.capture.enabled {
            writeln!(out, "    png:  {}", record.png_path.display())?;
        }
    }

    out.flush().context("failed to flush dry-run output")?;
    Ok(ExitCode::SUCCESS)
}
