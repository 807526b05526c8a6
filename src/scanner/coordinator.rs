//! Scan coordinator - per-target orchestration and the run lifecycle
//!
//! This module contains the loop that drives every target through
//! fetch, artifact write and optional capture, including:
//! - Run initialization (log, target list, transport, capture session)
//! - Per-target failure isolation
//! - Tally accumulation in list order
//! - The closing summary

use crate::config::ScanConfig;
use crate::output::{write_artifact, ArtifactRecord, LogTag, OutputLayout, RunLog, Tally};
use crate::scanner::capture::{BrowserSession, CaptureError, Capturer};
use crate::scanner::fetcher::fetch_document;
use crate::state::{RunState, TargetState};
use crate::targets::{load_targets, Target};
use crate::transport::{provision, ProxyEndpoint, Transport};
use crate::ScanError;
use chrono::{Local, SecondsFormat};
use futures::StreamExt;
use std::path::PathBuf;

/// Final result for one target
#[derive(Debug)]
pub enum TargetOutcome {
    /// Fetch failed; nothing was written
    FetchFailed { status: Option<u16>, error: String },

    /// Fetch succeeded but the document could not be written
    WriteFailed { error: String },

    /// Document saved; `snapshot` is `None` when capture is disabled
    Saved {
        html_path: PathBuf,
        snapshot: Option<Result<PathBuf, CaptureError>>,
    },
}

impl TargetOutcome {
    /// A saved document counts as success even when the snapshot failed
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Saved { .. })
    }
}

/// Main scan orchestrator
///
/// Owns the run's shared resources: the transport, the optional capturer,
/// the output layout and the run log. None of them is mutated by target
/// processing, so targets can be processed concurrently.
pub struct Orchestrator<C = BrowserSession> {
    transport: Transport,
    capturer: Option<C>,
    layout: OutputLayout,
    log: RunLog,
    workers: usize,
    state: RunState,
}

impl Orchestrator<BrowserSession> {
    /// Creates an orchestrator that saves documents only
    pub fn document_only(transport: Transport, layout: OutputLayout, log: RunLog) -> Self {
        Self::new(transport, None, layout, log)
    }
}

impl<C: Capturer> Orchestrator<C> {
    pub fn new(
        transport: Transport,
        capturer: Option<C>,
        layout: OutputLayout,
        log: RunLog,
    ) -> Self {
        Self {
            transport,
            capturer,
            layout,
            log,
            workers: 1,
            state: RunState::Idle,
        }
    }

    /// Sets how many targets may be in flight at once (minimum 1)
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Processes every target and returns the tally
    ///
    /// Outcomes are folded in list order regardless of the worker count.
    /// No per-target failure stops the loop.
    pub async fn run(&mut self, targets: &[Target]) -> Tally {
        self.transition(RunState::Running);
        let start_time = std::time::Instant::now();

        let this = &*self;
        let tally = futures::stream::iter(targets.iter().map(|target| this.process_target(target)))
            .buffered(this.workers)
            .fold(Tally::default(), |mut tally, outcome| async move {
                tally.record(&outcome);
                tally
            })
            .await;

        tracing::info!(
            "Processed {} targets in {:?} ({:.1}% saved)",
            tally.total(),
            start_time.elapsed(),
            tally.success_rate()
        );
        tally
    }

    /// Writes the summary and finish lines, then closes the log
    pub fn finish(&mut self, tally: &Tally) {
        self.transition(RunState::Summarized);
        self.log.banner(&format!("Summary {}", tally));
        self.log
            .banner(&format!("Scan finished at {}", timestamp()));

        self.transition(RunState::Closed);
        self.log.close();
    }

    /// Hands back the capturer so the caller can shut it down
    pub fn into_capturer(self) -> Option<C> {
        self.capturer
    }

    fn transition(&mut self, next: RunState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid run transition {} -> {}",
            self.state,
            next
        );
        tracing::debug!("Run {} -> {}", self.state, next);
        self.state = next;
    }

    /// Drives one target to `Recorded`; every failure stays inside this call
    async fn process_target(&self, target: &Target) -> TargetOutcome {
        let mut state = TargetState::Pending;
        self.log.event(LogTag::Info, &format!("Scanning: {}", target));

        advance(&mut state, TargetState::Fetching, target);
        let fetched = match fetch_document(&self.transport, target).await {
            Ok(fetched) => fetched,
            Err(e) => {
                advance(&mut state, TargetState::FetchFailed, target);
                self.log.event(
                    LogTag::Err,
                    &format!("{} status={} err={}", target, e.status().unwrap_or(0), e),
                );
                advance(&mut state, TargetState::Recorded, target);
                return TargetOutcome::FetchFailed {
                    status: e.status(),
                    error: e.to_string(),
                };
            }
        };

        if fetched.body.is_empty() {
            self.log.event(
                LogTag::Warn,
                &format!("{} status={} -> empty HTML body", target, fetched.status),
            );
        }

        let record = ArtifactRecord::for_target(&self.layout, target);
        if let Err(e) = write_artifact(&record.html_path, &fetched.body) {
            advance(&mut state, TargetState::FetchFailed, target);
            self.log
                .event(LogTag::Err, &format!("{} write_html_fail={}", target, e));
            advance(&mut state, TargetState::Recorded, target);
            return TargetOutcome::WriteFailed {
                error: e.to_string(),
            };
        }
        advance(&mut state, TargetState::Fetched, target);

        let snapshot = match &self.capturer {
            Some(capturer) => {
                advance(&mut state, TargetState::Capturing, target);
                let result = capturer.capture(target, &record.png_path).await;
                let next = if result.is_ok() {
                    TargetState::Captured
                } else {
                    TargetState::CaptureFailed
                };
                advance(&mut state, next, target);
                Some(result.map(|()| record.png_path.clone()))
            }
            None => None,
        };

        let html = record.html_path.display();
        let line = match &snapshot {
            None => format!("{} saved_html={}", target, html),
            Some(Ok(png)) => format!("{} saved_html={} saved_png={}", target, html, png.display()),
            Some(Err(e)) => format!("{} saved_html={} screenshot_fail={}", target, html, e),
        };
        self.log.event(LogTag::Ok, &line);
        advance(&mut state, TargetState::Recorded, target);

        TargetOutcome::Saved {
            html_path: record.html_path,
            snapshot,
        }
    }
}

fn advance(state: &mut TargetState, next: TargetState, target: &Target) {
    debug_assert!(
        state.can_transition_to(next),
        "invalid target transition {} -> {}",
        state,
        next
    );
    tracing::debug!("{}: {} -> {}", target, state, next);
    *state = next;
}

fn timestamp() -> String {
    Local::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Runs a complete scan
///
/// This function orchestrates the entire run:
///
/// 1. Open the run log (truncating the previous run's)
/// 2. Load the target list (fatal if empty)
/// 3. Provision the proxied transport (fatal on failure)
/// 4. Create the output directories (fatal on failure)
/// 5. Launch the capture session if enabled (degrades to document-only on failure)
/// 6. Process every target
/// 7. Write the summary, close the log and the browser
///
/// # Arguments
///
/// * `config` - The scan configuration
///
/// # Returns
///
/// * `Ok(Tally)` - The run reached its summary; per-target failures are in the tally
/// * `Err(ScanError)` - A fatal initialization error; the log holds one `[FATAL]` line
///
/// # Example
///
/// ```no_run
/// use onionshot::config::ScanConfig;
/// use onionshot::scanner::run_scan;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let tally = run_scan(&ScanConfig::default()).await?;
/// println!("OK={} ERR={}", tally.success, tally.failure);
/// # Ok(())
/// # }
/// ```
pub async fn run_scan(config: &ScanConfig) -> Result<Tally, ScanError> {
    let log = RunLog::create(&config.output.log).map_err(|source| ScanError::RunLog {
        path: config.output.log.clone(),
        source,
    })?;
    log.banner(&format!("Scan started at {}", timestamp()));

    let (targets, transport, layout) = match prepare(config).await {
        Ok(prepared) => prepared,
        Err(e) => {
            log.event(LogTag::Fatal, &e.to_string());
            log.close();
            return Err(e);
        }
    };
    tracing::info!("Loaded {} targets", targets.len());

    let session = if config.capture.enabled {
        launch_session(config, &layout, &log).await
    } else {
        None
    };

    let mut orchestrator =
        Orchestrator::new(transport, session, layout, log).with_workers(config.runner.workers);
    let tally = orchestrator.run(&targets).await;
    orchestrator.finish(&tally);

    if let Some(session) = orchestrator.into_capturer() {
        session.close().await;
    }

    Ok(tally)
}

/// Fatal initialization steps, in order
async fn prepare(config: &ScanConfig) -> Result<(Vec<Target>, Transport, OutputLayout), ScanError> {
    let targets = load_targets(&config.input.targets)?;
    let transport = provision(&config.proxy.socks).await?;

    let layout = OutputLayout::new(&config.output.dir);
    layout.ensure_dirs().map_err(|e| ScanError::OutputDir {
        path: e.path,
        source: e.source,
    })?;

    Ok((targets, transport, layout))
}

/// Launches the browser; any failure degrades the run to document-only
async fn launch_session(
    config: &ScanConfig,
    layout: &OutputLayout,
    log: &RunLog,
) -> Option<BrowserSession> {
    let launched = match ProxyEndpoint::parse(&config.proxy.socks) {
        Ok(proxy) => BrowserSession::launch(&proxy, config.capture.chrome_path.as_deref()).await,
        Err(reason) => Err(CaptureError::Launch(reason)),
    };

    match launched {
        Ok(session) => {
            log.event(
                LogTag::Info,
                &format!(
                    "screenshots enabled -> {}/",
                    layout.screenshot_dir().display()
                ),
            );
            Some(session)
        }
        Err(e) => {
            log.event(LogTag::Warn, &format!("browser init failed: {}", e));
            None
        }
    }
}
