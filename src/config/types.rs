use serde::Deserialize;
use std::path::PathBuf;

/// Main configuration structure for a scan run
///
/// Every section is optional in the TOML file; missing sections fall back
/// to the defaults a Tor Browser install expects.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub input: InputConfig,
    pub proxy: ProxyConfig,
    pub capture: CaptureConfig,
    pub output: OutputConfig,
    pub runner: RunnerConfig,
}

/// Where the target list comes from
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Path to the newline-delimited target list
    pub targets: PathBuf,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            targets: PathBuf::from("targets.yaml"),
        }
    }
}

/// Anonymizing proxy settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// SOCKS5 endpoint as `host:port` (Tor Browser listens on 9150)
    pub socks: String,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            socks: "127.0.0.1:9150".to_string(),
        }
    }
}

/// Snapshot capture settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Whether to render a snapshot for each successfully fetched target
    pub enabled: bool,

    /// Browser executable; auto-detected when absent
    #[serde(rename = "chrome-path")]
    pub chrome_path: Option<PathBuf>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            chrome_path: None,
        }
    }
}

/// Output locations
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Root directory for `html/` and `screenshots/`
    pub dir: PathBuf,

    /// Run log path, truncated at every run start
    pub log: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("output"),
            log: PathBuf::from("scan_report.log"),
        }
    }
}

/// Scheduling settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Number of targets processed at once; 1 keeps strict list order
    pub workers: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self { workers: 1 }
    }
}
