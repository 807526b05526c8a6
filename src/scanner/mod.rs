//! Scanner module for per-target capture
//!
//! This module contains the capture orchestration pipeline, including:
//! - Proxied document fetching with status classification
//! - Snapshot capture through a headless browser
//! - Per-target failure isolation and overall run coordination

mod capture;
mod coordinator;
mod fetcher;

pub use capture::{
    store_snapshot, with_deadline, BrowserSession, CaptureError, CaptureStep, Capturer,
    CAPTURE_TIMEOUT, READY_SELECTOR, SETTLE_DELAY,
};
pub use coordinator::{run_scan, Orchestrator, TargetOutcome};
pub use fetcher::{fetch_document, is_accepted, FetchError, Fetched};
