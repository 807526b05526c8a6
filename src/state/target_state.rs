/// Per-target state definitions for tracking scan progress
///
/// Every target walks the same path and always ends in `Recorded`:
///
/// ```text
/// Pending -> Fetching -> FetchFailed ----------------------------> Recorded
///                     -> Fetched -> Capturing -> CaptureFailed --> Recorded
///                                             -> Captured -------> Recorded
///                     -> Fetched --------------------------------> Recorded
/// ```
use std::fmt;

/// Represents the current state of one target in the scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetState {
    /// Loaded from the list, not yet touched
    Pending,

    /// Document request in flight
    Fetching,

    /// Document request or artifact write failed
    FetchFailed,

    /// Document saved to disk
    Fetched,

    /// Snapshot capture in flight
    Capturing,

    /// Snapshot failed; the document is kept
    CaptureFailed,

    /// Snapshot saved to disk
    Captured,

    /// Outcome logged and tallied
    Recorded,
}

impl TargetState {
    /// Returns true if `next` is a legal successor of this state
    ///
    /// There is no transition back to `Fetching`: a single bad attempt is
    /// terminal for the target within a run.
    pub fn can_transition_to(&self, next: TargetState) -> bool {
        use TargetState::*;
        matches!(
            (self, next),
            (Pending, Fetching)
                | (Fetching, FetchFailed)
                | (Fetching, Fetched)
                | (Fetched, Capturing)
                | (Fetched, Recorded)
                | (Capturing, CaptureFailed)
                | (Capturing, Captured)
                | (FetchFailed, Recorded)
                | (CaptureFailed, Recorded)
                | (Captured, Recorded)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Fetching => "fetching",
            Self::FetchFailed => "fetch_failed",
            Self::Fetched => "fetched",
            Self::Capturing => "capturing",
            Self::CaptureFailed => "capture_failed",
            Self::Captured => "captured",
            Self::Recorded => "recorded",
        }
    }
}

impl fmt::Display for TargetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
