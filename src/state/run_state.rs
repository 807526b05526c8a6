use std::fmt;

/// Lifecycle of a whole scan run
///
/// `Idle -> Running -> Summarized -> Closed`. A fatal initialization error
/// ends the scan before any run starts, so it never enters this machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunState {
    Idle,
    Running,
    Summarized,
    Closed,
}

impl RunState {
    pub fn can_transition_to(&self, next: RunState) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Running)
                | (Self::Running, Self::Summarized)
                | (Self::Summarized, Self::Closed)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Summarized => "summarized",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
