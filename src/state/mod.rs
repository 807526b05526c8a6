//! State module for tracking scan progress
//!
//! # Components
//!
//! - `TargetState`: Tracks one target from loading to its logged outcome
//! - `RunState`: Tracks the run as a whole (idle, running, summarized, closed)

mod run_state;
mod target_state;

// Re-export main types
pub use run_state::RunState;
pub use target_state::TargetState;
