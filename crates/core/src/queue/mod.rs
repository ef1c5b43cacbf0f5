//! The queue state machine.

mod engine;

pub use engine::{AdvanceOutcome, CancelOutcome, QueueEngine, SkipOutcome};
