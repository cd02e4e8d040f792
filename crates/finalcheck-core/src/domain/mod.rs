//! Domain models for the harness.
//!
//! - `Example`: one dataset item with an integer answer
//! - `RolloutSample`: one sampled completion with log-prob bookkeeping
//! - `Completion`: text or an explicit gap, as handed to the verifier

pub mod error;
pub mod example;
pub mod sample;

pub use error::{HarnessError, Result};
pub use example::{coerce_expected_answer, Example};
pub use sample::{Completion, RolloutSample};
