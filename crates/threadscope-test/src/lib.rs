//! threadscope test harness
//!
//! This crate provides:
//! - Deterministic cross-thread interleavings (`Turnstile`)
//! - Gated concurrent races (`race`, `RaceConfig`)
//! - Tracing setup and log capture for tests (`init_tracing`, `LogCapture`)

pub mod logging;
pub mod race;
pub mod turnstile;

pub use logging::*;
pub use race::*;
pub use turnstile::*;

use std::time::Duration;

use thiserror::Error;

/// Harness errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HarnessError {
    #[error("Timed out after {waited:?} waiting for step {step} (at step {current})")]
    Timeout {
        step: usize,
        current: usize,
        waited: Duration,
    },

    #[error("Step {step} already passed (at step {current})")]
    StepPassed { step: usize, current: usize },
}

/// Result type for harness operations
pub type HarnessResult<T> = Result<T, HarnessError>;
