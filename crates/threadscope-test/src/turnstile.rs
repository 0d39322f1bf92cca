//! Deterministic interleaving of cooperating threads
//!
//! A [`Turnstile`] holds a single step counter. Each thread waits for the
//! step it owns, does its work, then advances the counter, which lets a test
//! spell out one exact cross-thread ordering:
//!
//! ```rust
//! use std::sync::Arc;
//! use threadscope_test::Turnstile;
//!
//! let turns = Arc::new(Turnstile::new());
//! let other = Arc::clone(&turns);
//!
//! let handle = std::thread::spawn(move || {
//!     other.step(1, || "second").unwrap()
//! });
//! let first = turns.step(0, || "first").unwrap();
//!
//! assert_eq!(first, "first");
//! assert_eq!(handle.join().unwrap(), "second");
//! assert_eq!(turns.current(), 2);
//! ```

use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use tracing::trace;

use crate::{HarnessError, HarnessResult};

/// Step sequencer for cooperating threads
pub struct Turnstile {
    current: Mutex<usize>,
    turned: Condvar,
    timeout: Duration,
}

impl Turnstile {
    /// Turnstile starting at step 0 with a 5 second wait limit
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(5))
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Turnstile {
            current: Mutex::new(0),
            turned: Condvar::new(),
            timeout,
        }
    }

    /// Current step
    pub fn current(&self) -> usize {
        *self.current.lock()
    }

    /// Block until the counter reaches `step`.
    ///
    /// Fails if the step was already passed, or if the wait limit elapses
    /// (usually a test bug where no thread owns an intermediate step).
    pub fn wait_for(&self, step: usize) -> HarnessResult<()> {
        let mut current = self.current.lock();
        loop {
            if *current == step {
                return Ok(());
            }
            if *current > step {
                return Err(HarnessError::StepPassed {
                    step,
                    current: *current,
                });
            }
            if self.turned.wait_for(&mut current, self.timeout).timed_out() && *current < step {
                return Err(HarnessError::Timeout {
                    step,
                    current: *current,
                    waited: self.timeout,
                });
            }
        }
    }

    /// Move to the next step and wake every waiter
    pub fn advance(&self) {
        let mut current = self.current.lock();
        *current += 1;
        trace!(step = *current, "turnstile advanced");
        self.turned.notify_all();
    }

    /// Wait for `step`, run `f`, then advance.
    ///
    /// The counter advances even if `f` panics, so other threads are not
    /// left waiting for the full timeout.
    pub fn step<R, F>(&self, step: usize, f: F) -> HarnessResult<R>
    where
        F: FnOnce() -> R,
    {
        self.wait_for(step)?;
        let _advance = AdvanceOnDrop(self);
        Ok(f())
    }
}

impl Default for Turnstile {
    fn default() -> Self {
        Self::new()
    }
}

struct AdvanceOnDrop<'a>(&'a Turnstile);

impl Drop for AdvanceOnDrop<'_> {
    fn drop(&mut self) {
        self.0.advance();
    }
}
