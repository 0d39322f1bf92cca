//! Concurrent races between worker threads
//!
//! [`race`] starts a set of scoped threads, holds them at a start gate until
//! all of them exist, then releases them at once so their bodies overlap as
//! much as the scheduler allows.

use parking_lot::{Condvar, Mutex};
use tracing::debug;

/// Race configuration
#[derive(Clone, Debug)]
pub struct RaceConfig {
    /// Number of worker threads
    pub threads: usize,
    /// Iterations each worker is expected to run
    pub iterations: usize,
}

impl Default for RaceConfig {
    fn default() -> Self {
        RaceConfig {
            threads: 8,
            iterations: 1_000,
        }
    }
}

impl RaceConfig {
    /// Two threads, few iterations
    pub fn pair() -> Self {
        RaceConfig {
            threads: 2,
            iterations: 100,
        }
    }

    /// Many threads, many iterations
    pub fn heavy() -> Self {
        RaceConfig {
            threads: 32,
            iterations: 10_000,
        }
    }
}

/// One-shot gate that releases every waiter when opened
#[derive(Default)]
pub struct StartGate {
    open: Mutex<bool>,
    opened: Condvar,
}

impl StartGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn wait(&self) {
        let mut open = self.open.lock();
        while !*open {
            self.opened.wait(&mut open);
        }
    }

    pub fn open(&self) {
        *self.open.lock() = true;
        self.opened.notify_all();
    }
}

/// Run `worker(thread_index, iterations)` on `config.threads` threads at once.
///
/// Results are returned in thread-index order. A panic in any worker is
/// re-raised on the calling thread after all workers have finished.
pub fn race<R, F>(config: &RaceConfig, worker: F) -> Vec<R>
where
    F: Fn(usize, usize) -> R + Sync,
    R: Send,
{
    let gate = StartGate::new();
    let ready = Mutex::new(0usize);
    let all_ready = Condvar::new();

    debug!(threads = config.threads, iterations = config.iterations, "race starting");

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..config.threads)
            .map(|index| {
                let gate = &gate;
                let ready = &ready;
                let all_ready = &all_ready;
                let worker = &worker;
                scope.spawn(move || {
                    *ready.lock() += 1;
                    all_ready.notify_one();
                    gate.wait();
                    worker(index, config.iterations)
                })
            })
            .collect();

        {
            let mut count = ready.lock();
            while *count < config.threads {
                all_ready.wait(&mut count);
            }
        }
        gate.open();

        let mut results = Vec::with_capacity(handles.len());
        let mut panic = None;
        for handle in handles {
            match handle.join() {
                Ok(result) => results.push(result),
                Err(payload) => {
                    panic.get_or_insert(payload);
                }
            }
        }

        if let Some(payload) = panic {
            std::panic::resume_unwind(payload);
        }
        results
    })
}
