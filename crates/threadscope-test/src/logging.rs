//! Tracing setup for tests and benches

use std::io;
use std::sync::{Arc, Once};

use parking_lot::Mutex;
use tracing::Level;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Install a `tracing` subscriber that writes through the test harness.
///
/// The filter comes from `RUST_LOG` and defaults to `warn`. Safe to call
/// from every test; only the first call installs anything.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        // Another subscriber may already be set by the embedding test binary.
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// In-memory sink for asserting on emitted events.
///
/// [`LogCapture::run`] installs a thread-scoped `TRACE`-level fmt subscriber
/// writing plain lines into the capture, so it works alongside a global
/// subscriber set by [`init_tracing`].
#[derive(Clone, Default)]
pub struct LogCapture {
    buffer: Arc<Mutex<Vec<u8>>>,
    panic_on: Option<&'static str>,
}

impl LogCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// A capture whose writer panics on any line containing `needle`,
    /// unless the thread is already unwinding
    pub fn panicking_on(needle: &'static str) -> Self {
        LogCapture {
            panic_on: Some(needle),
            ..Self::default()
        }
    }

    /// Run `f` with this capture as the current thread's subscriber
    pub fn run<R, F>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(Level::TRACE)
            .with_ansi(false)
            .with_writer(self.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, f)
    }

    /// Everything written so far
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buffer.lock()).into_owned()
    }

    /// Captured lines that contain `needle`
    pub fn lines_containing(&self, needle: &str) -> Vec<String> {
        self.contents()
            .lines()
            .filter(|line| line.contains(needle))
            .map(str::to_string)
            .collect()
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = CaptureWriter;

    fn make_writer(&'a self) -> Self::Writer {
        CaptureWriter {
            buffer: Arc::clone(&self.buffer),
            panic_on: self.panic_on,
        }
    }
}

/// Writer handed out by [`LogCapture`]
pub struct CaptureWriter {
    buffer: Arc<Mutex<Vec<u8>>>,
    panic_on: Option<&'static str>,
}

impl io::Write for CaptureWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        // Never panic while unwinding; that would abort the test binary.
        if let (Some(needle), false) = (self.panic_on, std::thread::panicking()) {
            if String::from_utf8_lossy(buf).contains(needle) {
                panic!("log sink refused event containing {:?}", needle);
            }
        }
        self.buffer.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
