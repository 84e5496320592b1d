//! Progress reporting for the extraction stage.
//!
//! Inject an [`Arc<dyn ProgressCallback>`] into
//! [`crate::pipeline::extract::DocumentProcessor`] to receive incremental
//! 0–100 progress as a document moves through extraction.
//!
//! # Why callbacks instead of channels?
//!
//! The callback approach is the least-invasive integration point: callers
//! can forward values to a channel, a WebSocket, or a terminal progress bar
//! without the library knowing how the host application communicates. The
//! trait is `Send + Sync` so a callback can be shared across tasks when a
//! caller chooses to process independent files in parallel.
//!
//! # Guarantees
//!
//! Within one `process` call, delivered values are strictly non-decreasing
//! and end at exactly 100 on success. On failure the value is reset to 0 so
//! UI consumers can detect incompleteness. The [`ProgressReporter`] wrapper
//! enforces the monotonic part so stage code cannot regress it by accident.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Receives 0–100 progress values during extraction.
pub trait ProgressCallback: Send + Sync {
    /// Called with the current progress percentage.
    fn on_progress(&self, percent: u8) {
        let _ = percent;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgress;

impl ProgressCallback for NoopProgress {}

/// Convenience alias matching the type held by the processor.
pub type SharedProgress = Arc<dyn ProgressCallback>;

/// Enforces monotonicity over a wrapped callback for one `process` call.
///
/// `advance` delivers a value only if it is greater than everything already
/// delivered; `reset` is the single sanctioned regression, used on failure.
pub(crate) struct ProgressReporter {
    callback: SharedProgress,
    last: AtomicU8,
}

impl ProgressReporter {
    pub fn new(callback: SharedProgress) -> Self {
        Self {
            callback,
            last: AtomicU8::new(0),
        }
    }

    /// Report `percent` if it advances the high-water mark.
    pub fn advance(&self, percent: u8) {
        let percent = percent.min(100);
        let prev = self.last.fetch_max(percent, Ordering::SeqCst);
        if percent > prev {
            self.callback.on_progress(percent);
        }
    }

    /// Reset to 0 on failure so consumers can detect incompleteness.
    pub fn reset(&self) {
        self.last.store(0, Ordering::SeqCst);
        self.callback.on_progress(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Recording {
        values: Mutex<Vec<u8>>,
    }

    impl ProgressCallback for Recording {
        fn on_progress(&self, percent: u8) {
            self.values.lock().unwrap().push(percent);
        }
    }

    #[test]
    fn reporter_suppresses_regressions() {
        let rec = Arc::new(Recording {
            values: Mutex::new(Vec::new()),
        });
        let reporter = ProgressReporter::new(rec.clone());
        reporter.advance(10);
        reporter.advance(70);
        reporter.advance(40); // must be swallowed
        reporter.advance(100);
        assert_eq!(*rec.values.lock().unwrap(), vec![10, 70, 100]);
    }

    #[test]
    fn duplicate_values_are_delivered_once() {
        let rec = Arc::new(Recording {
            values: Mutex::new(Vec::new()),
        });
        let reporter = ProgressReporter::new(rec.clone());
        reporter.advance(50);
        reporter.advance(50);
        assert_eq!(*rec.values.lock().unwrap(), vec![50]);
    }

    #[test]
    fn reset_delivers_zero() {
        let rec = Arc::new(Recording {
            values: Mutex::new(Vec::new()),
        });
        let reporter = ProgressReporter::new(rec.clone());
        reporter.advance(80);
        reporter.reset();
        assert_eq!(*rec.values.lock().unwrap(), vec![80, 0]);
    }

    #[test]
    fn values_above_hundred_are_clamped() {
        let rec = Arc::new(Recording {
            values: Mutex::new(Vec::new()),
        });
        let reporter = ProgressReporter::new(rec.clone());
        reporter.advance(250);
        assert_eq!(*rec.values.lock().unwrap(), vec![100]);
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgress;
        cb.on_progress(0);
        cb.on_progress(100);
    }
}
