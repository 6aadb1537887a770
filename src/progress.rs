//! Progress reporting.
//!
//! This module provides [`ProgressCallback`] for monitoring extraction and
//! assembly, and [`ProgressInfo`] for the snapshot delivered to it. Callbacks
//! fire every [`PipelineOptions::with_progress_interval`](crate::PipelineOptions::with_progress_interval)
//! frames and once more when the run finishes.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use frameshift::{Pipeline, PipelineOptions, ProgressCallback, ProgressInfo};
//!
//! struct PrintProgress;
//!
//! impl ProgressCallback for PrintProgress {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         println!("[{:?}] {} frames", info.operation, info.current);
//!     }
//! }
//!
//! let options = PipelineOptions::new().with_progress(Arc::new(PrintProgress));
//! let pipeline = Pipeline::new(options)?;
//! pipeline.extract("input.mp4", "frames")?;
//! # Ok::<(), frameshift::FrameshiftError>(())
//! ```

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

/// The kind of operation currently in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum OperationType {
    /// Writing frames out of a video.
    FrameExtraction,
    /// Encoding frames into a video.
    FrameAssembly,
}

/// A snapshot of progress.
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// What kind of work is being performed.
    pub operation: OperationType,
    /// How many frames have been processed so far.
    pub current: u64,
    /// Total frames expected, if known ahead of time.
    pub total: Option<u64>,
    /// Completion percentage (0.0 – 100.0), if `total` is known.
    pub percentage: Option<f32>,
    /// Wall-clock time elapsed since the operation started.
    pub elapsed: Duration,
    /// `true` for the report emitted when the operation completes.
    pub finished: bool,
}

/// Trait for receiving progress updates.
///
/// Implementations must be [`Send`] and [`Sync`] so one callback can be
/// shared between independent pipelines.
///
/// Callbacks observe but cannot halt the operation.
pub trait ProgressCallback: Send + Sync {
    /// Called at the configured cadence during a run.
    fn on_progress(&self, info: &ProgressInfo);
}

/// Discards all progress notifications. The default callback.
pub(crate) struct NoOpProgress;

impl ProgressCallback for NoOpProgress {
    fn on_progress(&self, _info: &ProgressInfo) {}
}

/// Tracks progress timing and emits callbacks at a fixed cadence.
pub(crate) struct ProgressTracker {
    callback: Arc<dyn ProgressCallback>,
    operation: OperationType,
    total: Option<u64>,
    current: u64,
    interval: u64,
    last_reported: u64,
    start_time: Instant,
}

impl ProgressTracker {
    pub(crate) fn new(
        callback: Arc<dyn ProgressCallback>,
        operation: OperationType,
        total: Option<u64>,
        interval: u64,
    ) -> Self {
        Self {
            callback,
            operation,
            total,
            current: 0,
            interval: interval.max(1),
            last_reported: 0,
            start_time: Instant::now(),
        }
    }

    /// Record one completed frame.
    pub(crate) fn advance(&mut self) {
        self.advance_to(self.current + 1);
    }

    /// Record that `current` frames are complete.
    ///
    /// Used when frames are counted by an external process that reports in
    /// uneven steps; at most one callback fires per call.
    pub(crate) fn advance_to(&mut self, current: u64) {
        if current <= self.current {
            return;
        }
        self.current = current;

        let boundary = current - current % self.interval;
        if boundary > self.last_reported {
            self.last_reported = boundary;
            self.report(false);
        }
    }

    /// Frames recorded so far.
    pub(crate) fn current(&self) -> u64 {
        self.current
    }

    /// Unconditionally emit a final progress report.
    pub(crate) fn finish(&mut self) {
        self.report(true);
    }

    fn report(&self, finished: bool) {
        let percentage = self
            .total
            .filter(|&total| total > 0)
            .map(|total| (self.current as f32 / total as f32) * 100.0);

        let info = ProgressInfo {
            operation: self.operation,
            current: self.current,
            total: self.total,
            percentage,
            elapsed: self.start_time.elapsed(),
            finished,
        };

        self.callback.on_progress(&info);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct Recorder {
        reports: Mutex<Vec<(u64, bool)>>,
    }

    impl ProgressCallback for Recorder {
        fn on_progress(&self, info: &ProgressInfo) {
            self.reports
                .lock()
                .unwrap()
                .push((info.current, info.finished));
        }
    }

    #[test]
    fn reports_every_interval_and_on_finish() {
        let recorder = Arc::new(Recorder::default());
        let mut tracker =
            ProgressTracker::new(recorder.clone(), OperationType::FrameExtraction, None, 100);
        for _ in 0..250 {
            tracker.advance();
        }
        tracker.finish();

        let reports = recorder.reports.lock().unwrap();
        assert_eq!(*reports, vec![(100, false), (200, false), (250, true)]);
    }

    #[test]
    fn uneven_steps_report_once_per_call() {
        let recorder = Arc::new(Recorder::default());
        let mut tracker =
            ProgressTracker::new(recorder.clone(), OperationType::FrameExtraction, None, 100);
        tracker.advance_to(40);
        tracker.advance_to(350);
        tracker.advance_to(360);
        tracker.advance_to(30);
        assert_eq!(tracker.current(), 360);

        let reports = recorder.reports.lock().unwrap();
        assert_eq!(*reports, vec![(350, false)]);
    }

    #[test]
    fn percentage_uses_known_total() {
        struct Percent(Mutex<Option<f32>>);
        impl ProgressCallback for Percent {
            fn on_progress(&self, info: &ProgressInfo) {
                *self.0.lock().unwrap() = info.percentage;
            }
        }

        let percent = Arc::new(Percent(Mutex::new(None)));
        let mut tracker =
            ProgressTracker::new(percent.clone(), OperationType::FrameAssembly, Some(4), 1);
        tracker.advance();
        assert_eq!(*percent.0.lock().unwrap(), Some(25.0));
    }
}
