//! Capture session lifecycle: start, timed wait, orderly stop

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{info, instrument, warn};

use crate::capture::{Frame, FrameCallback, Pipeline, StreamDeclaration};
use crate::error::{CaptureError, CaptureResult};
use crate::pipeline::{FrameStats, StreamCounts};
use crate::session::progress::ProgressReporter;
use crate::session::CancelToken;
use crate::Settings;

/// Controller-side timing
#[derive(Debug, Clone, Copy)]
pub struct SessionTiming {
    /// Upper bound on each sleep of the wait loop
    pub poll_interval: Duration,
}

impl Default for SessionTiming {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(10),
        }
    }
}

impl From<&Settings> for SessionTiming {
    fn from(settings: &Settings) -> Self {
        Self {
            poll_interval: settings.poll_interval(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Starting,
    Active,
    Stopping,
    Closed,
    Failed,
}

/// Outcome of a closed session
#[derive(Debug, Clone)]
pub struct SessionSummary {
    /// Time between a successful start and the stop request
    pub active_for: Duration,
    pub frames: StreamCounts,
    pub reports: u64,
    pub cancelled: bool,
}

enum WaitOutcome {
    Elapsed,
    Cancelled,
}

/// Drives one recording on a pipeline. A session records at most once.
pub struct CaptureSession<P: Pipeline> {
    pipeline: P,
    reporter: Arc<ProgressReporter>,
    timing: SessionTiming,
    state: SessionState,
}

impl<P: Pipeline> CaptureSession<P> {
    pub fn new(pipeline: P, reporter: ProgressReporter, timing: SessionTiming) -> Self {
        Self {
            pipeline,
            reporter: Arc::new(reporter),
            timing,
            state: SessionState::Idle,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn pipeline(&self) -> &P {
        &self.pipeline
    }

    /// Start streaming, wait out `duration_seconds`, then stop and close the recording.
    ///
    /// A failed start never reaches `stop`. Once started, `stop` always runs; if the wait
    /// already failed, that first error is returned and a stop error is only logged.
    #[instrument(skip(self, declaration, cancel))]
    pub fn record(
        &mut self,
        declaration: &StreamDeclaration,
        duration_seconds: i64,
        cancel: &CancelToken,
    ) -> CaptureResult<SessionSummary> {
        if self.state != SessionState::Idle {
            return Err(CaptureError::generic(format!(
                "capture session already used (state {:?})",
                self.state
            )));
        }

        self.state = SessionState::Starting;
        let stats = Arc::new(FrameStats::default());
        let callback = progress_callback(Arc::clone(&self.reporter), Arc::clone(&stats));

        let handle = match self.pipeline.start(declaration, callback) {
            Ok(handle) => handle,
            Err(e) => {
                self.state = SessionState::Failed;
                return Err(e);
            }
        };

        self.state = SessionState::Active;
        let started = Instant::now();
        info!("Recording {} for {}s", declaration.output_path().display(), duration_seconds);
        let waited = self.wait(&handle, duration_seconds, started, cancel);
        let active_for = started.elapsed();

        self.state = SessionState::Stopping;
        let stopped = self.pipeline.stop(handle);

        let outcome = match (waited, stopped) {
            (Ok(outcome), Ok(())) => outcome,
            (Ok(_), Err(e)) => {
                self.state = SessionState::Failed;
                return Err(e);
            }
            (Err(primary), stopped) => {
                if let Err(secondary) = stopped {
                    warn!("Stop after failure also failed: {}", secondary);
                }
                self.state = SessionState::Failed;
                return Err(primary);
            }
        };

        self.reporter.finish();
        self.state = SessionState::Closed;

        let summary = SessionSummary {
            active_for,
            frames: stats.snapshot(),
            reports: self.reporter.reports(),
            cancelled: matches!(outcome, WaitOutcome::Cancelled),
        };
        info!(
            "Session closed after {:.3}s: {}",
            summary.active_for.as_secs_f64(),
            summary.frames
        );
        Ok(summary)
    }

    fn wait(
        &self,
        handle: &P::Handle,
        duration_seconds: i64,
        started: Instant,
        cancel: &CancelToken,
    ) -> CaptureResult<WaitOutcome> {
        let budget = Duration::from_secs(duration_seconds.max(0) as u64);
        loop {
            let elapsed = started.elapsed();
            if elapsed >= budget {
                return Ok(WaitOutcome::Elapsed);
            }
            if cancel.is_cancelled() {
                info!("Recording cancelled at {:.3}s", elapsed.as_secs_f64());
                return Ok(WaitOutcome::Cancelled);
            }
            self.pipeline.check(handle)?;
            thread::sleep(self.timing.poll_interval.min(budget - elapsed));
        }
    }
}

/// Per-frame callback: count the frame, print progress when due, contain any panic
fn progress_callback(reporter: Arc<ProgressReporter>, stats: Arc<FrameStats>) -> FrameCallback {
    Arc::new(move |frame: &Frame| {
        let handled = panic::catch_unwind(AssertUnwindSafe(|| {
            stats.record(frame.modality());
            reporter.report_if_due(frame.timestamp);
        }));
        if handled.is_err() {
            warn!(
                "Progress callback panicked on {} frame {}",
                frame.modality(),
                frame.meta.sequence
            );
        }
    })
}
