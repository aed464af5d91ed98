pub mod controller;
pub mod progress;

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub use controller::{CaptureSession, SessionState, SessionSummary, SessionTiming};
pub use progress::ProgressReporter;

use crate::capture::{Pipeline, StreamDeclaration};
use crate::error::CaptureResult;
use crate::{RecordingConfig, Settings};

/// Shared flag that ends the wait loop early
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Record the standard stream set for `config` on `pipeline`, printing progress to `out`
pub fn record<P: Pipeline>(
    config: &RecordingConfig,
    settings: &Settings,
    pipeline: P,
    out: impl Write + Send + 'static,
    cancel: &CancelToken,
) -> CaptureResult<SessionSummary> {
    let declaration = StreamDeclaration::for_recording(config);
    let mut session = CaptureSession::new(
        pipeline,
        ProgressReporter::new(out),
        SessionTiming::from(settings),
    );
    session.record(&declaration, config.duration_seconds, cancel)
}
