//! Device abstraction consumed by the session controller

use std::sync::Arc;

use crate::capture::frame::Frame;
use crate::capture::stream::StreamDeclaration;
use crate::error::CaptureResult;

/// Frame-arrival callback, invoked on device-owned threads
pub type FrameCallback = Arc<dyn Fn(&Frame) + Send + Sync>;

/// Streaming device + recorder.
///
/// `start` either opens every declared stream and the recording, or leaves nothing open.
/// The returned handle is consumed by `stop`, which blocks until the device has stopped
/// producing frames and the recording is flushed and closed.
pub trait Pipeline {
    type Handle: Send;

    fn start(
        &self,
        declaration: &StreamDeclaration,
        callback: FrameCallback,
    ) -> CaptureResult<Self::Handle>;

    /// Surface asynchronous faults while streaming
    fn check(&self, _handle: &Self::Handle) -> CaptureResult<()> {
        Ok(())
    }

    fn stop(&self, handle: Self::Handle) -> CaptureResult<()>;
}

impl<P: Pipeline + ?Sized> Pipeline for &P {
    type Handle = P::Handle;

    fn start(
        &self,
        declaration: &StreamDeclaration,
        callback: FrameCallback,
    ) -> CaptureResult<Self::Handle> {
        (**self).start(declaration, callback)
    }

    fn check(&self, handle: &Self::Handle) -> CaptureResult<()> {
        (**self).check(handle)
    }

    fn stop(&self, handle: Self::Handle) -> CaptureResult<()> {
        (**self).stop(handle)
    }
}
