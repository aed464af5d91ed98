use thiserror::Error;

pub type CaptureResult<T> = Result<T, CaptureError>;

/// Fatal session errors, reported once at the outermost boundary
#[derive(Debug, Error)]
pub enum CaptureError {
    /// The device layer rejected an operation (open, negotiation, recording, stop)
    #[error("device error calling {operation}({args}):\n    {message}")]
    Device {
        operation: String,
        args: String,
        message: String,
    },

    /// Anything else: filesystem, thread spawn, misuse of a session
    #[error("{0}")]
    Generic(String),
}

impl CaptureError {
    pub fn device(
        operation: impl Into<String>,
        args: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Device {
            operation: operation.into(),
            args: args.into(),
            message: message.into(),
        }
    }

    pub fn generic(message: impl Into<String>) -> Self {
        Self::Generic(message.into())
    }

    pub fn is_device(&self) -> bool {
        matches!(self, Self::Device { .. })
    }
}

impl From<std::io::Error> for CaptureError {
    fn from(e: std::io::Error) -> Self {
        Self::Generic(e.to_string())
    }
}
