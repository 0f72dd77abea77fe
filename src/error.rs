use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("{0}")]
    Validation(String),

    #[error("{0} not available")]
    Unavailable(String),

    #[error("{message}: {details}")]
    Execution { message: String, details: String },

    #[error("capture timeout after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CaptureError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn execution(message: impl Into<String>, details: impl Into<String>) -> Self {
        Self::Execution {
            message: message.into(),
            details: details.into(),
        }
    }

    /// Short label used for log fields and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Unavailable(_) => "unavailable",
            Self::Execution { .. } => "execution",
            Self::Timeout(_) => "timeout",
            Self::Io(_) => "io",
        }
    }
}

pub type Result<T> = std::result::Result<T, CaptureError>;
