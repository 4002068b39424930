//! Error types for droidpilot.

use thiserror::Error;

/// Primary error type for all droidpilot operations.
#[derive(Error, Debug)]
pub enum PilotError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Connect, timeout or socket failure talking to the inference endpoint.
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-2xx response; the body is kept verbatim for the output sink.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Pre-flight readiness check failed.
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Another request is already in flight for this session.
    #[error("A request is already in flight, please wait")]
    Busy,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Coarse classification used by callers deciding whether to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Network,
    Timeout,
    Server,
    Api,
    Decode,
    Unavailable,
    Busy,
    Invalid,
}

impl PilotError {
    pub fn http(status: u16, body: impl Into<String>) -> Self {
        Self::Http {
            status,
            body: body.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Configuration(_) => ErrorCategory::Configuration,
            Self::Transport(e) if e.is_timeout() => ErrorCategory::Timeout,
            Self::Transport(_) | Self::Io(_) => ErrorCategory::Network,
            Self::Timeout(_) => ErrorCategory::Timeout,
            Self::Http { status, .. } => match status {
                500..=599 => ErrorCategory::Server,
                _ => ErrorCategory::Api,
            },
            Self::Decode(_) | Self::Serialization(_) => ErrorCategory::Decode,
            Self::ServiceUnavailable(_) => ErrorCategory::Unavailable,
            Self::Busy => ErrorCategory::Busy,
            Self::InvalidArgument(_) => ErrorCategory::Invalid,
        }
    }

    /// Whether a caller may reasonably try again later. The tool loop
    /// itself never retries.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Network
                | ErrorCategory::Timeout
                | ErrorCategory::Server
                | ErrorCategory::Unavailable
                | ErrorCategory::Busy
        )
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, PilotError>;
