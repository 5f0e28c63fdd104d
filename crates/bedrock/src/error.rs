use riverbed_eventstream::FrameError;
use riverbed_tool_runtime::{ErrorKind, LlmError};

#[derive(Debug, thiserror::Error)]
pub enum BedrockError {
    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error("{0}")]
    Protocol(String),

    /// An exception frame or error event sent by the service mid-stream.
    #[error("{event_type}: {message}")]
    Upstream { event_type: String, message: String },

    #[error("throttled: {0}")]
    Throttled(String),

    #[error("{dialect} dialect does not support {capability}")]
    Unsupported {
        dialect: &'static str,
        capability: &'static str,
    },

    #[error("{0}")]
    InvalidRequest(String),

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("{0}")]
    Transport(String),

    #[error("{0}")]
    InvalidResponse(String),
}

impl BedrockError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Frame(e) if e.is_corruption() => ErrorKind::FrameCorruption,
            Self::Frame(_) | Self::Transport(_) => ErrorKind::Transport,
            Self::Protocol(_) => ErrorKind::ProtocolViolation,
            Self::Upstream { .. } | Self::InvalidResponse(_) => ErrorKind::Provider,
            Self::Throttled(_) => ErrorKind::RateLimited,
            Self::Http { status: 429, .. } => ErrorKind::RateLimited,
            Self::Http { .. } => ErrorKind::Provider,
            Self::Unsupported { .. } => ErrorKind::CapabilityUnsupported,
            Self::InvalidRequest(_) => ErrorKind::InvalidRequest,
        }
    }

    /// Classify a mid-stream exception by its type name.
    pub fn from_exception(event_type: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        match event_type {
            "throttlingException" | "overloaded_error" | "rate_limit_error" => {
                Self::Throttled(message)
            }
            _ => Self::Upstream {
                event_type: event_type.to_string(),
                message,
            },
        }
    }

    pub(crate) fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }
}

impl From<reqwest::Error> for BedrockError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(e.to_string())
    }
}

impl From<BedrockError> for LlmError {
    fn from(e: BedrockError) -> Self {
        match e {
            BedrockError::InvalidResponse(message) => LlmError::InvalidResponse(message),
            other => LlmError::from_kind(other.kind(), other.to_string()),
        }
    }
}
