use thiserror::Error;

/// Core error type for chatwire.
/// Internally, modules can use `anyhow::Result<T>` for convenience,
/// but public boundaries should expose `CoreResult<T>` with this error.
#[derive(Debug, Error)]
pub enum ChatWireError {
    #[error("validation failed: {0}")]
    Validation(String),

    /// Connection dropped or the backend answered with a non-2xx status.
    #[error("transport error: {status:?} {message}")]
    Transport {
        status: Option<u16>,
        message: String,
    },

    #[error("rate limited by backend")]
    RateLimited { retry_after: Option<u64> },

    #[error("backend unavailable")]
    Unavailable,

    /// A delimited unit whose payload could not be parsed.
    #[error("malformed event unit: {0}")]
    Framing(String),

    /// A well-formed event of a type this client does not understand.
    #[error("unrecognized event type: {0}")]
    Protocol(String),

    #[error("no data from backend within {after_ms}ms")]
    Timeout { after_ms: u64 },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ChatWireError {
    /// Stable short name used for telemetry and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Transport { .. } => "transport",
            Self::RateLimited { .. } => "rate_limited",
            Self::Unavailable => "unavailable",
            Self::Framing(_) => "framing",
            Self::Protocol(_) => "protocol",
            Self::Timeout { .. } => "timeout",
            Self::Io(_) => "io",
            Self::Other(_) => "other",
        }
    }
}

pub type CoreResult<T> = std::result::Result<T, ChatWireError>;
