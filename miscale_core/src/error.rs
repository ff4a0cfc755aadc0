use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ScaleError {
    #[error("invalid profile: {0}")]
    InvalidProfile(String),
    #[error("a weigh-in session is already running")]
    SessionAlreadyRunning,
    #[error("malformed payload: expected at least {min} bytes, got {len}")]
    MalformedPayload { len: usize, min: usize },
    #[error("transport failure: {0}")]
    TransportFailure(String),
    #[error("timeout waiting for scale")]
    Timeout,
    #[error("persistence failure: {0}")]
    PersistenceFailure(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("session cancelled")]
    Cancelled,
}

impl ScaleError {
    /// Stable machine-readable name for logs and JSON output.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidProfile(_) => "InvalidProfile",
            Self::SessionAlreadyRunning => "SessionAlreadyRunning",
            Self::MalformedPayload { .. } => "MalformedPayload",
            Self::TransportFailure(_) => "TransportFailure",
            Self::Timeout => "Timeout",
            Self::PersistenceFailure(_) => "PersistenceFailure",
            Self::Config(_) => "Config",
            Self::Cancelled => "Cancelled",
        }
    }
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing transport factory")]
    MissingTransport,
    #[error("missing measurement store")]
    MissingStore,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
