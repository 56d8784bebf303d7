use thiserror::Error as ThisError;

/// Error kinds surfaced by the gateway.
///
/// Cache waiters share a cloned `Result`, so every variant carries owned,
/// clonable data; foreign errors are stringified at the boundary instead of
/// being held transparently.
#[derive(ThisError, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("failed to parse request: {0}")]
    ParseFailure(String),

    #[error("invalid request parameter: {0}")]
    InvalidParameter(String),

    #[error("required dependency missing: {0}")]
    DependencyMissing(String),

    #[error("command execution failed: {0}")]
    ExecError(String),

    #[error("query returned no usable data")]
    EmptyResult,

    #[error("I/O error: {0}")]
    Io(String),

    #[error("relay protocol error: {0}")]
    Relay(String),
}

impl From<std::io::Error> for GatewayError {
    fn from(err: std::io::Error) -> Self {
        GatewayError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        GatewayError::ParseFailure(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;
