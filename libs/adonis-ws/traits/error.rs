use thiserror::Error;

/// Main error type for adonis-ws
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdonisError {
    /// Transport level failure (handshake, I/O, protocol)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Connection closed unexpectedly
    #[error("Connection closed: {0}")]
    ConnectionClosed(String),

    /// Outbound frame could not be serialized
    #[error("Encode error: {0}")]
    Encode(String),

    /// Inbound frame could not be parsed
    #[error("Decode error: {0}")]
    Decode(String),

    /// Caller handed us a payload that is not a JSON object
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The connection was terminated and accepts no further work
    #[error("Connection terminated")]
    Terminated,

    /// Generic error
    #[error("Error: {0}")]
    Other(String),
}

impl From<serde_json::Error> for AdonisError {
    fn from(e: serde_json::Error) -> Self {
        AdonisError::Decode(e.to_string())
    }
}

/// Result type for adonis-ws operations
pub type Result<T> = std::result::Result<T, AdonisError>;
