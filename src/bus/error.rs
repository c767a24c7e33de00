//! Error types for message bus operations

use std::fmt;

/// Result type alias for bus operations
pub type BusResult<T> = Result<T, BusError>;

/// Errors that can occur while talking to the message bus
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusError {
    /// Publish attempted before `connect` or after `disconnect`
    NotConnected,

    /// The bus client rejected the request
    Client(String),

    /// Disconnect did not complete cleanly
    Disconnect(String),
}

impl fmt::Display for BusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BusError::NotConnected => write!(f, "message bus is not connected"),
            BusError::Client(msg) => write!(f, "message bus client error: {}", msg),
            BusError::Disconnect(msg) => write!(f, "failed to disconnect from message bus: {}", msg),
        }
    }
}

impl std::error::Error for BusError {}

impl From<rumqttc::ClientError> for BusError {
    fn from(err: rumqttc::ClientError) -> Self {
        BusError::Client(err.to_string())
    }
}
