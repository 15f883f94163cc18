//! Bridge-wide error definitions.

use thiserror::Error;

use crate::correlation::CorrelationKey;

/// Errors raised by the correlation and dispatch core.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Missing or invalid element parameter. Fatal to element initialization.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A listener is already registered under this key.
    #[error("There is a connection already established for {key}")]
    DuplicateRegistration { key: CorrelationKey },

    /// The transport could not deliver the request or produce a response.
    #[error("Connection unavailable for {url}: {reason}")]
    ConnectionUnavailable { url: String, reason: String },

    /// The outbound request could not be built (bad header, bad URI).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Reading a message payload failed.
    #[error("Payload error: {0}")]
    Payload(String),

    /// The worker pool was closed before the job could run.
    #[error("Worker pool closed")]
    PoolClosed,

    /// The task resolving a send ended without reporting a state.
    #[error("Delivery task aborted")]
    DeliveryAborted,
}

impl BridgeError {
    /// True for errors the sending element may choose to retry.
    pub fn is_connection_unavailable(&self) -> bool {
        matches!(self, BridgeError::ConnectionUnavailable { .. })
    }
}

/// Result type for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;
