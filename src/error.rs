//! Error types for DarkTower
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using TowerError
pub type Result<T> = std::result::Result<T, TowerError>;

/// Failure reported by the transport adapter
///
/// The message text is kept verbatim: the retry policy classifies
/// failures by inspecting it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct TransportError {
    pub message: String,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Unified error type for DarkTower operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TowerError {
    // -------------------------------------------------------------------------
    // Transport Errors
    // -------------------------------------------------------------------------
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Tower is not connected")]
    NotConnected,

    // -------------------------------------------------------------------------
    // Protocol Errors
    // -------------------------------------------------------------------------
    #[error("Buffer too short: expected {expected} bytes, got {actual}")]
    BufferTooShort { expected: usize, actual: usize },

    #[error("Field {field} out of range: {value} (max {max})")]
    FieldOutOfRange {
        field: &'static str,
        value: u32,
        max: u32,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // -------------------------------------------------------------------------
    // Queue Errors
    // -------------------------------------------------------------------------
    #[error("Command queue cleared")]
    QueueCleared,

    #[error("Command queue shut down")]
    QueueShutdown,

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl TowerError {
    /// True for errors raised by the codecs (malformed or undersized buffers,
    /// out-of-range fields)
    pub fn is_protocol(&self) -> bool {
        matches!(
            self,
            TowerError::BufferTooShort { .. }
                | TowerError::FieldOutOfRange { .. }
                | TowerError::InvalidArgument(_)
        )
    }
}
