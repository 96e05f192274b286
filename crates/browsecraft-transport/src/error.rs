//! Transport-level error kinds.

use browsecraft_core::ProtocolError;
use thiserror::Error;

/// Everything a pending command, or `send`, can resolve with besides success.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("'{operation}' timed out after {elapsed_ms}ms")]
    Timeout { operation: String, elapsed_ms: u64 },

    #[error("connection closed")]
    ConnectionClosed,
}
