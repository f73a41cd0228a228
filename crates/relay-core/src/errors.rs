//! Transport error types.

use std::time::Duration;

use thiserror::Error;

/// Errors raised by a connection's read or write half.
///
/// Every variant is local to one connection: the hub and the session loop
/// react by unregistering and closing that connection only.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The peer went away or the half was already closed.
    #[error("connection closed")]
    Closed,
    /// The underlying transport failed.
    #[error("transport error: {0}")]
    Io(String),
    /// The operation did not finish within its deadline.
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

impl TransportError {
    /// Wrap any displayable transport failure.
    pub fn io(err: impl std::fmt::Display) -> Self {
        Self::Io(err.to_string())
    }

    /// Whether the error is an orderly end of stream rather than a failure.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }
}
