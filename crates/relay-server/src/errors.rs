//! Server error types.

use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

/// Errors that stop the server from starting.
///
/// Runtime failures on individual connections never surface here; they are
/// contained by the hub and the session loops.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listener could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Requested address.
        addr: SocketAddr,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The bound listener could not report its address.
    #[error("listener error: {0}")]
    Listener(#[from] std::io::Error),
    /// The landing page file could not be read.
    #[error("failed to read landing page {path}: {source}")]
    LandingPage {
        /// Configured file path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The metrics recorder could not be installed.
    #[error("failed to install metrics recorder: {0}")]
    Metrics(String),
    /// Settings could not be turned into a server configuration.
    #[error(transparent)]
    Settings(#[from] relay_settings::SettingsError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_error_mentions_addr() {
        let err = ServerError::Bind {
            addr: "127.0.0.1:80".parse().unwrap(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        let msg = err.to_string();
        assert!(msg.contains("127.0.0.1:80"));
        assert!(msg.contains("denied"));
    }

    #[test]
    fn settings_error_is_transparent() {
        let err: ServerError = relay_settings::SettingsError::InvalidValue("x".into()).into();
        assert_eq!(err.to_string(), "invalid settings value: x");
    }
}
