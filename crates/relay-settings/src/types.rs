//! Settings types.
//!
//! All types use camelCase JSON keys and `#[serde(default)]`, so a settings
//! file only needs the keys it overrides.

use std::net::SocketAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings object.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelaySettings {
    /// Network and hub settings.
    pub server: ServerSettings,
    /// Log output settings.
    pub logging: LoggingSettings,
}

impl RelaySettings {
    /// Check every value the server relies on.
    pub fn validate(&self) -> Result<()> {
        let _ = self.server.socket_addr()?;
        if self.server.hub_capacity == 0 {
            return Err(SettingsError::InvalidValue(
                "hubCapacity must be at least 1".into(),
            ));
        }
        if self.server.handshake_timeout_ms == 0 || self.server.write_timeout_ms == 0 {
            return Err(SettingsError::InvalidValue(
                "timeouts must be at least 1ms".into(),
            ));
        }
        if self.server.max_message_size == 0 {
            return Err(SettingsError::InvalidValue(
                "maxMessageSize must be at least 1 byte".into(),
            ));
        }
        Ok(())
    }
}

/// Server network and hub settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Listen address. A bare `:port` binds every interface.
    pub addr: String,
    /// Capacity of the hub's event queue. Senders wait when it is full.
    pub hub_capacity: usize,
    /// How long the hub waits for a client's name frame.
    pub handshake_timeout_ms: u64,
    /// Per-recipient deadline for one fan-out write.
    pub write_timeout_ms: u64,
    /// Largest inbound WebSocket message accepted, in bytes.
    pub max_message_size: usize,
    /// HTML file served instead of the built-in landing page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub landing_page: Option<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:8080".to_string(),
            hub_capacity: 256,
            handshake_timeout_ms: 10_000,
            write_timeout_ms: 5_000,
            max_message_size: 64 * 1024,
            landing_page: None,
        }
    }
}

impl ServerSettings {
    /// Parse [`addr`](Self::addr) into a socket address.
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        normalize_addr(&self.addr)
            .parse()
            .map_err(|e: std::net::AddrParseError| SettingsError::InvalidAddr {
                addr: self.addr.clone(),
                reason: e.to_string(),
            })
    }

    /// Registration handshake deadline.
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    /// Fan-out write deadline.
    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}

/// Expand the `:port` shorthand to `0.0.0.0:port`.
pub fn normalize_addr(addr: &str) -> String {
    let addr = addr.trim();
    if addr.starts_with(':') {
        format!("0.0.0.0{addr}")
    } else {
        addr.to_string()
    }
}

/// Log output settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Filter directive used when `RUST_LOG` is unset.
    pub level: String,
    /// Emit JSON lines instead of compact text.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}
