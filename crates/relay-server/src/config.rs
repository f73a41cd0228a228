//! Server configuration.

use std::net::SocketAddr;
use std::path::PathBuf;

use relay_settings::{ServerSettings, SettingsError};

use crate::hub::HubConfig;

/// Resolved configuration for [`RelayServer`](crate::server::RelayServer).
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Address to bind. Port `0` picks a free port.
    pub addr: SocketAddr,
    /// Hub queue size and deadlines.
    pub hub: HubConfig,
    /// Max inbound WebSocket message size in bytes.
    pub max_message_size: usize,
    /// HTML file replacing the built-in landing page.
    pub landing_page: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            hub: HubConfig::default(),
            max_message_size: 64 * 1024,
            landing_page: None,
        }
    }
}

impl ServerConfig {
    /// Build from loaded settings.
    pub fn from_settings(settings: &ServerSettings) -> Result<Self, SettingsError> {
        Ok(Self {
            addr: settings.socket_addr()?,
            hub: HubConfig {
                capacity: settings.hub_capacity,
                handshake_timeout: settings.handshake_timeout(),
                write_timeout: settings.write_timeout(),
            },
            max_message_size: settings.max_message_size,
            landing_page: settings.landing_page.as_ref().map(PathBuf::from),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn default_binds_loopback_ephemeral() {
        let cfg = ServerConfig::default();
        assert!(cfg.addr.ip().is_loopback());
        assert_eq!(cfg.addr.port(), 0);
        assert_eq!(cfg.hub.capacity, 256);
    }

    #[test]
    fn from_default_settings() {
        let cfg = ServerConfig::from_settings(&ServerSettings::default()).unwrap();
        assert_eq!(cfg.addr, "0.0.0.0:8080".parse().unwrap());
        assert_eq!(cfg.hub.handshake_timeout, Duration::from_secs(10));
        assert_eq!(cfg.hub.write_timeout, Duration::from_secs(5));
        assert_eq!(cfg.max_message_size, 64 * 1024);
        assert!(cfg.landing_page.is_none());
    }

    #[test]
    fn port_shorthand_binds_all_interfaces() {
        let settings = ServerSettings {
            addr: ":9001".into(),
            landing_page: Some("/srv/index.html".into()),
            ..ServerSettings::default()
        };
        let cfg = ServerConfig::from_settings(&settings).unwrap();
        assert_eq!(cfg.addr, "0.0.0.0:9001".parse().unwrap());
        assert_eq!(cfg.landing_page, Some(PathBuf::from("/srv/index.html")));
    }

    #[test]
    fn bad_addr_rejected() {
        let settings = ServerSettings {
            addr: "not an address".into(),
            ..ServerSettings::default()
        };
        assert!(matches!(
            ServerConfig::from_settings(&settings),
            Err(SettingsError::InvalidAddr { .. })
        ));
    }
}
