//! # relay
//!
//! Relay server binary: loads settings, installs logging and metrics, and
//! serves until Ctrl-C.

#![deny(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use relay_settings::RelaySettings;
use relay_server::{LandingPage, RelayServer, ServerConfig};

/// Real-time WebSocket message relay.
#[derive(Parser, Debug)]
#[command(name = "relay", about = "Real-time WebSocket message relay")]
struct Cli {
    /// Listen address, e.g. `127.0.0.1:8080` or `:8080`.
    #[arg(long)]
    addr: Option<String>,

    /// Settings file (default `~/.relay/settings.json`, optional).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Hub event queue capacity.
    #[arg(long)]
    hub_capacity: Option<usize>,

    /// Deadline for a client's name frame, in milliseconds.
    #[arg(long)]
    handshake_timeout_ms: Option<u64>,

    /// Per-recipient write deadline, in milliseconds.
    #[arg(long)]
    write_timeout_ms: Option<u64>,

    /// HTML file served instead of the built-in landing page.
    #[arg(long)]
    landing_page: Option<PathBuf>,

    /// Log filter used when `RUST_LOG` is unset.
    #[arg(long)]
    log_level: Option<String>,

    /// Emit JSON log lines.
    #[arg(long)]
    log_json: bool,
}

impl Cli {
    /// Overlay flags that were given on top of loaded settings.
    fn apply(&self, settings: &mut RelaySettings) {
        if let Some(addr) = &self.addr {
            settings.server.addr.clone_from(addr);
        }
        if let Some(capacity) = self.hub_capacity {
            settings.server.hub_capacity = capacity;
        }
        if let Some(ms) = self.handshake_timeout_ms {
            settings.server.handshake_timeout_ms = ms;
        }
        if let Some(ms) = self.write_timeout_ms {
            settings.server.write_timeout_ms = ms;
        }
        if let Some(path) = &self.landing_page {
            settings.server.landing_page = Some(path.to_string_lossy().into_owned());
        }
        if let Some(level) = &self.log_level {
            settings.logging.level.clone_from(level);
        }
        if self.log_json {
            settings.logging.json = true;
        }
    }

    fn load_settings(&self) -> Result<RelaySettings> {
        let mut settings = match &self.config {
            Some(path) => relay_settings::load_settings_from_path(path)
                .with_context(|| format!("Failed to load settings from {}", path.display()))?,
            None => relay_settings::load_settings().context("Failed to load settings")?,
        };
        self.apply(&mut settings);
        settings.validate().context("Invalid settings")?;
        Ok(settings)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    let settings = args.load_settings()?;

    relay_core::logging::init_subscriber(&settings.logging.level, settings.logging.json);

    let metrics = relay_server::metrics::install_recorder()
        .context("Failed to install metrics recorder")?;
    let config = ServerConfig::from_settings(&settings.server).context("Invalid server settings")?;
    let landing = LandingPage::load(config.landing_page.as_deref())
        .await
        .context("Failed to load landing page")?;

    let handle = RelayServer::new(config, landing)
        .with_metrics(metrics)
        .listen()
        .await
        .context("Failed to bind server")?;

    tracing::info!("Relay listening on http://{}", handle.addr());

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    if !handle.stop(None).await {
        tracing::warn!("some tasks did not stop in time");
    }
    tracing::info!("Shutdown complete");
    Ok(())
}
