//! # relay-server
//!
//! Axum HTTP + `WebSocket` server and the connection hub behind it.
//!
//! - Connection hub: one task owning the registry, reached through a bounded queue
//! - `WebSocket` sessions: name handshake, message forwarding, exactly-once cleanup
//! - HTTP endpoints: health check, Prometheus metrics, landing page
//! - Graceful shutdown via `tokio::signal` + `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod errors;
pub mod health;
pub mod hub;
pub mod landing;
pub mod metrics;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use config::ServerConfig;
pub use errors::ServerError;
pub use hub::{HubClosed, HubConfig, HubHandle};
pub use landing::LandingPage;
pub use server::{RelayServer, ServerHandle};
