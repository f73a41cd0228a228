//! `RelayServer`: Axum HTTP + WebSocket server.
//!
//! Routes:
//! - `GET /ws`: WebSocket upgrade into the relay protocol
//! - `GET /health`: JSON liveness and registered connection count
//! - `GET /metrics`: Prometheus text, when a recorder is installed
//! - anything else: the landing page

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use axum::Router;
use axum::extract::State;
use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse, Json, Response};
use axum::routing::get;
use metrics::counter;
use metrics_exporter_prometheus::PrometheusHandle;
use relay_core::ConnectionId;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::ServerConfig;
use crate::errors::ServerError;
use crate::health::{self, HealthResponse};
use crate::hub::{self, HubHandle};
use crate::landing::LandingPage;
use crate::metrics::CONNECTIONS_TOTAL;
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::{adapter, session};

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Sender side of the hub's event queue.
    pub hub: HubHandle,
    /// Page served for every non-API path.
    pub landing: LandingPage,
    /// When the server started.
    pub start_time: Instant,
    /// Renders `/metrics`; `None` disables the endpoint.
    pub metrics: Option<PrometheusHandle>,
    /// Max inbound WebSocket message size in bytes.
    pub max_message_size: usize,
}

impl AppState {
    /// State with the embedded landing page and no metrics.
    pub fn new(hub: HubHandle) -> Self {
        Self {
            hub,
            landing: LandingPage::embedded(),
            start_time: Instant::now(),
            metrics: None,
            max_message_size: ServerConfig::default().max_message_size,
        }
    }
}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .fallback(landing_handler)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// The relay server, ready to bind.
pub struct RelayServer {
    config: ServerConfig,
    landing: LandingPage,
    metrics: Option<PrometheusHandle>,
    shutdown: ShutdownCoordinator,
}

impl RelayServer {
    /// Create a server serving `landing` on non-API paths.
    pub fn new(config: ServerConfig, landing: LandingPage) -> Self {
        Self {
            config,
            landing,
            metrics: None,
            shutdown: ShutdownCoordinator::new(),
        }
    }

    /// Expose `handle` on `/metrics`.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Bind the listener, start the hub, and serve in the background.
    pub async fn listen(self) -> Result<ServerHandle, ServerError> {
        let addr = self.config.addr;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        let local_addr = listener.local_addr()?;

        let token = self.shutdown.token();
        let (hub, hub_task) = hub::spawn(self.config.hub.clone(), token.clone());

        let state = AppState {
            hub: hub.clone(),
            landing: self.landing,
            start_time: Instant::now(),
            metrics: self.metrics,
            max_message_size: self.config.max_message_size,
        };
        let router = build_router(state);

        info!(addr = %local_addr, "relay listening");

        let server_task = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router)
                .with_graceful_shutdown(token.cancelled_owned())
                .await
            {
                error!(error = %e, "server error");
            }
            info!("listener stopped");
        });

        Ok(ServerHandle {
            addr: local_addr,
            hub,
            shutdown: self.shutdown,
            tasks: vec![server_task, hub_task],
        })
    }
}

/// Handle to a running server. Keeps the background tasks reachable.
pub struct ServerHandle {
    addr: SocketAddr,
    hub: HubHandle,
    shutdown: ShutdownCoordinator,
    tasks: Vec<JoinHandle<()>>,
}

impl ServerHandle {
    /// Address actually bound (resolves port `0`).
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// The hub serving this listener.
    pub fn hub(&self) -> &HubHandle {
        &self.hub
    }

    /// Whether [`stop`](Self::stop) or another holder of the token fired.
    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_shutting_down()
    }

    /// Stop accepting, close every registered connection, and wait for the
    /// listener and hub tasks up to `timeout`.
    pub async fn stop(self, timeout: Option<Duration>) -> bool {
        info!("shutting down");
        self.shutdown.graceful_shutdown(self.tasks, timeout).await
    }
}

/// GET /ws
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let hub = state.hub.clone();
    ws.max_message_size(state.max_message_size)
        .on_upgrade(move |socket| handle_socket(socket, hub))
}

/// Run one upgraded connection to completion.
async fn handle_socket(socket: WebSocket, hub: HubHandle) {
    let id = ConnectionId::next();
    counter!(CONNECTIONS_TOTAL).increment(1);
    let (reader, writer) = adapter::split(socket);
    session::run_session(hub, id, Box::new(reader), Box::new(writer)).await;
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let connections = state.hub.snapshot().await.ok().map(|snap| snap.len());
    let resp = health::health_check(state.start_time, connections);
    let status = if resp.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(resp))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn landing_handler(State(state): State<AppState>) -> Html<String> {
    state.landing.response()
}
