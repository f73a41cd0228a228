//! The connection hub.
//!
//! A single task owns the registry and applies [`HubEvent`]s one at a time in
//! queue order. Nothing else can reach the registry: session loops and HTTP
//! handlers talk to the hub through a cloned [`HubHandle`].
//!
//! The event queue is bounded. When it is full, senders wait, so a burst of
//! incoming messages slows down the sockets producing it instead of growing
//! memory. Events are never dropped.

pub mod event;
mod registry;

use std::time::Duration;

use futures::future::join_all;
use metrics::{counter, gauge};
use relay_core::{BoxReader, BoxWriter, ConnectionId, Frame, TransportError};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub use event::{Handback, HubEvent, HubSnapshot, Registration};
use registry::{Client, Registry};

use crate::metrics::{
    BROADCASTS_TOTAL, CONNECTIONS_REGISTERED, FANOUT_FAILURES_TOTAL, HANDSHAKE_FAILURES_TOTAL,
};

/// Hub tuning knobs.
#[derive(Clone, Debug)]
pub struct HubConfig {
    /// Event queue capacity.
    pub capacity: usize,
    /// Deadline for reading a connection's name frame.
    pub handshake_timeout: Duration,
    /// Deadline for each recipient's write during fan-out.
    pub write_timeout: Duration,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            capacity: 256,
            handshake_timeout: Duration::from_secs(10),
            write_timeout: Duration::from_secs(5),
        }
    }
}

/// The hub task has stopped and accepts no more events.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("relay hub is no longer running")]
pub struct HubClosed;

/// Format a fan-out message for one recipient.
///
/// The prefix is the recipient's own stored name, not the sender's: every
/// recipient sees `[<its name>]: <text>`.
pub fn format_message(identity: &str, text: &str) -> String {
    format!("[{identity}]: {text}")
}

/// Cloneable sender side of the hub's event queue.
#[derive(Clone, Debug)]
pub struct HubHandle {
    events: mpsc::Sender<HubEvent>,
}

impl HubHandle {
    /// Hand a connection to the hub for registration.
    ///
    /// Returns once the event is queued, not once registration finished. The
    /// returned receiver resolves with the [`Handback`] after the hub read the
    /// name frame. If the hub is gone the halves come straight back as `Err`.
    pub async fn register(
        &self,
        id: ConnectionId,
        reader: BoxReader,
        writer: BoxWriter,
    ) -> Result<oneshot::Receiver<Handback>, Handback> {
        let Ok(permit) = self.events.reserve().await else {
            return Err(Handback {
                reader,
                writer: Some(writer),
            });
        };
        let (reply, rx) = oneshot::channel();
        permit.send(HubEvent::Register(Registration {
            id,
            reader,
            writer,
            reply,
        }));
        Ok(rx)
    }

    /// Queue a message for fan-out.
    pub async fn broadcast(&self, text: String) -> Result<(), HubClosed> {
        self.events
            .send(HubEvent::Broadcast(text))
            .await
            .map_err(|_| HubClosed)
    }

    /// Queue removal of a connection. Safe to call more than once.
    pub async fn unregister(&self, id: ConnectionId) -> Result<(), HubClosed> {
        self.events
            .send(HubEvent::Unregister(id))
            .await
            .map_err(|_| HubClosed)
    }

    /// Ask the hub for its current membership.
    ///
    /// The answer reflects every event queued before this call.
    pub async fn snapshot(&self) -> Result<HubSnapshot, HubClosed> {
        let (reply, rx) = oneshot::channel();
        self.events
            .send(HubEvent::Inspect(reply))
            .await
            .map_err(|_| HubClosed)?;
        rx.await.map_err(|_| HubClosed)
    }

    /// Whether the hub task has stopped.
    pub fn is_closed(&self) -> bool {
        self.events.is_closed()
    }
}

/// The hub actor. Create with [`Hub::new`], then drive with [`Hub::run`].
pub struct Hub {
    config: HubConfig,
    events: mpsc::Receiver<HubEvent>,
    registry: Registry,
}

impl Hub {
    /// Create a hub and the handle used to reach it.
    pub fn new(config: HubConfig) -> (Self, HubHandle) {
        let (tx, rx) = mpsc::channel(config.capacity.max(1));
        let hub = Self {
            config,
            events: rx,
            registry: Registry::default(),
        };
        (hub, HubHandle { events: tx })
    }

    /// Process events until every handle is dropped or `shutdown` fires.
    ///
    /// On exit every registered connection is sent a close frame and closed.
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!(
            capacity = self.config.capacity,
            write_timeout_ms = self.config.write_timeout.as_millis(),
            "hub started"
        );
        loop {
            let event = tokio::select! {
                biased;
                () = shutdown.cancelled() => break,
                event = self.events.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };
            self.handle(event).await;
        }
        self.events.close();
        self.close_all().await;
        info!("hub stopped");
    }

    async fn handle(&mut self, event: HubEvent) {
        match event {
            HubEvent::Register(registration) => self.register(registration).await,
            HubEvent::Broadcast(text) => self.broadcast(&text).await,
            HubEvent::Unregister(id) => self.unregister(id).await,
            HubEvent::Inspect(reply) => {
                let _ = reply.send(self.registry.snapshot());
            }
        }
    }

    async fn register(&mut self, registration: Registration) {
        let Registration {
            id,
            mut reader,
            writer,
            reply,
        } = registration;

        let identity = match timeout(self.config.handshake_timeout, read_name(&mut reader)).await {
            Ok(Ok(Some(name))) => Some(name),
            Ok(Ok(None)) => {
                warn!(conn_id = %id, "close frame before name, registration abandoned");
                None
            }
            Ok(Err(e)) => {
                warn!(conn_id = %id, error = %e, "handshake read failed, registration abandoned");
                None
            }
            Err(_) => {
                warn!(
                    conn_id = %id,
                    timeout_ms = self.config.handshake_timeout.as_millis(),
                    "handshake timed out, registration abandoned"
                );
                None
            }
        };

        let returned_writer = match identity {
            Some(identity) => {
                info!(conn_id = %id, %identity, "connection registered");
                if let Some(mut stale) = self.registry.insert(id, Client { identity, writer }) {
                    warn!(conn_id = %id, "replaced existing registration");
                    let _ = timeout(self.config.write_timeout, stale.writer.close()).await;
                } else {
                    gauge!(CONNECTIONS_REGISTERED).increment(1.0);
                }
                None
            }
            None => {
                counter!(HANDSHAKE_FAILURES_TOTAL).increment(1);
                Some(writer)
            }
        };

        let registered = returned_writer.is_none();
        if reply
            .send(Handback {
                reader,
                writer: returned_writer,
            })
            .is_err()
            && registered
        {
            // The session loop is gone and will never read from this connection.
            debug!(conn_id = %id, "session ended during registration");
            self.remove(id, false).await;
        }
    }

    async fn broadcast(&mut self, text: &str) {
        counter!(BROADCASTS_TOTAL).increment(1);
        debug!(recipients = self.registry.len(), len = text.len(), "fan-out");

        let write_timeout = self.config.write_timeout;
        let writes = self.registry.iter_mut().map(|(id, client)| {
            let message = format_message(&client.identity, text);
            async move {
                let result = timeout(write_timeout, client.writer.write_frame(Frame::Text(message)))
                    .await
                    .unwrap_or(Err(TransportError::Timeout(write_timeout)));
                (*id, result)
            }
        });

        let failed: Vec<ConnectionId> = join_all(writes)
            .await
            .into_iter()
            .filter_map(|(id, result)| match result {
                Ok(()) => None,
                Err(e) => {
                    warn!(conn_id = %id, error = %e, "write failed, dropping recipient");
                    Some(id)
                }
            })
            .collect();

        for id in failed {
            counter!(FANOUT_FAILURES_TOTAL).increment(1);
            self.remove(id, true).await;
        }
    }

    async fn unregister(&mut self, id: ConnectionId) {
        if self.remove(id, false).await {
            info!(conn_id = %id, "connection unregistered");
        } else {
            debug!(conn_id = %id, "unregister for unknown connection ignored");
        }
    }

    /// Remove `id` and close its writer. Returns whether it was registered.
    ///
    /// `send_close` sends a close frame first; used when a write failed and
    /// the peer may still be reading.
    async fn remove(&mut self, id: ConnectionId, send_close: bool) -> bool {
        let Some(client) = self.registry.remove(id) else {
            return false;
        };
        gauge!(CONNECTIONS_REGISTERED).decrement(1.0);
        Self::close_client(self.config.write_timeout, id, client, send_close).await;
        true
    }

    async fn close_client(
        deadline: Duration,
        id: ConnectionId,
        mut client: Client,
        send_close: bool,
    ) {
        if send_close {
            if let Ok(Err(e)) = timeout(deadline, client.writer.write_frame(Frame::Close)).await {
                debug!(conn_id = %id, error = %e, "close frame not delivered");
            }
        }
        match timeout(deadline, client.writer.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!(conn_id = %id, error = %e, "close failed"),
            Err(_) => debug!(conn_id = %id, "close timed out"),
        }
    }

    async fn close_all(&mut self) {
        let clients = self.registry.drain();
        if clients.is_empty() {
            return;
        }
        info!(count = clients.len(), "closing registered connections");
        gauge!(CONNECTIONS_REGISTERED).set(0.0);
        let deadline = self.config.write_timeout;
        let closes = clients
            .into_iter()
            .map(|(id, client)| Self::close_client(deadline, id, client, true));
        let _ = join_all(closes).await;
    }
}

/// Read the name frame, skipping keepalives.
///
/// A binary name is decoded lossily. `None` means the client closed first.
async fn read_name(reader: &mut BoxReader) -> Result<Option<String>, TransportError> {
    loop {
        match reader.read_frame().await? {
            Frame::Text(name) => return Ok(Some(name)),
            Frame::Binary(data) => return Ok(Some(String::from_utf8_lossy(&data).into_owned())),
            Frame::Ping(_) | Frame::Pong(_) => {}
            Frame::Close => return Ok(None),
        }
    }
}

/// Spawn a hub on the current runtime.
pub fn spawn(
    config: HubConfig,
    shutdown: CancellationToken,
) -> (HubHandle, tokio::task::JoinHandle<()>) {
    let (hub, handle) = Hub::new(config);
    (handle, tokio::spawn(hub.run(shutdown)))
}
