//! Messages accepted by the hub.

use std::fmt;

use relay_core::{BoxReader, BoxWriter, ConnectionId};
use tokio::sync::oneshot;

/// One unit of work for the hub. Events are processed strictly in the order
/// they were queued.
pub enum HubEvent {
    /// Read the connection's name frame and start delivering to it.
    Register(Registration),
    /// Fan a message out to every registered connection.
    Broadcast(String),
    /// Forget a connection and close its send half. Unknown ids are ignored.
    Unregister(ConnectionId),
    /// Report current membership without changing it.
    Inspect(oneshot::Sender<HubSnapshot>),
}

impl fmt::Debug for HubEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Register(r) => f.debug_tuple("Register").field(&r.id).finish(),
            Self::Broadcast(text) => f.debug_tuple("Broadcast").field(&text.len()).finish(),
            Self::Unregister(id) => f.debug_tuple("Unregister").field(id).finish(),
            Self::Inspect(_) => f.write_str("Inspect"),
        }
    }
}

/// A connection handed to the hub for registration.
///
/// The read half is lent only for the name handshake and always comes back
/// through `reply`, so the session loop stays its single long-term reader.
pub struct Registration {
    /// Connection identity and registry key.
    pub id: ConnectionId,
    /// Receive half, returned in the [`Handback`].
    pub reader: BoxReader,
    /// Send half, kept by the hub on success.
    pub writer: BoxWriter,
    /// Where the hub returns what the session still owns.
    pub reply: oneshot::Sender<Handback>,
}

/// What the hub gives back to a session loop after handling its registration.
pub struct Handback {
    /// The receive half, always returned.
    pub reader: BoxReader,
    /// The send half, returned only when registration was abandoned. The
    /// session loop is then responsible for closing it.
    pub writer: Option<BoxWriter>,
}

impl Handback {
    /// Whether the connection made it into the registry.
    pub fn is_registered(&self) -> bool {
        self.writer.is_none()
    }
}

impl fmt::Debug for Handback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handback")
            .field("registered", &self.is_registered())
            .finish_non_exhaustive()
    }
}

/// Point-in-time view of the registry.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HubSnapshot {
    /// Registered connections and their names, ordered by id.
    pub clients: Vec<(ConnectionId, String)>,
}

impl HubSnapshot {
    /// Number of registered connections.
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Whether nobody is registered.
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Whether `id` is registered.
    pub fn contains(&self, id: ConnectionId) -> bool {
        self.clients.iter().any(|(c, _)| *c == id)
    }

    /// Name stored for `id`.
    pub fn identity(&self, id: ConnectionId) -> Option<&str> {
        self.clients
            .iter()
            .find(|(c, _)| *c == id)
            .map(|(_, name)| name.as_str())
    }
}
