//! The hub's connection registry.

use std::collections::HashMap;
use std::collections::hash_map::IterMut;

use relay_core::{BoxWriter, ConnectionId};

use super::event::HubSnapshot;

/// A registered connection.
pub(crate) struct Client {
    /// Display name from the registration handshake, stored verbatim.
    pub(crate) identity: String,
    /// Send half. Moved out and closed when the client is removed.
    pub(crate) writer: BoxWriter,
}

/// Map from connection id to client record. Owned by the hub task alone.
#[derive(Default)]
pub(crate) struct Registry {
    clients: HashMap<ConnectionId, Client>,
}

impl Registry {
    /// Insert a client. Returns the previous record if the id was present.
    pub(crate) fn insert(&mut self, id: ConnectionId, client: Client) -> Option<Client> {
        self.clients.insert(id, client)
    }

    /// Remove a client, handing back ownership of its writer.
    pub(crate) fn remove(&mut self, id: ConnectionId) -> Option<Client> {
        self.clients.remove(&id)
    }

    /// Remove every client.
    pub(crate) fn drain(&mut self) -> Vec<(ConnectionId, Client)> {
        self.clients.drain().collect()
    }

    pub(crate) fn iter_mut(&mut self) -> IterMut<'_, ConnectionId, Client> {
        self.clients.iter_mut()
    }

    pub(crate) fn len(&self) -> usize {
        self.clients.len()
    }

    pub(crate) fn snapshot(&self) -> HubSnapshot {
        let mut clients: Vec<_> = self
            .clients
            .iter()
            .map(|(id, client)| (*id, client.identity.clone()))
            .collect();
        clients.sort_by_key(|(id, _)| *id);
        HubSnapshot { clients }
    }
}
