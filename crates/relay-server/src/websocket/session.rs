//! Session loop: drives one connection from registration to close.
//!
//! 1. Hands the connection to the hub as a `Register` event
//! 2. Waits for the hub to return the read half after the name handshake
//! 3. Forwards every text frame as a `Broadcast` event
//! 4. On close frame, read error, or hub shutdown: unregisters and closes
//!
//! Step 4 runs exactly once on every exit path. A [`SessionGuard`] performs it
//! explicitly on normal exit and from `Drop` if the task unwinds or is aborted.

use metrics::counter;
use relay_core::{BoxReader, BoxWriter, ConnectionId, Frame};
use tracing::{debug, info, instrument, warn};

use crate::hub::HubHandle;
use crate::metrics::IGNORED_FRAMES_TOTAL;

/// Owns a session's cleanup obligation.
struct SessionGuard {
    hub: HubHandle,
    id: ConnectionId,
    /// Send half still owned by the session (registration abandoned).
    writer: Option<BoxWriter>,
    released: bool,
}

impl SessionGuard {
    fn new(hub: HubHandle, id: ConnectionId) -> Self {
        Self {
            hub,
            id,
            writer: None,
            released: false,
        }
    }

    fn keep_writer(&mut self, writer: Option<BoxWriter>) {
        self.writer = writer;
    }

    /// Run cleanup now. Marked done only once it finished, so an abort while
    /// the hub queue is full still leaves the work to `Drop`.
    async fn release(mut self) {
        cleanup(&self.hub, self.id, &mut self.writer).await;
        self.released = true;
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let hub = self.hub.clone();
        let id = self.id;
        let mut writer = self.writer.take();
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let _ = runtime.spawn(async move { cleanup(&hub, id, &mut writer).await });
            }
            Err(_) => warn!(conn_id = %id, "no runtime for session cleanup"),
        }
    }
}

/// Unregister, then close whatever send half the session still owns.
///
/// The writer is taken only after the unregister was queued.
async fn cleanup(hub: &HubHandle, id: ConnectionId, writer: &mut Option<BoxWriter>) {
    if hub.unregister(id).await.is_err() {
        debug!(conn_id = %id, "hub stopped before unregister");
    }
    if let Some(mut writer) = writer.take() {
        if let Err(e) = writer.close().await {
            debug!(conn_id = %id, error = %e, "close failed");
        }
    }
}

/// Run the session loop for one accepted connection.
#[instrument(skip_all, fields(conn_id = %id))]
pub async fn run_session(hub: HubHandle, id: ConnectionId, reader: BoxReader, writer: BoxWriter) {
    info!("client connected");
    let mut guard = SessionGuard::new(hub.clone(), id);

    let pending = match hub.register(id, reader, writer).await {
        Ok(pending) => pending,
        Err(handback) => {
            debug!("hub stopped before registration");
            guard.keep_writer(handback.writer);
            guard.release().await;
            return;
        }
    };

    let Ok(handback) = pending.await else {
        debug!("hub stopped during registration");
        guard.release().await;
        return;
    };
    guard.keep_writer(handback.writer);
    let mut reader = handback.reader;

    loop {
        match reader.read_frame().await {
            Ok(Frame::Text(text)) => {
                if hub.broadcast(text).await.is_err() {
                    debug!("hub stopped, ending session");
                    break;
                }
            }
            Ok(Frame::Close) => {
                info!("client sent close frame");
                break;
            }
            Ok(frame) => {
                counter!(IGNORED_FRAMES_TOTAL).increment(1);
                info!(kind = frame.kind(), "ignoring non-text frame");
            }
            Err(e) if e.is_closed() => {
                debug!("stream ended");
                break;
            }
            Err(e) => {
                warn!(error = %e, "read error");
                break;
            }
        }
    }

    guard.release().await;
    drop(reader);
    info!("client disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use relay_core::transport::memory::{self, MemoryPeer};
    use tokio_util::sync::CancellationToken;

    use crate::hub::{self, HubConfig, HubSnapshot};

    fn start_hub() -> (HubHandle, CancellationToken, tokio::task::JoinHandle<()>) {
        let token = CancellationToken::new();
        let config = HubConfig {
            capacity: 16,
            handshake_timeout: Duration::from_secs(1),
            write_timeout: Duration::from_millis(200),
        };
        let (handle, task) = hub::spawn(config, token.clone());
        (handle, token, task)
    }

    fn open(hub: &HubHandle) -> (ConnectionId, MemoryPeer, tokio::task::JoinHandle<()>) {
        let (reader, writer, peer) = memory::pipe();
        let id = ConnectionId::next();
        let task = tokio::spawn(run_session(
            hub.clone(),
            id,
            Box::new(reader),
            Box::new(writer),
        ));
        (id, peer, task)
    }

    async fn wait_for(hub: &HubHandle, pred: impl Fn(&HubSnapshot) -> bool) -> HubSnapshot {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let snap = hub.snapshot().await.unwrap();
                if pred(&snap) {
                    return snap;
                }
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("condition not reached")
    }

    #[tokio::test]
    async fn registers_and_relays_text() {
        let (hub, _token, _task) = start_hub();
        let (alice, mut peer_a, _ta) = open(&hub);
        let (bob, mut peer_b, _tb) = open(&hub);
        assert!(peer_a.send_text("alice"));
        assert!(peer_b.send_text("bob"));
        let snap = wait_for(&hub, |s| s.len() == 2).await;
        assert_eq!(snap.identity(alice), Some("alice"));
        assert_eq!(snap.identity(bob), Some("bob"));

        assert!(peer_a.send_text("hello"));
        assert_eq!(peer_a.recv().await, Some(Frame::Text("[alice]: hello".into())));
        assert_eq!(peer_b.recv().await, Some(Frame::Text("[bob]: hello".into())));
    }

    #[tokio::test]
    async fn non_text_frames_are_ignored() {
        let (hub, _token, _task) = start_hub();
        let (_id, mut peer, _t) = open(&hub);
        assert!(peer.send_text("alice"));
        let _ = wait_for(&hub, |s| s.len() == 1).await;

        assert!(peer.send(Frame::Binary(vec![1, 2, 3])));
        assert!(peer.send(Frame::Ping(vec![])));
        assert!(peer.send_text("after"));

        assert_eq!(peer.recv().await, Some(Frame::Text("[alice]: after".into())));
        assert!(peer.try_recv().is_none());
    }

    #[tokio::test]
    async fn ping_before_name_still_registers() {
        let (hub, _token, _task) = start_hub();
        let (_bob, mut peer_b, _tb) = open(&hub);
        assert!(peer_b.send_text("bob"));
        let _ = wait_for(&hub, |s| s.len() == 1).await;

        let (alice, mut peer_a, _ta) = open(&hub);
        assert!(peer_a.send(Frame::Ping(vec![])));
        assert!(peer_a.send_text("alice"));
        let snap = wait_for(&hub, |s| s.contains(alice)).await;
        assert_eq!(snap.identity(alice), Some("alice"));

        // the name was not relayed as a chat message
        assert!(peer_b.try_recv().is_none());
        assert!(peer_a.send_text("hi"));
        assert_eq!(peer_b.recv().await, Some(Frame::Text("[bob]: hi".into())));
        assert_eq!(peer_a.recv().await, Some(Frame::Text("[alice]: hi".into())));
    }

    #[tokio::test]
    async fn binary_name_registers() {
        let (hub, _token, _task) = start_hub();
        let (id, mut peer, _t) = open(&hub);
        assert!(peer.send(Frame::Binary(b"carol".to_vec())));
        let snap = wait_for(&hub, |s| s.contains(id)).await;
        assert_eq!(snap.identity(id), Some("carol"));

        assert!(peer.send_text("hey"));
        assert_eq!(peer.recv().await, Some(Frame::Text("[carol]: hey".into())));
    }

    #[tokio::test]
    async fn release_aborted_on_full_queue_still_cleans_up() {
        let config = HubConfig {
            capacity: 1,
            ..HubConfig::default()
        };
        let (actor, handle) = hub::Hub::new(config);
        let (_reader, writer, peer) = memory::pipe();
        let mut guard = SessionGuard::new(handle.clone(), ConnectionId::next());
        guard.keep_writer(Some(Box::new(writer)));

        // hub not running yet: this fills the queue
        handle.broadcast("filler".into()).await.unwrap();
        let task = tokio::spawn(guard.release());
        tokio::task::yield_now().await;
        task.abort();
        let _ = task.await;
        assert!(!peer.writer_closed());

        let _hub_task = tokio::spawn(actor.run(CancellationToken::new()));
        tokio::time::timeout(Duration::from_secs(5), async {
            while !peer.writer_closed() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("writer never closed");
    }

    #[tokio::test]
    async fn close_frame_unregisters_and_closes() {
        let (hub, _token, _task) = start_hub();
        let (id, mut peer, task) = open(&hub);
        assert!(peer.send_text("alice"));
        let _ = wait_for(&hub, |s| s.contains(id)).await;

        assert!(peer.send(Frame::Close));
        task.await.unwrap();

        assert!(!hub.snapshot().await.unwrap().contains(id));
        assert!(peer.writer_closed());
        assert_eq!(peer.recv().await, None);
    }

    #[tokio::test]
    async fn hang_up_unregisters() {
        let (hub, _token, _task) = start_hub();
        let (id, mut peer, task) = open(&hub);
        assert!(peer.send_text("alice"));
        let _ = wait_for(&hub, |s| s.contains(id)).await;

        peer.hang_up();
        task.await.unwrap();
        assert!(hub.snapshot().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn abandoned_registration_closes_own_writer() {
        let (hub, _token, _task) = start_hub();
        let (id, mut peer, task) = open(&hub);
        assert!(peer.send(Frame::Close));
        peer.hang_up();
        task.await.unwrap();

        assert!(!hub.snapshot().await.unwrap().contains(id));
        assert!(peer.writer_closed());
    }

    #[tokio::test]
    async fn hub_shutdown_ends_session() {
        let (hub, token, hub_task) = start_hub();
        let (id, mut peer, task) = open(&hub);
        assert!(peer.send_text("alice"));
        let _ = wait_for(&hub, |s| s.contains(id)).await;

        token.cancel();
        hub_task.await.unwrap();
        assert_eq!(peer.recv().await, Some(Frame::Close));

        // the client answers the close; the session's read loop ends
        peer.hang_up();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn session_on_stopped_hub_returns() {
        let (hub, token, hub_task) = start_hub();
        token.cancel();
        hub_task.await.unwrap();

        let (_id, peer, task) = open(&hub);
        task.await.unwrap();
        assert!(peer.writer_closed());
    }

    #[tokio::test]
    async fn aborted_session_still_unregisters() {
        let (hub, _token, _task) = start_hub();
        let (id, peer, task) = open(&hub);
        assert!(peer.send_text("alice"));
        let _ = wait_for(&hub, |s| s.contains(id)).await;

        task.abort();
        let _ = task.await;
        let _ = wait_for(&hub, |s| !s.contains(id)).await;
        assert!(peer.writer_closed());
    }
}
