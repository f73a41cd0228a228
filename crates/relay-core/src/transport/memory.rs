//! In-process transport backed by unbounded channels.
//!
//! [`pipe`] returns the server-side halves plus a [`MemoryPeer`] playing the
//! remote client. The peer can inject write failures or stall writes, which
//! is how the hub's failure paths are exercised without sockets.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{Frame, FrameReader, FrameWriter};
use crate::errors::TransportError;

#[derive(Default)]
struct Faults {
    fail_writes: AtomicBool,
    stall_writes: AtomicBool,
    writer_closed: AtomicBool,
}

/// Server-side receive half of an in-memory connection.
pub struct MemoryReader {
    inbound: mpsc::UnboundedReceiver<Frame>,
}

/// Server-side send half of an in-memory connection.
pub struct MemoryWriter {
    outbound: Option<mpsc::UnboundedSender<Frame>>,
    faults: Arc<Faults>,
}

/// The remote end of an in-memory connection.
pub struct MemoryPeer {
    inbound: Option<mpsc::UnboundedSender<Frame>>,
    outbound: mpsc::UnboundedReceiver<Frame>,
    faults: Arc<Faults>,
}

/// Create a connected reader/writer pair and the peer driving it.
pub fn pipe() -> (MemoryReader, MemoryWriter, MemoryPeer) {
    let (in_tx, in_rx) = mpsc::unbounded_channel();
    let (out_tx, out_rx) = mpsc::unbounded_channel();
    let faults = Arc::new(Faults::default());
    (
        MemoryReader { inbound: in_rx },
        MemoryWriter {
            outbound: Some(out_tx),
            faults: faults.clone(),
        },
        MemoryPeer {
            inbound: Some(in_tx),
            outbound: out_rx,
            faults,
        },
    )
}

#[async_trait]
impl FrameReader for MemoryReader {
    async fn read_frame(&mut self) -> Result<Frame, TransportError> {
        self.inbound.recv().await.ok_or(TransportError::Closed)
    }
}

#[async_trait]
impl FrameWriter for MemoryWriter {
    async fn write_frame(&mut self, frame: Frame) -> Result<(), TransportError> {
        let Some(tx) = self.outbound.as_ref() else {
            return Err(TransportError::Closed);
        };
        if self.faults.fail_writes.load(Ordering::Relaxed) {
            return Err(TransportError::io("injected write failure"));
        }
        if self.faults.stall_writes.load(Ordering::Relaxed) {
            return std::future::pending().await;
        }
        tx.send(frame).map_err(|_| TransportError::Closed)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.faults.writer_closed.store(true, Ordering::Relaxed);
        match self.outbound.take() {
            Some(_) => Ok(()),
            None => Err(TransportError::Closed),
        }
    }
}

impl MemoryPeer {
    /// Send a frame to the server. Returns `false` once the reader is gone.
    pub fn send(&self, frame: Frame) -> bool {
        self.inbound
            .as_ref()
            .is_some_and(|tx| tx.send(frame).is_ok())
    }

    /// Send a text frame to the server.
    pub fn send_text(&self, text: &str) -> bool {
        self.send(Frame::Text(text.to_owned()))
    }

    /// Wait for the next frame written by the server.
    ///
    /// Returns `None` once the server closed or dropped its send half.
    pub async fn recv(&mut self) -> Option<Frame> {
        self.outbound.recv().await
    }

    /// Take a frame written by the server, if one is already queued.
    pub fn try_recv(&mut self) -> Option<Frame> {
        self.outbound.try_recv().ok()
    }

    /// Drop the client's send side; the server's next read fails with
    /// [`TransportError::Closed`].
    pub fn hang_up(&mut self) {
        self.inbound = None;
    }

    /// Make every subsequent server write fail.
    pub fn fail_writes(&self) {
        self.faults.fail_writes.store(true, Ordering::Relaxed);
    }

    /// Make every subsequent server write block forever.
    pub fn stall_writes(&self) {
        self.faults.stall_writes.store(true, Ordering::Relaxed);
    }

    /// Whether the server called [`FrameWriter::close`] on its send half.
    pub fn writer_closed(&self) -> bool {
        self.faults.writer_closed.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn peer_to_reader() {
        let (mut reader, _writer, peer) = pipe();
        assert!(peer.send_text("alice"));
        assert_eq!(reader.read_frame().await.unwrap(), Frame::Text("alice".into()));
    }

    #[tokio::test]
    async fn writer_to_peer() {
        let (_reader, mut writer, mut peer) = pipe();
        writer.write_frame(Frame::Text("hi".into())).await.unwrap();
        assert_eq!(peer.recv().await, Some(Frame::Text("hi".into())));
    }

    #[tokio::test]
    async fn hang_up_closes_reader() {
        let (mut reader, _writer, mut peer) = pipe();
        peer.hang_up();
        assert_matches!(reader.read_frame().await, Err(TransportError::Closed));
        assert!(!peer.send_text("late"));
    }

    #[tokio::test]
    async fn injected_failure() {
        let (_reader, mut writer, peer) = pipe();
        peer.fail_writes();
        assert_matches!(
            writer.write_frame(Frame::Text("x".into())).await,
            Err(TransportError::Io(_))
        );
    }

    #[tokio::test]
    async fn close_ends_peer_stream() {
        let (_reader, mut writer, mut peer) = pipe();
        writer.close().await.unwrap();
        assert!(peer.writer_closed());
        assert_eq!(peer.recv().await, None);
        assert_matches!(
            writer.write_frame(Frame::Close).await,
            Err(TransportError::Closed)
        );
        assert_matches!(writer.close().await, Err(TransportError::Closed));
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_write_never_completes() {
        let (_reader, mut writer, peer) = pipe();
        peer.stall_writes();
        let result = tokio::time::timeout(
            std::time::Duration::from_secs(1),
            writer.write_frame(Frame::Text("x".into())),
        )
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn dropped_peer_fails_writes() {
        let (_reader, mut writer, peer) = pipe();
        drop(peer);
        assert_matches!(
            writer.write_frame(Frame::Text("x".into())).await,
            Err(TransportError::Closed)
        );
    }
}
