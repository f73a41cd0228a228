//! Connection handles, frames, and the transport halves.
//!
//! A physical connection is split into a [`FrameReader`] owned by exactly one
//! session loop and a [`FrameWriter`] owned by the hub once the connection is
//! registered. The core never sees how frames are encoded on the wire.

#[cfg(any(test, feature = "test-util"))]
pub mod memory;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

use crate::errors::TransportError;

/// Stable identity of one accepted connection.
///
/// Allocated once per connection from a process-wide counter and used as the
/// registry key. Two connections never share an id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

impl ConnectionId {
    /// Allocate the next unused id.
    pub fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn_{}", self.0)
    }
}

/// One framed message on a connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Frame {
    /// UTF-8 text message.
    Text(String),
    /// Opaque binary message.
    Binary(Vec<u8>),
    /// Keepalive ping.
    Ping(Vec<u8>),
    /// Keepalive pong.
    Pong(Vec<u8>),
    /// Close handshake.
    Close,
}

impl Frame {
    /// Short frame kind name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Binary(_) => "binary",
            Self::Ping(_) => "ping",
            Self::Pong(_) => "pong",
            Self::Close => "close",
        }
    }
}

/// Receive half of a connection.
#[async_trait]
pub trait FrameReader: Send + 'static {
    /// Wait for the next frame.
    ///
    /// Returns [`TransportError::Closed`] once the peer is gone.
    async fn read_frame(&mut self) -> Result<Frame, TransportError>;
}

/// Send half of a connection.
#[async_trait]
pub trait FrameWriter: Send + 'static {
    /// Write one frame.
    async fn write_frame(&mut self, frame: Frame) -> Result<(), TransportError>;

    /// Flush and shut down the send half. Further writes fail.
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Owned, type-erased receive half.
pub type BoxReader = Box<dyn FrameReader>;

/// Owned, type-erased send half.
pub type BoxWriter = Box<dyn FrameWriter>;
