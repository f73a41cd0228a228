//! # relay-core
//!
//! Foundation types shared by every relay crate.
//!
//! - [`transport`]: the [`Frame`](transport::Frame) model, connection handles,
//!   and the read/write halves every transport implements
//! - [`errors`]: transport error taxonomy
//! - [`logging`]: `tracing` subscriber setup

#![deny(unsafe_code)]

pub mod errors;
pub mod logging;
pub mod transport;

pub use errors::TransportError;
pub use transport::{BoxReader, BoxWriter, ConnectionId, Frame, FrameReader, FrameWriter};
