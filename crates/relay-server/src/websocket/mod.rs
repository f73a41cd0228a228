//! WebSocket transport adapter and per-connection session loop.

pub mod adapter;
pub mod session;
