//! WebSocket transport: per-connection reader and writer tasks.

pub mod heartbeat;
pub mod session;
