//! Ping/pong liveness tracking.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

/// What the writer should do on a heartbeat tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatResult {
    /// Send the next ping.
    Ping,
    /// The client has been silent past the timeout.
    TimedOut,
}

/// Liveness of one connection, fed by the reader and checked by the writer.
#[derive(Debug)]
pub struct Liveness {
    alive: AtomicBool,
    last_seen: Mutex<Instant>,
    timeout: Duration,
}

impl Liveness {
    /// Start alive; silence longer than `timeout` is fatal.
    pub fn new(timeout: Duration) -> Self {
        Self {
            alive: AtomicBool::new(true),
            last_seen: Mutex::new(Instant::now()),
            timeout,
        }
    }

    /// Record inbound activity (any frame, including pongs).
    pub fn mark_alive(&self) {
        self.alive.store(true, Ordering::Relaxed);
        *self.last_seen.lock() = Instant::now();
    }

    /// Time since the last inbound activity.
    pub fn silent_for(&self) -> Duration {
        self.last_seen.lock().elapsed()
    }

    /// Called on every ping tick. Resets the alive flag.
    pub fn tick(&self) -> HeartbeatResult {
        let alive = self.alive.swap(false, Ordering::Relaxed);
        if !alive && self.silent_for() > self.timeout {
            HeartbeatResult::TimedOut
        } else {
            HeartbeatResult::Ping
        }
    }
}
