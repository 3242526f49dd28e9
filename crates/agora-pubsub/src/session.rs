//! Outbound handle of a connected session.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use agora_core::{Frame, Principal, SessionId};
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Why a frame did not reach the session queue.
#[derive(Debug, Error)]
pub enum PushError {
    /// The bounded queue is full; the frame was dropped.
    #[error("session queue full")]
    Full,
    /// The session is closed or its writer is gone.
    #[error("session channel closed")]
    Closed,
    /// The frame could not be serialized.
    #[error("failed to encode frame: {0}")]
    Encode(#[from] serde_json::Error),
}

/// A connected client as seen by the registry and the dispatcher.
///
/// Holds the sending half of the session's bounded outbound queue. The
/// transport owns the receiving half and writes whatever arrives to the
/// socket.
pub struct SessionHandle {
    /// Session id.
    pub id: SessionId,
    principal: Option<Principal>,
    tx: Mutex<Option<mpsc::Sender<Arc<String>>>>,
    closed: AtomicBool,
    dropped_messages: AtomicU64,
    cancel: CancellationToken,
    /// When the session was accepted.
    pub connected_at: Instant,
}

impl SessionHandle {
    /// Create a handle around an outbound sender.
    pub fn new(id: SessionId, principal: Option<Principal>, tx: mpsc::Sender<Arc<String>>) -> Self {
        Self {
            id,
            principal,
            tx: Mutex::new(Some(tx)),
            closed: AtomicBool::new(false),
            dropped_messages: AtomicU64::new(0),
            cancel: CancellationToken::new(),
            connected_at: Instant::now(),
        }
    }

    /// Authenticated principal, if any.
    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    /// Serialize `frame` and queue it.
    pub fn push(&self, frame: &Frame) -> Result<(), PushError> {
        let json = serde_json::to_string(frame)?;
        self.send(Arc::new(json))
    }

    /// Queue an already-serialized message without waiting.
    ///
    /// A full queue increments the drop counter.
    pub fn send(&self, message: Arc<String>) -> Result<(), PushError> {
        if self.is_closed() {
            return Err(PushError::Closed);
        }
        let guard = self.tx.lock();
        let Some(tx) = guard.as_ref() else {
            return Err(PushError::Closed);
        };
        match tx.try_send(message) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                let _ = self.dropped_messages.fetch_add(1, Ordering::Relaxed);
                Err(PushError::Full)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(PushError::Closed),
        }
    }

    /// Frames dropped on a full queue so far.
    pub fn drop_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }

    /// Whether [`close`](Self::close) has run.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Mark the session closed and cancel its in-flight work.
    ///
    /// Returns `true` for the call that performed the transition.
    pub fn close(&self) -> bool {
        let first = !self.closed.swap(true, Ordering::AcqRel);
        if first {
            self.cancel.cancel();
        }
        first
    }

    /// Drop the outbound sender so the transport's writer drains and exits.
    pub fn release(&self) {
        drop(self.tx.lock().take());
    }

    /// Token cancelled when the session closes.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Time since the session was accepted.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("id", &self.id)
            .field("principal", &self.principal)
            .field("closed", &self.is_closed())
            .field("dropped_messages", &self.drop_count())
            .finish_non_exhaustive()
    }
}
