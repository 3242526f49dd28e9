//! In-process change feed.
//!
//! Storage collaborators publish [`ChangeEvent`]s; a single worker drains
//! them in arrival order into [`ChangeDispatcher::dispatch`].

use std::sync::Arc;

use agora_core::ChangeEvent;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::dispatcher::ChangeDispatcher;

/// Feed errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FeedError {
    /// The worker has stopped.
    #[error("change feed is closed")]
    FeedClosed,
}

/// Constructor namespace for the feed pair.
pub struct ChangeFeed;

impl ChangeFeed {
    /// Bounded feed. Publishers wait when `capacity` events are queued.
    pub fn channel(capacity: usize) -> (FeedPublisher, FeedWorker) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (FeedPublisher { tx }, FeedWorker { rx })
    }
}

/// Cloneable sending side.
#[derive(Clone, Debug)]
pub struct FeedPublisher {
    tx: mpsc::Sender<ChangeEvent>,
}

impl FeedPublisher {
    /// Queue an event, waiting for room.
    pub async fn publish(&self, event: ChangeEvent) -> Result<(), FeedError> {
        self.tx.send(event).await.map_err(|_| FeedError::FeedClosed)
    }

    /// Whether the worker is gone.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Receiving side; run it once.
#[derive(Debug)]
pub struct FeedWorker {
    rx: mpsc::Receiver<ChangeEvent>,
}

impl FeedWorker {
    /// Dispatch events until cancelled or every publisher is dropped.
    ///
    /// Returns the number of events dispatched.
    #[instrument(skip_all, name = "change_feed")]
    pub async fn run(mut self, dispatcher: Arc<ChangeDispatcher>, cancel: CancellationToken) -> u64 {
        let mut dispatched = 0_u64;
        loop {
            let event = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    debug!("change feed cancelled");
                    break;
                }
                event = self.rx.recv() => match event {
                    Some(event) => event,
                    None => {
                        debug!("all publishers dropped");
                        break;
                    }
                },
            };
            let _ = dispatcher.dispatch(&event).await;
            dispatched += 1;
        }
        self.rx.close();
        info!(dispatched, "change feed stopped");
        dispatched
    }
}
