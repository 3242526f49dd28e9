//! WebSocket session lifecycle: one admitted client from upgrade through
//! disconnect.

use std::sync::Arc;
use std::time::Duration;

use agora_core::{Frame, InboundFrame};
use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

use super::heartbeat::{HeartbeatResult, Liveness};
use crate::gateway::{GatewayError, Session, SessionGateway};

/// Action name of the greeting sent after admission.
pub const CONNECTION_ESTABLISHED: &str = "connection.established";

/// How long the writer may take to flush after the session closes.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Transport timing for one session.
#[derive(Clone, Copy, Debug)]
pub struct WsTiming {
    /// Interval between server pings.
    pub heartbeat_interval: Duration,
    /// Silence allowed before the client is dropped.
    pub pong_timeout: Duration,
}

#[derive(Debug, PartialEq, Eq)]
enum Inbound {
    Text(String),
    Skip,
    Close,
}

fn classify(msg: Message) -> Inbound {
    match msg {
        Message::Text(text) => Inbound::Text(text.to_string()),
        Message::Binary(data) => match String::from_utf8(data.to_vec()) {
            Ok(text) => Inbound::Text(text),
            Err(_) => {
                debug!(len = data.len(), "ignoring non-UTF-8 binary frame");
                Inbound::Skip
            }
        },
        Message::Close(_) => Inbound::Close,
        Message::Ping(_) | Message::Pong(_) => Inbound::Skip,
    }
}

/// Drive an admitted session until either side goes away.
///
/// 1. Queues `connection.established` with the session id
/// 2. Spawns the writer: drains the outbound queue and pings on an interval
/// 3. Parses inbound frames and hands them to the gateway one at a time
/// 4. Calls `on_disconnect`, then lets the writer flush and send Close
#[instrument(skip_all, fields(session_id = %session.id()))]
pub async fn run_ws_session(
    ws: WebSocket,
    session: Arc<Session>,
    gateway: Arc<SessionGateway>,
    mut outbound: mpsc::Receiver<Arc<String>>,
    timing: WsTiming,
) {
    let (mut ws_tx, mut ws_rx) = ws.split();
    let liveness = Arc::new(Liveness::new(timing.pong_timeout));
    // Child of the session token: eviction or shutdown also stops the reader.
    let stop = session.handle().cancellation().child_token();

    let greeting = Frame::notice(CONNECTION_ESTABLISHED, json!({ "session_id": session.id() }));
    if let Err(err) = session.handle().push(&greeting) {
        warn!(error = %err, "failed to queue greeting");
    }

    let writer = {
        let liveness = Arc::clone(&liveness);
        let stop = stop.clone();
        tokio::spawn(async move {
            let mut ping_interval = tokio::time::interval(timing.heartbeat_interval);
            // Skip the immediate first tick
            let _ = ping_interval.tick().await;

            loop {
                tokio::select! {
                    msg = outbound.recv() => match msg {
                        Some(text) => {
                            if ws_tx.send(Message::Text(text.as_str().to_owned().into())).await.is_err() {
                                break;
                            }
                        }
                        None => {
                            let _ = ws_tx.send(Message::Close(None)).await;
                            break;
                        }
                    },
                    _ = ping_interval.tick() => {
                        if liveness.tick() == HeartbeatResult::TimedOut {
                            warn!(silent_for = ?liveness.silent_for(), "client unresponsive, disconnecting");
                            let _ = ws_tx.send(Message::Close(None)).await;
                            break;
                        }
                        if ws_tx.send(Message::Ping(vec![].into())).await.is_err() {
                            break;
                        }
                    }
                }
            }
            stop.cancel();
        })
    };

    loop {
        let msg = tokio::select! {
            biased;
            () = stop.cancelled() => break,
            msg = ws_rx.next() => msg,
        };
        let Some(Ok(msg)) = msg else { break };
        liveness.mark_alive();

        let text = match classify(msg) {
            Inbound::Text(text) => text,
            Inbound::Skip => continue,
            Inbound::Close => {
                info!("client sent close frame");
                break;
            }
        };

        match InboundFrame::parse(&text) {
            Ok(frame) => {
                if let Err(GatewayError::SessionClosed(_)) = gateway.on_action(&session, frame).await {
                    break;
                }
            }
            Err(err) => {
                debug!(error = %err, "unparseable frame");
                let reply = Frame::error("error", None, err.to_string(), 400);
                let _ = session.handle().push(&reply);
            }
        }
    }

    gateway.on_disconnect(&session);
    if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, writer).await.is_err() {
        debug!("writer did not finish draining in time");
    }
}
