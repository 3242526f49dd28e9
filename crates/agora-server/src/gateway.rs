//! Session gateway.
//!
//! Owns the set of live sessions and runs the per-session lifecycle
//! `Connecting → Open → Closed`. Transports call [`SessionGateway::on_connect`]
//! when a client arrives, [`SessionGateway::on_action`] per inbound frame, and
//! [`SessionGateway::on_disconnect`] when the client leaves. The gateway never
//! touches sockets; it writes to the session's outbound queue.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use agora_core::{Frame, InboundFrame, Principal, SessionId};
use agora_pubsub::{PushError, SessionHandle, SubscriptionRegistry, TopicRouter};
use metrics::{counter, gauge, histogram};
use parking_lot::{Mutex, RwLock};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::metrics::{
    WS_CONNECTION_DURATION_SECONDS, WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_REJECTED_TOTAL,
    WS_CONNECTIONS_TOTAL, WS_DISCONNECTIONS_TOTAL,
};
use crate::rpc::context::ActionContext;
use crate::rpc::registry::ActionRegistry;

/// Gateway errors surfaced to the transport.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GatewayError {
    /// The connection carried no valid credentials.
    #[error("authentication required")]
    Unauthenticated,
    /// The connection limit is reached.
    #[error("connection limit of {limit} reached")]
    CapacityExceeded {
        /// Configured limit.
        limit: usize,
    },
    /// The session is closed; nothing was written.
    #[error("session {0} is closed")]
    SessionClosed(SessionId),
}

impl GatewayError {
    /// HTTP status the transport answers with before upgrading.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Unauthenticated => 403,
            Self::CapacityExceeded { .. } => 503,
            Self::SessionClosed(_) => 410,
        }
    }
}

/// Lifecycle state of a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Accepted by the transport, not yet admitted.
    Connecting,
    /// Admitted; actions are served.
    Open,
    /// Terminal.
    Closed,
}

/// A live session as tracked by the gateway.
#[derive(Debug)]
pub struct Session {
    handle: Arc<SessionHandle>,
    state: Mutex<SessionState>,
}

impl Session {
    /// Outbound handle shared with the registry.
    pub fn handle(&self) -> &Arc<SessionHandle> {
        &self.handle
    }

    /// Session id.
    pub fn id(&self) -> &SessionId {
        &self.handle.id
    }

    /// Current lifecycle state.
    ///
    /// A session evicted by the dispatcher reports `Closed` even before the
    /// transport calls `on_disconnect`.
    pub fn state(&self) -> SessionState {
        if self.handle.is_closed() {
            return SessionState::Closed;
        }
        *self.state.lock()
    }
}

/// Gateway configuration.
#[derive(Clone, Debug)]
pub struct GatewayConfig {
    /// Maximum concurrently open sessions.
    pub max_connections: usize,
    /// Reject connections without a principal.
    pub require_auth: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            max_connections: 10_000,
            require_auth: true,
        }
    }
}

/// Admits sessions, serves their actions, and tears them down.
pub struct SessionGateway {
    config: GatewayConfig,
    sessions: RwLock<HashMap<SessionId, Arc<Session>>>,
    subscriptions: Arc<SubscriptionRegistry>,
    router: Arc<dyn TopicRouter>,
    actions: Arc<ActionRegistry>,
}

impl SessionGateway {
    /// Create a gateway.
    pub fn new(
        config: GatewayConfig,
        subscriptions: Arc<SubscriptionRegistry>,
        router: Arc<dyn TopicRouter>,
        actions: Arc<ActionRegistry>,
    ) -> Self {
        Self {
            config,
            sessions: RwLock::new(HashMap::new()),
            subscriptions,
            router,
            actions,
        }
    }

    /// Admit a new session writing to `outbound`.
    pub fn on_connect(
        &self,
        principal: Option<Principal>,
        outbound: mpsc::Sender<Arc<String>>,
    ) -> Result<Arc<Session>, GatewayError> {
        let handle = Arc::new(SessionHandle::new(SessionId::new(), principal, outbound));
        let session = Arc::new(Session {
            handle,
            state: Mutex::new(SessionState::Connecting),
        });

        let rejection = if self.config.require_auth && session.handle.principal().is_none() {
            Some(GatewayError::Unauthenticated)
        } else {
            let mut sessions = self.sessions.write();
            if sessions.len() >= self.config.max_connections {
                Some(GatewayError::CapacityExceeded {
                    limit: self.config.max_connections,
                })
            } else {
                let _ = sessions.insert(session.id().clone(), Arc::clone(&session));
                None
            }
        };

        if let Some(err) = rejection {
            *session.state.lock() = SessionState::Closed;
            let _ = session.handle.close();
            session.handle.release();
            counter!(WS_CONNECTIONS_REJECTED_TOTAL, "reason" => err.http_status().to_string()).increment(1);
            info!(session_id = %session.id(), error = %err, "connection rejected");
            return Err(err);
        }

        *session.state.lock() = SessionState::Open;
        counter!(WS_CONNECTIONS_TOTAL).increment(1);
        gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);
        info!(
            session_id = %session.id(),
            principal = session.handle.principal().map(|p| p.id.as_str()),
            "session opened"
        );
        Ok(session)
    }

    /// Serve one action and write the reply to the session.
    ///
    /// The handler races the session's cancellation token; a disconnect in
    /// the middle abandons it and nothing is written.
    pub async fn on_action(&self, session: &Session, frame: InboundFrame) -> Result<Frame, GatewayError> {
        if session.state() != SessionState::Open {
            return Err(GatewayError::SessionClosed(session.id().clone()));
        }

        let ctx = ActionContext {
            session: Arc::clone(&session.handle),
            request_id: frame.request_id.clone(),
            subscriptions: Arc::clone(&self.subscriptions),
            router: Arc::clone(&self.router),
        };
        let action = frame.action.clone();
        let cancel = session.handle.cancellation().clone();

        let reply = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                debug!(session_id = %session.id(), action, "action abandoned on disconnect");
                return Err(GatewayError::SessionClosed(session.id().clone()));
            }
            reply = self.actions.dispatch(frame, &ctx) => reply,
        };

        match session.handle.push(&reply) {
            Ok(()) => Ok(reply),
            Err(PushError::Closed) => Err(GatewayError::SessionClosed(session.id().clone())),
            Err(err) => {
                warn!(session_id = %session.id(), action, error = %err, "failed to enqueue reply");
                Ok(reply)
            }
        }
    }

    /// Tear a session down. Idempotent.
    ///
    /// Order: mark closed, cancel in-flight actions, release subscriptions,
    /// then drop the outbound sender. Once this returns nothing more is
    /// queued for the session.
    pub fn on_disconnect(&self, session: &Session) {
        *session.state.lock() = SessionState::Closed;
        let _ = session.handle.close();
        let released = self.subscriptions.unsubscribe_all(session.id());
        session.handle.release();

        if self.sessions.write().remove(session.id()).is_some() {
            counter!(WS_DISCONNECTIONS_TOTAL).increment(1);
            gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
            histogram!(WS_CONNECTION_DURATION_SECONDS).record(session.handle.age().as_secs_f64());
            info!(
                session_id = %session.id(),
                subscriptions = released,
                dropped = session.handle.drop_count(),
                "session closed"
            );
        }
    }

    /// Disconnect every live session (shutdown path).
    pub fn close_all(&self) -> usize {
        let sessions: Vec<Arc<Session>> = self.sessions.read().values().cloned().collect();
        for session in &sessions {
            self.on_disconnect(session);
        }
        sessions.len()
    }

    /// Look up a live session.
    pub fn session(&self, id: &SessionId) -> Option<Arc<Session>> {
        self.sessions.read().get(id).cloned()
    }

    /// Number of live sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.read().len()
    }

    /// The shared subscription registry.
    pub fn subscriptions(&self) -> &Arc<SubscriptionRegistry> {
        &self.subscriptions
    }

    /// The registered actions.
    pub fn actions(&self) -> &Arc<ActionRegistry> {
        &self.actions
    }

    /// Time limit applied to handlers, for diagnostics.
    pub fn handler_timeout(&self) -> Duration {
        self.actions.timeout()
    }
}
