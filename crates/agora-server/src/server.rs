//! `AgoraServer`: Axum HTTP + WebSocket server wiring the gateway, the
//! dispatcher and the change feed together.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use agora_pubsub::{
    ChangeDispatcher, ChangeFeed, FeedPublisher, FeedWorker, PolicyAuthorizer, Renderer, RouteTable,
    SnapshotRenderer, SubscriptionRegistry, TopicRouter,
};
use agora_settings::AgoraSettings;
use axum::Router;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::auth::{Authenticator, StaticTokenAuthenticator, extract_token};
use crate::config::ServerConfig;
use crate::gateway::{GatewayConfig, SessionGateway};
use crate::http::events::ingest_events;
use crate::http::health::{self, HealthCounts, HealthResponse};
use crate::rpc::handlers::register_builtin;
use crate::rpc::registry::ActionRegistry;
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::session::{WsTiming, run_ws_session};

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Session gateway.
    pub gateway: Arc<SessionGateway>,
    /// Resolves connection keys to principals.
    pub authenticator: Arc<dyn Authenticator>,
    /// Change feed publisher used by `POST /events`.
    pub feed: FeedPublisher,
    /// Runtime configuration.
    pub config: Arc<ServerConfig>,
    /// Prometheus handle for `/metrics`.
    pub metrics: PrometheusHandle,
    /// Deployment name reported by `/health`.
    pub name: Arc<str>,
    /// When the server started.
    pub start_time: Instant,
}

/// Pluggable collaborators.
pub struct ServerComponents {
    /// Deployment name reported by `/health`.
    pub name: String,
    /// Topic router shared by subscribe and dispatch.
    pub router: Arc<dyn TopicRouter>,
    /// Per-recipient payload renderer.
    pub renderer: Arc<dyn Renderer>,
    /// Connection authenticator.
    pub authenticator: Arc<dyn Authenticator>,
    /// Action handlers. Built-ins are registered by the constructors.
    pub actions: ActionRegistry,
}

impl ServerComponents {
    /// Components described by settings: route table, visibility policy,
    /// static tokens, built-in actions.
    pub fn from_settings(settings: &AgoraSettings) -> Self {
        let mut actions = ActionRegistry::new();
        register_builtin(&mut actions);
        Self {
            name: settings.name.clone(),
            router: Arc::new(RouteTable::new(settings.routes.iter().cloned())),
            renderer: Arc::new(SnapshotRenderer::new(PolicyAuthorizer::new(
                settings.visibility.iter().cloned(),
            ))),
            authenticator: Arc::new(StaticTokenAuthenticator::new(&settings.auth.tokens)),
            actions,
        }
    }
}

impl Default for ServerComponents {
    fn default() -> Self {
        Self::from_settings(&AgoraSettings::default())
    }
}

/// The Agora server.
pub struct AgoraServer {
    config: Arc<ServerConfig>,
    name: Arc<str>,
    subscriptions: Arc<SubscriptionRegistry>,
    dispatcher: Arc<ChangeDispatcher>,
    gateway: Arc<SessionGateway>,
    authenticator: Arc<dyn Authenticator>,
    feed: FeedPublisher,
    feed_worker: Mutex<Option<FeedWorker>>,
    shutdown: Arc<ShutdownCoordinator>,
    metrics: PrometheusHandle,
    start_time: Instant,
}

impl AgoraServer {
    /// Create a server from explicit components.
    pub fn new(config: ServerConfig, components: ServerComponents, metrics: PrometheusHandle) -> Self {
        let subscriptions = Arc::new(SubscriptionRegistry::new());
        let dispatcher = Arc::new(
            ChangeDispatcher::new(
                Arc::clone(&subscriptions),
                Arc::clone(&components.router),
                components.renderer,
            )
            .with_max_dropped_messages(config.max_dropped_messages),
        );
        let actions = Arc::new(components.actions.with_timeout(config.handler_timeout()));
        let gateway = Arc::new(SessionGateway::new(
            GatewayConfig {
                max_connections: config.max_connections,
                require_auth: config.require_auth,
            },
            Arc::clone(&subscriptions),
            components.router,
            actions,
        ));
        let (feed, worker) = ChangeFeed::channel(config.feed_capacity);

        Self {
            config: Arc::new(config),
            name: components.name.into(),
            subscriptions,
            dispatcher,
            gateway,
            authenticator: components.authenticator,
            feed,
            feed_worker: Mutex::new(Some(worker)),
            shutdown: Arc::new(ShutdownCoordinator::new()),
            metrics,
            start_time: Instant::now(),
        }
    }

    /// Create a server entirely from settings.
    pub fn from_settings(settings: &AgoraSettings, metrics: PrometheusHandle) -> Self {
        Self::new(
            ServerConfig::from_settings(settings),
            ServerComponents::from_settings(settings),
            metrics,
        )
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            gateway: Arc::clone(&self.gateway),
            authenticator: Arc::clone(&self.authenticator),
            feed: self.feed.clone(),
            config: Arc::clone(&self.config),
            metrics: self.metrics.clone(),
            name: Arc::clone(&self.name),
            start_time: self.start_time,
        };

        Router::new()
            .route("/ws", get(ws_handler))
            .route("/events", post(ingest_events))
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// Bind, start the change feed worker, and serve until shutdown.
    ///
    /// Both background tasks are tracked by the [`ShutdownCoordinator`], so
    /// `graceful_shutdown` waits for them. Can be called once.
    pub async fn listen(&self) -> std::io::Result<SocketAddr> {
        let Some(worker) = self.feed_worker.lock().take() else {
            return Err(std::io::Error::other("server is already listening"));
        };

        let listener = tokio::net::TcpListener::bind(self.config.bind_addr()).await?;
        let addr = listener.local_addr()?;
        let token = self.shutdown.token();

        let feed_task = {
            let dispatcher = Arc::clone(&self.dispatcher);
            let token = token.clone();
            tokio::spawn(async move {
                let dispatched = worker.run(dispatcher, token).await;
                info!(dispatched, "change feed stopped");
            })
        };
        self.shutdown.track("change-feed", feed_task);

        let graceful = {
            let token = token.clone();
            let gateway = Arc::clone(&self.gateway);
            async move {
                token.cancelled().await;
                let closed = gateway.close_all();
                info!(closed, "sessions closed for shutdown");
            }
        };
        let router = self.router();

        let http_task = tokio::spawn(async move {
            if let Err(err) = axum::serve(listener, router).with_graceful_shutdown(graceful).await {
                error!(error = %err, "server error");
            }
            // A failed listener still stops the feed.
            token.cancel();
            info!("http listener stopped");
        });
        self.shutdown.track("http", http_task);

        info!(%addr, "agora server listening");
        Ok(addr)
    }

    /// Publisher for in-process storage collaborators.
    pub fn feed(&self) -> &FeedPublisher {
        &self.feed
    }

    /// The session gateway.
    pub fn gateway(&self) -> &Arc<SessionGateway> {
        &self.gateway
    }

    /// The subscription registry.
    pub fn subscriptions(&self) -> &Arc<SubscriptionRegistry> {
        &self.subscriptions
    }

    /// The change dispatcher.
    pub fn dispatcher(&self) -> &Arc<ChangeDispatcher> {
        &self.dispatcher
    }

    /// The shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// The runtime configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// GET /ws
///
/// Resolves the principal and admits the session before upgrading, so
/// rejected clients get a plain HTTP status.
async fn ws_handler(
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
    State(state): State<AppState>,
) -> Response {
    let principal = match extract_token(&headers, &query) {
        Some(key) => state.authenticator.authenticate(key).await,
        None => None,
    };

    let (tx, rx) = mpsc::channel(state.config.send_queue_capacity.max(1));
    let session = match state.gateway.on_connect(principal, tx) {
        Ok(session) => session,
        Err(err) => {
            let status = StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::FORBIDDEN);
            return (status, err.to_string()).into_response();
        }
    };

    let timing = WsTiming {
        heartbeat_interval: state.config.heartbeat_interval(),
        pong_timeout: state.config.pong_timeout(),
    };
    let gateway = Arc::clone(&state.gateway);
    let failed_gateway = Arc::clone(&state.gateway);
    let failed_session = Arc::clone(&session);

    ws.max_message_size(state.config.max_message_size)
        .on_failed_upgrade(move |err| {
            warn!(session_id = %failed_session.id(), error = %err, "websocket upgrade failed");
            failed_gateway.on_disconnect(&failed_session);
        })
        .on_upgrade(move |socket| run_ws_session(socket, session, gateway, rx, timing))
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let subscriptions = state.gateway.subscriptions();
    let counts = HealthCounts {
        sessions: state.gateway.session_count(),
        topics: subscriptions.topic_count(),
        subscriptions: subscriptions.subscription_count(),
    };
    Json(health::health_check(&state.name, state.start_time, counts))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> String {
    crate::metrics::render(&state.metrics)
}
