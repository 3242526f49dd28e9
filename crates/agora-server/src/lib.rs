//! # agora-server
//!
//! Axum HTTP + `WebSocket` front end for the change-notification core.
//!
//! - Session gateway: admission, action dispatch, idempotent teardown
//! - Built-in actions: `subscribe`, `unsubscribe`, `subscriptions`, `ping`
//! - `WebSocket` transport with ping/pong liveness and bounded outbound queues
//! - `POST /events` ingest into the change feed, `/health`, `/metrics`
//! - Graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod auth;
pub mod config;
pub mod gateway;
pub mod http;
pub mod metrics;
pub mod rpc;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use config::ServerConfig;
pub use gateway::{GatewayError, Session, SessionGateway, SessionState};
pub use server::{AgoraServer, ServerComponents};
