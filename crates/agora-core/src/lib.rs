//! # agora-core
//!
//! Foundation types shared by every Agora crate.
//!
//! - **Branded IDs**: [`SessionId`] newtype and the client-supplied [`RequestId`]
//! - **Principals**: [`Principal`], the authenticated identity behind a session
//! - **Change events**: [`ChangeEvent`] emitted by the storage layer
//! - **Wire frames**: [`InboundFrame`] (client → server) and [`Frame`] (server → client)
//! - **Rules**: [`RouteRule`] and [`VisibilityRule`], the data that drives topic
//!   routing and per-recipient redaction
//! - **Logging**: `tracing` subscriber setup and a capture layer for tests

#![deny(unsafe_code)]

pub mod event;
pub mod frame;
pub mod ids;
pub mod logging;
pub mod principal;
pub mod rules;

pub use event::{ChangeEvent, ChangeKind, GroupKey};
pub use frame::{Frame, FrameError, InboundFrame};
pub use ids::{RequestId, SessionId};
pub use principal::Principal;
pub use rules::{ParentRoute, RouteRule, VisibilityRule};
