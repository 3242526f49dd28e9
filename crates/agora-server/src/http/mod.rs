//! Plain HTTP endpoints: change ingest and health.

pub mod events;
pub mod health;
