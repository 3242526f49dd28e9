//! Action dispatch: context, errors, registry, validation, built-in handlers.

pub mod context;
pub mod errors;
pub mod handlers;
pub mod registry;
pub mod validation;
