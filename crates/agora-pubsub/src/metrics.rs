//! Metric names recorded by the dispatcher.

/// Change events dispatched (counter).
pub const DISPATCH_EVENTS_TOTAL: &str = "dispatch_events_total";
/// Frames pushed to session queues (counter).
pub const DISPATCH_DELIVERIES_TOTAL: &str = "dispatch_deliveries_total";
/// Per-session renders that returned `Suppress` (counter).
pub const DISPATCH_SUPPRESSED_TOTAL: &str = "dispatch_suppressed_total";
/// Per-session renders that failed or panicked (counter).
pub const DISPATCH_RENDER_FAILURES_TOTAL: &str = "dispatch_render_failures_total";
/// Frames dropped on a full session queue (counter).
pub const DISPATCH_DROPS_TOTAL: &str = "dispatch_drops_total";
/// Sessions closed for exceeding the drop limit (counter).
pub const DISPATCH_EVICTIONS_TOTAL: &str = "dispatch_evictions_total";
/// Time to dispatch one event (histogram).
pub const DISPATCH_DURATION_SECONDS: &str = "dispatch_duration_seconds";
