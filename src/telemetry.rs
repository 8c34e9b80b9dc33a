//! Telemetry metric name constants.
//!
//! Emitted through the `metrics` facade. The extension does not install a
//! recorder itself; without one, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `parameter_extension_`. Counters end in
//! `_total`, histograms use `_seconds`.
//!
//! # Common labels
//!
//! - `status`: outcome: "ok" or "error"
//! - `event`: lifecycle event type: "invoke" or "shutdown"

/// Local requests answered from the cache.
pub const CACHE_HITS_TOTAL: &str = "parameter_extension_cache_hits_total";

/// Local requests that found no live cache entry.
pub const CACHE_MISSES_TOTAL: &str = "parameter_extension_cache_misses_total";

/// Calls made to the remote parameter store.
///
/// Labels: `status` ("ok" | "error").
pub const REMOTE_FETCHES_TOTAL: &str = "parameter_extension_remote_fetches_total";

/// Remote parameter store call duration in seconds.
pub const REMOTE_FETCH_DURATION_SECONDS: &str = "parameter_extension_remote_fetch_duration_seconds";

/// Lifecycle events received from the host.
///
/// Labels: `event` ("invoke" | "shutdown").
pub const EVENTS_TOTAL: &str = "parameter_extension_events_total";

/// Failed long-poll attempts against the host.
pub const POLL_ERRORS_TOTAL: &str = "parameter_extension_poll_errors_total";
