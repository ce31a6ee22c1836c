// src/core/metrics.rs

//! Defines and registers Prometheus metrics for gateway monitoring.
//!
//! This module uses `lazy_static` to ensure that metrics are registered only
//! once globally for the entire application lifecycle.

use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Gauge, TextEncoder, register_counter, register_counter_vec,
    register_gauge,
};

lazy_static! {
    // --- Gateway-wide Gauges ---
    /// The number of client sessions currently registered.
    pub static ref CONNECTED_SESSIONS: Gauge =
        register_gauge!("polyglot_connected_sessions", "Number of currently registered client sessions.").unwrap();
    /// The number of translation tasks currently awaiting a worker response.
    pub static ref PENDING_TRANSLATION_TASKS: Gauge =
        register_gauge!("polyglot_pending_translation_tasks", "Number of in-flight translation tasks.").unwrap();

    // --- Messaging Counters ---
    /// The total number of messages persisted since startup.
    pub static ref MESSAGES_SAVED_TOTAL: Counter =
        register_counter!("polyglot_messages_saved_total", "Total number of messages persisted.").unwrap();
    /// The total number of room events fanned out, labeled by event kind.
    pub static ref ROOM_EVENTS_PUBLISHED_TOTAL: CounterVec =
        register_counter_vec!("polyglot_room_events_published_total", "Total number of room events published, labeled by event kind.", &["event"]).unwrap();

    // --- Translation Counters ---
    /// The total number of translation requests dispatched to the worker pool.
    pub static ref TRANSLATION_REQUESTS_TOTAL: Counter =
        register_counter!("polyglot_translation_requests_total", "Total number of translation requests dispatched.").unwrap();
    /// The total number of completed translations received from the worker pool.
    pub static ref TRANSLATIONS_RECEIVED_TOTAL: Counter =
        register_counter!("polyglot_translations_received_total", "Total number of completed translations received.").unwrap();
    /// The total number of translation failures (transport errors, timeouts).
    pub static ref TRANSLATION_ERRORS_TOTAL: Counter =
        register_counter!("polyglot_translation_errors_total", "Total number of failed or timed-out translation tasks.").unwrap();
    /// The total number of requests rejected because the worker pool was full.
    pub static ref POOL_FULL_REJECTIONS_TOTAL: Counter =
        register_counter!("polyglot_pool_full_rejections_total", "Total number of worker-pool saturation rejections.").unwrap();
    /// The total number of deterministic fallback results served.
    pub static ref FALLBACK_TRANSLATIONS_TOTAL: Counter =
        register_counter!("polyglot_fallback_translations_total", "Total number of fallback (untranslated) results served.").unwrap();

    // --- Presence Counters ---
    /// The total number of presence updates suppressed by throttling, labeled
    /// by policy (`activity` or `connection`).
    pub static ref PRESENCE_THROTTLED_TOTAL: CounterVec =
        register_counter_vec!("polyglot_presence_throttled_total", "Total number of throttled presence updates, labeled by policy.", &["policy"]).unwrap();
    /// The total number of presence entries evicted by the background sweeper.
    pub static ref PRESENCE_EVICTED_TOTAL: Counter =
        register_counter!("polyglot_presence_evicted_total", "Total number of presence cache entries evicted.").unwrap();

    // --- Language Cache Counters ---
    /// The total number of successful target-language cache lookups.
    pub static ref LANGUAGE_CACHE_HITS_TOTAL: Counter =
        register_counter!("polyglot_language_cache_hits_total", "Total number of language cache hits.").unwrap();
    /// The total number of failed target-language cache lookups.
    pub static ref LANGUAGE_CACHE_MISSES_TOTAL: Counter =
        register_counter!("polyglot_language_cache_misses_total", "Total number of language cache misses.").unwrap();
}

/// Gathers all registered metrics and encodes them in the Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder.encode_to_string(&metric_families).unwrap()
}
