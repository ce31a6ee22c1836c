// src/core/state/stats.rs

//! Cheap process-wide counters behind relaxed atomics, snapshotted on demand
//! for the stats endpoint. The Prometheus registry carries the same numbers
//! for scraping; these survive a registry reset and back the JSON snapshot.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

/// Monotonic gateway counters. All increments are relaxed; exact cross-
/// counter consistency is not needed for monitoring output.
#[derive(Debug)]
pub struct StatsState {
    started_at: Instant,
    pub messages_saved: AtomicU64,
    pub translation_requests: AtomicU64,
    pub translations_received: AtomicU64,
    pub translation_errors: AtomicU64,
    pub pool_full_rejections: AtomicU64,
    pub fallback_translations: AtomicU64,
}

/// A point-in-time copy of the counters plus process vitals.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub uptime_secs: u64,
    pub messages_saved: u64,
    pub translation_requests: u64,
    pub translations_received: u64,
    pub translation_errors: u64,
    pub pool_full_rejections: u64,
    pub fallback_translations: u64,
    pub memory_used_bytes: u64,
}

impl Default for StatsState {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsState {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            messages_saved: AtomicU64::new(0),
            translation_requests: AtomicU64::new(0),
            translations_received: AtomicU64::new(0),
            translation_errors: AtomicU64::new(0),
            pool_full_rejections: AtomicU64::new(0),
            fallback_translations: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            uptime_secs: self.started_at.elapsed().as_secs(),
            messages_saved: self.messages_saved.load(Ordering::Relaxed),
            translation_requests: self.translation_requests.load(Ordering::Relaxed),
            translations_received: self.translations_received.load(Ordering::Relaxed),
            translation_errors: self.translation_errors.load(Ordering::Relaxed),
            pool_full_rejections: self.pool_full_rejections.load(Ordering::Relaxed),
            fallback_translations: self.fallback_translations.load(Ordering::Relaxed),
            memory_used_bytes: process_memory_bytes(),
        }
    }

    /// Zeroes every counter. Uptime is not reset.
    pub fn reset(&self) {
        self.messages_saved.store(0, Ordering::Relaxed);
        self.translation_requests.store(0, Ordering::Relaxed);
        self.translations_received.store(0, Ordering::Relaxed);
        self.translation_errors.store(0, Ordering::Relaxed);
        self.pool_full_rejections.store(0, Ordering::Relaxed);
        self.fallback_translations.store(0, Ordering::Relaxed);
    }
}

fn process_memory_bytes() -> u64 {
    let pid = Pid::from_u32(std::process::id());
    let mut system = System::new();
    system.refresh_processes_specifics(
        ProcessesToUpdate::Some(&[pid]),
        true,
        ProcessRefreshKind::nothing().with_memory(),
    );
    system.process(pid).map(|p| p.memory()).unwrap_or(0)
}
