// src/core/language_cache.rs

//! A TTL and capacity-bounded cache of "target languages for a conversation".
//!
//! This cache only exists to avoid a membership query on every message; a
//! cold cache is never incorrect, only slower. Expiry is checked lazily on
//! access and proactively by the background purger. Capacity eviction drops
//! the single oldest entry by insertion order, deliberately not true LRU.

use crate::core::metrics;
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug, Clone)]
struct CacheEntry {
    languages: Vec<String>,
    inserted_at: Instant,
}

/// Insertion-ordered cache of conversation target languages.
#[derive(Debug)]
pub struct LanguageCache {
    ttl: Duration,
    max_entries: usize,
    inner: Mutex<IndexMap<String, CacheEntry>>,
}

impl LanguageCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            ttl,
            max_entries: max_entries.max(1),
            inner: Mutex::new(IndexMap::new()),
        }
    }

    /// Returns the cached languages for a conversation, dropping the entry
    /// if it has expired.
    pub fn get(&self, conversation_id: &str) -> Option<Vec<String>> {
        let mut inner = self.inner.lock();
        match inner.get(conversation_id) {
            Some(entry) if entry.inserted_at.elapsed() <= self.ttl => {
                metrics::LANGUAGE_CACHE_HITS_TOTAL.inc();
                Some(entry.languages.clone())
            }
            Some(_) => {
                inner.shift_remove(conversation_id);
                metrics::LANGUAGE_CACHE_MISSES_TOTAL.inc();
                None
            }
            None => {
                metrics::LANGUAGE_CACHE_MISSES_TOTAL.inc();
                None
            }
        }
    }

    /// Like `get` without cloning the value or touching hit/miss counters.
    pub fn has(&self, conversation_id: &str) -> bool {
        let mut inner = self.inner.lock();
        match inner.get(conversation_id) {
            Some(entry) if entry.inserted_at.elapsed() <= self.ttl => true,
            Some(_) => {
                inner.shift_remove(conversation_id);
                false
            }
            None => false,
        }
    }

    /// Inserts or replaces an entry. Replacing resets the entry's age and
    /// moves it to the back of the eviction order (refresh-on-write). When
    /// a new key would exceed capacity, the oldest entry is evicted first.
    pub fn set(&self, conversation_id: &str, languages: Vec<String>) {
        let mut inner = self.inner.lock();
        // Remove-then-insert so a refreshed key moves to the back of the
        // insertion order.
        inner.shift_remove(conversation_id);
        if inner.len() >= self.max_entries {
            if let Some((evicted, _)) = inner.shift_remove_index(0) {
                debug!(conversation_id = %evicted, "Language cache full, evicted oldest entry.");
            }
        }
        inner.insert(
            conversation_id.to_string(),
            CacheEntry {
                languages,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Removes one entry. Returns true if it was present.
    pub fn delete(&self, conversation_id: &str) -> bool {
        self.inner.lock().shift_remove(conversation_id).is_some()
    }

    /// Drops every entry.
    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    /// Proactively removes all expired entries, returning how many were
    /// dropped.
    pub fn clean_expired(&self) -> usize {
        let mut inner = self.inner.lock();
        let before = inner.len();
        inner.retain(|_, entry| entry.inserted_at.elapsed() <= self.ttl);
        before - inner.len()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}
