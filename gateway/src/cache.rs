//! # Response Cache
//!
//! Global `(model, prompt)` → completion store with lazy time-based expiry.
//!
//! The key is built from the raw user prompt, never from the
//! conversation-augmented prompt, so a hit may answer a different user's
//! identical prompt. Entries live in a concurrent map with its own sharded
//! locks, independent of any session lock.

use crate::telemetry::GatewayTelemetry;
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;
use utils::compute_cache_key;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub response: String,
    pub stored_at: Instant,
    pub model: String
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub expirations: u64,
    pub entries: usize
}

pub struct ResponseCache {
    entries: DashMap<String, CacheEntry>,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
    expirations: AtomicU64,
    telemetry: Arc<GatewayTelemetry>
}

impl ResponseCache {
    pub fn new(ttl: Duration, telemetry: Arc<GatewayTelemetry>) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            expirations: AtomicU64::new(0),
            telemetry
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn is_expired(&self, entry: &CacheEntry, now: Instant) -> bool {
        now.saturating_duration_since(entry.stored_at) >= self.ttl
    }

    /// Returns the live entry for `(model, prompt)`. An expired entry is
    /// removed and reported as absent.
    pub fn get(&self, model: &str, prompt: &str, now: Instant) -> Option<CacheEntry> {
        let key = compute_cache_key(model, prompt);

        let expired = match self.entries.get(&key) {
            Some(entry) if !self.is_expired(&entry, now) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                self.telemetry.record_cache_hit();
                debug!(model, key = &key[..16], "Cache hit");
                return Some(entry.clone());
            }
            Some(_) => true,
            None => false
        };

        if expired
            && self
                .entries
                .remove_if(&key, |_, entry| self.is_expired(entry, now))
                .is_some()
        {
            self.expirations.fetch_add(1, Ordering::Relaxed);
            self.telemetry.record_cache_expiration();
            debug!(model, key = &key[..16], "Cache entry expired");
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        self.telemetry.record_cache_miss();
        debug!(model, key = &key[..16], "Cache miss");
        None
    }

    /// Stores `response`, replacing any previous entry for the same key.
    pub fn put(&self, model: &str, prompt: &str, response: &str, now: Instant) {
        let key = compute_cache_key(model, prompt);
        self.entries.insert(
            key,
            CacheEntry {
                response: response.to_string(),
                stored_at: now,
                model: model.to_string()
            }
        );
        self.telemetry.record_cache_size(self.entries.len());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            entries: self.entries.len()
        }
    }
}
