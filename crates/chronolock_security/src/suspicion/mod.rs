//! Per-actor suspicion scores with a sliding TTL.
//!
//! Every increment refreshes the expiry, so an actor who keeps misbehaving
//! never silently ages out mid-campaign. Scoring fails open: when the store
//! is unreachable the increment is dropped and the last value this process
//! saw (or zero) is returned.
//!
//! The fail-open cache only holds actors this process has scored, is
//! dropped per key as soon as the store reports the score gone, and never
//! exceeds [`LAST_KNOWN_CAPACITY`] entries.

use chrono::TimeDelta;
use chronolock_core::Actor;
use chronolock_store::SharedStore;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Most actors the fail-open cache holds.
pub const LAST_KNOWN_CAPACITY: usize = 4096;

fn score_key(actor: &Actor) -> String {
    format!("suspicion:{}", actor.key())
}

/// Suspicion score tracker over a [`SharedStore`].
pub struct SuspicionScoreTracker {
    store: Arc<dyn SharedStore>,
    ttl: TimeDelta,
    last_known: Mutex<HashMap<String, i64>>,
}

impl SuspicionScoreTracker {
    /// Creates a tracker whose entries live `ttl` past their last increment.
    #[must_use]
    pub fn new(store: Arc<dyn SharedStore>, ttl: TimeDelta) -> Self {
        Self {
            store,
            ttl,
            last_known: Mutex::new(HashMap::new()),
        }
    }

    /// Adds `delta` and returns the new total.
    pub fn increment(&self, actor: &Actor, delta: i64) -> i64 {
        let key = score_key(actor);
        match self.store.increment(&key, delta, self.ttl) {
            Ok(total) => {
                self.remember(key, total);
                tracing::debug!(%actor, delta, total, "suspicion score incremented");
                total
            }
            Err(e) => {
                let total = self.cached(&key);
                tracing::warn!(%actor, delta, error = %e, "suspicion increment dropped");
                total
            }
        }
    }

    /// Current score; zero if absent or expired.
    pub fn get(&self, actor: &Actor) -> i64 {
        let key = score_key(actor);
        match self.store.get(&key) {
            Ok(Some(total)) => {
                // Refresh only; reads never grow the cache.
                if let Some(cached) = self.last_known.lock().get_mut(&key) {
                    *cached = total;
                }
                total
            }
            Ok(None) => {
                self.last_known.lock().remove(&key);
                0
            }
            Err(e) => {
                tracing::warn!(%actor, error = %e, "suspicion read failed, using last known");
                self.cached(&key)
            }
        }
    }

    /// Deletes the score.
    pub fn reset(&self, actor: &Actor) {
        let key = score_key(actor);
        if let Err(e) = self.store.delete(&key) {
            tracing::warn!(%actor, error = %e, "suspicion reset failed");
        }
        self.last_known.lock().remove(&key);
    }

    /// Time left before the score expires.
    pub fn expires_in(&self, actor: &Actor) -> Option<TimeDelta> {
        self.store.ttl(&score_key(actor)).ok().flatten()
    }

    /// Actors currently held for fail-open reads.
    #[must_use]
    pub fn cached_len(&self) -> usize {
        self.last_known.lock().len()
    }

    fn remember(&self, key: String, total: i64) {
        let mut cache = self.last_known.lock();
        if cache.len() >= LAST_KNOWN_CAPACITY && !cache.contains_key(&key) {
            // Evict the lowest score.
            let lowest = cache
                .iter()
                .min_by_key(|(_, score)| **score)
                .map(|(k, _)| k.clone());
            if let Some(lowest) = lowest {
                cache.remove(&lowest);
            }
        }
        cache.insert(key, total);
    }

    fn cached(&self, key: &str) -> i64 {
        self.last_known.lock().get(key).copied().unwrap_or(0)
    }
}
