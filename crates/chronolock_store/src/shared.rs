//! # Shared Low-Latency Store
//!
//! Key-value store shaped like a cache server: numeric counters with TTL,
//! flags set only if absent, and per-key time-ordered windows.
//!
//! ## Key Patterns
//!
//! ```text
//! suspicion:{actor}           → i64 score, sliding 30-day TTL
//! ratelimit:{tier}:{actor}    → window of request timestamps, TTL 2×window
//! cooldown:{actor}            → flag with TTL
//! ip-block:{ip}               → flag with TTL
//! ```
//!
//! Every operation on one key is atomic with respect to other callers.

use crate::error::{StoreError, StoreResult};
use crate::lifecycle::Lifecycle;
use chrono::TimeDelta;
use chronolock_core::{Clock, Timestamp};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

/// Narrow cache interface used for scores, windows and flags.
pub trait SharedStore: Send + Sync {
    /// Atomically adds `delta` and resets the key's TTL; returns the new value.
    ///
    /// A missing or expired key starts from zero.
    ///
    /// # Errors
    ///
    /// Backend failure, or the key holds a window.
    fn increment(&self, key: &str, delta: i64, ttl: TimeDelta) -> StoreResult<i64>;

    /// Reads a counter or flag value.
    ///
    /// # Errors
    ///
    /// Backend failure, or the key holds a window.
    fn get(&self, key: &str) -> StoreResult<Option<i64>>;

    /// Writes a value with a TTL, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Backend failure.
    fn set(&self, key: &str, value: i64, ttl: TimeDelta) -> StoreResult<()>;

    /// Writes a value only if the key is absent; returns true if written.
    ///
    /// # Errors
    ///
    /// Backend failure.
    fn set_if_absent(&self, key: &str, value: i64, ttl: TimeDelta) -> StoreResult<bool>;

    /// Replaces the TTL of an existing key; returns false if absent.
    ///
    /// # Errors
    ///
    /// Backend failure.
    fn expire(&self, key: &str, ttl: TimeDelta) -> StoreResult<bool>;

    /// Remaining TTL, or `None` if the key is absent.
    ///
    /// # Errors
    ///
    /// Backend failure.
    fn ttl(&self, key: &str) -> StoreResult<Option<TimeDelta>>;

    /// Removes a key; returns true if it existed.
    ///
    /// # Errors
    ///
    /// Backend failure.
    fn delete(&self, key: &str) -> StoreResult<bool>;

    /// Drops window entries at or before `cutoff`; returns how many were removed.
    ///
    /// # Errors
    ///
    /// Backend failure, or the key holds a counter.
    fn window_trim(&self, key: &str, cutoff: Timestamp) -> StoreResult<usize>;

    /// Number of entries in a window (0 if absent).
    ///
    /// # Errors
    ///
    /// Backend failure, or the key holds a counter.
    fn window_len(&self, key: &str) -> StoreResult<usize>;

    /// Oldest entry in a window.
    ///
    /// # Errors
    ///
    /// Backend failure, or the key holds a counter.
    fn window_oldest(&self, key: &str) -> StoreResult<Option<Timestamp>>;

    /// Appends an entry and resets the window key's TTL.
    ///
    /// # Errors
    ///
    /// Backend failure, or the key holds a counter.
    fn window_push(&self, key: &str, at: Timestamp, ttl: TimeDelta) -> StoreResult<()>;

    /// Closes the connection; later calls fail with [`StoreError::Unavailable`].
    fn close(&self);

    /// Returns true while the connection is usable.
    fn is_open(&self) -> bool;
}

#[derive(Debug)]
enum Value {
    Counter(i64),
    Window(VecDeque<Timestamp>),
}

#[derive(Debug)]
struct Entry {
    value: Value,
    expires_at: Timestamp,
}

/// In-process [`SharedStore`] with lazy TTL expiry.
///
/// Expired keys read as absent and are physically removed by
/// [`MemoryStore::purge_expired`].
pub struct MemoryStore {
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<String, Entry>>,
    lifecycle: Lifecycle,
}

impl MemoryStore {
    /// Opens a new, empty store.
    #[must_use]
    pub fn connect(clock: Arc<dyn Clock>) -> Arc<Self> {
        tracing::debug!("memory shared store connected");
        Arc::new(Self {
            clock,
            entries: Mutex::new(HashMap::new()),
            lifecycle: Lifecycle::open("memory-shared-store"),
        })
    }

    /// Re-opens after [`SharedStore::close`], keeping data.
    pub fn reconnect(&self) {
        self.lifecycle.reconnect();
    }

    /// Removes every expired key; returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] once closed.
    pub fn purge_expired(&self) -> StoreResult<usize> {
        self.lifecycle.ensure_open()?;
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        Ok(before - entries.len())
    }

    /// Number of physically stored keys, expired ones included.
    #[must_use]
    pub fn raw_len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Runs `f` on the live entry for `key`, dropping it first if expired.
    fn with_live<R>(
        &self,
        key: &str,
        f: impl FnOnce(&mut HashMap<String, Entry>, Timestamp) -> StoreResult<R>,
    ) -> StoreResult<R> {
        self.lifecycle.ensure_open()?;
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        if entries.get(key).is_some_and(|entry| entry.expires_at <= now) {
            entries.remove(key);
        }
        f(&mut entries, now)
    }
}

fn wrong_type(key: &str) -> StoreError {
    StoreError::Rejected(format!("wrong value type under {key}"))
}

impl SharedStore for MemoryStore {
    fn increment(&self, key: &str, delta: i64, ttl: TimeDelta) -> StoreResult<i64> {
        self.with_live(key, |entries, now| {
            let entry = entries.entry(key.to_owned()).or_insert(Entry {
                value: Value::Counter(0),
                expires_at: now + ttl,
            });
            let Value::Counter(value) = &mut entry.value else {
                return Err(wrong_type(key));
            };
            *value = value.saturating_add(delta);
            entry.expires_at = now + ttl;
            Ok(*value)
        })
    }

    fn get(&self, key: &str) -> StoreResult<Option<i64>> {
        self.with_live(key, |entries, _| match entries.get(key) {
            None => Ok(None),
            Some(Entry {
                value: Value::Counter(v),
                ..
            }) => Ok(Some(*v)),
            Some(_) => Err(wrong_type(key)),
        })
    }

    fn set(&self, key: &str, value: i64, ttl: TimeDelta) -> StoreResult<()> {
        self.with_live(key, |entries, now| {
            entries.insert(
                key.to_owned(),
                Entry {
                    value: Value::Counter(value),
                    expires_at: now + ttl,
                },
            );
            Ok(())
        })
    }

    fn set_if_absent(&self, key: &str, value: i64, ttl: TimeDelta) -> StoreResult<bool> {
        self.with_live(key, |entries, now| {
            if entries.contains_key(key) {
                return Ok(false);
            }
            entries.insert(
                key.to_owned(),
                Entry {
                    value: Value::Counter(value),
                    expires_at: now + ttl,
                },
            );
            Ok(true)
        })
    }

    fn expire(&self, key: &str, ttl: TimeDelta) -> StoreResult<bool> {
        self.with_live(key, |entries, now| match entries.get_mut(key) {
            Some(entry) => {
                entry.expires_at = now + ttl;
                Ok(true)
            }
            None => Ok(false),
        })
    }

    fn ttl(&self, key: &str) -> StoreResult<Option<TimeDelta>> {
        self.with_live(key, |entries, now| {
            Ok(entries.get(key).map(|entry| entry.expires_at - now))
        })
    }

    fn delete(&self, key: &str) -> StoreResult<bool> {
        self.with_live(key, |entries, _| Ok(entries.remove(key).is_some()))
    }

    fn window_trim(&self, key: &str, cutoff: Timestamp) -> StoreResult<usize> {
        self.with_live(key, |entries, _| match entries.get_mut(key) {
            None => Ok(0),
            Some(Entry {
                value: Value::Window(window),
                ..
            }) => {
                let before = window.len();
                // Entries are pushed in server-time order, so the stale ones are a prefix.
                while window.front().is_some_and(|at| *at <= cutoff) {
                    window.pop_front();
                }
                Ok(before - window.len())
            }
            Some(_) => Err(wrong_type(key)),
        })
    }

    fn window_len(&self, key: &str) -> StoreResult<usize> {
        self.with_live(key, |entries, _| match entries.get(key) {
            None => Ok(0),
            Some(Entry {
                value: Value::Window(window),
                ..
            }) => Ok(window.len()),
            Some(_) => Err(wrong_type(key)),
        })
    }

    fn window_oldest(&self, key: &str) -> StoreResult<Option<Timestamp>> {
        self.with_live(key, |entries, _| match entries.get(key) {
            None => Ok(None),
            Some(Entry {
                value: Value::Window(window),
                ..
            }) => Ok(window.front().copied()),
            Some(_) => Err(wrong_type(key)),
        })
    }

    fn window_push(&self, key: &str, at: Timestamp, ttl: TimeDelta) -> StoreResult<()> {
        self.with_live(key, |entries, now| {
            let entry = entries.entry(key.to_owned()).or_insert(Entry {
                value: Value::Window(VecDeque::new()),
                expires_at: now + ttl,
            });
            let Value::Window(window) = &mut entry.value else {
                return Err(wrong_type(key));
            };
            // Keep the window sorted even if a caller pushes out of order.
            let idx = window.partition_point(|existing| *existing <= at);
            window.insert(idx, at);
            entry.expires_at = now + ttl;
            Ok(())
        })
    }

    fn close(&self) {
        self.lifecycle.close();
    }

    fn is_open(&self) -> bool {
        self.lifecycle.is_open()
    }
}
