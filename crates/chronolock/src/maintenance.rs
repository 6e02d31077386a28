//! # Maintenance
//!
//! Timer-triggered purge of expired scores, windows and flags.
//!
//! The task only calls [`MemoryStore::purge_expired`], the same public
//! operation an external scheduler would use. Expired keys already read as
//! absent, so purging reclaims memory and changes no decision.

use chronolock_store::{MemoryStore, StoreResult};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Periodic purge over a shared store.
pub struct MaintenanceTask {
    store: Arc<MemoryStore>,
    interval: Duration,
}

impl MaintenanceTask {
    /// Creates a task purging every `interval`.
    #[must_use]
    pub fn new(store: Arc<MemoryStore>, interval: Duration) -> Self {
        Self { store, interval }
    }

    /// Purge interval.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Runs one purge; returns how many keys were removed.
    ///
    /// # Errors
    ///
    /// Returns [`chronolock_store::StoreError::Unavailable`] once the store is closed.
    pub fn run_once(&self) -> StoreResult<usize> {
        let purged = self.store.purge_expired()?;
        if purged > 0 {
            tracing::debug!(purged, "expired entries purged");
        }
        Ok(purged)
    }

    /// Runs on a tokio interval until `shutdown` turns true or its sender
    /// is dropped. Resolves to the total number of purged keys.
    #[must_use]
    pub fn spawn(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<usize> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut total = 0usize;

            loop {
                tokio::select! {
                    _ = ticker.tick() => match self.run_once() {
                        Ok(purged) => total += purged,
                        Err(e) => tracing::warn!(error = %e, "maintenance purge failed"),
                    },
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }

            tracing::info!(total, "maintenance task stopped");
            total
        })
    }
}
