//! # Capsule Provider
//!
//! The gate's only view of capsule storage: the unlock rule, the viewer
//! capacity, and the recipient registrations.
//!
//! [`CapsuleProvider::increment_if_below_max`] is the sole arbiter of
//! capacity. Backends must execute it as one atomic conditional update
//! (`UPDATE ... SET current = current + 1 WHERE id = ? AND current < max`)
//! and report the affected row count.

use crate::error::StoreResult;
use crate::lifecycle::Lifecycle;
use chronolock_core::{Actor, CapsuleId, UnlockRule};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Gate-relevant capsule fields.
#[derive(Clone, Debug, PartialEq)]
pub struct CapsuleGate {
    /// Capsule id.
    pub capsule_id: CapsuleId,
    /// Unlock rule.
    pub rule: UnlockRule,
    /// First-come viewer limit; `0` means unlimited.
    pub max_viewers: u32,
}

impl CapsuleGate {
    /// Returns true if the capsule uses first-come allocation.
    #[must_use]
    pub const fn is_capacity_limited(&self) -> bool {
        self.max_viewers > 0
    }
}

/// Snapshot of a capsule's viewer counter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CapacityCounter {
    /// Capsule id.
    pub capsule_id: CapsuleId,
    /// Viewer limit.
    pub max: u32,
    /// Slots taken.
    pub current: u32,
}

/// Narrow capsule storage interface.
pub trait CapsuleProvider: Send + Sync {
    /// Loads the rule and capacity of a capsule.
    ///
    /// # Errors
    ///
    /// Backend failure.
    fn capsule(&self, id: CapsuleId) -> StoreResult<Option<CapsuleGate>>;

    /// Reads the viewer counter.
    ///
    /// # Errors
    ///
    /// Backend failure.
    fn capacity(&self, id: CapsuleId) -> StoreResult<Option<CapacityCounter>>;

    /// Atomically increments `current` iff `current < max`; returns rows affected (0 or 1).
    ///
    /// # Errors
    ///
    /// Backend failure. Callers must treat this as exhausted.
    fn increment_if_below_max(&self, id: CapsuleId) -> StoreResult<u64>;

    /// Atomically decrements `current` iff `current > 0`; returns rows affected.
    ///
    /// # Errors
    ///
    /// Backend failure.
    fn release_slot(&self, id: CapsuleId) -> StoreResult<u64>;

    /// Returns true if `actor` already holds a registration.
    ///
    /// # Errors
    ///
    /// Backend failure.
    fn has_recipient(&self, id: CapsuleId, actor: &Actor) -> StoreResult<bool>;

    /// Writes a registration; returns false if one already existed.
    ///
    /// # Errors
    ///
    /// Backend failure.
    fn register_recipient(&self, id: CapsuleId, actor: &Actor) -> StoreResult<bool>;
}

struct CapsuleSlot {
    gate: CapsuleGate,
    // Shared with any replacement slot, so in-flight increments are never lost.
    current: Arc<AtomicU32>,
}

/// In-process [`CapsuleProvider`].
///
/// The conditional update is a single compare-and-swap loop on the counter,
/// so it stays exact under any number of concurrent callers.
pub struct MemoryCapsuleStore {
    capsules: RwLock<HashMap<CapsuleId, Arc<CapsuleSlot>>>,
    recipients: Mutex<HashSet<(CapsuleId, Actor)>>,
    lifecycle: Lifecycle,
}

impl MemoryCapsuleStore {
    /// Opens a new, empty store.
    #[must_use]
    pub fn connect() -> Arc<Self> {
        Arc::new(Self {
            capsules: RwLock::new(HashMap::new()),
            recipients: Mutex::new(HashSet::new()),
            lifecycle: Lifecycle::open("memory-capsule-store"),
        })
    }

    /// Inserts a capsule, or replaces its rule and cap.
    ///
    /// A replaced capsule keeps its viewer count and registrations, so
    /// counter and recipient set stay in agreement.
    pub fn insert(&self, gate: CapsuleGate) {
        let mut capsules = self.capsules.write();
        let current = capsules
            .get(&gate.capsule_id)
            .map_or_else(|| Arc::new(AtomicU32::new(0)), |slot| Arc::clone(&slot.current));
        capsules.insert(gate.capsule_id, Arc::new(CapsuleSlot { gate, current }));
    }

    /// Closes the connection.
    pub fn close(&self) {
        self.lifecycle.close();
    }

    /// Re-opens the connection.
    pub fn reconnect(&self) {
        self.lifecycle.reconnect();
    }

    /// Number of registrations for a capsule.
    #[must_use]
    pub fn recipient_count(&self, id: CapsuleId) -> usize {
        self.recipients
            .lock()
            .iter()
            .filter(|(capsule, _)| *capsule == id)
            .count()
    }

    fn slot(&self, id: CapsuleId) -> Option<Arc<CapsuleSlot>> {
        self.capsules.read().get(&id).cloned()
    }
}

impl CapsuleProvider for MemoryCapsuleStore {
    fn capsule(&self, id: CapsuleId) -> StoreResult<Option<CapsuleGate>> {
        self.lifecycle.ensure_open()?;
        Ok(self.slot(id).map(|slot| slot.gate.clone()))
    }

    fn capacity(&self, id: CapsuleId) -> StoreResult<Option<CapacityCounter>> {
        self.lifecycle.ensure_open()?;
        Ok(self.slot(id).map(|slot| CapacityCounter {
            capsule_id: id,
            max: slot.gate.max_viewers,
            current: slot.current.load(Ordering::Acquire),
        }))
    }

    fn increment_if_below_max(&self, id: CapsuleId) -> StoreResult<u64> {
        self.lifecycle.ensure_open()?;
        let Some(slot) = self.slot(id) else {
            return Ok(0);
        };
        let max = slot.gate.max_viewers;
        let updated = slot
            .current
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (current < max).then_some(current + 1)
            });
        Ok(u64::from(updated.is_ok()))
    }

    fn release_slot(&self, id: CapsuleId) -> StoreResult<u64> {
        self.lifecycle.ensure_open()?;
        let Some(slot) = self.slot(id) else {
            return Ok(0);
        };
        let updated = slot
            .current
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                current.checked_sub(1)
            });
        Ok(u64::from(updated.is_ok()))
    }

    fn has_recipient(&self, id: CapsuleId, actor: &Actor) -> StoreResult<bool> {
        self.lifecycle.ensure_open()?;
        Ok(self.recipients.lock().contains(&(id, actor.clone())))
    }

    fn register_recipient(&self, id: CapsuleId, actor: &Actor) -> StoreResult<bool> {
        self.lifecycle.ensure_open()?;
        Ok(self.recipients.lock().insert((id, actor.clone())))
    }
}
