//! # First-Come Allocation
//!
//! Bounded viewer slots for capacity-limited capsules.
//!
//! ## Order of Operations
//!
//! 1. Registration exists → already viewed, counter untouched.
//! 2. Atomic `increment if current < max` → zero rows means exhausted.
//! 3. Write the registration.
//!
//! The conditional increment is the only capacity check, so the counter can
//! never pass `max` however many gate instances race. Every store failure
//! here is answered as exhausted.

use chronolock_core::{Actor, GateError, GateResult};
use chronolock_store::{CapsuleGate, CapsuleProvider};
use std::sync::Arc;

/// Result of a successful allocation request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Allocation {
    /// A slot was taken for this actor.
    Granted,
    /// The actor already holds a slot.
    AlreadyViewed,
    /// The capsule has no viewer limit.
    Unlimited,
}

/// Capacity-constrained slot allocator.
pub struct FirstComeAllocator {
    capsules: Arc<dyn CapsuleProvider>,
}

impl FirstComeAllocator {
    /// Creates an allocator over a capsule provider.
    #[must_use]
    pub fn new(capsules: Arc<dyn CapsuleProvider>) -> Self {
        Self { capsules }
    }

    /// Claims a slot on `gate` for `actor`.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::CapacityExhausted`] when no slot is left or the
    /// store fails at any step.
    pub fn allocate(&self, gate: &CapsuleGate, actor: &Actor) -> GateResult<Allocation> {
        if !gate.is_capacity_limited() {
            return Ok(Allocation::Unlimited);
        }
        let id = gate.capsule_id;

        match self.capsules.has_recipient(id, actor) {
            Ok(true) => return Ok(Allocation::AlreadyViewed),
            Ok(false) => {}
            Err(e) => {
                tracing::error!(capsule = %id, %actor, error = %e, "registration lookup failed");
                return Err(GateError::CapacityExhausted);
            }
        }

        match self.capsules.increment_if_below_max(id) {
            Ok(0) => {
                tracing::debug!(capsule = %id, %actor, max = gate.max_viewers, "capacity exhausted");
                return Err(GateError::CapacityExhausted);
            }
            Ok(_) => {}
            Err(e) => {
                tracing::error!(capsule = %id, %actor, error = %e, "conditional increment failed");
                return Err(GateError::CapacityExhausted);
            }
        }

        match self.capsules.register_recipient(id, actor) {
            Ok(true) => {
                tracing::debug!(capsule = %id, %actor, "viewer slot granted");
                Ok(Allocation::Granted)
            }
            Ok(false) => {
                // Lost a race against our own concurrent request.
                if let Err(e) = self.capsules.release_slot(id) {
                    tracing::error!(capsule = %id, %actor, error = %e, "duplicate slot not released");
                }
                Ok(Allocation::AlreadyViewed)
            }
            Err(e) => {
                // The slot stays counted; leaking one beats over-admitting.
                tracing::error!(capsule = %id, %actor, error = %e, "registration write failed");
                Err(GateError::CapacityExhausted)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronolock_core::{CapsuleId, GeoFence, GeoPoint, UnlockRule};
    use chronolock_store::MemoryCapsuleStore;

    fn gate(max: u32) -> CapsuleGate {
        CapsuleGate {
            capsule_id: CapsuleId(1),
            rule: UnlockRule::location(GeoFence::new(GeoPoint::new(37.5, 127.0), 200.0)),
            max_viewers: max,
        }
    }

    fn setup(max: u32) -> (Arc<MemoryCapsuleStore>, FirstComeAllocator) {
        let store = MemoryCapsuleStore::connect();
        store.insert(gate(max));
        let allocator = FirstComeAllocator::new(store.clone());
        (store, allocator)
    }

    fn current(store: &MemoryCapsuleStore) -> u32 {
        store.capacity(CapsuleId(1)).unwrap().unwrap().current
    }

    #[test]
    fn test_slots_run_out() {
        let (store, allocator) = setup(2);
        assert_eq!(allocator.allocate(&gate(2), &Actor::member(1)), Ok(Allocation::Granted));
        assert_eq!(allocator.allocate(&gate(2), &Actor::member(2)), Ok(Allocation::Granted));
        assert_eq!(
            allocator.allocate(&gate(2), &Actor::member(3)),
            Err(GateError::CapacityExhausted)
        );
        assert_eq!(current(&store), 2);
        assert_eq!(store.recipient_count(CapsuleId(1)), 2);
    }

    #[test]
    fn test_reentry_is_free() {
        let (store, allocator) = setup(1);
        let actor = Actor::member(9);
        assert_eq!(allocator.allocate(&gate(1), &actor), Ok(Allocation::Granted));
        assert_eq!(allocator.allocate(&gate(1), &actor), Ok(Allocation::AlreadyViewed));
        assert_eq!(current(&store), 1);
    }

    #[test]
    fn test_unlimited_capsule_skips_counter() {
        let (store, allocator) = setup(0);
        assert_eq!(allocator.allocate(&gate(0), &Actor::member(1)), Ok(Allocation::Unlimited));
        assert_eq!(current(&store), 0);
    }

    #[test]
    fn test_store_outage_fails_closed() {
        let (store, allocator) = setup(5);
        store.close();
        assert_eq!(
            allocator.allocate(&gate(5), &Actor::member(1)),
            Err(GateError::CapacityExhausted)
        );
        store.reconnect();
        assert_eq!(current(&store), 0);
    }
}
