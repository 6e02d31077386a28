//! Append-only attempt log.

use crate::error::StoreResult;
use crate::lifecycle::Lifecycle;
use chronolock_core::{Actor, AttemptRecord, CapsuleId, Timestamp};
use parking_lot::RwLock;
use std::sync::Arc;

/// Attempt log store. Records are never mutated.
pub trait AttemptLog: Send + Sync {
    /// Appends a record.
    ///
    /// # Errors
    ///
    /// Backend failure.
    fn append(&self, record: AttemptRecord) -> StoreResult<()>;

    /// Most recent record for `actor` on `capsule` with `timestamp >= since`.
    ///
    /// # Errors
    ///
    /// Backend failure.
    fn latest_since(
        &self,
        actor: &Actor,
        capsule: CapsuleId,
        since: Timestamp,
    ) -> StoreResult<Option<AttemptRecord>>;

    /// Every record for `actor`, oldest first.
    ///
    /// # Errors
    ///
    /// Backend failure.
    fn history(&self, actor: &Actor) -> StoreResult<Vec<AttemptRecord>>;
}

/// In-process [`AttemptLog`].
pub struct MemoryAttemptLog {
    records: RwLock<Vec<AttemptRecord>>,
    lifecycle: Lifecycle,
}

impl MemoryAttemptLog {
    /// Opens a new, empty log.
    #[must_use]
    pub fn connect() -> Arc<Self> {
        Arc::new(Self {
            records: RwLock::new(Vec::new()),
            lifecycle: Lifecycle::open("memory-attempt-log"),
        })
    }

    /// Closes the connection.
    pub fn close(&self) {
        self.lifecycle.close();
    }

    /// Total records written.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Returns true if nothing has been written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl AttemptLog for MemoryAttemptLog {
    fn append(&self, record: AttemptRecord) -> StoreResult<()> {
        self.lifecycle.ensure_open()?;
        self.records.write().push(record);
        Ok(())
    }

    fn latest_since(
        &self,
        actor: &Actor,
        capsule: CapsuleId,
        since: Timestamp,
    ) -> StoreResult<Option<AttemptRecord>> {
        self.lifecycle.ensure_open()?;
        let records = self.records.read();
        Ok(records
            .iter()
            .filter(|r| r.actor == *actor && r.capsule_id == capsule && r.timestamp >= since)
            .max_by_key(|r| r.timestamp)
            .cloned())
    }

    fn history(&self, actor: &Actor) -> StoreResult<Vec<AttemptRecord>> {
        self.lifecycle.ensure_open()?;
        let records = self.records.read();
        Ok(records.iter().filter(|r| r.actor == *actor).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, TimeZone, Utc};
    use chronolock_core::{AnomalyTier, AttemptOutcome};

    fn record(actor: Actor, capsule: u64, at: Timestamp) -> AttemptRecord {
        AttemptRecord {
            actor,
            capsule_id: CapsuleId(capsule),
            timestamp: at,
            claimed_time: Some(at),
            position: None,
            outcome: AttemptOutcome::ConditionNotMet,
            anomaly_tier: AnomalyTier::None,
            user_agent: None,
        }
    }

    #[test]
    fn test_latest_respects_actor_capsule_and_lookback() {
        let log = MemoryAttemptLog::connect();
        let t0 = Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap();
        let alice = Actor::member(1);

        log.append(record(alice.clone(), 1, t0)).unwrap();
        log.append(record(alice.clone(), 1, t0 + TimeDelta::hours(2))).unwrap();
        log.append(record(alice.clone(), 2, t0 + TimeDelta::hours(3))).unwrap();
        log.append(record(Actor::ip("10.0.0.1"), 1, t0 + TimeDelta::hours(4)))
            .unwrap();

        let latest = log
            .latest_since(&alice, CapsuleId(1), t0)
            .unwrap()
            .unwrap();
        assert_eq!(latest.timestamp, t0 + TimeDelta::hours(2));

        let none = log
            .latest_since(&alice, CapsuleId(1), t0 + TimeDelta::hours(3))
            .unwrap();
        assert!(none.is_none());
        assert_eq!(log.history(&alice).unwrap().len(), 3);
        assert_eq!(log.len(), 4);
    }
}
