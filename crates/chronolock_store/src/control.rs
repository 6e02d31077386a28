//! # Account / IP Control Plane
//!
//! Suspension and blocking, plus the audit ledger of status changes.
//!
//! Every mutating call is idempotent: a second suspension of an already
//! suspended member reports [`SanctionChange::AlreadyInEffect`] and changes
//! nothing. Scores can cross the block threshold several times in one burst,
//! so callers rely on this.

use crate::error::{StoreError, StoreResult};
use crate::lifecycle::Lifecycle;
use crate::shared::SharedStore;
use chrono::{DateTime, Utc};
use chronolock_core::{AccountState, Actor, Clock, MemberId, SanctionRecord, Timestamp};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;

/// Current sanction status of an actor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ActorStatus {
    /// Current state.
    pub state: AccountState,
    /// Expiry of the current sanction.
    pub until: Option<Timestamp>,
}

impl ActorStatus {
    /// No sanction in effect.
    pub const ACTIVE: Self = Self {
        state: AccountState::Active,
        until: None,
    };

    /// Returns true if the actor is suspended or blocked.
    #[must_use]
    pub const fn is_restricted(&self) -> bool {
        !matches!(self.state, AccountState::Active)
    }
}

/// Result of an idempotent sanction call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SanctionChange {
    /// The sanction was applied now.
    Applied {
        /// State before the change.
        before: AccountState,
    },
    /// A sanction was already in effect; nothing changed.
    AlreadyInEffect {
        /// Expiry of the existing sanction.
        until: Option<Timestamp>,
    },
}

/// External account and IP control plane.
pub trait ControlPlane: Send + Sync {
    /// Current status of an actor.
    ///
    /// # Errors
    ///
    /// Backend failure.
    fn status(&self, actor: &Actor) -> StoreResult<ActorStatus>;

    /// Suspends a member until `until`, unless already suspended.
    ///
    /// # Errors
    ///
    /// Backend failure, or `until` is not in the future.
    fn suspend_member(&self, member: MemberId, until: Timestamp) -> StoreResult<SanctionChange>;

    /// Blocks an IP until `until`, unless already blocked.
    ///
    /// # Errors
    ///
    /// Backend failure, or `until` is not in the future.
    fn block_ip(&self, ip: &str, until: Timestamp) -> StoreResult<SanctionChange>;

    /// Lifts any sanction; returns the previous state if one was lifted.
    ///
    /// # Errors
    ///
    /// Backend failure.
    fn lift(&self, actor: &Actor) -> StoreResult<Option<AccountState>>;
}

/// Audit ledger for [`SanctionRecord`]s.
pub trait SanctionLedger: Send + Sync {
    /// Appends a record.
    ///
    /// # Errors
    ///
    /// Backend failure.
    fn append(&self, record: SanctionRecord) -> StoreResult<()>;

    /// Every record for `actor`, oldest first.
    ///
    /// # Errors
    ///
    /// Backend failure.
    fn history(&self, actor: &Actor) -> StoreResult<Vec<SanctionRecord>>;
}

fn ip_block_key(ip: &str) -> String {
    format!("ip-block:{ip}")
}

/// In-process [`ControlPlane`].
///
/// Member suspensions live in a local table (the account database);
/// IP blocks are TTL flags in the shared store, so every gate instance
/// sharing that store sees them.
pub struct MemoryControlPlane {
    clock: Arc<dyn Clock>,
    flags: Arc<dyn SharedStore>,
    suspensions: Mutex<HashMap<MemberId, Timestamp>>,
    lifecycle: Lifecycle,
}

impl MemoryControlPlane {
    /// Opens a control plane over the given shared store.
    #[must_use]
    pub fn connect(clock: Arc<dyn Clock>, flags: Arc<dyn SharedStore>) -> Arc<Self> {
        Arc::new(Self {
            clock,
            flags,
            suspensions: Mutex::new(HashMap::new()),
            lifecycle: Lifecycle::open("memory-control-plane"),
        })
    }

    /// Closes the connection.
    pub fn close(&self) {
        self.lifecycle.close();
    }

    fn ensure_future(&self, until: Timestamp) -> StoreResult<Timestamp> {
        let now = self.clock.now();
        if until <= now {
            return Err(StoreError::Rejected(format!(
                "sanction expiry {until} is not after {now}"
            )));
        }
        Ok(now)
    }
}

impl ControlPlane for MemoryControlPlane {
    fn status(&self, actor: &Actor) -> StoreResult<ActorStatus> {
        self.lifecycle.ensure_open()?;
        let now = self.clock.now();
        match actor {
            Actor::Member(member) => {
                let until = self.suspensions.lock().get(member).copied();
                Ok(match until {
                    Some(until) if until > now => ActorStatus {
                        state: AccountState::Suspended,
                        until: Some(until),
                    },
                    _ => ActorStatus::ACTIVE,
                })
            }
            Actor::Ip(ip) => {
                let stamp = self.flags.get(&ip_block_key(ip))?;
                Ok(match stamp {
                    Some(secs) => ActorStatus {
                        state: AccountState::Blocked,
                        until: DateTime::<Utc>::from_timestamp(secs, 0),
                    },
                    None => ActorStatus::ACTIVE,
                })
            }
        }
    }

    fn suspend_member(&self, member: MemberId, until: Timestamp) -> StoreResult<SanctionChange> {
        self.lifecycle.ensure_open()?;
        let now = self.ensure_future(until)?;
        let mut suspensions = self.suspensions.lock();
        if let Some(existing) = suspensions.get(&member).copied() {
            if existing > now {
                return Ok(SanctionChange::AlreadyInEffect {
                    until: Some(existing),
                });
            }
        }
        suspensions.insert(member, until);
        Ok(SanctionChange::Applied {
            before: AccountState::Active,
        })
    }

    fn block_ip(&self, ip: &str, until: Timestamp) -> StoreResult<SanctionChange> {
        self.lifecycle.ensure_open()?;
        let now = self.ensure_future(until)?;
        let key = ip_block_key(ip);
        if self.flags.set_if_absent(&key, until.timestamp(), until - now)? {
            Ok(SanctionChange::Applied {
                before: AccountState::Active,
            })
        } else {
            let existing = self
                .flags
                .get(&key)?
                .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0));
            Ok(SanctionChange::AlreadyInEffect { until: existing })
        }
    }

    fn lift(&self, actor: &Actor) -> StoreResult<Option<AccountState>> {
        self.lifecycle.ensure_open()?;
        let before = self.status(actor)?;
        match actor {
            Actor::Member(member) => {
                self.suspensions.lock().remove(member);
            }
            Actor::Ip(ip) => {
                self.flags.delete(&ip_block_key(ip))?;
            }
        }
        Ok(before.is_restricted().then_some(before.state))
    }
}

/// In-process [`SanctionLedger`].
pub struct MemorySanctionLedger {
    records: RwLock<Vec<SanctionRecord>>,
    lifecycle: Lifecycle,
}

impl MemorySanctionLedger {
    /// Opens a new, empty ledger.
    #[must_use]
    pub fn connect() -> Arc<Self> {
        Arc::new(Self {
            records: RwLock::new(Vec::new()),
            lifecycle: Lifecycle::open("memory-sanction-ledger"),
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

impl SanctionLedger for MemorySanctionLedger {
    fn append(&self, record: SanctionRecord) -> StoreResult<()> {
        self.lifecycle.ensure_open()?;
        self.records.write().push(record);
        Ok(())
    }

    fn history(&self, actor: &Actor) -> StoreResult<Vec<SanctionRecord>> {
        self.lifecycle.ensure_open()?;
        Ok(self
            .records
            .read()
            .iter()
            .filter(|r| r.actor == *actor)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::MemoryStore;
    use chrono::{TimeDelta, TimeZone};
    use chronolock_core::ManualClock;

    fn setup() -> (Arc<ManualClock>, Arc<MemoryControlPlane>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 4, 1, 0, 0, 0).unwrap(),
        ));
        let flags = MemoryStore::connect(clock.clone());
        let control = MemoryControlPlane::connect(clock.clone(), flags);
        (clock, control)
    }

    #[test]
    fn test_suspension_is_idempotent_and_expires() {
        let (clock, control) = setup();
        let until = clock.now() + TimeDelta::days(7);
        let member = MemberId(5);

        assert_eq!(
            control.suspend_member(member, until).unwrap(),
            SanctionChange::Applied {
                before: AccountState::Active
            }
        );
        assert_eq!(
            control.suspend_member(member, until + TimeDelta::days(1)).unwrap(),
            SanctionChange::AlreadyInEffect { until: Some(until) }
        );
        assert!(control.status(&Actor::Member(member)).unwrap().is_restricted());

        clock.advance(TimeDelta::days(7));
        assert_eq!(
            control.status(&Actor::Member(member)).unwrap(),
            ActorStatus::ACTIVE
        );
    }

    #[test]
    fn test_ip_block_is_a_shared_flag() {
        let (clock, control) = setup();
        let until = clock.now() + TimeDelta::days(7);
        let ip = Actor::ip("203.0.113.9");

        assert!(matches!(
            control.block_ip("203.0.113.9", until).unwrap(),
            SanctionChange::Applied { .. }
        ));
        assert_eq!(
            control.block_ip("203.0.113.9", until).unwrap(),
            SanctionChange::AlreadyInEffect { until: Some(until) }
        );
        let status = control.status(&ip).unwrap();
        assert_eq!(status.state, AccountState::Blocked);
        assert_eq!(status.until, Some(until));

        assert_eq!(control.lift(&ip).unwrap(), Some(AccountState::Blocked));
        assert_eq!(control.lift(&ip).unwrap(), None);
    }

    #[test]
    fn test_past_expiry_is_rejected() {
        let (clock, control) = setup();
        assert!(matches!(
            control.suspend_member(MemberId(1), clock.now()),
            Err(StoreError::Rejected(_))
        ));
    }
}
