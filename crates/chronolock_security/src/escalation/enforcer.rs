//! Sanction enforcement against the account/IP control plane.
//!
//! Members are suspended, IPs are blocked. Each status change that actually
//! happens writes exactly one [`SanctionRecord`]; repeated calls while a
//! sanction is in effect write nothing.

use chrono::TimeDelta;
use chronolock_core::{
    AccountState, Actor, Clock, GateResult, IssuedBy, SanctionKind, SanctionRecord, Timestamp,
};
use chronolock_store::{ActorStatus, ControlPlane, SanctionChange, SanctionLedger};
use std::sync::Arc;

/// Result of a sanction request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SanctionOutcome {
    /// A new sanction was applied and recorded.
    Issued(Box<SanctionRecord>),
    /// A sanction was already active; nothing was written.
    AlreadyInEffect {
        /// Expiry of the existing sanction.
        until: Option<Timestamp>,
    },
}

/// Issues, lifts and audits sanctions.
pub struct SanctionEnforcer {
    control: Arc<dyn ControlPlane>,
    ledger: Arc<dyn SanctionLedger>,
    clock: Arc<dyn Clock>,
}

impl SanctionEnforcer {
    /// Creates an enforcer.
    #[must_use]
    pub fn new(
        control: Arc<dyn ControlPlane>,
        ledger: Arc<dyn SanctionLedger>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            control,
            ledger,
            clock,
        }
    }

    /// Suspends a member or blocks an IP for `duration`.
    ///
    /// # Errors
    ///
    /// Returns [`chronolock_core::GateError::StoreUnavailable`] if the
    /// control plane fails.
    pub fn sanction(
        &self,
        actor: &Actor,
        duration: TimeDelta,
        reason: &str,
        issued_by: IssuedBy,
    ) -> GateResult<SanctionOutcome> {
        let now = self.clock.now();
        let until = now + duration;

        let (change, kind, after_state) = match actor {
            Actor::Member(member) => (
                self.control.suspend_member(*member, until)?,
                SanctionKind::Suspend,
                AccountState::Suspended,
            ),
            Actor::Ip(ip) => (
                self.control.block_ip(ip, until)?,
                SanctionKind::Block,
                AccountState::Blocked,
            ),
        };

        match change {
            SanctionChange::AlreadyInEffect { until } => {
                tracing::info!(%actor, ?until, "sanction already in effect");
                Ok(SanctionOutcome::AlreadyInEffect { until })
            }
            SanctionChange::Applied { before } => {
                let record = SanctionRecord {
                    actor: actor.clone(),
                    kind,
                    before_state: before,
                    after_state,
                    reason: reason.to_owned(),
                    until: Some(until),
                    issued_by,
                    issued_at: now,
                };
                tracing::warn!(
                    %actor,
                    state = %after_state,
                    %until,
                    issued_by = %record.issued_by,
                    reason,
                    "sanction issued"
                );
                self.audit(&record);
                Ok(SanctionOutcome::Issued(Box::new(record)))
            }
        }
    }

    /// Lifts any active sanction. Returns the record if something was lifted.
    ///
    /// # Errors
    ///
    /// Returns [`chronolock_core::GateError::StoreUnavailable`] if the
    /// control plane fails.
    pub fn lift(
        &self,
        actor: &Actor,
        reason: &str,
        issued_by: IssuedBy,
    ) -> GateResult<Option<SanctionRecord>> {
        let Some(before) = self.control.lift(actor)? else {
            return Ok(None);
        };
        let record = SanctionRecord {
            actor: actor.clone(),
            kind: SanctionKind::Lift,
            before_state: before,
            after_state: AccountState::Active,
            reason: reason.to_owned(),
            until: None,
            issued_by,
            issued_at: self.clock.now(),
        };
        tracing::info!(%actor, from = %before, issued_by = %record.issued_by, "sanction lifted");
        self.audit(&record);
        Ok(Some(record))
    }

    /// Active sanction for `actor`, if any. Fails open.
    pub fn active_sanction(&self, actor: &Actor) -> Option<ActorStatus> {
        match self.control.status(actor) {
            Ok(status) => status.is_restricted().then_some(status),
            Err(e) => {
                tracing::warn!(%actor, error = %e, "sanction status unavailable, admitting");
                None
            }
        }
    }

    /// Audit trail for `actor`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`chronolock_core::GateError::StoreUnavailable`] if the
    /// ledger fails.
    pub fn history(&self, actor: &Actor) -> GateResult<Vec<SanctionRecord>> {
        Ok(self.ledger.history(actor)?)
    }

    fn audit(&self, record: &SanctionRecord) {
        if let Err(e) = self.ledger.append(record.clone()) {
            tracing::error!(actor = %record.actor, error = %e, "sanction record not written");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use chronolock_core::{GateError, ManualClock};
    use chronolock_store::{MemoryControlPlane, MemorySanctionLedger, MemoryStore, SharedStore};

    struct Fixture {
        clock: Arc<ManualClock>,
        flags: Arc<MemoryStore>,
        control: Arc<MemoryControlPlane>,
        ledger: Arc<MemorySanctionLedger>,
        enforcer: SanctionEnforcer,
    }

    fn fixture() -> Fixture {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 7, 1, 0, 0, 0).unwrap(),
        ));
        let flags = MemoryStore::connect(clock.clone());
        let control = MemoryControlPlane::connect(clock.clone(), flags.clone());
        let ledger = MemorySanctionLedger::connect();
        let enforcer = SanctionEnforcer::new(control.clone(), ledger.clone(), clock.clone());
        Fixture {
            clock,
            flags,
            control,
            ledger,
            enforcer,
        }
    }

    #[test]
    fn test_member_suspension_writes_one_record() {
        let f = fixture();
        let actor = Actor::member(11);

        let first = f
            .enforcer
            .sanction(&actor, TimeDelta::days(7), "score 120", IssuedBy::System)
            .unwrap();
        let SanctionOutcome::Issued(record) = first else {
            panic!("expected a new sanction");
        };
        assert_eq!(record.kind, SanctionKind::Suspend);
        assert_eq!(record.before_state, AccountState::Active);
        assert_eq!(record.after_state, AccountState::Suspended);
        assert_eq!(record.until, Some(f.clock.now() + TimeDelta::days(7)));

        let second = f
            .enforcer
            .sanction(&actor, TimeDelta::days(7), "score 140", IssuedBy::System)
            .unwrap();
        assert!(matches!(second, SanctionOutcome::AlreadyInEffect { .. }));
        assert_eq!(f.enforcer.history(&actor).unwrap().len(), 1);
    }

    #[test]
    fn test_ip_block_and_admin_lift() {
        let f = fixture();
        let actor = Actor::ip("203.0.113.50");

        f.enforcer
            .sanction(&actor, TimeDelta::days(7), "score 100", IssuedBy::System)
            .unwrap();
        assert_eq!(
            f.enforcer.active_sanction(&actor).map(|s| s.state),
            Some(AccountState::Blocked)
        );

        let lifted = f
            .enforcer
            .lift(&actor, "false positive", IssuedBy::Admin("mina".into()))
            .unwrap()
            .unwrap();
        assert_eq!(lifted.before_state, AccountState::Blocked);
        assert_eq!(lifted.after_state, AccountState::Active);
        assert!(f.enforcer.active_sanction(&actor).is_none());
        assert!(f
            .enforcer
            .lift(&actor, "again", IssuedBy::Admin("mina".into()))
            .unwrap()
            .is_none());

        let kinds: Vec<_> = f
            .enforcer
            .history(&actor)
            .unwrap()
            .iter()
            .map(|r| r.kind)
            .collect();
        assert_eq!(kinds, vec![SanctionKind::Block, SanctionKind::Lift]);
    }

    #[test]
    fn test_control_plane_outage() {
        let f = fixture();
        let actor = Actor::member(12);
        f.control.close();

        assert!(matches!(
            f.enforcer
                .sanction(&actor, TimeDelta::days(7), "score 100", IssuedBy::System),
            Err(GateError::StoreUnavailable(_))
        ));
        assert!(f.enforcer.active_sanction(&actor).is_none());
        assert!(f.ledger.is_empty());

        f.flags.close();
        assert!(f.enforcer.active_sanction(&Actor::ip("192.0.2.1")).is_none());
    }
}
