//! Operator actions on actors.
//!
//! Every status change goes through the same enforcer the escalation ladder
//! uses, so manual and automatic sanctions share one audit trail. Manual
//! records carry `IssuedBy::Admin(name)`.

use crate::service::GateService;
use chrono::TimeDelta;
use chronolock_core::{Actor, AttemptRecord, GateResult, IssuedBy, SanctionRecord};
use chronolock_security::SanctionOutcome;

impl GateService {
    /// Current suspicion score.
    #[must_use]
    pub fn score(&self, actor: &Actor) -> i64 {
        self.gate.tracker().get(actor)
    }

    /// Clears the score, rate-limit windows and cooldown of `actor`.
    pub fn reset_score(&self, actor: &Actor, admin: &str) {
        let before = self.gate.tracker().get(actor);
        self.gate.tracker().reset(actor);
        self.gate.limiter().clear(actor);
        tracing::info!(%actor, before, admin, "suspicion score reset");
    }

    /// Suspends a member or blocks an IP on an operator's behalf.
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
        admin: &str,
    ) -> GateResult<SanctionOutcome> {
        self.gate
            .enforcer()
            .sanction(actor, duration, reason, IssuedBy::Admin(admin.to_owned()))
    }

    /// Lifts a sanction on an operator's behalf.
    ///
    /// # Errors
    ///
    /// Returns [`chronolock_core::GateError::StoreUnavailable`] if the
    /// control plane fails.
    pub fn lift(&self, actor: &Actor, reason: &str, admin: &str) -> GateResult<Option<SanctionRecord>> {
        self.gate
            .enforcer()
            .lift(actor, reason, IssuedBy::Admin(admin.to_owned()))
    }

    /// Every sanction record for `actor`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`chronolock_core::GateError::StoreUnavailable`] if the ledger fails.
    pub fn sanction_history(&self, actor: &Actor) -> GateResult<Vec<SanctionRecord>> {
        self.gate.enforcer().history(actor)
    }

    /// Every attempt by `actor`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`chronolock_core::GateError::StoreUnavailable`] if the log fails.
    pub fn attempt_history(&self, actor: &Actor) -> GateResult<Vec<AttemptRecord>> {
        self.gate.attempt_history(actor)
    }
}
