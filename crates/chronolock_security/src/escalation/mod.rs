//! # Escalation Ladder
//!
//! Maps an actor's current suspicion score to an action.
//!
//! ```text
//! score < WARNING            → nothing
//! WARNING <= score < LIMIT   → log
//! LIMIT   <= score < BLOCK   → cooldown (rate limiter flag)
//! BLOCK   <= score           → suspend member / block IP, reset score
//! ```
//!
//! The sanction step is idempotent: a burst can push the score past BLOCK
//! several times before the reset lands, and only the first crossing
//! changes anything.

mod enforcer;

pub use enforcer::{SanctionEnforcer, SanctionOutcome};

use crate::rate_limit::RateLimiter;
use crate::suspicion::SuspicionScoreTracker;
use chrono::TimeDelta;
use chronolock_core::{Actor, EscalationThresholds, IssuedBy, SanctionRecord, Timestamp};
use std::sync::Arc;

/// What the ladder did for one score.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EscalationAction {
    /// Below the warning threshold.
    None,
    /// Logged only.
    Warn,
    /// Cooldown flag applied.
    Cooldown {
        /// Cooldown length.
        duration: TimeDelta,
    },
    /// New sanction issued; score reset.
    Sanctioned(Box<SanctionRecord>),
    /// Sanction was already active; score reset, nothing new written.
    AlreadySanctioned {
        /// Expiry of the existing sanction.
        until: Option<Timestamp>,
    },
}

/// Threshold-driven escalation over score, limiter and enforcer.
pub struct EscalationPolicy {
    thresholds: EscalationThresholds,
    tracker: Arc<SuspicionScoreTracker>,
    limiter: Arc<RateLimiter>,
    enforcer: Arc<SanctionEnforcer>,
}

impl EscalationPolicy {
    /// Creates the policy.
    #[must_use]
    pub fn new(
        thresholds: EscalationThresholds,
        tracker: Arc<SuspicionScoreTracker>,
        limiter: Arc<RateLimiter>,
        enforcer: Arc<SanctionEnforcer>,
    ) -> Self {
        Self {
            thresholds,
            tracker,
            limiter,
            enforcer,
        }
    }

    /// Thresholds in use.
    #[must_use]
    pub const fn thresholds(&self) -> &EscalationThresholds {
        &self.thresholds
    }

    /// Adds `delta` to the actor's score and escalates on the new total.
    pub fn record_suspicion(&self, actor: &Actor, delta: i64, reason: &str) -> (i64, EscalationAction) {
        if delta <= 0 {
            return (self.tracker.get(actor), EscalationAction::None);
        }
        let total = self.tracker.increment(actor, delta);
        (total, self.evaluate(actor, total, reason))
    }

    /// Applies the ladder to `score`.
    pub fn evaluate(&self, actor: &Actor, score: i64, reason: &str) -> EscalationAction {
        let t = &self.thresholds;

        if score < t.warning {
            return EscalationAction::None;
        }
        if score < t.limit {
            tracing::info!(%actor, score, reason, "suspicion above warning threshold");
            return EscalationAction::Warn;
        }
        if score < t.block {
            let duration = t.cooldown();
            self.limiter.apply_cooldown(actor, duration);
            return EscalationAction::Cooldown { duration };
        }

        let note = format!("suspicion score {score}: {reason}");
        match self
            .enforcer
            .sanction(actor, t.sanction(), &note, IssuedBy::System)
        {
            Ok(SanctionOutcome::Issued(record)) => {
                self.tracker.reset(actor);
                EscalationAction::Sanctioned(record)
            }
            Ok(SanctionOutcome::AlreadyInEffect { until }) => {
                self.tracker.reset(actor);
                EscalationAction::AlreadySanctioned { until }
            }
            Err(e) => {
                // Score is kept so the next increment retries the sanction.
                tracing::warn!(%actor, score, error = %e, "sanction failed, falling back to cooldown");
                let duration = t.cooldown();
                self.limiter.apply_cooldown(actor, duration);
                EscalationAction::Cooldown { duration }
            }
        }
    }
}
