//! # Access Gate
//!
//! One access attempt, end to end.
//!
//! ```text
//! 1. active sanction?              → Blocked
//! 2. cooldown / sliding window     → RateLimited
//! 3. load capsule                  → CapsuleNotFound
//! 4. clock skew                    → scored; Blocked if that sanctions
//! 5. validate rule at server time
//!    ├─ met     → allocate slot    → Unlocked | CapacityExhausted
//!    └─ not met → movement check   → AnomalySuspected | ConditionNotMet
//! 6. append AttemptRecord
//! ```
//!
//! Sanction, rate-limit, scoring and logging failures fail open. Allocation
//! fails closed.

use crate::allocation::{Allocation, FirstComeAllocator};
use crate::anomaly::{MovementAnomalyDetector, MovementReport, MovementSample};
use crate::escalation::{EscalationAction, EscalationPolicy, SanctionEnforcer};
use crate::rate_limit::{RateLimiter, RiskTier};
use crate::suspicion::SuspicionScoreTracker;
use crate::unlock::{UnlockClaim, UnlockConditionValidator, Verdict};
use chronolock_core::{
    Actor, AnomalyTier, AttemptOutcome, AttemptRecord, CapsuleId, Clock, ConditionKind,
    GateConfig, GateError, GateResult, GeoPoint, ScoreTable, Timestamp,
};
use chronolock_store::{AttemptLog, CapsuleProvider, ControlPlane, SanctionLedger, SharedStore};
use std::sync::Arc;

/// Inbound attempt.
#[derive(Clone, Debug, PartialEq)]
pub struct AccessRequest {
    /// Target capsule.
    pub capsule_id: CapsuleId,
    /// Who is asking.
    pub actor: Actor,
    /// Client-reported time.
    pub claimed_time: Option<Timestamp>,
    /// Client-reported position.
    pub position: Option<GeoPoint>,
    /// Client user agent.
    pub user_agent: Option<String>,
}

impl AccessRequest {
    /// Request with a position and no client time.
    #[must_use]
    pub fn at(capsule_id: CapsuleId, actor: Actor, position: GeoPoint) -> Self {
        Self {
            capsule_id,
            actor,
            claimed_time: None,
            position: Some(position),
            user_agent: None,
        }
    }

    /// Sets the client-reported time.
    #[must_use]
    pub fn claimed_at(mut self, at: Timestamp) -> Self {
        self.claimed_time = Some(at);
        self
    }

    /// Sets the user agent.
    #[must_use]
    pub fn with_user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }
}

/// Result of an attempt that was well-formed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessOutcome {
    /// Capsule opened.
    Unlocked(Allocation),
    /// Time or location did not match.
    ConditionNotMet(ConditionKind),
    /// First-come slots are gone.
    CapacityExhausted,
    /// Movement between attempts looks spoofed.
    AnomalySuspected(AnomalyTier),
    /// Too many attempts.
    RateLimited {
        /// Seconds to wait.
        retry_after_secs: u64,
    },
    /// Actor is suspended or blocked.
    Blocked,
}

impl AccessOutcome {
    /// Returns true if the capsule was opened.
    #[must_use]
    pub const fn is_unlocked(&self) -> bool {
        matches!(self, Self::Unlocked(_))
    }

    /// Error equivalent of a denial, for [`GateError::public_message`].
    #[must_use]
    pub const fn denial(&self) -> Option<GateError> {
        match *self {
            Self::Unlocked(_) => None,
            Self::ConditionNotMet(kind) => Some(GateError::ConditionNotMet(kind)),
            Self::CapacityExhausted => Some(GateError::CapacityExhausted),
            Self::AnomalySuspected(tier) => Some(GateError::AnomalySuspected(tier)),
            Self::RateLimited { retry_after_secs } => {
                Some(GateError::RateLimited { retry_after_secs })
            }
            Self::Blocked => Some(GateError::Blocked),
        }
    }

    const fn attempt_outcome(&self) -> AttemptOutcome {
        match self {
            Self::Unlocked(_) => AttemptOutcome::Unlocked,
            Self::ConditionNotMet(_) => AttemptOutcome::ConditionNotMet,
            Self::CapacityExhausted => AttemptOutcome::CapacityExhausted,
            Self::AnomalySuspected(_) => AttemptOutcome::AnomalySuspected,
            Self::RateLimited { .. } => AttemptOutcome::RateLimited,
            Self::Blocked => AttemptOutcome::Blocked,
        }
    }
}

/// Backends the gate runs on.
#[derive(Clone)]
pub struct GateStores {
    /// Scores, windows and flags.
    pub shared: Arc<dyn SharedStore>,
    /// Capsule rules and capacity.
    pub capsules: Arc<dyn CapsuleProvider>,
    /// Attempt history.
    pub attempts: Arc<dyn AttemptLog>,
    /// Account and IP status.
    pub control: Arc<dyn ControlPlane>,
    /// Sanction audit trail.
    pub ledger: Arc<dyn SanctionLedger>,
}

/// Unlock gate.
pub struct AccessGate {
    clock: Arc<dyn Clock>,
    capsules: Arc<dyn CapsuleProvider>,
    attempts: Arc<dyn AttemptLog>,
    scores: ScoreTable,
    validator: UnlockConditionValidator,
    detector: MovementAnomalyDetector,
    tracker: Arc<SuspicionScoreTracker>,
    limiter: Arc<RateLimiter>,
    enforcer: Arc<SanctionEnforcer>,
    policy: EscalationPolicy,
    allocator: FirstComeAllocator,
}

impl AccessGate {
    /// Wires the gate from configuration and backends.
    #[must_use]
    pub fn new(config: &GateConfig, stores: GateStores, clock: Arc<dyn Clock>) -> Self {
        let tracker = Arc::new(SuspicionScoreTracker::new(
            Arc::clone(&stores.shared),
            config.suspicion.ttl(),
        ));
        let limiter = Arc::new(RateLimiter::new(
            Arc::clone(&stores.shared),
            Arc::clone(&clock),
            config.rate_limits,
        ));
        let enforcer = Arc::new(SanctionEnforcer::new(
            stores.control,
            stores.ledger,
            Arc::clone(&clock),
        ));
        let policy = EscalationPolicy::new(
            config.escalation,
            Arc::clone(&tracker),
            Arc::clone(&limiter),
            Arc::clone(&enforcer),
        );

        Self {
            clock,
            allocator: FirstComeAllocator::new(Arc::clone(&stores.capsules)),
            capsules: stores.capsules,
            attempts: stores.attempts,
            scores: config.scores,
            validator: UnlockConditionValidator::new(),
            detector: MovementAnomalyDetector::new(config.detector),
            tracker,
            limiter,
            enforcer,
            policy,
        }
    }

    /// Suspicion scores.
    #[must_use]
    pub fn tracker(&self) -> &SuspicionScoreTracker {
        &self.tracker
    }

    /// Rate limiter.
    #[must_use]
    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Sanction enforcer.
    #[must_use]
    pub fn enforcer(&self) -> &SanctionEnforcer {
        &self.enforcer
    }

    /// Escalation policy.
    #[must_use]
    pub const fn policy(&self) -> &EscalationPolicy {
        &self.policy
    }

    /// Attempt history for an actor.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::StoreUnavailable`] if the log fails.
    pub fn attempt_history(&self, actor: &Actor) -> GateResult<Vec<AttemptRecord>> {
        Ok(self.attempts.history(actor)?)
    }

    /// Handles one access attempt.
    ///
    /// # Errors
    ///
    /// Malformed rules or claims ([`GateError::InvalidCoordinate`],
    /// [`GateError::PositionMissing`], ...), [`GateError::CapsuleNotFound`],
    /// and [`GateError::StoreUnavailable`] when the capsule cannot be read.
    pub fn attempt(&self, request: &AccessRequest) -> GateResult<AccessOutcome> {
        let now = self.clock.now();
        let actor = &request.actor;
        let _span = tracing::debug_span!("attempt", %actor, capsule = %request.capsule_id).entered();

        if let Some(status) = self.enforcer.active_sanction(actor) {
            tracing::debug!(state = %status.state, "sanctioned actor refused");
            return Ok(self.finish(request, now, AccessOutcome::Blocked, AnomalyTier::None));
        }

        let score = self.tracker.get(actor);
        let tier = RiskTier::from_score(score, self.policy.thresholds());
        let decision = self.limiter.check(actor, tier);
        if !decision.is_allowed() {
            let outcome = AccessOutcome::RateLimited {
                retry_after_secs: decision.retry_after_secs(),
            };
            return Ok(self.finish(request, now, outcome, AnomalyTier::None));
        }

        let gate = match self.capsules.capsule(request.capsule_id) {
            Ok(Some(gate)) => gate,
            Ok(None) => {
                self.log_invalid(request, now);
                return Err(GateError::CapsuleNotFound(request.capsule_id.0));
            }
            Err(e) => {
                self.log_invalid(request, now);
                return Err(e.into());
            }
        };

        if let Some(skew) = self.detector.check_clock_skew(request.claimed_time, now) {
            tracing::info!(skew_secs = skew.abs_secs(), "client clock skew");
            let (total, action) = self.policy.record_suspicion(
                actor,
                self.scores.time_manipulation,
                "time manipulation",
            );
            // A sanction issued by this very attempt stops it before any slot is taken.
            if matches!(
                action,
                EscalationAction::Sanctioned(_) | EscalationAction::AlreadySanctioned { .. }
            ) {
                tracing::warn!(total, "clock skew escalated to sanction");
                return Ok(self.finish(request, now, AccessOutcome::Blocked, AnomalyTier::None));
            }
        }

        let claim = UnlockClaim {
            now: Some(now),
            position: request.position,
        };
        let verdict = match self.validator.evaluate(&gate.rule, &claim) {
            Ok(verdict) => verdict,
            Err(e) => {
                self.log_invalid(request, now);
                return Err(e);
            }
        };

        let (outcome, anomaly) = match verdict {
            Verdict::Met => match self.allocator.allocate(&gate, actor) {
                Ok(allocation) => (AccessOutcome::Unlocked(allocation), AnomalyTier::None),
                Err(_) => (AccessOutcome::CapacityExhausted, AnomalyTier::None),
            },
            Verdict::NotMet(kind) => {
                let anomaly = self.movement_tier(request, now);
                if anomaly.is_anomalous() {
                    (AccessOutcome::AnomalySuspected(anomaly), anomaly)
                } else {
                    (AccessOutcome::ConditionNotMet(kind), anomaly)
                }
            }
        };

        Ok(self.finish(request, now, outcome, anomaly))
    }

    /// Compares against the actor's last attempt on this capsule and scores it.
    fn movement_tier(&self, request: &AccessRequest, now: Timestamp) -> AnomalyTier {
        let Some(position) = request.position else {
            return AnomalyTier::None;
        };

        let since = now - self.detector.config().lookback();
        let prior = match self.attempts.latest_since(&request.actor, request.capsule_id, since) {
            Ok(prior) => prior,
            Err(e) => {
                tracing::warn!(error = %e, "attempt log unavailable, skipping movement check");
                return AnomalyTier::None;
            }
        };
        let prior = prior.and_then(|record| {
            record
                .position
                .map(|position| MovementSample::new(record.timestamp, position))
        });

        let report = self
            .detector
            .analyze(prior.as_ref(), &MovementSample::new(now, position));
        if report.tier.is_anomalous() {
            self.score_movement(&request.actor, &report);
        }
        report.tier
    }

    fn score_movement(&self, actor: &Actor, report: &MovementReport) {
        let delta = self.scores.for_tier(report.tier);
        let reason = format!(
            "{:?} movement: {:.0} km/h over {:.0} m",
            report.tier, report.speed_kmh, report.distance_meters
        );
        let (total, action) = self.policy.record_suspicion(actor, delta, &reason);
        match action {
            EscalationAction::Sanctioned(_) | EscalationAction::AlreadySanctioned { .. } => {
                tracing::warn!(tier = ?report.tier, total, "movement anomaly escalated to sanction");
            }
            _ => tracing::debug!(tier = ?report.tier, total, ?action, "movement anomaly scored"),
        }
    }

    fn finish(
        &self,
        request: &AccessRequest,
        now: Timestamp,
        outcome: AccessOutcome,
        anomaly: AnomalyTier,
    ) -> AccessOutcome {
        self.append(request, now, outcome.attempt_outcome(), anomaly);
        tracing::debug!(?outcome, "attempt finished");
        outcome
    }

    fn log_invalid(&self, request: &AccessRequest, now: Timestamp) {
        self.append(request, now, AttemptOutcome::Invalid, AnomalyTier::None);
    }

    fn append(
        &self,
        request: &AccessRequest,
        now: Timestamp,
        outcome: AttemptOutcome,
        anomaly_tier: AnomalyTier,
    ) {
        let record = AttemptRecord {
            actor: request.actor.clone(),
            capsule_id: request.capsule_id,
            timestamp: now,
            claimed_time: request.claimed_time,
            position: request.position,
            outcome,
            anomaly_tier,
            user_agent: request.user_agent.clone(),
        };
        if let Err(e) = self.attempts.append(record) {
            tracing::warn!(error = %e, "attempt record dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, TimeZone, Utc};
    use chronolock_core::{GeoFence, IssuedBy, ManualClock, UnlockRule};
    use chronolock_store::{
        CapsuleGate, MemoryAttemptLog, MemoryCapsuleStore, MemoryControlPlane,
        MemorySanctionLedger, MemoryStore,
    };

    const PLAZA: GeoPoint = GeoPoint::new(37.5665, 126.9780);
    const BUSAN: GeoPoint = GeoPoint::new(35.1796, 129.0756);
    const NEAR_PLAZA: GeoPoint = GeoPoint::new(37.5700, 126.9800);

    struct Fixture {
        clock: Arc<ManualClock>,
        capsules: Arc<MemoryCapsuleStore>,
        attempts: Arc<MemoryAttemptLog>,
        gate: AccessGate,
    }

    fn fixture() -> Fixture {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 10, 1, 12, 0, 0).unwrap(),
        ));
        let shared = MemoryStore::connect(clock.clone());
        let capsules = MemoryCapsuleStore::connect();
        let attempts = MemoryAttemptLog::connect();
        let stores = GateStores {
            shared: shared.clone(),
            capsules: capsules.clone(),
            attempts: attempts.clone(),
            control: MemoryControlPlane::connect(clock.clone(), shared),
            ledger: MemorySanctionLedger::connect(),
        };
        capsules.insert(CapsuleGate {
            capsule_id: CapsuleId(1),
            rule: UnlockRule::location(GeoFence::new(PLAZA, 100.0)),
            max_viewers: 0,
        });
        let gate = AccessGate::new(&GateConfig::default(), stores, clock.clone());
        Fixture {
            clock,
            capsules,
            attempts,
            gate,
        }
    }

    fn at(position: GeoPoint) -> AccessRequest {
        AccessRequest::at(CapsuleId(1), Actor::member(1), position)
    }

    #[test]
    fn test_unlock_inside_fence() {
        let f = fixture();
        let outcome = f.gate.attempt(&at(PLAZA).with_user_agent("test/1.0")).unwrap();
        assert_eq!(outcome, AccessOutcome::Unlocked(Allocation::Unlimited));

        let history = f.gate.attempt_history(&Actor::member(1)).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].outcome, AttemptOutcome::Unlocked);
        assert_eq!(history[0].user_agent.as_deref(), Some("test/1.0"));
    }

    #[test]
    fn test_plausible_miss_is_condition_not_met() {
        let f = fixture();
        let outcome = f.gate.attempt(&at(NEAR_PLAZA)).unwrap();
        assert_eq!(outcome, AccessOutcome::ConditionNotMet(ConditionKind::OutsideRadius));

        f.clock.advance(TimeDelta::minutes(5));
        let outcome = f.gate.attempt(&at(NEAR_PLAZA)).unwrap();
        assert_eq!(outcome, AccessOutcome::ConditionNotMet(ConditionKind::OutsideRadius));
        assert_eq!(f.gate.tracker().get(&Actor::member(1)), 0);
    }

    #[test]
    fn test_teleport_is_anomalous_and_scored() {
        let f = fixture();
        f.gate.attempt(&at(BUSAN)).unwrap();

        f.clock.advance(TimeDelta::minutes(10));
        let outcome = f.gate.attempt(&at(NEAR_PLAZA)).unwrap();
        assert_eq!(outcome, AccessOutcome::AnomalySuspected(AnomalyTier::Extreme));
        assert_eq!(f.gate.tracker().get(&Actor::member(1)), 60);
        assert_eq!(
            outcome.denial().unwrap().public_message(),
            GateError::Blocked.public_message()
        );

        let last = f.attempts.history(&Actor::member(1)).unwrap().pop().unwrap();
        assert_eq!(last.anomaly_tier, AnomalyTier::Extreme);
    }

    #[test]
    fn test_second_attempt_within_a_minute_is_rate_limited() {
        let f = fixture();
        f.gate.attempt(&at(NEAR_PLAZA)).unwrap();
        f.clock.advance(TimeDelta::seconds(15));
        assert_eq!(
            f.gate.attempt(&at(PLAZA)).unwrap(),
            AccessOutcome::RateLimited {
                retry_after_secs: 45
            }
        );
    }

    #[test]
    fn test_sanctioned_actor_is_blocked_first() {
        let f = fixture();
        f.gate
            .enforcer()
            .sanction(
                &Actor::member(1),
                TimeDelta::days(7),
                "manual",
                IssuedBy::Admin("ops".into()),
            )
            .unwrap();
        assert_eq!(f.gate.attempt(&at(PLAZA)).unwrap(), AccessOutcome::Blocked);
        assert_eq!(
            f.attempts.history(&Actor::member(1)).unwrap()[0].outcome,
            AttemptOutcome::Blocked
        );
    }

    #[test]
    fn test_clock_skew_scores_without_denying() {
        let f = fixture();
        let request = at(PLAZA).claimed_at(f.clock.now() - TimeDelta::hours(3));
        assert!(f.gate.attempt(&request).unwrap().is_unlocked());
        assert_eq!(f.gate.tracker().get(&Actor::member(1)), 20);
    }

    #[test]
    fn test_skew_that_reaches_block_denies_same_attempt() {
        let f = fixture();
        let actor = Actor::member(1);
        f.gate.tracker().increment(&actor, 90);

        let request = at(PLAZA).claimed_at(f.clock.now() - TimeDelta::hours(3));
        assert_eq!(f.gate.attempt(&request).unwrap(), AccessOutcome::Blocked);

        assert!(f.gate.enforcer().active_sanction(&actor).is_some());
        assert_eq!(f.gate.enforcer().history(&actor).unwrap().len(), 1);
        assert_eq!(f.gate.tracker().get(&actor), 0);

        let history = f.gate.attempt_history(&actor).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].outcome, AttemptOutcome::Blocked);
    }

    #[test]
    fn test_skew_blocked_attempt_takes_no_slot() {
        let f = fixture();
        f.capsules.insert(CapsuleGate {
            capsule_id: CapsuleId(2),
            rule: UnlockRule::location(GeoFence::new(PLAZA, 100.0)),
            max_viewers: 1,
        });
        let actor = Actor::member(1);
        f.gate.tracker().increment(&actor, 90);

        let request = AccessRequest::at(CapsuleId(2), actor, PLAZA)
            .claimed_at(f.clock.now() + TimeDelta::hours(1));
        assert_eq!(f.gate.attempt(&request).unwrap(), AccessOutcome::Blocked);
        assert_eq!(f.capsules.capacity(CapsuleId(2)).unwrap().unwrap().current, 0);
    }

    #[test]
    fn test_errors_are_returned_and_logged() {
        let f = fixture();
        assert_eq!(
            f.gate
                .attempt(&AccessRequest::at(CapsuleId(99), Actor::member(1), PLAZA)),
            Err(GateError::CapsuleNotFound(99))
        );

        f.clock.advance(TimeDelta::minutes(1));
        assert!(matches!(
            f.gate.attempt(&at(GeoPoint::new(91.0, 0.0))),
            Err(GateError::InvalidCoordinate { .. })
        ));

        let outcomes: Vec<_> = f
            .attempts
            .history(&Actor::member(1))
            .unwrap()
            .iter()
            .map(|r| r.outcome)
            .collect();
        assert_eq!(outcomes, vec![AttemptOutcome::Invalid, AttemptOutcome::Invalid]);
    }

    #[test]
    fn test_capacity_limited_capsule() {
        let f = fixture();
        f.capsules.insert(CapsuleGate {
            capsule_id: CapsuleId(2),
            rule: UnlockRule::location(GeoFence::new(PLAZA, 100.0)),
            max_viewers: 1,
        });
        let first = AccessRequest::at(CapsuleId(2), Actor::member(1), PLAZA);
        let second = AccessRequest::at(CapsuleId(2), Actor::member(2), PLAZA);

        assert_eq!(
            f.gate.attempt(&first).unwrap(),
            AccessOutcome::Unlocked(Allocation::Granted)
        );
        assert_eq!(f.gate.attempt(&second).unwrap(), AccessOutcome::CapacityExhausted);

        f.clock.advance(TimeDelta::minutes(1));
        assert_eq!(
            f.gate.attempt(&first).unwrap(),
            AccessOutcome::Unlocked(Allocation::AlreadyViewed)
        );
    }
}
