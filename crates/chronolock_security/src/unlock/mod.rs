//! # Unlock Condition Validation
//!
//! Decides whether a claimed `(time, position)` satisfies a capsule's rule.
//!
//! ## Rules
//!
//! - **TIME**: met iff `unlock_at <= now` and (`unlock_until` absent or `now <= unlock_until`).
//!   Both bounds are inclusive.
//! - **LOCATION**: met iff the claimed point is within `radius_meters` of the fence center.
//! - **TIME_AND_LOCATION**: both halves are evaluated; the time failure is reported first.
//!
//! Malformed rules and claims are errors, never a plain "not met".

use chronolock_core::{
    ConditionKind, GateError, GateResult, GeoPoint, Timestamp, UnlockRule, UnlockType,
};

/// What the client claims at the moment of the attempt.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct UnlockClaim {
    /// Evaluation time (server time on the request path).
    pub now: Option<Timestamp>,
    /// Claimed position.
    pub position: Option<GeoPoint>,
}

impl UnlockClaim {
    /// Claim with both time and position.
    #[must_use]
    pub const fn at(now: Timestamp, position: GeoPoint) -> Self {
        Self {
            now: Some(now),
            position: Some(position),
        }
    }

    /// Claim with a time only.
    #[must_use]
    pub const fn at_time(now: Timestamp) -> Self {
        Self {
            now: Some(now),
            position: None,
        }
    }
}

/// Outcome of a well-formed evaluation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    /// The rule is satisfied.
    Met,
    /// The rule is not satisfied.
    NotMet(ConditionKind),
}

/// Stateless unlock rule evaluator.
#[derive(Clone, Copy, Debug, Default)]
pub struct UnlockConditionValidator;

impl UnlockConditionValidator {
    /// Creates a validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Evaluates a rule against a claim.
    ///
    /// # Errors
    ///
    /// - [`GateError::EvaluationTimeMissing`] if a time rule gets no `now`
    /// - [`GateError::TimeConditionMissing`] if a time rule has no `unlock_at`
    /// - [`GateError::InvalidTimeRange`] if `unlock_until <= unlock_at`
    /// - [`GateError::LocationConditionMissing`] if a location rule has no fence
    /// - [`GateError::PositionMissing`] if a location rule gets no position
    /// - [`GateError::InvalidCoordinate`] for an out-of-range claim or fence
    /// - [`GateError::InvalidRadius`] for a negative or non-finite radius
    pub fn evaluate(&self, rule: &UnlockRule, claim: &UnlockClaim) -> GateResult<Verdict> {
        let failure = match rule.unlock_type {
            UnlockType::Time => Self::check_time(rule, claim.now)?,
            UnlockType::Location => Self::check_location(rule, claim.position)?,
            UnlockType::TimeAndLocation => {
                let time = Self::check_time(rule, claim.now)?;
                let location = Self::check_location(rule, claim.position)?;
                time.or(location)
            }
        };

        let verdict = failure.map_or(Verdict::Met, Verdict::NotMet);
        tracing::trace!(rule = ?rule.unlock_type, ?verdict, "unlock condition evaluated");
        Ok(verdict)
    }

    /// Returns true if the rule is satisfied.
    ///
    /// # Errors
    ///
    /// Same as [`Self::evaluate`].
    pub fn is_met(&self, rule: &UnlockRule, claim: &UnlockClaim) -> GateResult<bool> {
        Ok(self.evaluate(rule, claim)? == Verdict::Met)
    }

    /// Like [`Self::evaluate`], but a miss becomes [`GateError::ConditionNotMet`].
    ///
    /// # Errors
    ///
    /// Same as [`Self::evaluate`], plus [`GateError::ConditionNotMet`].
    pub fn check(&self, rule: &UnlockRule, claim: &UnlockClaim) -> GateResult<()> {
        match self.evaluate(rule, claim)? {
            Verdict::Met => Ok(()),
            Verdict::NotMet(kind) => Err(GateError::ConditionNotMet(kind)),
        }
    }

    fn check_time(rule: &UnlockRule, now: Option<Timestamp>) -> GateResult<Option<ConditionKind>> {
        let now = now.ok_or(GateError::EvaluationTimeMissing)?;
        let unlock_at = rule.unlock_at.ok_or(GateError::TimeConditionMissing)?;
        if let Some(until) = rule.unlock_until {
            if until <= unlock_at {
                return Err(GateError::InvalidTimeRange);
            }
            if now > until {
                return Ok(Some(ConditionKind::TimeExpired));
            }
        }
        if now < unlock_at {
            return Ok(Some(ConditionKind::TimeNotReached));
        }
        Ok(None)
    }

    fn check_location(
        rule: &UnlockRule,
        position: Option<GeoPoint>,
    ) -> GateResult<Option<ConditionKind>> {
        let fence = rule.fence.ok_or(GateError::LocationConditionMissing)?;
        if !fence.center.is_valid() {
            return Err(GateError::InvalidCoordinate {
                lat: fence.center.lat,
                lng: fence.center.lng,
            });
        }
        if !fence.radius_meters.is_finite() || fence.radius_meters < 0.0 {
            return Err(GateError::InvalidRadius(fence.radius_meters));
        }

        let claimed = position.ok_or(GateError::PositionMissing)?;
        let claimed = GeoPoint::validated(claimed.lat, claimed.lng)?;

        if fence.contains(claimed) {
            Ok(None)
        } else {
            Ok(Some(ConditionKind::OutsideRadius))
        }
    }
}
