//! # Rate Limiting
//!
//! Two independent mechanisms per actor:
//!
//! - **Sliding window**: request timestamps within the last `window`; a
//!   request is rejected once `max_requests` are already inside it.
//! - **Cooldown flag**: a TTL flag set by the escalation ladder. A cooled-down
//!   actor is rejected whatever the window says.
//!
//! The window is read-then-write, so extreme contention may over-admit a
//! few requests. Both paths fail open.

use chrono::TimeDelta;
use chronolock_core::{Actor, Clock, EscalationThresholds, RateLimitPolicy, RateLimitTiers};
use chronolock_store::SharedStore;
use std::fmt;
use std::sync::Arc;

/// Window tier selected from an actor's suspicion score.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RiskTier {
    /// Below the warning threshold.
    Baseline,
    /// Between warning and limit.
    Elevated,
    /// At or above limit.
    Restricted,
}

impl RiskTier {
    /// All tiers, lowest first.
    pub const ALL: [Self; 3] = [Self::Baseline, Self::Elevated, Self::Restricted];

    /// Tier for a score under the given thresholds.
    #[must_use]
    pub const fn from_score(score: i64, thresholds: &EscalationThresholds) -> Self {
        if score >= thresholds.limit {
            Self::Restricted
        } else if score >= thresholds.warning {
            Self::Elevated
        } else {
            Self::Baseline
        }
    }

    /// Key segment.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Baseline => "baseline",
            Self::Elevated => "elevated",
            Self::Restricted => "restricted",
        }
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Admission decision.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateDecision {
    /// Admitted.
    Allowed {
        /// Requests left in the current window.
        remaining: u32,
    },
    /// Window is full.
    Limited {
        /// Time until the oldest entry leaves the window.
        retry_after: TimeDelta,
    },
    /// Cooldown flag is set.
    CooledDown {
        /// Time until the flag expires.
        retry_after: TimeDelta,
    },
}

impl RateDecision {
    /// Returns true if the request was admitted.
    #[must_use]
    pub const fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }

    /// Whole seconds to wait, rounded up; zero when admitted.
    #[must_use]
    pub fn retry_after_secs(&self) -> u64 {
        match self {
            Self::Allowed { .. } => 0,
            Self::Limited { retry_after } | Self::CooledDown { retry_after } => {
                let millis = retry_after.num_milliseconds().max(0);
                u64::try_from((millis + 999) / 1000).unwrap_or(0).max(1)
            }
        }
    }
}

fn window_key(tier: RiskTier, actor: &Actor) -> String {
    format!("ratelimit:{tier}:{}", actor.key())
}

fn cooldown_key(actor: &Actor) -> String {
    format!("cooldown:{}", actor.key())
}

/// Sliding-window rate limiter with cooldown flags.
pub struct RateLimiter {
    store: Arc<dyn SharedStore>,
    clock: Arc<dyn Clock>,
    tiers: RateLimitTiers,
}

impl RateLimiter {
    /// Creates a limiter.
    #[must_use]
    pub fn new(store: Arc<dyn SharedStore>, clock: Arc<dyn Clock>, tiers: RateLimitTiers) -> Self {
        Self { store, clock, tiers }
    }

    /// Policy for a tier.
    #[must_use]
    pub const fn policy(&self, tier: RiskTier) -> RateLimitPolicy {
        match tier {
            RiskTier::Baseline => self.tiers.baseline,
            RiskTier::Elevated => self.tiers.elevated,
            RiskTier::Restricted => self.tiers.restricted,
        }
    }

    /// Checks the cooldown flag, then the tier's window.
    pub fn check(&self, actor: &Actor, tier: RiskTier) -> RateDecision {
        if let Some(retry_after) = self.cooldown_remaining(actor) {
            tracing::debug!(%actor, %tier, "rejected by cooldown");
            return RateDecision::CooledDown { retry_after };
        }
        self.check_window(&window_key(tier, actor), actor, self.policy(tier))
    }

    /// Sets (or extends) the cooldown flag. Returns false if the store failed.
    pub fn apply_cooldown(&self, actor: &Actor, duration: TimeDelta) -> bool {
        let until = self.clock.now() + duration;
        match self.store.set(&cooldown_key(actor), until.timestamp(), duration) {
            Ok(()) => {
                tracing::info!(%actor, minutes = duration.num_minutes(), "cooldown applied");
                true
            }
            Err(e) => {
                tracing::warn!(%actor, error = %e, "cooldown not applied");
                false
            }
        }
    }

    /// Time left on the cooldown flag; `None` if absent or unreadable.
    pub fn cooldown_remaining(&self, actor: &Actor) -> Option<TimeDelta> {
        match self.store.ttl(&cooldown_key(actor)) {
            Ok(remaining) => remaining.filter(|left| *left > TimeDelta::zero()),
            Err(e) => {
                tracing::warn!(%actor, error = %e, "cooldown read failed, admitting");
                None
            }
        }
    }

    /// Drops every window and the cooldown flag for `actor`.
    pub fn clear(&self, actor: &Actor) {
        let keys = RiskTier::ALL
            .iter()
            .map(|tier| window_key(*tier, actor))
            .chain(std::iter::once(cooldown_key(actor)));
        for key in keys {
            if let Err(e) = self.store.delete(&key) {
                tracing::warn!(%actor, key = %key, error = %e, "rate-limit clear failed");
            }
        }
    }

    fn check_window(&self, key: &str, actor: &Actor, policy: RateLimitPolicy) -> RateDecision {
        let now = self.clock.now();
        let window = policy.window();

        let admit = || -> chronolock_store::StoreResult<RateDecision> {
            self.store.window_trim(key, now - window)?;
            let count = self.store.window_len(key)?;
            let max = policy.max_requests as usize;
            if count >= max {
                let oldest = self.store.window_oldest(key)?.unwrap_or(now);
                return Ok(RateDecision::Limited {
                    retry_after: oldest + window - now,
                });
            }
            self.store.window_push(key, now, window * 2)?;
            let remaining = u32::try_from(max - count - 1).unwrap_or(0);
            Ok(RateDecision::Allowed { remaining })
        };

        match admit() {
            Ok(decision) => {
                if !decision.is_allowed() {
                    tracing::debug!(%actor, key = %key, ?decision, "rate limited");
                }
                decision
            }
            Err(e) => {
                tracing::warn!(%actor, key = %key, error = %e, "rate-limit store failed, admitting");
                RateDecision::Allowed {
                    remaining: policy.max_requests.saturating_sub(1),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use chronolock_core::ManualClock;
    use chronolock_store::MemoryStore;

    fn setup() -> (Arc<ManualClock>, Arc<MemoryStore>, RateLimiter) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 5, 5, 9, 0, 0).unwrap(),
        ));
        let store = MemoryStore::connect(clock.clone());
        let limiter = RateLimiter::new(store.clone(), clock.clone(), RateLimitTiers::default());
        (clock, store, limiter)
    }

    #[test]
    fn test_tier_from_score() {
        let t = EscalationThresholds::default();
        assert_eq!(RiskTier::from_score(0, &t), RiskTier::Baseline);
        assert_eq!(RiskTier::from_score(29, &t), RiskTier::Baseline);
        assert_eq!(RiskTier::from_score(30, &t), RiskTier::Elevated);
        assert_eq!(RiskTier::from_score(50, &t), RiskTier::Restricted);
        assert_eq!(RiskTier::from_score(500, &t), RiskTier::Restricted);
    }

    #[test]
    fn test_window_rejects_n_plus_one_then_recovers() {
        let (clock, _, limiter) = setup();
        let actor = Actor::member(1);

        // restricted: 3 per 10 minutes
        for expected_remaining in [2, 1, 0] {
            assert_eq!(
                limiter.check(&actor, RiskTier::Restricted),
                RateDecision::Allowed {
                    remaining: expected_remaining
                }
            );
        }
        let rejected = limiter.check(&actor, RiskTier::Restricted);
        assert_eq!(
            rejected,
            RateDecision::Limited {
                retry_after: TimeDelta::minutes(10)
            }
        );
        assert_eq!(rejected.retry_after_secs(), 600);

        clock.advance(TimeDelta::minutes(10));
        assert!(limiter.check(&actor, RiskTier::Restricted).is_allowed());
    }

    #[test]
    fn test_retry_after_tracks_oldest_entry() {
        let (clock, _, limiter) = setup();
        let actor = Actor::ip("192.0.2.1");

        assert!(limiter.check(&actor, RiskTier::Baseline).is_allowed());
        clock.advance(TimeDelta::seconds(20));
        assert_eq!(
            limiter.check(&actor, RiskTier::Baseline),
            RateDecision::Limited {
                retry_after: TimeDelta::seconds(40)
            }
        );
    }

    #[test]
    fn test_tiers_use_separate_windows() {
        let (_, _, limiter) = setup();
        let actor = Actor::member(2);
        assert!(limiter.check(&actor, RiskTier::Baseline).is_allowed());
        assert!(!limiter.check(&actor, RiskTier::Baseline).is_allowed());
        assert!(limiter.check(&actor, RiskTier::Elevated).is_allowed());
    }

    #[test]
    fn test_cooldown_overrides_empty_window() {
        let (clock, _, limiter) = setup();
        let actor = Actor::member(3);

        assert!(limiter.apply_cooldown(&actor, TimeDelta::minutes(30)));
        assert_eq!(
            limiter.check(&actor, RiskTier::Elevated),
            RateDecision::CooledDown {
                retry_after: TimeDelta::minutes(30)
            }
        );

        clock.advance(TimeDelta::minutes(30));
        assert!(limiter.check(&actor, RiskTier::Elevated).is_allowed());
    }

    #[test]
    fn test_clear_drops_windows_and_cooldown() {
        let (_, _, limiter) = setup();
        let actor = Actor::member(4);
        limiter.check(&actor, RiskTier::Baseline);
        limiter.apply_cooldown(&actor, TimeDelta::minutes(30));

        limiter.clear(&actor);
        assert!(limiter.check(&actor, RiskTier::Baseline).is_allowed());
    }

    #[test]
    fn test_store_outage_admits() {
        let (_, store, limiter) = setup();
        let actor = Actor::member(5);
        store.close();
        for _ in 0..5 {
            assert!(limiter.check(&actor, RiskTier::Baseline).is_allowed());
        }
        assert!(!limiter.apply_cooldown(&actor, TimeDelta::minutes(30)));
    }
}
