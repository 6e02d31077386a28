//! # Gate Configuration
//!
//! Every threshold the gate uses lives here, in one object loaded once at
//! startup from TOML. Components receive their own section by value.
//!
//! ```toml
//! [detector]
//! suspicious_kmh = 150.0
//!
//! [escalation]
//! warning = 30
//! limit = 50
//! block = 100
//! ```
//!
//! Missing sections and fields fall back to the defaults below.

use crate::error::{GateError, GateResult};
use crate::records::AnomalyTier;
use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Longest duration any setting may express: ten years.
///
/// Durations are added to wall-clock timestamps on the request path, so
/// they must stay far from `TimeDelta`'s range.
pub const MAX_DURATION_SECS: i64 = 10 * 365 * 24 * 60 * 60;

/// Movement anomaly detector thresholds.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Attempts this close together are UI double-submits (seconds).
    pub double_submit_secs: i64,
    /// Attempts this close together are duplicate requests, never analyzed (seconds).
    pub dedupe_window_secs: i64,
    /// Lower bound of the SUSPICIOUS band (km/h).
    pub suspicious_kmh: f64,
    /// Lower bound of the HIGH band (km/h).
    pub high_kmh: f64,
    /// Lower bound of the EXTREME band (km/h).
    pub extreme_kmh: f64,
    /// Client/server skew above which the clock counts as manipulated (seconds).
    pub max_clock_skew_secs: i64,
    /// Prior attempts older than this are ignored (hours).
    pub lookback_hours: i64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            double_submit_secs: 1,
            dedupe_window_secs: 3,
            suspicious_kmh: 150.0,
            high_kmh: 300.0,
            extreme_kmh: 1000.0,
            max_clock_skew_secs: 10 * 60,
            lookback_hours: 24,
        }
    }
}

impl DetectorConfig {
    /// Prior-attempt lookback window.
    #[must_use]
    pub fn lookback(&self) -> TimeDelta {
        TimeDelta::hours(self.lookback_hours)
    }

    /// Maximum tolerated clock skew.
    #[must_use]
    pub fn max_clock_skew(&self) -> TimeDelta {
        TimeDelta::seconds(self.max_clock_skew_secs)
    }
}

/// Suspicion-score delta per finding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreTable {
    /// Delta for [`AnomalyTier::Suspicious`].
    pub suspicious: i64,
    /// Delta for [`AnomalyTier::High`].
    pub high: i64,
    /// Delta for [`AnomalyTier::Extreme`].
    pub extreme: i64,
    /// Delta for a manipulated client clock.
    pub time_manipulation: i64,
}

impl Default for ScoreTable {
    fn default() -> Self {
        Self {
            suspicious: 15,
            high: 40,
            extreme: 60,
            time_manipulation: 20,
        }
    }
}

impl ScoreTable {
    /// Delta for a movement tier.
    #[must_use]
    pub const fn for_tier(&self, tier: AnomalyTier) -> i64 {
        match tier {
            AnomalyTier::None => 0,
            AnomalyTier::Suspicious => self.suspicious,
            AnomalyTier::High => self.high,
            AnomalyTier::Extreme => self.extreme,
        }
    }
}

/// Suspicion-score storage settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuspicionConfig {
    /// Sliding TTL refreshed on every increment (days).
    pub ttl_days: i64,
}

impl Default for SuspicionConfig {
    fn default() -> Self {
        Self { ttl_days: 30 }
    }
}

impl SuspicionConfig {
    /// Score TTL.
    #[must_use]
    pub fn ttl(&self) -> TimeDelta {
        TimeDelta::days(self.ttl_days)
    }
}

/// Escalation ladder thresholds on the current suspicion score.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EscalationThresholds {
    /// At or above: log a warning.
    pub warning: i64,
    /// At or above: apply a cooldown.
    pub limit: i64,
    /// At or above: suspend the member or block the IP.
    pub block: i64,
    /// Cooldown length (minutes).
    pub cooldown_minutes: i64,
    /// Suspension / block length (days).
    pub sanction_days: i64,
}

impl Default for EscalationThresholds {
    fn default() -> Self {
        Self {
            warning: 30,
            limit: 50,
            block: 100,
            cooldown_minutes: 30,
            sanction_days: 7,
        }
    }
}

impl EscalationThresholds {
    /// Cooldown duration.
    #[must_use]
    pub fn cooldown(&self) -> TimeDelta {
        TimeDelta::minutes(self.cooldown_minutes)
    }

    /// Sanction duration.
    #[must_use]
    pub fn sanction(&self) -> TimeDelta {
        TimeDelta::days(self.sanction_days)
    }
}

/// One sliding-window policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitPolicy {
    /// Requests admitted per window.
    pub max_requests: u32,
    /// Window length (seconds).
    pub window_secs: i64,
}

impl RateLimitPolicy {
    /// Creates a policy.
    #[must_use]
    pub const fn new(max_requests: u32, window_secs: i64) -> Self {
        Self {
            max_requests,
            window_secs,
        }
    }

    /// Window length.
    #[must_use]
    pub fn window(&self) -> TimeDelta {
        TimeDelta::seconds(self.window_secs)
    }
}

/// Sliding-window policies per risk tier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitTiers {
    /// Actors below the warning threshold.
    pub baseline: RateLimitPolicy,
    /// Actors between warning and limit.
    pub elevated: RateLimitPolicy,
    /// Actors at or above limit.
    pub restricted: RateLimitPolicy,
}

impl Default for RateLimitTiers {
    fn default() -> Self {
        Self {
            baseline: RateLimitPolicy::new(1, 60),
            elevated: RateLimitPolicy::new(5, 600),
            restricted: RateLimitPolicy::new(3, 600),
        }
    }
}

/// Timer-driven housekeeping.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaintenanceConfig {
    /// Seconds between expired-entry purges.
    pub purge_interval_secs: u64,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            purge_interval_secs: 60,
        }
    }
}

impl MaintenanceConfig {
    /// Purge interval.
    #[must_use]
    pub const fn purge_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.purge_interval_secs)
    }
}

/// Complete gate configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Movement anomaly detector.
    pub detector: DetectorConfig,
    /// Score deltas.
    pub scores: ScoreTable,
    /// Score storage.
    pub suspicion: SuspicionConfig,
    /// Escalation ladder.
    pub escalation: EscalationThresholds,
    /// Rate-limit tiers.
    pub rate_limits: RateLimitTiers,
    /// Housekeeping.
    pub maintenance: MaintenanceConfig,
}

impl GateConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::InvalidConfig`] on parse failure or inconsistent values.
    pub fn from_toml_str(source: &str) -> GateResult<Self> {
        let config: Self =
            toml::from_str(source).map_err(|e| GateError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::InvalidConfig`] if the file cannot be read or is invalid.
    pub fn load(path: impl AsRef<Path>) -> GateResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|e| GateError::InvalidConfig(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&source)
    }

    /// Rejects values that would make the ladder or bands meaningless.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::InvalidConfig`] naming the first offending field.
    pub fn validate(&self) -> GateResult<()> {
        let d = &self.detector;
        if d.double_submit_secs < 0 || d.dedupe_window_secs < d.double_submit_secs {
            return Err(invalid("detector: dedupe window must cover the double-submit window"));
        }
        let bands_ok = d.suspicious_kmh > 0.0
            && d.suspicious_kmh < d.high_kmh
            && d.high_kmh < d.extreme_kmh
            && d.extreme_kmh.is_finite();
        if !bands_ok {
            return Err(invalid("detector: speed bands must be positive and strictly increasing"));
        }
        if d.max_clock_skew_secs <= 0 || d.lookback_hours <= 0 {
            return Err(invalid("detector: skew and lookback must be positive"));
        }
        if !within_bound(d.dedupe_window_secs, 1)
            || !within_bound(d.max_clock_skew_secs, 1)
            || !within_bound(d.lookback_hours, HOUR)
        {
            return Err(invalid("detector: windows must not exceed ten years"));
        }

        let s = &self.scores;
        if [s.suspicious, s.high, s.extreme, s.time_manipulation]
            .iter()
            .any(|delta| *delta < 0)
        {
            return Err(invalid("scores: deltas must not be negative"));
        }
        if self.suspicion.ttl_days <= 0 {
            return Err(invalid("suspicion: ttl_days must be positive"));
        }
        if !within_bound(self.suspicion.ttl_days, DAY) {
            return Err(invalid("suspicion: ttl_days must not exceed ten years"));
        }

        let e = &self.escalation;
        if !(0 < e.warning && e.warning < e.limit && e.limit < e.block) {
            return Err(invalid("escalation: need 0 < warning < limit < block"));
        }
        if e.cooldown_minutes <= 0 || e.sanction_days <= 0 {
            return Err(invalid("escalation: durations must be positive"));
        }
        if !within_bound(e.cooldown_minutes, MINUTE) || !within_bound(e.sanction_days, DAY) {
            return Err(invalid("escalation: durations must not exceed ten years"));
        }

        let r = &self.rate_limits;
        for (name, policy) in [
            ("baseline", r.baseline),
            ("elevated", r.elevated),
            ("restricted", r.restricted),
        ] {
            if policy.max_requests == 0 || policy.window_secs <= 0 {
                return Err(GateError::InvalidConfig(format!(
                    "rate_limits.{name}: max_requests and window_secs must be positive"
                )));
            }
            // Window keys live for twice the window.
            if !within_bound(policy.window_secs, 2) {
                return Err(GateError::InvalidConfig(format!(
                    "rate_limits.{name}: window_secs must not exceed five years"
                )));
            }
        }
        let purge = self.maintenance.purge_interval_secs;
        if purge == 0 || purge > MAX_DURATION_SECS.unsigned_abs() {
            return Err(invalid("maintenance: purge_interval_secs must be positive and at most ten years"));
        }
        Ok(())
    }
}

const MINUTE: i64 = 60;
const HOUR: i64 = 60 * MINUTE;
const DAY: i64 = 24 * HOUR;

/// `value` units of `unit_secs` each fit under [`MAX_DURATION_SECS`].
fn within_bound(value: i64, unit_secs: i64) -> bool {
    value
        .checked_mul(unit_secs)
        .is_some_and(|secs| secs <= MAX_DURATION_SECS)
}

fn invalid(msg: &str) -> GateError {
    GateError::InvalidConfig(msg.to_owned())
}
