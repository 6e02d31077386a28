//! # Movement Anomaly Detection
//!
//! Server-side spoofing detection from two consecutive attempts.
//!
//! ## Detection Methods
//!
//! - **GPS spoofing**: implied travel speed faster than the actor could move
//! - **Clock tampering**: client-claimed time far from server time
//!
//! ## Speed Bands
//!
//! | km/h          | tier       |
//! |---------------|------------|
//! | `< 150`       | None       |
//! | `[150, 300)`  | Suspicious |
//! | `[300, 1000)` | High       |
//! | `>= 1000`     | Extreme    |
//!
//! Pairs closer than the dedupe window, and priors older than the lookback,
//! are never scored.

use chrono::TimeDelta;
use chronolock_core::{AnomalyTier, DetectorConfig, GeoPoint, Timestamp};

/// One side of a movement comparison.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MovementSample {
    /// Server time of the attempt.
    pub at: Timestamp,
    /// Claimed position.
    pub position: GeoPoint,
}

impl MovementSample {
    /// Creates a sample.
    #[must_use]
    pub const fn new(at: Timestamp, position: GeoPoint) -> Self {
        Self { at, position }
    }
}

/// Why a pair was not analyzed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// No usable prior attempt.
    FirstObservation,
    /// Within the UI double-submit window.
    DoubleSubmit,
    /// Within the duplicate-request dedupe window.
    DuplicateWindow,
    /// Prior attempt is older than the lookback.
    StalePrior,
}

/// Result of a movement analysis.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MovementReport {
    /// Severity.
    pub tier: AnomalyTier,
    /// Implied speed in km/h (0 when skipped).
    pub speed_kmh: f64,
    /// Great-circle distance between the two positions.
    pub distance_meters: f64,
    /// Seconds between the two attempts.
    pub elapsed_secs: f64,
    /// Set when the pair was not analyzed.
    pub skipped: Option<SkipReason>,
}

impl MovementReport {
    const fn skipped(reason: SkipReason, elapsed_secs: f64) -> Self {
        Self {
            tier: AnomalyTier::None,
            speed_kmh: 0.0,
            distance_meters: 0.0,
            elapsed_secs,
            skipped: Some(reason),
        }
    }
}

/// Client clock disagreeing with the server beyond tolerance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClockSkew {
    /// `claimed - server`; negative when the client is behind.
    pub skew: TimeDelta,
}

impl ClockSkew {
    /// Absolute skew in seconds.
    #[must_use]
    pub fn abs_secs(&self) -> i64 {
        self.skew.num_seconds().abs()
    }
}

/// Movement anomaly detector.
#[derive(Clone, Debug, Default)]
pub struct MovementAnomalyDetector {
    config: DetectorConfig,
}

impl MovementAnomalyDetector {
    /// Creates a new detector.
    #[must_use]
    pub const fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    /// Detector configuration.
    #[must_use]
    pub const fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Classifies an implied speed. Highest matching band wins.
    #[must_use]
    pub fn classify_speed(&self, speed_kmh: f64) -> AnomalyTier {
        if speed_kmh >= self.config.extreme_kmh {
            AnomalyTier::Extreme
        } else if speed_kmh >= self.config.high_kmh {
            AnomalyTier::High
        } else if speed_kmh >= self.config.suspicious_kmh {
            AnomalyTier::Suspicious
        } else {
            AnomalyTier::None
        }
    }

    /// Compares a new attempt against the actor's prior one.
    #[must_use]
    pub fn analyze(&self, prior: Option<&MovementSample>, current: &MovementSample) -> MovementReport {
        let Some(prior) = prior else {
            return MovementReport::skipped(SkipReason::FirstObservation, 0.0);
        };

        let elapsed = (current.at - prior.at).abs();
        #[allow(clippy::cast_precision_loss)]
        let elapsed_secs = elapsed.num_milliseconds() as f64 / 1000.0;

        if elapsed > self.config.lookback() {
            return MovementReport::skipped(SkipReason::StalePrior, elapsed_secs);
        }
        if elapsed <= TimeDelta::seconds(self.config.double_submit_secs) {
            return MovementReport::skipped(SkipReason::DoubleSubmit, elapsed_secs);
        }
        if elapsed <= TimeDelta::seconds(self.config.dedupe_window_secs) {
            return MovementReport::skipped(SkipReason::DuplicateWindow, elapsed_secs);
        }

        let distance_meters = prior.position.distance_to(current.position);
        let speed_kmh = (distance_meters / 1000.0) / (elapsed_secs / 3600.0);
        let tier = self.classify_speed(speed_kmh);

        if tier.is_anomalous() {
            tracing::debug!(
                ?tier,
                speed_kmh,
                distance_meters,
                elapsed_secs,
                "implausible movement between attempts"
            );
        }

        MovementReport {
            tier,
            speed_kmh,
            distance_meters,
            elapsed_secs,
            skipped: None,
        }
    }

    /// Flags a claimed time more than the tolerated skew away from server time.
    ///
    /// A missing claim is not skew.
    #[must_use]
    pub fn check_clock_skew(&self, claimed: Option<Timestamp>, server: Timestamp) -> Option<ClockSkew> {
        let skew = claimed? - server;
        (skew.abs() > self.config.max_clock_skew()).then_some(ClockSkew { skew })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn t0() -> Timestamp {
        Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap()
    }

    const SEOUL: GeoPoint = GeoPoint::new(37.5665, 126.9780);
    const BUSAN: GeoPoint = GeoPoint::new(35.1796, 129.0756);
    const NEW_YORK: GeoPoint = GeoPoint::new(40.7128, -74.0060);

    fn detector() -> MovementAnomalyDetector {
        MovementAnomalyDetector::default()
    }

    #[test]
    fn test_speed_band_boundaries() {
        let d = detector();
        assert_eq!(d.classify_speed(0.0), AnomalyTier::None);
        assert_eq!(d.classify_speed(149.9), AnomalyTier::None);
        assert_eq!(d.classify_speed(150.0), AnomalyTier::Suspicious);
        assert_eq!(d.classify_speed(299.9), AnomalyTier::Suspicious);
        assert_eq!(d.classify_speed(300.0), AnomalyTier::High);
        assert_eq!(d.classify_speed(999.9), AnomalyTier::High);
        assert_eq!(d.classify_speed(1000.0), AnomalyTier::Extreme);
    }

    #[test]
    fn test_first_observation_is_clean() {
        let report = detector().analyze(None, &MovementSample::new(t0(), SEOUL));
        assert_eq!(report.tier, AnomalyTier::None);
        assert_eq!(report.skipped, Some(SkipReason::FirstObservation));
    }

    #[test]
    fn test_close_pairs_are_never_scored() {
        let prior = MovementSample::new(t0(), SEOUL);
        for secs in [0, 1, 2, 3] {
            let current = MovementSample::new(t0() + TimeDelta::seconds(secs), NEW_YORK);
            let report = detector().analyze(Some(&prior), &current);
            assert_eq!(report.tier, AnomalyTier::None, "{secs}s apart");
        }

        let one = MovementSample::new(t0() + TimeDelta::seconds(1), NEW_YORK);
        assert_eq!(
            detector().analyze(Some(&prior), &one).skipped,
            Some(SkipReason::DoubleSubmit)
        );
        let three = MovementSample::new(t0() + TimeDelta::seconds(3), NEW_YORK);
        assert_eq!(
            detector().analyze(Some(&prior), &three).skipped,
            Some(SkipReason::DuplicateWindow)
        );
    }

    #[test]
    fn test_stale_prior_is_first_observation() {
        let prior = MovementSample::new(t0(), SEOUL);
        let current = MovementSample::new(t0() + TimeDelta::hours(24) + TimeDelta::seconds(1), NEW_YORK);
        let report = detector().analyze(Some(&prior), &current);
        assert_eq!(report.tier, AnomalyTier::None);
        assert_eq!(report.skipped, Some(SkipReason::StalePrior));
    }

    #[test]
    fn test_impossible_movement_tiers() {
        let prior = MovementSample::new(t0(), SEOUL);

        // ~325 km in 10 minutes: ~1950 km/h
        let busan_fast = MovementSample::new(t0() + TimeDelta::minutes(10), BUSAN);
        assert_eq!(detector().analyze(Some(&prior), &busan_fast).tier, AnomalyTier::Extreme);

        // ~325 km in 1 hour
        let busan_hour = MovementSample::new(t0() + TimeDelta::hours(1), BUSAN);
        assert_eq!(detector().analyze(Some(&prior), &busan_hour).tier, AnomalyTier::High);

        // ~325 km in 3 hours: KTX territory
        let busan_train = MovementSample::new(t0() + TimeDelta::hours(3), BUSAN);
        let report = detector().analyze(Some(&prior), &busan_train);
        assert!(report.speed_kmh > 100.0 && report.speed_kmh < 110.0);
        assert_eq!(report.tier, AnomalyTier::None);
    }

    #[test]
    fn test_elapsed_is_order_independent() {
        let a = MovementSample::new(t0(), SEOUL);
        let b = MovementSample::new(t0() + TimeDelta::minutes(30), BUSAN);
        assert_eq!(
            detector().analyze(Some(&a), &b).tier,
            detector().analyze(Some(&b), &a).tier
        );
    }

    #[test]
    fn test_clock_skew_is_strictly_over_ten_minutes() {
        let d = detector();
        assert_eq!(d.check_clock_skew(None, t0()), None);
        assert_eq!(d.check_clock_skew(Some(t0() + TimeDelta::minutes(10)), t0()), None);

        let ahead = d
            .check_clock_skew(Some(t0() + TimeDelta::minutes(10) + TimeDelta::seconds(1)), t0())
            .unwrap();
        assert_eq!(ahead.abs_secs(), 601);

        let behind = d.check_clock_skew(Some(t0() - TimeDelta::hours(2)), t0()).unwrap();
        assert!(behind.skew < TimeDelta::zero());
    }
}
