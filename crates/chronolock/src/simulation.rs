//! # Abuse Simulation
//!
//! Drives honest visitors, GPS spoofers and retry hammerers through a full
//! gate on a manual clock, and tallies what the gate answered.
//!
//! - **Honest**: stands inside the fence, one attempt per round
//! - **Spoofer**: jumps between a far city and a spot just outside the fence
//! - **Hammerer**: an IP retrying from far away several times per round
//!
//! Randomness comes from a seeded `ChaCha8Rng`, so a seed always replays
//! the same run.

use crate::service::GateService;
use chrono::{TimeDelta, TimeZone, Utc};
use chronolock_core::{
    Actor, CapsuleId, Clock, GateConfig, GateError, GateResult, GeoFence, GeoPoint, ManualClock,
    UnlockRule,
};
use chronolock_security::{AccessOutcome, AccessRequest};
use chronolock_store::CapsuleGate;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::sync::Arc;

/// Fence center of the simulated capsule (Seoul City Hall plaza).
pub const PLAZA: GeoPoint = GeoPoint::new(37.5665, 126.9780);

/// Places at least 300 km from the plaza.
const FAR_CITIES: [GeoPoint; 5] = [
    GeoPoint::new(35.1796, 129.0756), // Busan
    GeoPoint::new(33.4996, 126.5312), // Jeju
    GeoPoint::new(35.6762, 139.6503), // Tokyo
    GeoPoint::new(39.9042, 116.4074), // Beijing
    GeoPoint::new(31.2304, 121.4737), // Shanghai
];

const CAPSULE: CapsuleId = CapsuleId(1);
const SPOOFER_BASE: u64 = 100_000;

/// Simulation parameters.
#[derive(Clone, Debug)]
pub struct SimulationConfig {
    /// Honest members.
    pub honest: u32,
    /// Spoofing members.
    pub spoofers: u32,
    /// Hammering IPs.
    pub hammerers: u32,
    /// Attempts per hammerer per round.
    pub hammer_burst: u32,
    /// Rounds to run.
    pub rounds: u32,
    /// Simulated minutes between rounds.
    pub round_minutes: i64,
    /// First-come slots on the capsule.
    pub max_viewers: u32,
    /// Fence radius in meters.
    pub radius_meters: f64,
    /// RNG seed.
    pub seed: u64,
    /// Gate configuration.
    pub gate: GateConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            honest: 40,
            spoofers: 5,
            hammerers: 5,
            hammer_burst: 5,
            rounds: 12,
            round_minutes: 10,
            max_viewers: 25,
            radius_meters: 150.0,
            seed: 42,
            gate: GateConfig::default(),
        }
    }
}

/// Outcome tallies.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SimulationStats {
    /// Attempts made.
    pub attempts: u64,
    /// First-time unlocks.
    pub granted: u64,
    /// Repeat unlocks by existing viewers.
    pub already_viewed: u64,
    /// Condition misses.
    pub condition_not_met: u64,
    /// Capacity refusals.
    pub capacity_exhausted: u64,
    /// Anomaly refusals.
    pub anomalies: u64,
    /// Rate-limit refusals.
    pub rate_limited: u64,
    /// Refusals of sanctioned actors.
    pub blocked: u64,
    /// Attempts that returned an error.
    pub errors: u64,
    /// Sanctions written.
    pub sanctions: u64,
    /// Honest members who got a slot.
    pub honest_viewers: u64,
    /// Final capacity counter.
    pub final_viewers: u32,
}

impl SimulationStats {
    fn record(&mut self, result: &GateResult<AccessOutcome>) {
        use chronolock_security::Allocation;

        self.attempts += 1;
        match result {
            Ok(AccessOutcome::Unlocked(Allocation::AlreadyViewed)) => self.already_viewed += 1,
            Ok(AccessOutcome::Unlocked(_)) => self.granted += 1,
            Ok(AccessOutcome::ConditionNotMet(_)) => self.condition_not_met += 1,
            Ok(AccessOutcome::CapacityExhausted) => self.capacity_exhausted += 1,
            Ok(AccessOutcome::AnomalySuspected(_)) => self.anomalies += 1,
            Ok(AccessOutcome::RateLimited { .. }) => self.rate_limited += 1,
            Ok(AccessOutcome::Blocked) => self.blocked += 1,
            Err(_) => self.errors += 1,
        }
    }
}

/// A deterministic abuse simulation.
pub struct AbuseSimulation {
    config: SimulationConfig,
    clock: Arc<ManualClock>,
    service: GateService,
    rng: ChaCha8Rng,
    round: u32,
    stats: SimulationStats,
}

impl AbuseSimulation {
    /// Builds the service and the capsule.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::InvalidConfig`] for an inconsistent gate
    /// configuration, or a rule error for a bad radius.
    pub fn new(config: SimulationConfig) -> GateResult<Self> {
        let start = Utc
            .with_ymd_and_hms(2026, 12, 24, 18, 0, 0)
            .single()
            .ok_or_else(|| GateError::InvalidConfig("simulation start time".into()))?;
        let clock = Arc::new(ManualClock::new(start));
        let service = GateService::connect(config.gate.clone(), clock.clone())?;
        service.register_capsule(CapsuleGate {
            capsule_id: CAPSULE,
            rule: UnlockRule::location(GeoFence::new(PLAZA, config.radius_meters)),
            max_viewers: config.max_viewers,
        })?;

        Ok(Self {
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            config,
            clock,
            service,
            round: 0,
            stats: SimulationStats::default(),
        })
    }

    /// The service under test.
    #[must_use]
    pub const fn service(&self) -> &GateService {
        &self.service
    }

    /// Rounds completed.
    #[must_use]
    pub const fn round(&self) -> u32 {
        self.round
    }

    /// Tallies so far.
    #[must_use]
    pub const fn stats(&self) -> &SimulationStats {
        &self.stats
    }

    /// Runs one round. Returns false once every round has run.
    pub fn step(&mut self) -> bool {
        if self.round >= self.config.rounds {
            return false;
        }

        let mut arrivals: Vec<Actor> = (1..=u64::from(self.config.honest))
            .map(Actor::member)
            .chain((0..u64::from(self.config.spoofers)).map(|i| Actor::member(SPOOFER_BASE + i)))
            .collect();
        arrivals.shuffle(&mut self.rng);

        for actor in arrivals {
            let position = match &actor {
                Actor::Member(id) if id.0 >= SPOOFER_BASE => self.spoofer_position(),
                _ => self.honest_position(),
            };
            let request = AccessRequest::at(CAPSULE, actor, position)
                .claimed_at(self.clock.now())
                .with_user_agent("chronolock-sim/1.0");
            let result = self.service.attempt(&request);
            self.stats.record(&result);
        }

        for i in 0..self.config.hammerers {
            let actor = Actor::ip(format!("198.51.100.{}", i + 1));
            let home = FAR_CITIES[i as usize % FAR_CITIES.len()];
            for _ in 0..self.config.hammer_burst {
                let request = AccessRequest::at(CAPSULE, actor.clone(), home);
                let result = self.service.attempt(&request);
                self.stats.record(&result);
            }
        }

        self.round += 1;
        self.clock.advance(TimeDelta::minutes(self.config.round_minutes));
        true
    }

    /// Runs every remaining round and returns the final tallies.
    pub fn run(&mut self) -> SimulationStats {
        while self.step() {}
        self.finish()
    }

    fn finish(&mut self) -> SimulationStats {
        let spoofers = (0..u64::from(self.config.spoofers)).map(|i| Actor::member(SPOOFER_BASE + i));
        let hammerers = (0..self.config.hammerers).map(|i| Actor::ip(format!("198.51.100.{}", i + 1)));
        let honest: Vec<Actor> = (1..=u64::from(self.config.honest)).map(Actor::member).collect();

        self.stats.sanctions = spoofers
            .chain(hammerers)
            .chain(honest.iter().cloned())
            .map(|actor| {
                self.service
                    .sanction_history(&actor)
                    .map_or(0, |history| history.len() as u64)
            })
            .sum();

        self.stats.honest_viewers = honest
            .iter()
            .filter(|actor| {
                self.service.attempt_history(actor).is_ok_and(|history| {
                    history
                        .iter()
                        .any(|r| r.outcome == chronolock_core::AttemptOutcome::Unlocked)
                })
            })
            .count() as u64;

        self.stats.final_viewers = self
            .service
            .capacity(CAPSULE)
            .ok()
            .flatten()
            .map_or(0, |counter| counter.current);

        self.stats.clone()
    }

    /// A point inside the fence.
    fn honest_position(&mut self) -> GeoPoint {
        // 0.0005° is ~55 m at this latitude.
        let dlat = self.rng.gen_range(-0.0005..=0.0005);
        let dlng = self.rng.gen_range(-0.0005..=0.0005);
        GeoPoint::new(PLAZA.lat + dlat, PLAZA.lng + dlng)
    }

    /// Alternates between a far city and a spot 1-2 km from the plaza.
    fn spoofer_position(&mut self) -> GeoPoint {
        if self.round % 2 == 0 {
            FAR_CITIES[self.rng.gen_range(0..FAR_CITIES.len())]
        } else {
            let offset = self.rng.gen_range(0.01..0.02);
            GeoPoint::new(PLAZA.lat + offset, PLAZA.lng)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_run() {
        let a = AbuseSimulation::new(SimulationConfig::default()).unwrap().run();
        let b = AbuseSimulation::new(SimulationConfig::default()).unwrap().run();
        assert_eq!(a, b);
    }

    #[test]
    fn test_capacity_and_sanctions() {
        let config = SimulationConfig::default();
        let stats = AbuseSimulation::new(config.clone()).unwrap().run();

        assert_eq!(stats.final_viewers, config.max_viewers);
        assert_eq!(stats.honest_viewers, u64::from(config.max_viewers));
        assert_eq!(stats.granted, u64::from(config.max_viewers));
        assert_eq!(stats.sanctions, u64::from(config.spoofers));
        assert!(stats.anomalies >= u64::from(config.spoofers) * 2);
        assert_eq!(stats.errors, 0);

        // Baseline allows one attempt a minute; every burst after the first is refused.
        let bursts = u64::from(config.hammerers * config.rounds);
        assert!(stats.rate_limited >= bursts * u64::from(config.hammer_burst - 1));
        assert!(stats.blocked > 0);
    }

    #[test]
    fn test_step_stops_after_last_round() {
        let config = SimulationConfig {
            rounds: 2,
            ..SimulationConfig::default()
        };
        let mut sim = AbuseSimulation::new(config).unwrap();
        assert!(sim.step());
        assert!(sim.step());
        assert!(!sim.step());
        assert_eq!(sim.round(), 2);
        assert_eq!(sim.stats().attempts, 2 * (40 + 5 + 5 * 5));
    }
}
