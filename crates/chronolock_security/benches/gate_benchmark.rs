//! Benchmark for the hot paths of an access attempt.
//!
//! Run with: cargo bench --package chronolock_security --bench gate_benchmark

use chrono::{TimeDelta, TimeZone, Utc};
use chronolock_core::{
    geo, Actor, CapsuleId, DetectorConfig, GateConfig, GeoFence, GeoPoint, ManualClock,
    UnlockRule,
};
use chronolock_security::{
    AccessGate, AccessRequest, GateStores, MovementAnomalyDetector, MovementSample,
    UnlockClaim, UnlockConditionValidator,
};
use chronolock_store::{
    CapsuleGate, MemoryAttemptLog, MemoryCapsuleStore, MemoryControlPlane, MemorySanctionLedger,
    MemoryStore,
};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::sync::Arc;

const SEOUL: GeoPoint = GeoPoint::new(37.5665, 126.9780);
const BUSAN: GeoPoint = GeoPoint::new(35.1796, 129.0756);

fn benchmark_distance(c: &mut Criterion) {
    c.bench_function("haversine_distance", |b| {
        b.iter(|| {
            black_box(geo::distance_meters(
                black_box(SEOUL.lat),
                black_box(SEOUL.lng),
                black_box(BUSAN.lat),
                black_box(BUSAN.lng),
            ))
        });
    });
}

fn benchmark_movement_classification(c: &mut Criterion) {
    let detector = MovementAnomalyDetector::new(DetectorConfig::default());
    let t0 = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    let prior = MovementSample::new(t0, SEOUL);
    let current = MovementSample::new(t0 + TimeDelta::minutes(10), BUSAN);

    c.bench_function("movement_analyze", |b| {
        b.iter(|| black_box(detector.analyze(Some(black_box(&prior)), black_box(&current))));
    });
}

fn benchmark_condition_check(c: &mut Criterion) {
    let validator = UnlockConditionValidator::new();
    let t0 = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    let rule = UnlockRule::time_and_location(t0, None, GeoFence::new(SEOUL, 150.0));
    let claim = UnlockClaim::at(t0 + TimeDelta::hours(1), SEOUL);

    c.bench_function("time_and_location_check", |b| {
        b.iter(|| black_box(validator.evaluate(black_box(&rule), black_box(&claim))));
    });
}

fn benchmark_full_attempt(c: &mut Criterion) {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
    ));
    let shared = MemoryStore::connect(clock.clone());
    let capsules = MemoryCapsuleStore::connect();
    capsules.insert(CapsuleGate {
        capsule_id: CapsuleId(1),
        rule: UnlockRule::location(GeoFence::new(SEOUL, 150.0)),
        max_viewers: 0,
    });
    let stores = GateStores {
        shared: shared.clone(),
        capsules,
        attempts: MemoryAttemptLog::connect(),
        control: MemoryControlPlane::connect(clock.clone(), shared),
        ledger: MemorySanctionLedger::connect(),
    };
    let gate = AccessGate::new(&GateConfig::default(), stores, clock.clone());

    c.bench_function("full_attempt_distinct_actors", |b| {
        let mut member = 0u64;
        b.iter(|| {
            member += 1;
            let request = AccessRequest::at(CapsuleId(1), Actor::member(member), SEOUL);
            black_box(gate.attempt(&request))
        });
    });
}

criterion_group!(
    benches,
    benchmark_distance,
    benchmark_movement_classification,
    benchmark_condition_check,
    benchmark_full_attempt
);
criterion_main!(benches);
