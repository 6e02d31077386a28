//! # Movement Check
//!
//! Command-line tool to classify the movement between two attempts.

use chrono::{TimeDelta, Utc};
use chronolock_core::{GateConfig, GeoPoint};
use chronolock_security::{MovementAnomalyDetector, MovementSample};

fn main() {
    println!("╔══════════════════════════════════════════════════════════════════╗");
    println!("║         CHRONOLOCK MOVEMENT CHECK                                ║");
    println!("╚══════════════════════════════════════════════════════════════════╝");
    println!();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 6 {
        println!("Usage: movement_check <lat1> <lng1> <lat2> <lng2> <elapsed_secs>");
        println!();
        println!("Options:");
        println!("  --config <file>  Detector thresholds from a chronolock TOML file");
        return;
    }

    let numbers: Result<Vec<f64>, _> = args[1..5].iter().map(|s| s.parse::<f64>()).collect();
    let Ok(numbers) = numbers else {
        println!("Error: coordinates must be numbers");
        return;
    };
    let Ok(elapsed_secs) = args[5].parse::<i64>() else {
        println!("Error: elapsed_secs must be a whole number of seconds");
        return;
    };

    let config = match args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
    {
        Some(path) => match GateConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                println!("Error: {e}");
                return;
            }
        },
        None => GateConfig::default(),
    };

    let from = match GeoPoint::validated(numbers[0], numbers[1]) {
        Ok(p) => p,
        Err(e) => {
            println!("Error: {e}");
            return;
        }
    };
    let to = match GeoPoint::validated(numbers[2], numbers[3]) {
        Ok(p) => p,
        Err(e) => {
            println!("Error: {e}");
            return;
        }
    };

    let detector = MovementAnomalyDetector::new(config.detector);
    let start = Utc::now();
    let prior = MovementSample::new(start, from);
    let current = MovementSample::new(start + TimeDelta::seconds(elapsed_secs), to);
    let report = detector.analyze(Some(&prior), &current);

    println!("┌─ MOVEMENT ───────────────────────────────────────────────────────┐");
    println!("│ From:               {:.5}, {:.5}", from.lat, from.lng);
    println!("│ To:                 {:.5}, {:.5}", to.lat, to.lng);
    println!("│ Distance:           {:.1} m", from.distance_to(to));
    println!("│ Bearing:            {:.1}°", from.bearing_to(to));
    println!("│ Elapsed:            {elapsed_secs} s");
    println!("└──────────────────────────────────────────────────────────────────┘");
    println!();

    match report.skipped {
        Some(reason) => println!("Not analyzed: {reason:?}"),
        None => {
            println!("Implied speed:      {:.1} km/h", report.speed_kmh);
            println!(
                "Tier:               {:?} ({}) → +{} suspicion",
                report.tier,
                report.tier.level(),
                config.scores.for_tier(report.tier)
            );
        }
    }
}
