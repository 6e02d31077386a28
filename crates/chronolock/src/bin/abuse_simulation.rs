//! # Abuse Simulation
//!
//! Replays honest visitors, GPS spoofers and retry hammerers against one
//! first-come capsule and prints what the gate did.
//!
//! Run with: cargo run --bin abuse_simulation -- --seed 7 --rounds 24
//! Set `RUST_LOG=chronolock_security=info` to watch escalations.

use chronolock::{AbuseSimulation, SimulationConfig};
use chronolock_core::GateConfig;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_target(false)
        .init();

    println!("╔══════════════════════════════════════════════════════════════════╗");
    println!("║         CHRONOLOCK ABUSE SIMULATION                              ║");
    println!("╚══════════════════════════════════════════════════════════════════╝");
    println!();

    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        println!("Usage: abuse_simulation [options]");
        println!();
        println!("Options:");
        println!("  --seed <n>       RNG seed (default 42)");
        println!("  --rounds <n>     Rounds, 10 simulated minutes apart (default 12)");
        println!("  --config <file>  Gate configuration TOML");
        return;
    }

    let mut config = SimulationConfig::default();
    if let Some(seed) = flag(&args, "--seed").and_then(|s| s.parse().ok()) {
        config.seed = seed;
    }
    if let Some(rounds) = flag(&args, "--rounds").and_then(|s| s.parse().ok()) {
        config.rounds = rounds;
    }
    if let Some(path) = flag(&args, "--config") {
        match GateConfig::load(path) {
            Ok(gate) => config.gate = gate,
            Err(e) => {
                println!("Error: {e}");
                return;
            }
        }
    }

    println!("┌─ SETUP ──────────────────────────────────────────────────────────┐");
    println!("│ Seed:               {}", config.seed);
    println!("│ Rounds:             {} x {} min", config.rounds, config.round_minutes);
    println!("│ Honest members:     {}", config.honest);
    println!("│ Spoofers:           {}", config.spoofers);
    println!("│ Hammering IPs:      {} ({} per round)", config.hammerers, config.hammer_burst);
    println!("│ First-come slots:   {}", config.max_viewers);
    println!("│ Fence radius:       {:.0} m", config.radius_meters);
    println!("└──────────────────────────────────────────────────────────────────┘");
    println!();

    let mut simulation = match AbuseSimulation::new(config.clone()) {
        Ok(simulation) => simulation,
        Err(e) => {
            println!("Error: {e}");
            return;
        }
    };

    let start = std::time::Instant::now();
    let stats = simulation.run();
    let elapsed = start.elapsed();

    println!("┌─ OUTCOMES ───────────────────────────────────────────────────────┐");
    println!("│ Attempts:           {}", stats.attempts);
    println!("│ Granted:            {}", stats.granted);
    println!("│ Already viewed:     {}", stats.already_viewed);
    println!("│ Condition not met:  {}", stats.condition_not_met);
    println!("│ Capacity exhausted: {}", stats.capacity_exhausted);
    println!("│ Anomalies:          {}", stats.anomalies);
    println!("│ Rate limited:       {}", stats.rate_limited);
    println!("│ Blocked:            {}", stats.blocked);
    println!("│ Errors:             {}", stats.errors);
    println!("└──────────────────────────────────────────────────────────────────┘");
    println!();

    println!("┌─ ENFORCEMENT ────────────────────────────────────────────────────┐");
    println!("│ Sanctions issued:   {}", stats.sanctions);
    println!("│ Honest viewers:     {} / {}", stats.honest_viewers, config.honest);
    println!("│ Slots used:         {} / {}", stats.final_viewers, config.max_viewers);
    println!("│ Wall time:          {elapsed:.2?}");
    println!("└──────────────────────────────────────────────────────────────────┘");

    if stats.final_viewers > config.max_viewers {
        println!();
        println!("⚠️  CAPACITY OVERRUN");
        std::process::exit(1);
    }
}

fn flag<'a>(args: &'a [String], name: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == name)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}
