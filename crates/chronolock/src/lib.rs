//! # Chronolock
//!
//! The capsule unlock gate, assembled and runnable.
//!
//! ## Quick Start
//!
//! ```no_run
//! use chronolock::GateService;
//! use chronolock_core::{Actor, CapsuleId, GateConfig, GeoPoint, SystemClock};
//! use chronolock_security::AccessRequest;
//! use std::sync::Arc;
//!
//! let service = GateService::connect(GateConfig::default(), Arc::new(SystemClock)).unwrap();
//! let request = AccessRequest::at(CapsuleId(1), Actor::member(7), GeoPoint::new(37.5665, 126.978));
//! match service.attempt(&request) {
//!     Ok(outcome) => println!("{outcome:?}"),
//!     Err(e) => println!("{}", e.public_message()),
//! }
//! service.close();
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod admin;
pub mod maintenance;
pub mod service;
pub mod simulation;

pub use maintenance::MaintenanceTask;
pub use service::GateService;
pub use simulation::{AbuseSimulation, SimulationConfig, SimulationStats};
