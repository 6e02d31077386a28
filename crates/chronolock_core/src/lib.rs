//! # Chronolock Core
//!
//! Shared vocabulary for the unlock gate.
//!
//! ## Contents
//!
//! - **GeoMath**: Haversine great-circle distance and initial bearing
//! - **Domain types**: [`Actor`], [`CapsuleId`], [`UnlockRule`], [`AttemptRecord`], [`SanctionRecord`]
//! - **Clock**: injected time source ([`SystemClock`], [`ManualClock`])
//! - **Errors**: the [`GateError`] taxonomy
//! - **Configuration**: [`GateConfig`], every threshold in one place
//!
//! ## Example
//!
//! ```rust
//! use chronolock_core::geo::{distance_meters, GeoPoint};
//!
//! let seoul = GeoPoint::new(37.5665, 126.9780);
//! let busan = GeoPoint::new(35.1796, 129.0756);
//! let km = seoul.distance_to(busan) / 1000.0;
//! assert!((km - 325.0).abs() < 5.0);
//! assert_eq!(distance_meters(1.0, 2.0, 1.0, 2.0), 0.0);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod actor;
pub mod clock;
pub mod config;
pub mod error;
pub mod geo;
pub mod records;
pub mod rule;

pub use actor::{Actor, CapsuleId, MemberId};
pub use clock::{Clock, ManualClock, SystemClock, Timestamp};
pub use config::{
    DetectorConfig, EscalationThresholds, GateConfig, MaintenanceConfig, RateLimitPolicy,
    RateLimitTiers, ScoreTable, SuspicionConfig,
};
pub use error::{ConditionKind, GateError, GateResult};
pub use geo::{GeoFence, GeoPoint};
pub use records::{
    AccountState, AnomalyTier, AttemptOutcome, AttemptRecord, IssuedBy, SanctionKind,
    SanctionRecord,
};
pub use rule::{UnlockRule, UnlockType};
