//! # Chronolock Security - The Gate
//!
//! Server-side unlock validation and abuse control.
//!
//! ## Attempt Flow
//!
//! ```text
//! AccessRequest
//!     │
//!     ├── sanction pre-check ───────────────► Blocked
//!     ├── rate limiter (tier from score) ───► RateLimited
//!     │
//!     ▼
//! UnlockConditionValidator
//!     │ met                         │ not met
//!     ▼                             ▼
//! FirstComeAllocator        MovementAnomalyDetector ◄── AttemptLog (last 24h)
//!     │                             │ tier > 0 / clock skew
//!     ▼                             ▼
//! Unlocked |                SuspicionScoreTracker
//! CapacityExhausted                 │ new total
//!                                   ▼
//!                           EscalationPolicy ──► cooldown / suspend / block
//! ```
//!
//! Every attempt, whatever its outcome, is appended to the attempt log.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod allocation;
pub mod anomaly;
pub mod escalation;
pub mod gate;
pub mod rate_limit;
pub mod suspicion;
pub mod unlock;

pub use allocation::{Allocation, FirstComeAllocator};
pub use anomaly::{ClockSkew, MovementAnomalyDetector, MovementReport, MovementSample, SkipReason};
pub use escalation::{EscalationAction, EscalationPolicy, SanctionEnforcer, SanctionOutcome};
pub use gate::{AccessGate, AccessOutcome, AccessRequest, GateStores};
pub use rate_limit::{RateDecision, RateLimiter, RiskTier};
pub use suspicion::SuspicionScoreTracker;
pub use unlock::{UnlockClaim, UnlockConditionValidator, Verdict};
