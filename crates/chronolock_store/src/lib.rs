//! # Chronolock Store
//!
//! Storage seams for the unlock gate.
//!
//! ## Failure Contract
//!
//! Every call returns [`StoreResult`]. Callers decide per call site:
//!
//! | caller                    | on `StoreError`                    |
//! |---------------------------|------------------------------------|
//! | suspicion scoring         | fail open (log, keep last value)   |
//! | rate limiting / cooldown  | fail open (admit)                  |
//! | sanction pre-check        | fail open (treat as not sanctioned)|
//! | capacity allocation       | fail closed (capacity exhausted)   |
//!
//! ## Lifecycle
//!
//! Backends are created with `connect` and injected as `Arc<dyn Trait>`.
//! After `close()` every call fails with [`StoreError::Unavailable`].

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod attempts;
pub mod capsules;
pub mod control;
pub mod error;
pub mod lifecycle;
pub mod shared;

pub use attempts::{AttemptLog, MemoryAttemptLog};
pub use capsules::{CapacityCounter, CapsuleGate, CapsuleProvider, MemoryCapsuleStore};
pub use control::{
    ActorStatus, ControlPlane, MemoryControlPlane, MemorySanctionLedger, SanctionChange,
    SanctionLedger,
};
pub use error::{StoreError, StoreResult};
pub use lifecycle::Lifecycle;
pub use shared::{MemoryStore, SharedStore};
