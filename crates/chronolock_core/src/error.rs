//! # Gate Error Types
//!
//! All errors that can occur while gating a capsule.
//!
//! Validation and capacity errors go back to the caller verbatim.
//! `StoreUnavailable` is internal: callers surface it through
//! [`GateError::public_message`], which never reveals detection details.

use crate::records::AnomalyTier;
use thiserror::Error;

/// Which half of an unlock rule was not satisfied.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConditionKind {
    /// Before `unlock_at`.
    TimeNotReached,
    /// After `unlock_until`.
    TimeExpired,
    /// Outside the geofence radius.
    OutsideRadius,
}

impl ConditionKind {
    /// Returns true for the location half of a rule.
    #[must_use]
    pub const fn is_location(self) -> bool {
        matches!(self, Self::OutsideRadius)
    }
}

/// Errors that can occur in the gate.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GateError {
    /// Claimed or configured coordinates are outside `[-90,90] x [-180,180]`.
    #[error("invalid coordinate: lat {lat}, lng {lng}")]
    InvalidCoordinate {
        /// Latitude as received.
        lat: f64,
        /// Longitude as received.
        lng: f64,
    },

    /// The rule's `unlock_until` is not strictly after `unlock_at`.
    #[error("invalid unlock time range: until must be after start")]
    InvalidTimeRange,

    /// The rule requires a time condition but has no `unlock_at`.
    #[error("unlock time not found")]
    TimeConditionMissing,

    /// The rule requires a location condition but has no geofence.
    #[error("unlock location not found")]
    LocationConditionMissing,

    /// The geofence radius is negative or not finite.
    #[error("invalid geofence radius: {0}")]
    InvalidRadius(f64),

    /// No evaluation time was supplied for a time condition.
    #[error("evaluation time missing")]
    EvaluationTimeMissing,

    /// A location condition was evaluated without a claimed position.
    #[error("claimed position missing")]
    PositionMissing,

    /// The attempt does not satisfy the unlock rule.
    #[error("unlock condition not met: {0:?}")]
    ConditionNotMet(ConditionKind),

    /// All first-come slots are taken.
    #[error("capacity exhausted")]
    CapacityExhausted,

    /// The attempt looks physically impossible or manipulated.
    #[error("anomaly suspected: {0:?}")]
    AnomalySuspected(AnomalyTier),

    /// Too many attempts; retry later.
    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited {
        /// Seconds until the next attempt may be admitted.
        retry_after_secs: u64,
    },

    /// The actor is suspended or blocked.
    #[error("actor blocked")]
    Blocked,

    /// Capsule does not exist.
    #[error("capsule not found: {0}")]
    CapsuleNotFound(u64),

    /// A backing store could not be reached.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// Invalid configuration file or values.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl GateError {
    /// Text safe to show to the end user.
    ///
    /// Condition and capacity failures explain themselves; anything touching
    /// abuse detection or infrastructure collapses into one generic message.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::InvalidCoordinate { .. } => "The supplied location is not valid.".to_owned(),
            Self::PositionMissing => "Location is required to open this capsule.".to_owned(),
            Self::ConditionNotMet(ConditionKind::TimeNotReached) => {
                "This capsule cannot be opened yet.".to_owned()
            }
            Self::ConditionNotMet(ConditionKind::TimeExpired) => {
                "This capsule can no longer be opened.".to_owned()
            }
            Self::ConditionNotMet(ConditionKind::OutsideRadius) => {
                "You are not at the capsule's location.".to_owned()
            }
            Self::CapacityExhausted => "All viewer slots for this capsule are taken.".to_owned(),
            Self::CapsuleNotFound(_) => "Capsule not found.".to_owned(),
            Self::RateLimited { retry_after_secs } => {
                format!("Too many attempts. Try again in {retry_after_secs} seconds.")
            }
            Self::InvalidTimeRange
            | Self::TimeConditionMissing
            | Self::LocationConditionMissing
            | Self::InvalidRadius(_)
            | Self::EvaluationTimeMissing
            | Self::AnomalySuspected(_)
            | Self::Blocked
            | Self::StoreUnavailable(_)
            | Self::InvalidConfig(_) => "Cannot unlock right now.".to_owned(),
        }
    }
}

/// Result type for gate operations.
pub type GateResult<T> = Result<T, GateError>;
