//! Unlock rules attached to capsules.

use crate::clock::Timestamp;
use crate::error::{GateError, GateResult};
use crate::geo::GeoFence;
use serde::{Deserialize, Serialize};

/// The closed set of unlock condition types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnlockType {
    /// Opens inside a time window.
    Time,
    /// Opens inside a geofence.
    Location,
    /// Both must hold.
    TimeAndLocation,
}

impl UnlockType {
    /// Returns true if the rule has a time half.
    #[must_use]
    pub const fn needs_time(self) -> bool {
        matches!(self, Self::Time | Self::TimeAndLocation)
    }

    /// Returns true if the rule has a location half.
    #[must_use]
    pub const fn needs_location(self) -> bool {
        matches!(self, Self::Location | Self::TimeAndLocation)
    }
}

/// Condition gating a capsule.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UnlockRule {
    /// Condition type.
    pub unlock_type: UnlockType,
    /// Earliest unlock time (inclusive).
    pub unlock_at: Option<Timestamp>,
    /// Latest unlock time (inclusive); open-ended if absent.
    pub unlock_until: Option<Timestamp>,
    /// Geofence for location rules.
    pub fence: Option<GeoFence>,
}

impl UnlockRule {
    /// Time-only rule.
    #[must_use]
    pub const fn time(unlock_at: Timestamp, unlock_until: Option<Timestamp>) -> Self {
        Self {
            unlock_type: UnlockType::Time,
            unlock_at: Some(unlock_at),
            unlock_until,
            fence: None,
        }
    }

    /// Location-only rule.
    #[must_use]
    pub const fn location(fence: GeoFence) -> Self {
        Self {
            unlock_type: UnlockType::Location,
            unlock_at: None,
            unlock_until: None,
            fence: Some(fence),
        }
    }

    /// Combined rule.
    #[must_use]
    pub const fn time_and_location(
        unlock_at: Timestamp,
        unlock_until: Option<Timestamp>,
        fence: GeoFence,
    ) -> Self {
        Self {
            unlock_type: UnlockType::TimeAndLocation,
            unlock_at: Some(unlock_at),
            unlock_until,
            fence: Some(fence),
        }
    }

    /// Checks the rule's own consistency.
    ///
    /// These are configuration errors on the capsule, not user errors.
    ///
    /// # Errors
    ///
    /// - [`GateError::InvalidTimeRange`] if `unlock_until <= unlock_at`
    /// - [`GateError::TimeConditionMissing`] if a time rule has no `unlock_at`
    /// - [`GateError::LocationConditionMissing`] if a location rule has no fence
    /// - [`GateError::InvalidCoordinate`] / [`GateError::InvalidRadius`] for a bad fence
    pub fn validate(&self) -> GateResult<()> {
        if let (Some(at), Some(until)) = (self.unlock_at, self.unlock_until) {
            if until <= at {
                return Err(GateError::InvalidTimeRange);
            }
        }
        if self.unlock_type.needs_time() && self.unlock_at.is_none() {
            return Err(GateError::TimeConditionMissing);
        }
        if self.unlock_type.needs_location() {
            let fence = self.fence.ok_or(GateError::LocationConditionMissing)?;
            if !fence.center.is_valid() {
                return Err(GateError::InvalidCoordinate {
                    lat: fence.center.lat,
                    lng: fence.center.lng,
                });
            }
            if !fence.radius_meters.is_finite() || fence.radius_meters < 0.0 {
                return Err(GateError::InvalidRadius(fence.radius_meters));
            }
        }
        Ok(())
    }
}
