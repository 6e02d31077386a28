//! Append-only records: access attempts and sanctions.
//!
//! Neither record is ever mutated after it is written.

use crate::actor::{Actor, CapsuleId};
use crate::clock::Timestamp;
use crate::geo::GeoPoint;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity bucket for an implied-travel-speed check.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum AnomalyTier {
    /// Plausible movement.
    #[default]
    None = 0,
    /// Fast but possible (e.g. highway, train).
    Suspicious = 1,
    /// Impossible movement for ground travel.
    High = 2,
    /// Faster than commercial aviation.
    Extreme = 3,
}

impl AnomalyTier {
    /// Numeric tier, 0-3.
    #[must_use]
    pub const fn level(self) -> u8 {
        self as u8
    }

    /// Returns true for any tier above `None`.
    #[must_use]
    pub const fn is_anomalous(self) -> bool {
        !matches!(self, Self::None)
    }
}

/// How an access attempt ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// Capsule opened.
    Unlocked,
    /// Time or location did not match.
    ConditionNotMet,
    /// Rule or claim was malformed.
    Invalid,
    /// First-come slots were gone.
    CapacityExhausted,
    /// Movement or clock anomaly detected.
    AnomalySuspected,
    /// Rejected by the rate limiter or cooldown.
    RateLimited,
    /// Actor already suspended or blocked.
    Blocked,
}

/// One access attempt, as written to the attempt log.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    /// Who attempted.
    pub actor: Actor,
    /// Target capsule.
    pub capsule_id: CapsuleId,
    /// Server time of the attempt.
    pub timestamp: Timestamp,
    /// Client-claimed time, if sent.
    pub claimed_time: Option<Timestamp>,
    /// Claimed position, if sent.
    pub position: Option<GeoPoint>,
    /// Result of the attempt.
    pub outcome: AttemptOutcome,
    /// Movement tier assigned to the attempt.
    pub anomaly_tier: AnomalyTier,
    /// Client user agent, if sent.
    pub user_agent: Option<String>,
}

/// Account or IP status before and after a sanction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountState {
    /// No sanction in effect.
    Active,
    /// Member account suspended.
    Suspended,
    /// IP blocked.
    Blocked,
}

impl fmt::Display for AccountState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Active => "active",
            Self::Suspended => "suspended",
            Self::Blocked => "blocked",
        };
        f.write_str(s)
    }
}

/// Kind of status change a sanction record describes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SanctionKind {
    /// Member suspended.
    Suspend,
    /// IP blocked.
    Block,
    /// Existing sanction lifted.
    Lift,
}

/// Origin of a sanction.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssuedBy {
    /// Automatic escalation.
    System,
    /// Manual action by the named administrator.
    Admin(String),
}

impl fmt::Display for IssuedBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::System => f.write_str("system"),
            Self::Admin(name) => write!(f, "admin:{name}"),
        }
    }
}

/// Immutable audit entry for a status change.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SanctionRecord {
    /// Sanctioned actor.
    pub actor: Actor,
    /// What changed.
    pub kind: SanctionKind,
    /// State before the change.
    pub before_state: AccountState,
    /// State after the change.
    pub after_state: AccountState,
    /// Human-readable reason.
    pub reason: String,
    /// Expiry of the sanction, if any.
    pub until: Option<Timestamp>,
    /// Who issued the change.
    pub issued_by: IssuedBy,
    /// When the change was issued.
    pub issued_at: Timestamp,
}
