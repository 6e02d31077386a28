//! Actors and capsule identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Member (account) identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MemberId(pub u64);

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Capsule identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CapsuleId(pub u64);

impl fmt::Display for CapsuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who is making an access attempt.
///
/// Scoring and rate-limit state is keyed by exactly one of these per event:
/// an authenticated member, or the raw client IP for anonymous access.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Actor {
    /// Authenticated member.
    Member(MemberId),
    /// Anonymous client, identified by its IP as received.
    Ip(String),
}

impl Actor {
    /// Shorthand for a member actor.
    #[must_use]
    pub const fn member(id: u64) -> Self {
        Self::Member(MemberId(id))
    }

    /// Shorthand for an IP actor.
    #[must_use]
    pub fn ip(addr: impl Into<String>) -> Self {
        Self::Ip(addr.into())
    }

    /// Namespaced key used in shared stores (`member:42`, `ip:10.0.0.1`).
    #[must_use]
    pub fn key(&self) -> String {
        self.to_string()
    }

    /// Returns true for member actors.
    #[must_use]
    pub const fn is_member(&self) -> bool {
        matches!(self, Self::Member(_))
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Member(id) => write!(f, "member:{id}"),
            Self::Ip(addr) => write!(f, "ip:{addr}"),
        }
    }
}
