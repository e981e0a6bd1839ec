//! Identifier status and its transition table.
//!
//! ```text
//!   Unclaimed ──► Applied ──► Approved ──► Registered ◄──► Frozen
//!                  ▲   │                        │            │
//!                  │   ▼                        ▼            ▼
//!                  Rejected                 (deleted)    (deleted)
//! ```
//!
//! Deletion is record removal, so it has no status of its own.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Lifecycle status of an identifier record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Status {
    /// No claim exists. Records never persist in this state; it stands in
    /// for an absent record when checking transitions.
    Unclaimed = 0,
    /// A claim is pending audit.
    Applied = 1,
    /// The claim was approved; the owner may register a document.
    Approved = 2,
    /// The claim was rejected. A fresh Apply restarts the cycle.
    Rejected = 3,
    /// A document is anchored.
    Registered = 4,
    /// Anchored but frozen by governance.
    Frozen = 5,
}

impl Status {
    /// All statuses, in code order.
    pub const ALL: [Status; 6] = [
        Status::Unclaimed,
        Status::Applied,
        Status::Approved,
        Status::Rejected,
        Status::Registered,
        Status::Frozen,
    ];

    /// Convert to the wire code.
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Convert from the wire code.
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Status::Unclaimed),
            1 => Some(Status::Applied),
            2 => Some(Status::Approved),
            3 => Some(Status::Rejected),
            4 => Some(Status::Registered),
            5 => Some(Status::Frozen),
            _ => None,
        }
    }

    /// Lowercase name, as used by the contract surface.
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Unclaimed => "unclaimed",
            Status::Applied => "applied",
            Status::Approved => "approved",
            Status::Rejected => "rejected",
            Status::Registered => "registered",
            Status::Frozen => "frozen",
        }
    }

    /// Whether `self -> to` is a legal edge of the state machine.
    pub fn can_transition(self, to: Status) -> bool {
        use Status::*;
        matches!(
            (self, to),
            (Unclaimed, Applied)
                | (Rejected, Applied)
                | (Applied, Approved)
                | (Applied, Rejected)
                | (Approved, Registered)
                | (Registered, Frozen)
                | (Frozen, Registered)
        )
    }

    /// Whether a record in this status may be removed.
    pub fn is_deletable(self) -> bool {
        matches!(self, Status::Registered | Status::Frozen)
    }

    /// Whether this status still belongs to the claim phase.
    pub fn is_claim_phase(self) -> bool {
        matches!(
            self,
            Status::Unclaimed | Status::Applied | Status::Approved | Status::Rejected
        )
    }

    /// Whether a new Apply may (re)start a claim from this status.
    pub fn is_claimable(self) -> bool {
        self.can_transition(Status::Applied)
    }

    /// Whether a record mirrored from another registry may land on top of
    /// the local state.
    ///
    /// Mirrors only carry anchored records. A mirror may refresh a record in
    /// the same status, follow a legal edge, or overwrite any local claim
    /// still in the claim phase (last synchronize wins).
    pub fn accepts_mirror(local: Option<Status>, incoming: Status) -> bool {
        if !matches!(incoming, Status::Registered | Status::Frozen) {
            return false;
        }
        match local {
            None => true,
            Some(local) => {
                local == incoming || local.can_transition(incoming) || local.is_claim_phase()
            }
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Status::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| CoreError::InvalidStatus(s.to_string()))
    }
}
