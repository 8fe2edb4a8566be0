//! # Domain Types
//!
//! Client-side views of ledger-owned entities. Every value here is a
//! snapshot of a query result; the ledger remains authoritative and the
//! client never treats these as durable state.
//!
//! | Type | Ledger source |
//! |------|---------------|
//! | [`Report`] | report registry |
//! | [`Institution`] | institution registry |
//! | [`StakePosition`] | reward/stake manager |
//! | [`Role`] | derived, see `lapor_client::role` |
//! | [`RegistryKind`] | deployment topology |

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::address::Address;

/// Positive integer assigned by the report registry.
pub type ReportId = u64;

/// Positive integer assigned by the institution registry.
pub type InstitutionId = u64;

// ════════════════════════════════════════════════════════════════════════════════
// REPORT STATUS
// ════════════════════════════════════════════════════════════════════════════════

/// Lifecycle state of a report.
///
/// Ledger encoding is the enum ordinal (`0..=3`) in declaration order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Pending,
    Valid,
    Invalid,
    Appealed,
}

impl ReportStatus {
    /// All states in ledger ordinal order.
    pub const ALL: [ReportStatus; 4] = [
        ReportStatus::Pending,
        ReportStatus::Valid,
        ReportStatus::Invalid,
        ReportStatus::Appealed,
    ];

    /// Decodes the ledger ordinal.
    #[must_use]
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }

    /// Ledger ordinal.
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            ReportStatus::Pending => 0,
            ReportStatus::Valid => 1,
            ReportStatus::Invalid => 2,
            ReportStatus::Appealed => 3,
        }
    }

    /// The valid/invalid boolean implied by this status.
    ///
    /// `Appealed` is only reachable from `Invalid`, so it implies `false`
    /// until the appeal is finalized. `Pending` implies nothing.
    #[must_use]
    pub fn implied_verdict(self) -> Option<bool> {
        match self {
            ReportStatus::Pending => None,
            ReportStatus::Valid => Some(true),
            ReportStatus::Invalid | ReportStatus::Appealed => Some(false),
        }
    }
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReportStatus::Pending => "Pending",
            ReportStatus::Valid => "Valid",
            ReportStatus::Invalid => "Invalid",
            ReportStatus::Appealed => "Appealed",
        };
        f.write_str(s)
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// ENTITIES
// ════════════════════════════════════════════════════════════════════════════════

/// A submitted report.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub id: ReportId,
    pub institution_id: InstitutionId,
    pub title: String,
    pub description: String,
    pub reporter: Address,
    /// Unset until the registry assigns a validator.
    pub assigned_validator: Option<Address>,
    pub status: ReportStatus,
    /// The registry's `isBanding` flag. Stays set after the appeal is
    /// finalized, which is what forbids a second appeal.
    pub appealed: bool,
    pub created_at: u64,
}

/// A registered institution.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Institution {
    pub id: InstitutionId,
    pub name: String,
    /// Immutable after registration.
    pub admin: Address,
    pub treasury: Address,
}

/// A validator's stake against the manager's minimum.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakePosition {
    pub validator: Address,
    pub staked: u128,
    pub minimum: u128,
}

impl StakePosition {
    /// A validator is active once its stake reaches the minimum.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.staked >= self.minimum
    }

    /// Amount still needed to become active.
    #[must_use]
    pub fn shortfall(&self) -> u128 {
        self.minimum.saturating_sub(self.staked)
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// ROLE
// ════════════════════════════════════════════════════════════════════════════════

/// The single global role an address resolves to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Owner,
    Admin,
    Validator,
    Reporter,
    Unknown,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::Owner => "owner",
            Role::Admin => "admin",
            Role::Validator => "validator",
            Role::Reporter => "reporter",
            Role::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// REGISTRY KIND
// ════════════════════════════════════════════════════════════════════════════════

/// The independently deployed ledger contracts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RegistryKind {
    InstitutionRegistry,
    ReportRegistry,
    ValidatorRegistry,
    RewardManager,
    Token,
}

impl RegistryKind {
    pub const ALL: [RegistryKind; 5] = [
        RegistryKind::InstitutionRegistry,
        RegistryKind::ReportRegistry,
        RegistryKind::ValidatorRegistry,
        RegistryKind::RewardManager,
        RegistryKind::Token,
    ];

    /// Stable name used in diagnostics and wire messages.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            RegistryKind::InstitutionRegistry => "InstitutionRegistry",
            RegistryKind::ReportRegistry => "ReportRegistry",
            RegistryKind::ValidatorRegistry => "ValidatorRegistry",
            RegistryKind::RewardManager => "RewardManager",
            RegistryKind::Token => "Token",
        }
    }

    /// Inverse of [`name`](Self::name).
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.name() == name)
    }
}

impl fmt::Display for RegistryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_round_trip() {
        for s in ReportStatus::ALL {
            assert_eq!(ReportStatus::from_code(s.code()), Some(s));
        }
        assert_eq!(ReportStatus::from_code(4), None);
    }

    #[test]
    fn implied_verdicts() {
        assert_eq!(ReportStatus::Pending.implied_verdict(), None);
        assert_eq!(ReportStatus::Valid.implied_verdict(), Some(true));
        assert_eq!(ReportStatus::Invalid.implied_verdict(), Some(false));
        assert_eq!(ReportStatus::Appealed.implied_verdict(), Some(false));
    }

    #[test]
    fn stake_activity() {
        let p = StakePosition {
            validator: Address::repeat(1),
            staked: 40,
            minimum: 100,
        };
        assert!(!p.is_active());
        assert_eq!(p.shortfall(), 60);

        let p = StakePosition { staked: 100, ..p };
        assert!(p.is_active());
        assert_eq!(p.shortfall(), 0);
    }

    #[test]
    fn registry_names() {
        for k in RegistryKind::ALL {
            assert_eq!(RegistryKind::from_name(k.name()), Some(k));
        }
        assert_eq!(RegistryKind::from_name("Nope"), None);
    }

    #[test]
    fn role_display_is_lowercase() {
        assert_eq!(Role::Admin.to_string(), "admin");
        assert_eq!(serde_json::to_string(&Role::Validator).unwrap(), "\"validator\"");
    }
}
