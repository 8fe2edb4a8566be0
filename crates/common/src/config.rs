//! # Client Configuration
//!
//! TOML-backed configuration injected into the client at construction.
//! Nothing about a deployment is compiled in: the owner address, the five
//! registry addresses, the cost policy and the rejection-reason table all
//! come from here, so the same logic can target several deployments or
//! test networks.
//!
//! ```toml
//! owner = "0x…"
//! rpc_url = "http://127.0.0.1:8545"
//!
//! [deployment]
//! institution_registry = "0x…"
//! report_registry = "0x…"
//! validator_registry = "0x…"
//! reward_manager = "0x…"
//! token = "0x…"
//!
//! [cost]
//! margin_percent = 15
//! ```
//!
//! Every section is optional and falls back to [`Default`]. A loaded
//! config must still pass [`ClientConfig::validate`] before use.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::address::Address;
use crate::amount::DEFAULT_TOKEN_DECIMALS;
use crate::error::ErrorKind;
use crate::types::RegistryKind;

/// Lower bound of the cost safety margin.
pub const MIN_COST_MARGIN_PERCENT: u8 = 10;

/// Upper bound of the cost safety margin.
pub const MAX_COST_MARGIN_PERCENT: u8 = 20;

/// Version tag of the built-in rejection table.
pub const DEFAULT_REJECTION_TABLE_VERSION: &str = "2024.1";

// ════════════════════════════════════════════════════════════════════════════════
// ERRORS
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

// ════════════════════════════════════════════════════════════════════════════════
// DEPLOYMENT
// ════════════════════════════════════════════════════════════════════════════════

/// Addresses of the deployed registries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Deployment {
    pub institution_registry: Address,
    pub report_registry: Address,
    pub validator_registry: Address,
    pub reward_manager: Address,
    pub token: Address,
}

impl Deployment {
    /// Address the client believes `kind` is deployed at.
    #[must_use]
    pub fn address_of(&self, kind: RegistryKind) -> Address {
        match kind {
            RegistryKind::InstitutionRegistry => self.institution_registry,
            RegistryKind::ReportRegistry => self.report_registry,
            RegistryKind::ValidatorRegistry => self.validator_registry,
            RegistryKind::RewardManager => self.reward_manager,
            RegistryKind::Token => self.token,
        }
    }

    /// Reverse lookup. `None` for addresses outside the deployment.
    #[must_use]
    pub fn kind_of(&self, address: Address) -> Option<RegistryKind> {
        RegistryKind::ALL
            .iter()
            .copied()
            .find(|k| self.address_of(*k) == address)
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// COST POLICY
// ════════════════════════════════════════════════════════════════════════════════

/// Execution-cost policy.
///
/// On a successful estimate the ceiling is `estimate * (100 + margin) / 100`.
/// When estimation fails the action's complexity class picks a fixed
/// ceiling instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostConfig {
    /// Safety margin over the estimate. Clamped to 10..=20.
    pub margin_percent: u8,
    /// Token transfers and approvals.
    pub simple_ceiling: u64,
    /// Stake movements and membership registration.
    pub standard_ceiling: u64,
    /// Report lifecycle writes; these touch text storage and, for
    /// appeals, a second registry.
    pub heavy_ceiling: u64,
}

impl Default for CostConfig {
    fn default() -> Self {
        Self {
            margin_percent: 15,
            simple_ceiling: 100_000,
            standard_ceiling: 300_000,
            heavy_ceiling: 800_000,
        }
    }
}

impl CostConfig {
    /// Margin clamped into the allowed band.
    #[must_use]
    pub fn effective_margin(&self) -> u8 {
        self.margin_percent
            .clamp(MIN_COST_MARGIN_PERCENT, MAX_COST_MARGIN_PERCENT)
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// ASSIGNMENT POLICY
// ════════════════════════════════════════════════════════════════════════════════

/// Who may submit a verdict on a pending report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentPolicy {
    /// Only the assigned validator. Reports with no assignment fall back
    /// to any registered validator of the institution.
    #[default]
    AssignedOnly,
    /// Any registered validator of the report's institution.
    AnyInstitutionValidator,
}

// ════════════════════════════════════════════════════════════════════════════════
// REGISTRY TOPOLOGY
// ════════════════════════════════════════════════════════════════════════════════

/// One cross-reference a registry must hold: `from` stores the address of
/// `to`, and that stored address must equal the deployed `to`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectedLink {
    pub from: RegistryKind,
    pub to: RegistryKind,
    /// What `from` uses the reference for; shown in diagnostics.
    pub purpose: String,
}

impl ExpectedLink {
    pub fn new(from: RegistryKind, to: RegistryKind, purpose: &str) -> Self {
        Self {
            from,
            to,
            purpose: purpose.to_string(),
        }
    }
}

/// Cross-references of the deployed topology.
///
/// `RewardManager -> ReportRegistry` is the settlement-caller whitelist:
/// the reward manager's funds-moving entry points only accept the
/// registry stored there.
#[must_use]
pub fn default_links() -> Vec<ExpectedLink> {
    use RegistryKind::*;
    vec![
        ExpectedLink::new(ReportRegistry, InstitutionRegistry, "institution lookup"),
        ExpectedLink::new(ReportRegistry, RewardManager, "appeal stake custody"),
        ExpectedLink::new(ValidatorRegistry, ReportRegistry, "verdict recording"),
        ExpectedLink::new(ValidatorRegistry, InstitutionRegistry, "validator membership"),
        ExpectedLink::new(ValidatorRegistry, RewardManager, "validator stake lookup"),
        ExpectedLink::new(RewardManager, ReportRegistry, "settlement caller"),
        ExpectedLink::new(RewardManager, Token, "stake token"),
    ]
}

// ════════════════════════════════════════════════════════════════════════════════
// REJECTION TABLE
// ════════════════════════════════════════════════════════════════════════════════

/// One `substring -> kind` mapping. Matching is case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectionRule {
    pub pattern: String,
    pub kind: ErrorKind,
}

/// Versioned mapping from ledger rejection reasons to [`ErrorKind`].
///
/// Rules are tried in order and the first match wins; no match means
/// [`ErrorKind::Unknown`]. Ledger-side reason strings are not a stable
/// contract, so the table ships with a version tag and can be replaced
/// wholesale from config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectionTable {
    pub version: String,
    pub rules: Vec<RejectionRule>,
}

impl Default for RejectionTable {
    fn default() -> Self {
        use ErrorKind::*;
        // Specific cross-registry phrases precede the generic
        // "caller is not" authorization phrase.
        let rules: &[(&str, ErrorKind)] = &[
            ("not the authorized settlement registry", CrossRegistryMisconfiguration),
            ("only report registry", CrossRegistryMisconfiguration),
            ("only validator registry", CrossRegistryMisconfiguration),
            ("address mismatch", CrossRegistryMisconfiguration),
            ("registry not configured", CrossRegistryMisconfiguration),
            ("unauthorized", AuthorizationRejected),
            ("not authorized", AuthorizationRejected),
            ("access denied", AuthorizationRejected),
            ("only owner", AuthorizationRejected),
            ("only admin", AuthorizationRejected),
            ("only the reporter", AuthorizationRejected),
            ("caller is not", AuthorizationRejected),
            ("insufficient balance", InsufficientFunds),
            ("insufficient allowance", InsufficientFunds),
            ("insufficient funds", InsufficientFunds),
            ("insufficient pool", InsufficientFunds),
            ("insufficient stake", InsufficientFunds),
            ("exceeds balance", InsufficientFunds),
            ("exceeds allowance", InsufficientFunds),
            ("not pending", PreconditionViolatedOnChain),
            ("not invalid", PreconditionViolatedOnChain),
            ("not under appeal", PreconditionViolatedOnChain),
            ("already appealed", PreconditionViolatedOnChain),
            ("appeal already", PreconditionViolatedOnChain),
            ("already validated", PreconditionViolatedOnChain),
            ("invalid status", PreconditionViolatedOnChain),
            ("not found", PreconditionViolatedOnChain),
            ("timed out", NetworkError),
            ("timeout", NetworkError),
            ("connection", NetworkError),
            ("network", NetworkError),
        ];
        Self {
            version: DEFAULT_REJECTION_TABLE_VERSION.to_string(),
            rules: rules
                .iter()
                .map(|(p, k)| RejectionRule {
                    pattern: (*p).to_string(),
                    kind: *k,
                })
                .collect(),
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// CLIENT CONFIG
// ════════════════════════════════════════════════════════════════════════════════

/// Full client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Platform owner. Takes precedence over every registry role.
    pub owner: Address,
    pub deployment: Deployment,
    /// Ledger gateway JSON-RPC endpoint.
    pub rpc_url: String,
    pub rpc_timeout_secs: u64,
    /// Interval between receipt polls while awaiting confirmation.
    pub receipt_poll_interval_ms: u64,
    /// Give up awaiting a receipt after this long.
    pub receipt_timeout_secs: u64,
    pub token_decimals: u32,
    pub token_symbol: String,
    pub cost: CostConfig,
    pub assignment_policy: AssignmentPolicy,
    /// Refuse a risky write when its preflight diagnosis finds a
    /// cross-registry mismatch.
    pub block_on_preflight_misconfiguration: bool,
    pub expected_links: Vec<ExpectedLink>,
    pub rejection_table: RejectionTable,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            owner: Address::ZERO,
            deployment: Deployment::default(),
            rpc_url: "http://127.0.0.1:8545".to_string(),
            rpc_timeout_secs: 30,
            receipt_poll_interval_ms: 2_000,
            receipt_timeout_secs: 120,
            token_decimals: DEFAULT_TOKEN_DECIMALS,
            token_symbol: "LPR".to_string(),
            cost: CostConfig::default(),
            assignment_policy: AssignmentPolicy::default(),
            block_on_preflight_misconfiguration: true,
            expected_links: default_links(),
            rejection_table: RejectionTable::default(),
        }
    }
}

impl ClientConfig {
    /// Config for a given owner and deployment, everything else default.
    #[must_use]
    pub fn for_deployment(owner: Address, deployment: Deployment) -> Self {
        Self {
            owner,
            deployment,
            ..Self::default()
        }
    }

    /// Checks the invariants the client relies on.
    ///
    /// - owner and every registry address are non-zero
    /// - registry addresses are pairwise distinct
    /// - the rejection table has a version and no empty pattern
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.owner.is_zero() {
            return Err(ConfigError::Invalid("owner address is zero".to_string()));
        }

        let mut seen = HashSet::new();
        for kind in RegistryKind::ALL {
            let addr = self.deployment.address_of(kind);
            if addr.is_zero() {
                return Err(ConfigError::Invalid(format!("{kind} address is zero")));
            }
            if !seen.insert(addr) {
                return Err(ConfigError::Invalid(format!(
                    "{kind} shares address {addr} with another registry"
                )));
            }
        }

        if self.rejection_table.version.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "rejection table has no version".to_string(),
            ));
        }
        if self
            .rejection_table
            .rules
            .iter()
            .any(|r| r.pattern.trim().is_empty())
        {
            return Err(ConfigError::Invalid(
                "rejection table contains an empty pattern".to_string(),
            ));
        }
        Ok(())
    }
}

/// Load config from a TOML file path.
///
/// Missing sections take their defaults; the result is not validated.
pub fn load_from_file(path: impl AsRef<Path>) -> Result<ClientConfig, ConfigError> {
    let s = fs::read_to_string(path.as_ref())?;
    let cfg: ClientConfig = toml::from_str(&s)?;
    Ok(cfg)
}
