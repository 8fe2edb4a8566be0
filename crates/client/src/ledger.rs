//! # Ledger Access Traits
//!
//! The client talks to the ledger through two capabilities handed in by
//! its environment:
//!
//! | Trait | Capability | Mutates? |
//! |-------|------------|----------|
//! | [`RegistryReader`] | read-only RPC queries + call simulation | no |
//! | [`LedgerWriter`] | cost estimation, signed submission, receipts | yes |
//!
//! The client never holds key material; a `LedgerWriter` signs with
//! whatever identity its environment gave it and reports that identity
//! through [`LedgerWriter::signer`].
//!
//! ## Contract
//!
//! - Implementations MUST NOT retry internally.
//! - Implementations MUST NOT panic.
//! - Timeouts MUST surface as [`ReadError::Network`] or
//!   [`SubmitError::Timeout`].
//! - Each read returns one snapshot. Two reads issued concurrently may
//!   observe different ledger heights.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use lapor_common::{
    Address, Institution, InstitutionId, RawVerdictRecord, RegistryKind, Report, ReportId,
    StakePosition,
};

/// Entry point names, shared by the call builder, the mock ledger and
/// the RPC transport.
pub mod methods {
    pub const CREATE_REPORT: &str = "createReport";
    pub const VALIDATE_REPORT: &str = "validateReport";
    pub const SUBMIT_APPEAL: &str = "submitAppeal";
    pub const FINALIZE_APPEAL: &str = "finalizeAppeal";
    pub const STAKE: &str = "stake";
    pub const UNSTAKE: &str = "unstake";
    pub const TRANSFER: &str = "transfer";
    pub const APPROVE: &str = "approve";
    pub const REGISTER_INSTITUTION: &str = "registerInstitution";
    pub const ADD_VALIDATOR: &str = "addValidator";
    pub const ADD_REPORTER: &str = "addReporter";
}

// ════════════════════════════════════════════════════════════════════════════════
// ERRORS
// ════════════════════════════════════════════════════════════════════════════════

/// A read query failed as a whole.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReadError {
    /// Transport failure or timeout.
    #[error("ledger read failed: {0}")]
    Network(String),

    /// The response could not be decoded at all.
    #[error("ledger response could not be decoded: {0}")]
    Decode(String),

    /// The queried entity does not exist.
    #[error("{0} not found")]
    NotFound(String),
}

/// The ledger's structured refusal of a call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    /// Reason string as reported by the ledger.
    pub reason: String,
    /// Registry that raised the rejection, when the ledger says so. This
    /// can differ from the registry the call was sent to.
    pub origin: Option<RegistryKind>,
}

impl Rejection {
    pub fn new(reason: impl Into<String>, origin: Option<RegistryKind>) -> Self {
        Self {
            reason: reason.into(),
            origin,
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.origin {
            Some(origin) => write!(f, "{origin}: {}", self.reason),
            None => f.write_str(&self.reason),
        }
    }
}

/// A write-side operation (estimate, submit, receipt) failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error("ledger rejected the call: {0}")]
    Rejected(Rejection),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("ledger request timed out")]
    Timeout,
}

// ════════════════════════════════════════════════════════════════════════════════
// CALLS
// ════════════════════════════════════════════════════════════════════════════════

/// Positional argument of a contract entry point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum CallArg {
    Uint(u128),
    Address(Address),
    Bool(bool),
    Text(String),
}

/// A fully-resolved contract call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerCall {
    pub target: RegistryKind,
    /// Deployed address of `target`.
    pub to: Address,
    pub method: &'static str,
    pub args: Vec<CallArg>,
}

impl LedgerCall {
    pub fn arg_uint(&self, index: usize) -> Option<u128> {
        match self.args.get(index) {
            Some(CallArg::Uint(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn arg_address(&self, index: usize) -> Option<Address> {
        match self.args.get(index) {
            Some(CallArg::Address(a)) => Some(*a),
            _ => None,
        }
    }

    pub fn arg_bool(&self, index: usize) -> Option<bool> {
        match self.args.get(index) {
            Some(CallArg::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn arg_text(&self, index: usize) -> Option<&str> {
        match self.args.get(index) {
            Some(CallArg::Text(t)) => Some(t.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for LedgerCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}(", self.target, self.method)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            match arg {
                CallArg::Uint(v) => write!(f, "{v}")?,
                CallArg::Address(a) => write!(f, "{a}")?,
                CallArg::Bool(b) => write!(f, "{b}")?,
                CallArg::Text(t) => write!(f, "{t:?}")?,
            }
        }
        f.write_str(")")
    }
}

/// 32-byte transaction hash.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TxHash(pub [u8; 32]);

impl TxHash {
    /// Parses `0x` + 64 hex digits.
    pub fn parse(text: &str) -> Option<Self> {
        let body = text.strip_prefix("0x")?;
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(body, &mut bytes).ok()?;
        Some(Self(bytes))
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxHash({self})")
    }
}

impl Serialize for TxHash {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Outcome of a read-only dry run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimulationOutcome {
    WouldSucceed,
    WouldRevert(Rejection),
}

/// Final state of a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Confirmation {
    Confirmed { block: u64 },
    Reverted { rejection: Rejection },
}

// ════════════════════════════════════════════════════════════════════════════════
// TRAITS
// ════════════════════════════════════════════════════════════════════════════════

/// Read-only access to all registries.
///
/// Implementations MUST NOT mutate ledger state.
#[async_trait]
pub trait RegistryReader: Send + Sync {
    /// Number of institutions. Ids run `1..=count`.
    async fn institution_count(&self) -> Result<u64, ReadError>;

    async fn institution(&self, id: InstitutionId) -> Result<Institution, ReadError>;

    async fn is_validator(&self, institution_id: InstitutionId, address: Address) -> Result<bool, ReadError>;

    async fn is_reporter(&self, institution_id: InstitutionId, address: Address) -> Result<bool, ReadError>;

    /// Registered validators of one institution, in registration order.
    async fn validators(&self, institution_id: InstitutionId) -> Result<Vec<Address>, ReadError>;

    /// Registered reporters of one institution, in registration order.
    async fn reporters(&self, institution_id: InstitutionId) -> Result<Vec<Address>, ReadError>;

    /// Number of reports. Ids run `1..=count`.
    async fn report_count(&self) -> Result<u64, ReadError>;

    async fn report(&self, id: ReportId) -> Result<Report, ReadError>;

    /// The validator registry's verdict record.
    ///
    /// `Ok(None)`: no verdict recorded. `Err(Decode)`: a record exists but
    /// nothing of it could be decoded.
    async fn verdict_record(&self, report_id: ReportId) -> Result<Option<RawVerdictRecord>, ReadError>;

    async fn stake_position(&self, validator: Address) -> Result<StakePosition, ReadError>;

    /// Token stake required to appeal.
    async fn appeal_stake(&self) -> Result<u128, ReadError>;

    async fn token_balance(&self, owner: Address) -> Result<u128, ReadError>;

    async fn token_allowance(&self, owner: Address, spender: Address) -> Result<u128, ReadError>;

    /// Token balance pooled in the reward manager.
    async fn pool_balance(&self) -> Result<u128, ReadError>;

    /// Address `from` has stored for `to`. `Ok(None)` when `from` keeps no
    /// such reference.
    async fn registry_link(&self, from: RegistryKind, to: RegistryKind) -> Result<Option<Address>, ReadError>;

    /// Dry-runs `call` as `caller` without changing state.
    async fn simulate(&self, caller: Address, call: &LedgerCall) -> Result<SimulationOutcome, ReadError>;
}

/// Signing capability.
#[async_trait]
pub trait LedgerWriter: Send + Sync {
    /// The identity every submission is signed with.
    fn signer(&self) -> Address;

    /// Estimated execution cost of `call`. Failure here does not mean the
    /// call would fail.
    async fn estimate_cost(&self, call: &LedgerCall) -> Result<u64, SubmitError>;

    /// Sends `call` with the given cost ceiling. Returns as soon as the
    /// ledger accepted the transaction for inclusion.
    async fn submit(&self, call: &LedgerCall, cost_ceiling: u64) -> Result<TxHash, SubmitError>;

    /// Waits for the transaction's receipt.
    async fn await_receipt(&self, tx: &TxHash) -> Result<Confirmation, SubmitError>;
}

// ════════════════════════════════════════════════════════════════════════════════
// COMPILE-TIME ASSERTIONS
// ════════════════════════════════════════════════════════════════════════════════

const _: () = {
    fn assert_send_sync<T: Send + Sync>() {}
    fn check() {
        assert_send_sync::<LedgerCall>();
        assert_send_sync::<Rejection>();
        assert_send_sync::<SubmitError>();
    }
    let _ = check;
};
