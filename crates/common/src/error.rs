//! # Failure Taxonomy
//!
//! Every failure surfaced to the UI carries exactly one [`ErrorKind`].
//!
//! | Kind | Reaches the ledger? | Retry helps? |
//! |------|---------------------|--------------|
//! | `Precondition` | never | after fixing input/state |
//! | `AuthorizationRejected` | yes | no |
//! | `PreconditionViolatedOnChain` | yes | after a fresh read |
//! | `InsufficientFunds` | yes | after funding |
//! | `CrossRegistryMisconfiguration` | yes | no, needs an operator fix |
//! | `NetworkError` | maybe | yes, user-initiated |
//! | `Unknown` | yes | unclear |
//!
//! Nothing in this workspace retries automatically.
//!
//! [`PreconditionError`] is the client-side guard failure. It is produced
//! before any estimation, simulation or submission.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::types::{InstitutionId, ReportId, ReportStatus};

// ════════════════════════════════════════════════════════════════════════════════
// ERROR KIND
// ════════════════════════════════════════════════════════════════════════════════

/// Classification of a failed or refused action.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Client-detected; no network call was made.
    Precondition,
    AuthorizationRejected,
    /// Ledger state differs from the client's view (stale read, race).
    PreconditionViolatedOnChain,
    InsufficientFunds,
    /// Two registries disagree about each other.
    CrossRegistryMisconfiguration,
    /// Transport failure, including timeouts.
    NetworkError,
    Unknown,
}

impl ErrorKind {
    /// `true` when resubmitting the same action unchanged cannot succeed
    /// without an out-of-band fix.
    #[must_use]
    pub fn needs_operator(self) -> bool {
        matches!(
            self,
            ErrorKind::AuthorizationRejected | ErrorKind::CrossRegistryMisconfiguration
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Precondition => "PreconditionError",
            ErrorKind::AuthorizationRejected => "AuthorizationRejected",
            ErrorKind::PreconditionViolatedOnChain => "PreconditionViolatedOnChain",
            ErrorKind::InsufficientFunds => "InsufficientFunds",
            ErrorKind::CrossRegistryMisconfiguration => "CrossRegistryMisconfiguration",
            ErrorKind::NetworkError => "NetworkError",
            ErrorKind::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// PRECONDITION ERROR
// ════════════════════════════════════════════════════════════════════════════════

/// A client-side guard refused the action.
///
/// Each variant names one failed guard; the action was not sent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PreconditionError {
    /// The report is not in the state the transition starts from.
    WrongStatus {
        report_id: ReportId,
        expected: ReportStatus,
        actual: ReportStatus,
    },

    /// The report already carries the appeal flag.
    AlreadyAppealed { report_id: ReportId },

    /// The caller lacks the role the transition requires.
    Unauthorized {
        caller: Address,
        action: String,
        required: String,
    },

    /// Token balance below the required stake.
    InsufficientBalance { required: u128, available: u128 },

    UnknownInstitution(InstitutionId),

    UnknownReport(ReportId),

    /// Input failed a shape check (empty text, zero amount, zero address…).
    InvalidInput(String),
}

impl PreconditionError {
    /// Always [`ErrorKind::Precondition`].
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Precondition
    }
}

impl fmt::Display for PreconditionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PreconditionError::WrongStatus {
                report_id,
                expected,
                actual,
            } => write!(
                f,
                "report {report_id} is {actual}, transition requires {expected}"
            ),
            PreconditionError::AlreadyAppealed { report_id } => {
                write!(f, "report {report_id} has already been appealed")
            }
            PreconditionError::Unauthorized {
                caller,
                action,
                required,
            } => write!(f, "{caller} cannot {action}: requires {required}"),
            PreconditionError::InsufficientBalance { required, available } => write!(
                f,
                "insufficient token balance: required {required}, available {available}"
            ),
            PreconditionError::UnknownInstitution(id) => {
                write!(f, "institution {id} does not exist")
            }
            PreconditionError::UnknownReport(id) => write!(f, "report {id} does not exist"),
            PreconditionError::InvalidInput(reason) => write!(f, "invalid input: {reason}"),
        }
    }
}

impl std::error::Error for PreconditionError {}
