//! # Fault Diagnosis
//!
//! Read-only probes that localize why an action failed, or would fail.
//!
//! ## Probe order
//!
//! | # | Check | Localizes |
//! |---|-------|-----------|
//! | 1 | `role_freshness` | stale cached role |
//! | 2 | `authorization` | caller lacks the role |
//! | 3 | `lifecycle_state` | report moved on (race, stale read) |
//! | 4 | `link:<From>-><To>` | registries disagree about each other |
//! | 5 | `funds` | balance, allowance, pool or stake too low |
//! | 6 | `simulation` | most specific rejection reason |
//!
//! Every probe runs; none short-circuits the rest. A probe whose reads
//! fail is `inconclusive` rather than aborting the diagnosis.
//!
//! ## Classification precedence
//!
//! link mismatch > authorization > lifecycle > funds > simulation >
//! the submission failure that triggered the diagnosis.
//!
//! The engine never writes and never retries the action.

mod engine;
mod report;

use std::fmt;

use serde::Serialize;

use lapor_common::{Address, ErrorKind, RegistryKind};

use crate::action::Action;
use crate::classifier::RegistryPair;

pub use engine::FaultDiagnosisEngine;
pub use report::DiagnosisReport;

/// Outcome of one probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Passed,
    Failed,
    /// Not applicable to this action.
    Skipped,
    /// The probe's reads failed.
    Inconclusive,
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CheckStatus::Passed => "PASS",
            CheckStatus::Failed => "FAIL",
            CheckStatus::Skipped => "SKIP",
            CheckStatus::Inconclusive => "????",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiagnosisCheck {
    pub name: String,
    pub status: CheckStatus,
    /// Classification a failure of this probe implies.
    pub kind: Option<ErrorKind>,
    pub detail: Option<String>,
}

impl DiagnosisCheck {
    pub(crate) fn passed(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: CheckStatus::Passed,
            kind: None,
            detail: Some(detail.into()),
        }
    }

    pub(crate) fn failed(name: impl Into<String>, kind: Option<ErrorKind>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: CheckStatus::Failed,
            kind,
            detail: Some(detail.into()),
        }
    }

    pub(crate) fn skipped(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: CheckStatus::Skipped,
            kind: None,
            detail: Some(detail.into()),
        }
    }

    pub(crate) fn inconclusive(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: CheckStatus::Inconclusive,
            kind: None,
            detail: Some(detail.into()),
        }
    }
}

/// A cross-reference that does not point where the deployment says.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkMismatch {
    pub pair: RegistryPair,
    /// What `pair.from` stores. `None` when it stores nothing.
    pub configured: Option<Address>,
    /// Deployed address of `pair.to`.
    pub expected: Address,
    pub purpose: String,
}

impl fmt::Display for LinkMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.configured {
            Some(c) => write!(
                f,
                "{} stores {} for {} ({}), deployed at {}",
                self.pair.from, c, self.pair.to, self.purpose, self.expected
            ),
            None => write!(
                f,
                "{} has no reference to {} ({}), deployed at {}",
                self.pair.from, self.pair.to, self.purpose, self.expected
            ),
        }
    }
}

/// Structured result of a diagnosis run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnosis {
    pub action: Action,
    pub caller: Address,
    /// Probe results in execution order.
    pub checks: Vec<DiagnosisCheck>,
    /// `None` when no probe found a fault.
    pub classification: Option<ErrorKind>,
    /// Set for `CrossRegistryMisconfiguration`.
    pub registry_pair: Option<RegistryPair>,
    pub link_mismatches: Vec<LinkMismatch>,
    /// Registry that raised the rejection, when known.
    pub rejected_by: Option<RegistryKind>,
    /// Reason from the read-only simulation.
    pub simulated_reason: Option<String>,
    pub recommendation: String,
}

impl Diagnosis {
    #[must_use]
    pub fn failed_checks(&self) -> impl Iterator<Item = &DiagnosisCheck> {
        self.checks.iter().filter(|c| c.status == CheckStatus::Failed)
    }

    #[must_use]
    pub fn check(&self, name: &str) -> Option<&DiagnosisCheck> {
        self.checks.iter().find(|c| c.name == name)
    }

    #[must_use]
    pub fn is_cross_registry(&self) -> bool {
        self.classification == Some(ErrorKind::CrossRegistryMisconfiguration)
    }

    /// One line, e.g. `finalize_appeal by 0x0a0a…0a0a: CrossRegistryMisconfiguration (RewardManager -> ReportRegistry), 1/9 checks failed`.
    #[must_use]
    pub fn summary(&self) -> String {
        let failed = self.failed_checks().count();
        let verdict = match (self.classification, self.registry_pair) {
            (None, _) => "no fault found".to_string(),
            (Some(kind), Some(pair)) => format!("{kind} ({pair})"),
            (Some(kind), None) => kind.to_string(),
        };
        format!(
            "{} by {}: {}, {}/{} checks failed",
            self.action.label(),
            self.caller.short(),
            verdict,
            failed,
            self.checks.len()
        )
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
