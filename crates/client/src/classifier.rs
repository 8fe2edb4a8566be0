//! # Failure Classifier
//!
//! Maps ledger failures onto [`ErrorKind`] through the configured,
//! versioned [`RejectionTable`].
//!
//! | Input | Kind |
//! |-------|------|
//! | `SubmitError::Transport` / `Timeout` | `NetworkError` |
//! | rejection reason matching a rule | the rule's kind (first match) |
//! | authorization rejection raised by a registry other than the target | `CrossRegistryMisconfiguration` |
//! | anything else | `Unknown` |
//!
//! The origin upgrade covers the settlement defect: a call sent to one
//! registry is refused one hop away by a registry that only accepts calls
//! from a whitelisted peer. The refusal reads like a plain authorization
//! failure, but the pair that disagrees is `origin -> target`.

use std::fmt;

use serde::Serialize;
use tracing::debug;

use lapor_common::{ErrorKind, RegistryKind, RejectionTable};

use crate::ledger::{Rejection, SubmitError};

/// Two registries whose mutual reference is in question. Reads as "`from`
/// does not accept / does not reference `to`".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct RegistryPair {
    pub from: RegistryKind,
    pub to: RegistryKind,
}

impl RegistryPair {
    #[must_use]
    pub fn new(from: RegistryKind, to: RegistryKind) -> Self {
        Self { from, to }
    }
}

impl fmt::Display for RegistryPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}

/// A classified ledger failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassifiedFailure {
    pub kind: ErrorKind,
    /// Ledger reason string, or transport error text.
    pub reason: String,
    /// Registry the call was sent to.
    pub target: RegistryKind,
    /// Registry that raised the rejection, when known.
    pub rejected_by: Option<RegistryKind>,
    /// Set for `CrossRegistryMisconfiguration` when the pair is known.
    pub registry_pair: Option<RegistryPair>,
    /// Table pattern that matched.
    pub matched: Option<String>,
    pub table_version: String,
}

impl fmt::Display for ClassifiedFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(pair) = self.registry_pair {
            write!(f, " ({pair})")?;
        }
        match self.rejected_by {
            Some(origin) if origin != self.target => {
                write!(f, ": rejected by {origin} while calling {}: {}", self.target, self.reason)
            }
            Some(origin) => write!(f, ": rejected by {origin}: {}", self.reason),
            None => write!(f, ": {}", self.reason),
        }
    }
}

impl std::error::Error for ClassifiedFailure {}

/// Table-driven classifier.
#[derive(Debug, Clone)]
pub struct FailureClassifier {
    table: RejectionTable,
    /// Lowercased patterns, index-aligned with `table.rules`.
    lowered: Vec<String>,
}

impl FailureClassifier {
    #[must_use]
    pub fn new(table: RejectionTable) -> Self {
        let lowered = table
            .rules
            .iter()
            .map(|r| r.pattern.to_lowercase())
            .collect();
        Self { table, lowered }
    }

    #[must_use]
    pub fn table_version(&self) -> &str {
        &self.table.version
    }

    /// First matching rule for `reason`, case-insensitive.
    #[must_use]
    pub fn match_reason(&self, reason: &str) -> Option<(ErrorKind, &str)> {
        let lower = reason.to_lowercase();
        self.lowered
            .iter()
            .zip(self.table.rules.iter())
            .find(|(pattern, _)| lower.contains(pattern.as_str()))
            .map(|(_, rule)| (rule.kind, rule.pattern.as_str()))
    }

    /// Kind for a bare reason string. `Unknown` when nothing matches.
    #[must_use]
    pub fn kind_of(&self, reason: &str) -> ErrorKind {
        self.match_reason(reason)
            .map(|(kind, _)| kind)
            .unwrap_or(ErrorKind::Unknown)
    }

    /// Classifies a ledger rejection of a call sent to `target`.
    #[must_use]
    pub fn classify_rejection(&self, target: RegistryKind, rejection: &Rejection) -> ClassifiedFailure {
        let matched = self.match_reason(&rejection.reason);
        let mut kind = matched.map(|(k, _)| k).unwrap_or(ErrorKind::Unknown);
        let foreign_origin = rejection.origin.filter(|o| *o != target);

        if kind == ErrorKind::AuthorizationRejected && foreign_origin.is_some() {
            kind = ErrorKind::CrossRegistryMisconfiguration;
        }
        let registry_pair = match kind {
            ErrorKind::CrossRegistryMisconfiguration => {
                foreign_origin.map(|origin| RegistryPair::new(origin, target))
            }
            _ => None,
        };

        debug!(
            target_registry = %target,
            origin = ?rejection.origin,
            kind = %kind,
            "classified rejection"
        );

        ClassifiedFailure {
            kind,
            reason: rejection.reason.clone(),
            target,
            rejected_by: rejection.origin,
            registry_pair,
            matched: matched.map(|(_, p)| p.to_string()),
            table_version: self.table.version.clone(),
        }
    }

    /// Classifies a write-side failure.
    #[must_use]
    pub fn classify_submit(&self, target: RegistryKind, error: &SubmitError) -> ClassifiedFailure {
        match error {
            SubmitError::Rejected(rejection) => self.classify_rejection(target, rejection),
            SubmitError::Transport(_) | SubmitError::Timeout => ClassifiedFailure {
                kind: ErrorKind::NetworkError,
                reason: error.to_string(),
                target,
                rejected_by: None,
                registry_pair: None,
                matched: None,
                table_version: self.table.version.clone(),
            },
        }
    }
}

impl Default for FailureClassifier {
    fn default() -> Self {
        Self::new(RejectionTable::default())
    }
}
