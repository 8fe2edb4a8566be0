//! # Validation Reconciler
//!
//! Produces one trustworthy verdict per report out of two sources:
//!
//! - the report's `status`, always readable and authoritative for the
//!   valid/invalid boolean
//! - the validator registry's detail record, which may be missing,
//!   partially decodable, or unreadable
//!
//! | Record | Provenance | Verdict |
//! |--------|------------|---------|
//! | absent, report pending | `clean` | none |
//! | every field clean, agrees with status | `clean` | record |
//! | some fields repaired/unavailable, or boolean disagrees | `reconstructed` | sanitized record, status boolean |
//! | nothing decodable, or absent on a decided report | `fallback` | status boolean, other fields unavailable |
//!
//! The provenance tag is always part of the output. A reconstructed or
//! fallback verdict carries a validator address only when that address
//! was itself read cleanly.

use std::fmt;

use serde::Serialize;
use tracing::{debug, warn};

use lapor_common::{Address, Decoded, RawVerdictRecord, Report, ReportId, ReportStatus};

use crate::ledger::ReadError;
use crate::sanitizer::{ResponseSanitizer, Sanitized, UNAVAILABLE};

/// How far a reconciled verdict can be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Clean,
    Reconstructed,
    Fallback,
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Provenance::Clean => "clean",
            Provenance::Reconstructed => "reconstructed",
            Provenance::Fallback => "fallback",
        };
        f.write_str(s)
    }
}

/// Display-ready verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerdictView {
    pub is_valid: bool,
    /// Lowercase address text, or [`UNAVAILABLE`].
    pub validator: String,
    #[serde(skip)]
    pub validator_address: Option<Address>,
    /// Sanitized text, or [`UNAVAILABLE`].
    pub description: String,
    pub timestamp: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconciledVerdict {
    pub report_id: ReportId,
    pub status: ReportStatus,
    /// `None` only for a pending report with no record.
    pub verdict: Option<VerdictView>,
    pub provenance: Provenance,
    /// Human-readable notes on every field that was not clean.
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ValidationReconciler {
    sanitizer: ResponseSanitizer,
}

impl ValidationReconciler {
    #[must_use]
    pub fn new(sanitizer: ResponseSanitizer) -> Self {
        Self { sanitizer }
    }

    /// Reconciles `report` with the outcome of its verdict-record read.
    ///
    /// A decode failure of the whole record degrades to `fallback`; any
    /// other read error is returned unchanged.
    pub fn reconcile(
        &self,
        report: &Report,
        record: Result<Option<RawVerdictRecord>, ReadError>,
    ) -> Result<ReconciledVerdict, ReadError> {
        let record = match record {
            Ok(r) => r,
            Err(ReadError::Decode(detail)) => {
                warn!(report_id = report.id, %detail, "verdict record undecodable");
                return Ok(self.fallback(report, format!("verdict record undecodable: {detail}")));
            }
            Err(e) => return Err(e),
        };

        let Some(record) = record else {
            if report.status == ReportStatus::Pending {
                debug!(report_id = report.id, "pending report has no verdict");
                return Ok(ReconciledVerdict {
                    report_id: report.id,
                    status: report.status,
                    verdict: None,
                    provenance: Provenance::Clean,
                    notes: Vec::new(),
                });
            }
            warn!(report_id = report.id, status = %report.status, "decided report has no verdict record");
            return Ok(self.fallback(report, "no verdict record for a decided report".to_string()));
        };

        if record.is_unreadable() {
            warn!(report_id = report.id, "no verdict field decoded");
            return Ok(self.fallback(report, "no verdict field decoded".to_string()));
        }

        Ok(self.merge(report, &record))
    }

    /// Copy of `report` with title and description passed through the
    /// sanitizer. Unrecoverable text becomes [`UNAVAILABLE`].
    #[must_use]
    pub fn clean_report(&self, report: &Report) -> Report {
        let clean = |field: &'static str, text: &str| {
            self.sanitizer
                .text(field, &Decoded::Value(text.to_string()))
                .into_value()
                .unwrap_or_else(|| UNAVAILABLE.to_string())
        };
        Report {
            title: clean("report.title", &report.title),
            description: clean("report.description", &report.description),
            ..report.clone()
        }
    }

    fn fallback(&self, report: &Report, note: String) -> ReconciledVerdict {
        let verdict = report.status.implied_verdict().map(|is_valid| VerdictView {
            is_valid,
            validator: UNAVAILABLE.to_string(),
            validator_address: None,
            description: UNAVAILABLE.to_string(),
            timestamp: None,
        });
        ReconciledVerdict {
            report_id: report.id,
            status: report.status,
            verdict,
            provenance: Provenance::Fallback,
            notes: vec![note],
        }
    }

    fn merge(&self, report: &Report, record: &RawVerdictRecord) -> ReconciledVerdict {
        let s = &self.sanitizer;
        let validator = s.address("validator", &record.validator);
        let is_valid = s.boolean("is_valid", &record.is_valid);
        let description = s.text("description", &record.description);
        let timestamp = s.timestamp("timestamp", &record.timestamp);

        let mut notes = Vec::new();
        let mut note = |field: &str, outcome: Option<String>| {
            if let Some(issue) = outcome {
                notes.push(format!("{field}: {issue}"));
            }
        };
        note("validator", validator.issue().map(ToString::to_string));
        note("is_valid", is_valid.issue().map(ToString::to_string));
        note("description", description.issue().map(ToString::to_string));
        note("timestamp", timestamp.issue().map(ToString::to_string));

        let recorded = is_valid.value().copied();
        let implied = report.status.implied_verdict();
        let resolved = match (implied, recorded) {
            (Some(from_status), Some(from_record)) if from_status != from_record => {
                warn!(
                    report_id = report.id,
                    status = %report.status,
                    recorded = from_record,
                    "verdict boolean disagrees with report status"
                );
                notes.push(format!(
                    "is_valid: record says {from_record}, status {} wins",
                    report.status
                ));
                Some(from_status)
            }
            (Some(from_status), _) => Some(from_status),
            (None, _) => {
                notes.push("record present while report is pending".to_string());
                None
            }
        };

        let all_clean = validator.is_clean()
            && is_valid.is_clean()
            && description.is_clean()
            && timestamp.is_clean();
        let provenance = if all_clean && notes.is_empty() {
            Provenance::Clean
        } else {
            Provenance::Reconstructed
        };

        let verdict = resolved.map(|is_valid| {
            let validator_address = match &validator {
                Sanitized::Clean(a) => Some(*a),
                _ => None,
            };
            VerdictView {
                is_valid,
                validator: validator_address
                    .map(|a| a.to_string())
                    .unwrap_or_else(|| UNAVAILABLE.to_string()),
                validator_address,
                description: description
                    .into_value()
                    .unwrap_or_else(|| UNAVAILABLE.to_string()),
                timestamp: timestamp.into_value(),
            }
        });

        if provenance == Provenance::Clean {
            debug!(report_id = report.id, "verdict record clean");
        }

        ReconciledVerdict {
            report_id: report.id,
            status: report.status,
            verdict,
            provenance,
            notes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lapor_common::looks_like_address;

    const VALIDATOR: Address = Address::new([0xbb; 20]);

    fn report(status: ReportStatus) -> Report {
        Report {
            id: 12,
            institution_id: 1,
            title: "Flooded road".into(),
            description: "Drain blocked".into(),
            reporter: Address::repeat(0xaa),
            assigned_validator: Some(VALIDATOR),
            status,
            appealed: false,
            created_at: 1_700_000_000,
        }
    }

    fn reconciler() -> ValidationReconciler {
        ValidationReconciler::default()
    }

    #[test]
    fn clean_record_used_in_full() {
        let rec = RawVerdictRecord::decoded(VALIDATOR.to_string(), true, "Confirmed on site", 1_700_000_100);
        let out = reconciler()
            .reconcile(&report(ReportStatus::Valid), Ok(Some(rec)))
            .unwrap();
        assert_eq!(out.provenance, Provenance::Clean);
        let v = out.verdict.unwrap();
        assert!(v.is_valid);
        assert_eq!(v.validator, VALIDATOR.to_string());
        assert_eq!(v.description, "Confirmed on site");
        assert_eq!(v.timestamp, Some(1_700_000_100));
        assert!(out.notes.is_empty());
    }

    #[test]
    fn pending_without_record_is_clean_and_empty() {
        let out = reconciler()
            .reconcile(&report(ReportStatus::Pending), Ok(None))
            .unwrap();
        assert_eq!(out.provenance, Provenance::Clean);
        assert!(out.verdict.is_none());
    }

    #[test]
    fn decode_failure_falls_back_to_status() {
        let out = reconciler()
            .reconcile(
                &report(ReportStatus::Invalid),
                Err(ReadError::Decode("tuple length".into())),
            )
            .unwrap();
        assert_eq!(out.provenance, Provenance::Fallback);
        let v = out.verdict.unwrap();
        assert!(!v.is_valid);
        assert_eq!(v.validator, UNAVAILABLE);
        assert_eq!(v.description, UNAVAILABLE);
    }

    #[test]
    fn network_error_propagates() {
        let err = reconciler()
            .reconcile(&report(ReportStatus::Valid), Err(ReadError::Network("down".into())))
            .unwrap_err();
        assert!(matches!(err, ReadError::Network(_)));
    }

    #[test]
    fn impossible_address_is_reconstructed() {
        let rec = RawVerdictRecord {
            validator: Decoded::Value("0x12zz".into()),
            is_valid: Decoded::Value(true),
            description: Decoded::Value("Looks right".into()),
            timestamp: Decoded::Value(1_700_000_100),
        };
        let out = reconciler()
            .reconcile(&report(ReportStatus::Valid), Ok(Some(rec)))
            .unwrap();
        assert_eq!(out.provenance, Provenance::Reconstructed);
        let v = out.verdict.unwrap();
        assert!(v.is_valid);
        assert_eq!(v.validator, UNAVAILABLE);
        assert!(!looks_like_address(&v.validator));
        assert_eq!(v.validator_address, None);
    }

    #[test]
    fn zero_address_never_shown() {
        let rec = RawVerdictRecord::decoded(Address::ZERO.to_string(), false, "No evidence", 1_700_000_100);
        let out = reconciler()
            .reconcile(&report(ReportStatus::Invalid), Ok(Some(rec)))
            .unwrap();
        assert_eq!(out.provenance, Provenance::Reconstructed);
        assert_eq!(out.verdict.unwrap().validator, UNAVAILABLE);
    }

    #[test]
    fn status_boolean_wins_over_record() {
        let rec = RawVerdictRecord::decoded(VALIDATOR.to_string(), true, "ok", 1_700_000_100);
        let out = reconciler()
            .reconcile(&report(ReportStatus::Invalid), Ok(Some(rec)))
            .unwrap();
        assert_eq!(out.provenance, Provenance::Reconstructed);
        assert!(!out.verdict.unwrap().is_valid);
        assert!(out.notes.iter().any(|n| n.contains("status Invalid wins")));
    }

    #[test]
    fn unreadable_record_is_fallback() {
        let rec = RawVerdictRecord {
            validator: Decoded::undecodable("?"),
            is_valid: Decoded::undecodable("?"),
            description: Decoded::undecodable("?"),
            timestamp: Decoded::undecodable("?"),
        };
        let out = reconciler()
            .reconcile(&report(ReportStatus::Appealed), Ok(Some(rec)))
            .unwrap();
        assert_eq!(out.provenance, Provenance::Fallback);
        assert!(!out.verdict.unwrap().is_valid);
    }

    #[test]
    fn decided_report_without_record_is_fallback() {
        let out = reconciler()
            .reconcile(&report(ReportStatus::Valid), Ok(None))
            .unwrap();
        assert_eq!(out.provenance, Provenance::Fallback);
        assert!(out.verdict.unwrap().is_valid);
    }

    #[test]
    fn clean_report_sanitizes_free_text() {
        let mut r = report(ReportStatus::Invalid);
        r.title = format!("0x{}", "ab".repeat(40));
        r.description = "Drain blocked\u{fffd}\u{fffd}".into();
        let cleaned = reconciler().clean_report(&r);
        assert_eq!(cleaned.title, UNAVAILABLE);
        assert_eq!(cleaned.description, "Drain blocked");
        assert_eq!(cleaned.status, r.status);
        assert_eq!(cleaned.reporter, r.reporter);
    }
}
