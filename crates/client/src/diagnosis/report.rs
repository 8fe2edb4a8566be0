//! # Diagnosis Rendering
//!
//! `DiagnosisReport` renders a [`Diagnosis`] in two formats:
//!
//! - **Table** ([`to_table`](DiagnosisReport::to_table)): fixed-width
//!   table for CLI output.
//! - **JSON** ([`to_json`](DiagnosisReport::to_json)): machine-readable,
//!   for logs and automation.
//!
//! Both are deterministic: same diagnosis, same output.

use std::fmt::Write as FmtWrite;

use super::Diagnosis;

/// Zero-sized renderer.
pub struct DiagnosisReport;

impl DiagnosisReport {
    /// Human-readable table: header, one row per probe in execution
    /// order, then classification and recommendation.
    #[must_use]
    pub fn to_table(diagnosis: &Diagnosis) -> String {
        let mut out = String::new();

        // ── Header ────────────────────────────────────────────────────
        let _ = writeln!(out, "Fault Diagnosis");
        let _ = writeln!(out, "═══════════════════════════════════════════════════");
        let _ = writeln!(out, "  Action : {}", diagnosis.action.label());
        let _ = writeln!(out, "  Caller : {}", diagnosis.caller);
        let _ = writeln!(out, "═══════════════════════════════════════════════════");

        // ── Checks ────────────────────────────────────────────────────
        // Minimum widths: name=10, detail=6.
        let name_width = diagnosis
            .checks
            .iter()
            .map(|c| c.name.chars().count())
            .max()
            .unwrap_or(0)
            .max(10);
        let detail_width = diagnosis
            .checks
            .iter()
            .map(|c| c.detail.as_ref().map_or(1, |d| d.chars().count()))
            .max()
            .unwrap_or(0)
            .max(6);

        let _ = writeln!(
            out,
            "  {:<name_width$}  {:<6}  {:<detail_width$}",
            "Check", "Status", "Detail",
        );
        let _ = writeln!(
            out,
            "  {:-<name_width$}  {:-<6}  {:-<detail_width$}",
            "", "", "",
        );
        for check in &diagnosis.checks {
            let detail = check.detail.as_deref().unwrap_or("-");
            let _ = writeln!(
                out,
                "  {:<name_width$}  {:<6}  {}",
                check.name,
                check.status.to_string(),
                detail,
            );
        }

        // ── Conclusion ────────────────────────────────────────────────
        let _ = writeln!(out, "═══════════════════════════════════════════════════");
        match diagnosis.classification {
            Some(kind) => {
                let _ = writeln!(out, "  Classification : {kind}");
            }
            None => {
                let _ = writeln!(out, "  Classification : none");
            }
        }
        if let Some(pair) = diagnosis.registry_pair {
            let _ = writeln!(out, "  Registry pair  : {pair}");
        }
        if let Some(by) = diagnosis.rejected_by {
            let _ = writeln!(out, "  Rejected by    : {by}");
        }
        if let Some(reason) = &diagnosis.simulated_reason {
            let _ = writeln!(out, "  Dry-run reason : {reason}");
        }
        for mismatch in &diagnosis.link_mismatches {
            let _ = writeln!(out, "  Mismatch       : {mismatch}");
        }
        let _ = writeln!(out, "  Recommendation : {}", diagnosis.recommendation);

        out
    }

    /// Pretty-printed JSON.
    pub fn to_json(diagnosis: &Diagnosis) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(diagnosis)
    }
}
