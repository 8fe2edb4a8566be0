//! # Verdict Command
//!
//! `verdict <report-id> [--json]`
//!
//! Prints the reconciled verdict of one report. The provenance tag is
//! always shown; anything other than `clean` also lists the repair notes.

use std::fmt::Write as _;

use anyhow::{Context, Result};

use lapor_client::{LedgerClient, ReconciledVerdict};
use lapor_common::ReportId;

pub async fn handle_verdict(client: &LedgerClient, report_id: ReportId, json: bool) -> Result<()> {
    let verdict = client
        .get_reconciled_verdict(report_id)
        .await
        .with_context(|| format!("failed to read report {report_id}"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&verdict)?);
    } else {
        print!("{}", render(&verdict));
    }
    Ok(())
}

pub(crate) fn render(v: &ReconciledVerdict) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Report:       {}", v.report_id);
    let _ = writeln!(out, "Status:       {}", v.status);
    let _ = writeln!(out, "Provenance:   {}", v.provenance);

    match &v.verdict {
        Some(view) => {
            let _ = writeln!(
                out,
                "Verdict:      {}",
                if view.is_valid { "valid" } else { "invalid" }
            );
            let _ = writeln!(out, "Validator:    {}", view.validator);
            let _ = writeln!(out, "Description:  {}", view.description);
            match view.timestamp {
                Some(ts) => {
                    let _ = writeln!(out, "Timestamp:    {ts}");
                }
                None => {
                    let _ = writeln!(out, "Timestamp:    unavailable");
                }
            }
        }
        None => {
            let _ = writeln!(out, "Verdict:      none yet");
        }
    }

    for note in &v.notes {
        let _ = writeln!(out, "  note: {note}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use lapor_client::{Provenance, VerdictView};
    use lapor_common::ReportStatus;

    #[test]
    fn render_fallback_shows_notes_and_provenance() {
        let v = ReconciledVerdict {
            report_id: 7,
            status: ReportStatus::Invalid,
            verdict: Some(VerdictView {
                is_valid: false,
                validator: "unavailable".to_string(),
                validator_address: None,
                description: "unavailable".to_string(),
                timestamp: None,
            }),
            provenance: Provenance::Fallback,
            notes: vec!["verdict record could not be decoded".to_string()],
        };
        let text = render(&v);
        assert!(text.contains("Provenance:   fallback"));
        assert!(text.contains("Verdict:      invalid"));
        assert!(text.contains("Timestamp:    unavailable"));
        assert!(text.contains("note: verdict record could not be decoded"));
    }

    #[test]
    fn render_pending_without_verdict() {
        let v = ReconciledVerdict {
            report_id: 1,
            status: ReportStatus::Pending,
            verdict: None,
            provenance: Provenance::Clean,
            notes: Vec::new(),
        };
        let text = render(&v);
        assert!(text.contains("Verdict:      none yet"));
        assert!(text.contains("Provenance:   clean"));
    }
}
