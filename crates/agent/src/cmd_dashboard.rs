//! # Dashboard Command
//!
//! `dashboard [--address <address>] [--institution N] [--json]`
//!
//! Scans every report once and prints per-institution status counts,
//! the caller's own reports with verdict provenance, and stake
//! eligibility.

use std::fmt::Write as _;

use anyhow::{bail, Context, Result};

use lapor_client::{Dashboard, LedgerClient, Provenance};
use lapor_common::{format_units, Address, InstitutionId};

pub async fn handle_dashboard(
    client: &LedgerClient,
    address: Option<Address>,
    institution: Option<InstitutionId>,
    json: bool,
) -> Result<()> {
    let caller = address.unwrap_or_else(|| client.caller());
    if caller.is_zero() {
        bail!("dashboard needs an address: pass --address or --signer");
    }

    let mut dashboard = client
        .dashboard(caller)
        .await
        .context("failed to build dashboard")?;

    if let Some(id) = institution {
        dashboard.institutions.retain(|s| s.institution_id == id);
        dashboard.own_reports.retain(|e| e.report.institution_id == id);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&dashboard)?);
    } else {
        let cfg = client.config();
        print!("{}", render(&dashboard, cfg.token_decimals, &cfg.token_symbol));
    }
    Ok(())
}

fn render(d: &Dashboard, decimals: u32, symbol: &str) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "Caller:          {}", d.caller.to_checksum());
    let _ = writeln!(out, "Role:            {}", d.role);
    let _ = writeln!(out, "Reports scanned: {}", d.reports_scanned);
    let _ = writeln!(
        out,
        "Stake:           {} {symbol} (minimum {} {symbol}, {})",
        format_units(d.stake.staked, decimals),
        format_units(d.stake.minimum, decimals),
        if d.validator_eligible() { "eligible" } else { "not eligible" }
    );

    // ── Institutions ──
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "{:<12} {:>8} {:>8} {:>8} {:>8} {:>8}",
        "Institution", "Pending", "Valid", "Invalid", "Appealed", "Total"
    );
    for s in &d.institutions {
        let _ = writeln!(
            out,
            "{:<12} {:>8} {:>8} {:>8} {:>8} {:>8}",
            s.institution_id,
            s.pending,
            s.valid,
            s.invalid,
            s.appealed,
            s.total()
        );
    }

    // ── Own reports ──
    let _ = writeln!(out);
    if d.own_reports.is_empty() {
        let _ = writeln!(out, "No reports involve this address.");
        return out;
    }
    let _ = writeln!(
        out,
        "{:<8} {:<12} {:<10} {:<14} Title",
        "Report", "Institution", "Status", "Provenance"
    );
    for e in &d.own_reports {
        let marker = if e.verdict.provenance == Provenance::Clean { "" } else { " *" };
        let _ = writeln!(
            out,
            "{:<8} {:<12} {:<10} {:<14} {}{marker}",
            e.report.id,
            e.report.institution_id,
            e.report.status.to_string(),
            e.verdict.provenance.to_string(),
            e.report.title
        );
    }
    if d.degraded().next().is_some() {
        let _ = writeln!(out, "* verdict detail was repaired or unavailable; see `verdict <id>`");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use lapor_client::{LedgerWriter, MockLedger, RegistryReader};
    use lapor_common::{Report, ReportStatus};

    const ADMIN: Address = Address::new([0x0a; 20]);
    const REPORTER: Address = Address::new([0x0b; 20]);

    fn report(id: u64, institution_id: u64, status: ReportStatus) -> Report {
        Report {
            id,
            institution_id,
            title: format!("Report {id}"),
            description: "details".to_string(),
            reporter: REPORTER,
            assigned_validator: None,
            status,
            appealed: false,
            created_at: 1_700_000_000,
        }
    }

    #[tokio::test]
    async fn render_counts_and_marks_degraded_verdicts() {
        let ledger = Arc::new(MockLedger::new());
        let inst = ledger.add_institution("Transport", ADMIN, Address::repeat(0x0d));
        ledger.add_reporter(inst, REPORTER);
        ledger.insert_report(report(1, inst, ReportStatus::Pending));
        ledger.insert_report(report(2, inst, ReportStatus::Invalid));
        ledger.fail_verdict_decode(2, "bad tuple");
        ledger.set_minimum_stake(1_000);

        let client = LedgerClient::new(
            ledger.client_config(),
            Arc::clone(&ledger) as Arc<dyn RegistryReader>,
            Arc::new(ledger.signer(REPORTER)) as Arc<dyn LedgerWriter>,
        );
        let dashboard = client.dashboard(REPORTER).await.unwrap();
        let text = render(&dashboard, 18, "LPR");

        assert!(text.contains("Role:            reporter"));
        assert!(text.contains("Reports scanned: 2"));
        assert!(text.contains("Report 2 *"));
        assert!(text.contains("fallback"));
        assert!(text.contains("not eligible"));
    }
}
