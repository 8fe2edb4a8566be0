//! # Execute / Diagnose Commands
//!
//! - `execute <action …> [--wait] [--json]`: submit one action signed by
//!   `--signer`, optionally awaiting its receipt
//! - `diagnose <action …> [--caller <address>] [--json]`: read-only fault
//!   localization, nothing is submitted
//!
//! Every failure prints its classification. A failure that carries a
//! diagnosis prints the full diagnosis table after it. Nothing is retried.

use std::fmt::Write as _;

use anyhow::{anyhow, bail, Result};
use serde_json::json;
use tracing::info;

use lapor_client::{
    Action, Confirmation, DiagnosisReport, ExecuteError, LedgerClient, TransactionHandle,
};
use lapor_common::Address;

// ════════════════════════════════════════════════════════════════════════════════
// EXECUTE
// ════════════════════════════════════════════════════════════════════════════════

pub async fn handle_execute(
    client: &LedgerClient,
    action: Action,
    wait: bool,
    json: bool,
) -> Result<()> {
    // ── Step 1: signer ──
    if client.caller().is_zero() {
        bail!("execute needs a signer: pass --signer or set LAPOR_SIGNER");
    }

    // ── Step 2: submit ──
    let label = action.label();
    let handle = match client.execute(action).await {
        Ok(handle) => handle,
        Err(e) => {
            report_failure(&e, json)?;
            return Err(anyhow!("{label} failed ({})", e.kind()));
        }
    };

    // ── Step 3: optional confirmation ──
    let confirmation = if wait {
        match client.await_confirmation(&handle).await {
            Ok(c) => Some(c),
            Err(failure) => {
                if json {
                    let body = json!({ "handle": handle, "failure": failure });
                    println!("{}", serde_json::to_string_pretty(&body)?);
                } else {
                    print!("{}", render_handle(&handle));
                    println!("Receipt:      failed ({}) {}", failure.kind, failure.reason);
                }
                return Err(anyhow!("{label} was not confirmed ({})", failure.kind));
            }
        }
    } else {
        None
    };

    info!(action = label, tx = %handle.tx_hash, "submitted");

    if json {
        let body = json!({ "handle": handle, "confirmation": confirmation });
        println!("{}", serde_json::to_string_pretty(&body)?);
    } else {
        print!("{}", render_handle(&handle));
        if let Some(c) = &confirmation {
            println!("Receipt:      {}", render_confirmation(c));
        }
    }

    if let Some(Confirmation::Reverted { rejection }) = confirmation {
        bail!("{label} reverted: {rejection}");
    }
    Ok(())
}

fn report_failure(e: &ExecuteError, json: bool) -> Result<()> {
    if json {
        let body = match e {
            ExecuteError::Failed { failure, diagnosis } => json!({
                "kind": failure.kind,
                "error": e.to_string(),
                "failure": failure,
                "diagnosis": diagnosis,
            }),
            _ => json!({ "kind": e.kind(), "error": e.to_string() }),
        };
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    println!("Classification: {}", e.kind());
    println!("Error:          {e}");
    if let ExecuteError::Failed { failure, .. } = e {
        if let Some(pair) = &failure.registry_pair {
            println!("Registry pair:  {pair}");
        }
    }
    if let Some(d) = e.diagnosis() {
        println!();
        print!("{}", DiagnosisReport::to_table(d));
    }
    Ok(())
}

fn render_handle(handle: &TransactionHandle) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Action:       {}", handle.action);
    let _ = writeln!(out, "Transaction:  {}", handle.tx_hash);
    let _ = writeln!(out, "Call:         {}", handle.call);
    let _ = writeln!(out, "Signer:       {}", handle.submitted_by.to_checksum());
    let _ = writeln!(
        out,
        "Cost ceiling: {}{}",
        handle.cost.ceiling,
        if handle.cost.is_fallback() { " (fallback)" } else { "" }
    );
    if let Some((report, status)) = handle.expected {
        let _ = writeln!(out, "Expected:     report {report} -> {status}");
    }
    out
}

fn render_confirmation(c: &Confirmation) -> String {
    match c {
        Confirmation::Confirmed { block } => format!("confirmed in block {block}"),
        Confirmation::Reverted { rejection } => format!("reverted: {rejection}"),
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// DIAGNOSE
// ════════════════════════════════════════════════════════════════════════════════

pub async fn handle_diagnose(
    client: &LedgerClient,
    caller: Option<Address>,
    action: Action,
    json: bool,
) -> Result<()> {
    let caller = caller.unwrap_or_else(|| client.caller());
    if caller.is_zero() {
        bail!("diagnose needs a caller: pass --caller or --signer");
    }

    let diagnosis = client.diagnose(caller, &action).await;
    if json {
        println!("{}", DiagnosisReport::to_json(&diagnosis)?);
    } else {
        print!("{}", DiagnosisReport::to_table(&diagnosis));
    }
    Ok(())
}
