//! # Lapor Agent CLI
//!
//! Operator command line for the Lapor ledger client.
//!
//! ## Commands
//!
//! ### Read
//! - `role <address>`: Global role plus every per-institution membership
//! - `verdict <report-id>`: Reconciled verdict with its provenance tag
//! - `dashboard`: Per-institution counts, own reports, stake eligibility
//!   - `--address`: Address to build the dashboard for (default: signer)
//!   - `--institution`: Restrict output to one institution
//!
//! ### Write
//! - `execute <action …>`: Submit one action signed by `--signer`
//!   - `--wait`: Await the receipt
//!
//! ### Diagnosis
//! - `diagnose <action …>`: Read-only fault localization
//!   - `--caller`: Address to diagnose for (default: signer)
//!
//! Every command accepts `--json`.
//!
//! ## Environment Variables
//!
//! - `LAPOR_CONFIG`: Config file path
//! - `LAPOR_RPC_URL`: Ledger gateway endpoint (default: http://127.0.0.1:8545)
//! - `LAPOR_SIGNER`: Address writes are signed as
//! - `RUST_LOG`: Log filter (default: info)

mod cmd_action;
mod cmd_dashboard;
mod cmd_execute;
mod cmd_role;
mod cmd_verdict;
mod settings;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use lapor_common::{Address, InstitutionId, ReportId};

use crate::cmd_action::{parse_address, ActionCommand};

#[derive(Parser)]
#[command(version, about = "Lapor Agent CLI")]
struct Cli {
    /// Config file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Ledger gateway endpoint
    #[arg(long, global = true)]
    rpc_url: Option<String>,

    /// Address writes are signed as
    #[arg(long, global = true, env = "LAPOR_SIGNER", value_parser = parse_address)]
    signer: Option<Address>,

    /// Log filter, overrides RUST_LOG
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve the role of an address
    Role {
        #[arg(value_parser = parse_address)]
        address: Address,
    },

    /// Show the reconciled verdict of a report
    Verdict { report_id: ReportId },

    /// Submit an action to the ledger
    Execute {
        /// Await the receipt before returning
        #[arg(long)]
        wait: bool,
        #[command(subcommand)]
        action: ActionCommand,
    },

    /// Diagnose an action without submitting it
    Diagnose {
        /// Address to diagnose for (default: signer)
        #[arg(long, value_parser = parse_address)]
        caller: Option<Address>,
        #[command(subcommand)]
        action: ActionCommand,
    },

    /// Overview of reports, memberships and stake
    Dashboard {
        /// Address to build the dashboard for (default: signer)
        #[arg(long, value_parser = parse_address)]
        address: Option<Address>,
        /// Restrict output to one institution
        #[arg(long)]
        institution: Option<InstitutionId>,
    },
}

fn init_tracing(level: Option<&str>) {
    let filter = match level {
        Some(directive) => EnvFilter::new(directive),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref());

    let cfg = settings::load_config(cli.config, cli.rpc_url.as_deref())?;
    let decimals = cfg.token_decimals;
    let client = settings::connect(cfg, cli.signer.unwrap_or(Address::ZERO))?;

    match cli.cmd {
        Commands::Role { address } => cmd_role::handle_role(&client, address, cli.json).await,
        Commands::Verdict { report_id } => {
            cmd_verdict::handle_verdict(&client, report_id, cli.json).await
        }
        Commands::Execute { wait, action } => {
            let action = action.to_action(decimals)?;
            cmd_execute::handle_execute(&client, action, wait, cli.json).await
        }
        Commands::Diagnose { caller, action } => {
            let action = action.to_action(decimals)?;
            cmd_execute::handle_diagnose(&client, caller, action, cli.json).await
        }
        Commands::Dashboard {
            address,
            institution,
        } => cmd_dashboard::handle_dashboard(&client, address, institution, cli.json).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn execute_parses_nested_action() {
        let cli = Cli::try_parse_from([
            "lapor-agent",
            "--json",
            "execute",
            "--wait",
            "appeal",
            "--report",
            "7",
        ])
        .unwrap();
        assert!(cli.json);
        match cli.cmd {
            Commands::Execute { wait, action } => {
                assert!(wait);
                assert_eq!(action, ActionCommand::Appeal { report: 7 });
            }
            _ => panic!("expected execute"),
        }
    }

    #[test]
    fn finalize_requires_exactly_one_verdict_flag() {
        let both = Cli::try_parse_from([
            "lapor-agent",
            "diagnose",
            "finalize",
            "--report",
            "7",
            "--valid",
            "--invalid",
        ]);
        assert!(both.is_err());

        let neither =
            Cli::try_parse_from(["lapor-agent", "diagnose", "finalize", "--report", "7"]);
        assert!(neither.is_err());
    }

    #[test]
    fn role_rejects_malformed_address() {
        assert!(Cli::try_parse_from(["lapor-agent", "role", "0x12zz"]).is_err());
    }
}
