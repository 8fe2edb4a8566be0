//! # Action Arguments
//!
//! Shared argument surface for `execute` and `diagnose`. Each subcommand
//! maps onto exactly one [`Action`].
//!
//! | Subcommand | Action |
//! |------------|--------|
//! | `submit-report --institution N --title T --description D` | `SubmitReport` |
//! | `verdict --report N --valid/--invalid --description D` | `SubmitVerdict` |
//! | `appeal --report N` | `Appeal` |
//! | `finalize --report N --valid/--invalid` | `FinalizeAppeal` |
//! | `stake <amount>` / `unstake <amount>` | `Stake` / `Unstake` |
//! | `transfer --to A <amount>` | `TransferToken` |
//! | `approve --spender A <amount>` | `ApproveToken` |
//! | `register-institution --name N --admin A --treasury A` | `RegisterInstitution` |
//! | `register-validator --institution N --validator A` | `RegisterValidator` |
//! | `register-reporter --institution N --reporter A` | `RegisterReporter` |
//!
//! Amounts are decimal token units (`"12.5"`), scaled by the configured
//! token decimals before they reach the ledger.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use lapor_client::Action;
use lapor_common::{parse_units, Address};

// ════════════════════════════════════════════════════════════════════════════════
// ARGUMENTS
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Args, Debug, Clone, Copy, PartialEq, Eq)]
#[group(required = true, multiple = false)]
pub struct VerdictFlag {
    /// Mark the report valid
    #[arg(long)]
    pub valid: bool,
    /// Mark the report invalid
    #[arg(long)]
    pub invalid: bool,
}

impl VerdictFlag {
    fn is_valid(self) -> bool {
        self.valid && !self.invalid
    }
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ActionCommand {
    /// Submit a new report to an institution
    SubmitReport {
        #[arg(long)]
        institution: u64,
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: String,
    },

    /// Record a verdict on a pending report
    Verdict {
        #[arg(long)]
        report: u64,
        #[command(flatten)]
        verdict: VerdictFlag,
        #[arg(long, default_value = "")]
        description: String,
    },

    /// Appeal an invalid verdict
    Appeal {
        #[arg(long)]
        report: u64,
    },

    /// Settle an appealed report
    Finalize {
        #[arg(long)]
        report: u64,
        #[command(flatten)]
        verdict: VerdictFlag,
    },

    /// Stake tokens as a validator
    Stake { amount: String },

    /// Withdraw staked tokens
    Unstake { amount: String },

    /// Transfer tokens
    Transfer {
        #[arg(long, value_parser = parse_address)]
        to: Address,
        amount: String,
    },

    /// Approve a token allowance
    Approve {
        #[arg(long, value_parser = parse_address)]
        spender: Address,
        amount: String,
    },

    /// Register an institution (owner only)
    RegisterInstitution {
        #[arg(long)]
        name: String,
        #[arg(long, value_parser = parse_address)]
        admin: Address,
        #[arg(long, value_parser = parse_address)]
        treasury: Address,
    },

    /// Register a validator for an institution
    RegisterValidator {
        #[arg(long)]
        institution: u64,
        #[arg(long, value_parser = parse_address)]
        validator: Address,
    },

    /// Register a reporter for an institution
    RegisterReporter {
        #[arg(long)]
        institution: u64,
        #[arg(long, value_parser = parse_address)]
        reporter: Address,
    },
}

// ════════════════════════════════════════════════════════════════════════════════
// CONVERSION
// ════════════════════════════════════════════════════════════════════════════════

impl ActionCommand {
    /// Builds the ledger action, scaling amounts by `decimals`.
    pub fn to_action(&self, decimals: u32) -> Result<Action> {
        let action = match self {
            ActionCommand::SubmitReport {
                institution,
                title,
                description,
            } => Action::SubmitReport {
                institution_id: *institution,
                title: title.clone(),
                description: description.clone(),
            },
            ActionCommand::Verdict {
                report,
                verdict,
                description,
            } => Action::SubmitVerdict {
                report_id: *report,
                is_valid: verdict.is_valid(),
                description: description.clone(),
            },
            ActionCommand::Appeal { report } => Action::Appeal { report_id: *report },
            ActionCommand::Finalize { report, verdict } => Action::FinalizeAppeal {
                report_id: *report,
                is_valid: verdict.is_valid(),
            },
            ActionCommand::Stake { amount } => Action::Stake {
                amount: amount_arg(amount, decimals)?,
            },
            ActionCommand::Unstake { amount } => Action::Unstake {
                amount: amount_arg(amount, decimals)?,
            },
            ActionCommand::Transfer { to, amount } => Action::TransferToken {
                to: *to,
                amount: amount_arg(amount, decimals)?,
            },
            ActionCommand::Approve { spender, amount } => Action::ApproveToken {
                spender: *spender,
                amount: amount_arg(amount, decimals)?,
            },
            ActionCommand::RegisterInstitution {
                name,
                admin,
                treasury,
            } => Action::RegisterInstitution {
                name: name.clone(),
                admin: *admin,
                treasury: *treasury,
            },
            ActionCommand::RegisterValidator {
                institution,
                validator,
            } => Action::RegisterValidator {
                institution_id: *institution,
                validator: *validator,
            },
            ActionCommand::RegisterReporter {
                institution,
                reporter,
            } => Action::RegisterReporter {
                institution_id: *institution,
                reporter: *reporter,
            },
        };
        Ok(action)
    }
}

/// clap value parser for `0x`-prefixed addresses.
pub fn parse_address(text: &str) -> Result<Address, String> {
    Address::parse(text.trim()).map_err(|e| format!("invalid address {text:?}: {e}"))
}

fn amount_arg(text: &str, decimals: u32) -> Result<u128> {
    parse_units(text, decimals).with_context(|| format!("invalid amount {text:?}"))
}
