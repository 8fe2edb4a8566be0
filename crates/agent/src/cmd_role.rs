//! # Role Command
//!
//! `role <address> [--json]`
//!
//! Prints the global role (owner > admin > validator > reporter) and
//! every per-institution membership behind it.

use std::fmt::Write as _;

use anyhow::{Context, Result};
use serde::Serialize;

use lapor_client::{LedgerClient, Membership};
use lapor_common::{Address, Role};

#[derive(Debug, Serialize)]
struct RoleOutput {
    address: String,
    checksum: String,
    role: Role,
    memberships: Vec<Membership>,
}

pub async fn handle_role(client: &LedgerClient, address: Address, json: bool) -> Result<()> {
    let (role, memberships) = tokio::try_join!(
        client.resolve_role(address),
        client.memberships(address),
    )
    .with_context(|| format!("failed to resolve role of {address}"))?;

    let output = RoleOutput {
        address: address.to_string(),
        checksum: address.to_checksum(),
        role,
        memberships,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print!("{}", render(&output));
    }
    Ok(())
}

fn render(output: &RoleOutput) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Address:      {}", output.checksum);
    let _ = writeln!(out, "Role:         {}", output.role);
    if output.memberships.is_empty() {
        let _ = writeln!(out, "Memberships:  none");
    } else {
        let _ = writeln!(out, "Memberships:");
        for m in &output.memberships {
            let _ = writeln!(out, "  institution {:<6} {}", m.institution_id, m.role);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_lists_every_membership() {
        let output = RoleOutput {
            address: Address::repeat(0x0a).to_string(),
            checksum: Address::repeat(0x0a).to_checksum(),
            role: Role::Admin,
            memberships: vec![
                Membership {
                    institution_id: 3,
                    role: Role::Admin,
                },
                Membership {
                    institution_id: 7,
                    role: Role::Validator,
                },
            ],
        };
        let text = render(&output);
        assert!(text.contains("Role:         admin"));
        assert!(text.contains("institution 3      admin"));
        assert!(text.contains("institution 7      validator"));
    }

    #[test]
    fn render_without_memberships() {
        let output = RoleOutput {
            address: Address::ZERO.to_string(),
            checksum: Address::ZERO.to_checksum(),
            role: Role::Unknown,
            memberships: Vec::new(),
        };
        assert!(render(&output).contains("Memberships:  none"));
    }
}
