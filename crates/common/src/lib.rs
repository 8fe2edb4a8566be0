//! # Lapor Common Crate
//!
//! Shared types for the Lapor ledger client.
//!
//! ## Modules
//! - `address`: 20-byte ledger address, strict text form, EIP-55 rendering
//! - `amount`: base-unit ⇄ decimal string conversion
//! - `types`: report, institution, stake, role and registry types
//! - `record`: field-by-field decoded ledger tuples
//! - `error`: failure taxonomy and client-side precondition errors
//! - `config`: TOML configuration (deployment, cost policy, rejection table)

pub mod address;
pub mod amount;
pub mod config;
pub mod error;
pub mod record;
pub mod types;

pub use address::{looks_like_address, Address, AddressError};
pub use amount::{format_units, parse_units, AmountError, DEFAULT_TOKEN_DECIMALS};
pub use config::{
    default_links, load_from_file, AssignmentPolicy, ClientConfig, ConfigError, CostConfig,
    Deployment, ExpectedLink, RejectionRule, RejectionTable,
};
pub use error::{ErrorKind, PreconditionError};
pub use record::{Decoded, RawVerdictRecord};
pub use types::{
    Institution, InstitutionId, RegistryKind, Report, ReportId, ReportStatus, Role,
    StakePosition,
};
