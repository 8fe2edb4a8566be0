//! # Lapor Client Library
//!
//! Orchestration, diagnosis and reconciliation layer between the Lapor UI
//! and its independently deployed ledger registries.
//!
//! ## Module Overview
//!
//! | Module | Purpose |
//! |--------|--------|
//! | `ledger` | Read/write capability traits, calls, rejections, receipts |
//! | `action` | State-changing actions and their contract calls |
//! | `lifecycle` | Report state machine and transition guards |
//! | `role` | Global role resolution, per-institution memberships, role index |
//! | `cost` | Execution-cost ceiling: estimate + margin or class fallback |
//! | `classifier` | Versioned `substring -> ErrorKind` rejection table |
//! | `orchestrator` | Precondition → cost → submit pipeline |
//! | `diagnosis` | Read-only fault localization and its renderings |
//! | `sanitizer` | Field-level repair of raw ledger responses |
//! | `reconciler` | One verdict per report with a provenance tag |
//! | `dashboard` | Concurrent report scan for the UI overview |
//! | `rpc` | JSON-RPC 2.0 gateway transport |
//! | `mock_ledger` | Deterministic in-memory ledger for tests |
//! | `client` | `LedgerClient`, the consumer surface |
//!
//! ## Error Taxonomy
//!
//! ```text
//! PreconditionError              client-side, nothing sent
//! AuthorizationRejected          caller lacks the role
//! PreconditionViolatedOnChain    ledger moved on (race, stale read)
//! InsufficientFunds              balance, allowance, pool or stake
//! CrossRegistryMisconfiguration  two registries disagree (names the pair)
//! NetworkError                   transport or timeout
//! Unknown                        nothing in the table matched
//! ```
//!
//! Nothing is retried automatically.

pub mod action;
pub mod classifier;
pub mod client;
pub mod cost;
pub mod dashboard;
pub mod diagnosis;
pub mod ledger;
pub mod lifecycle;
pub mod mock_ledger;
pub mod orchestrator;
pub mod reconciler;
pub mod role;
pub mod rpc;
pub mod sanitizer;

pub use action::{Action, Complexity, Transition};
pub use classifier::{ClassifiedFailure, FailureClassifier, RegistryPair};
pub use client::{ExecuteError, LedgerClient};
pub use cost::{CostDecision, CostPolicy, CostSource};
pub use dashboard::{Dashboard, DashboardBuilder, DashboardEntry, InstitutionSummary};
pub use diagnosis::{
    CheckStatus, Diagnosis, DiagnosisCheck, DiagnosisReport, FaultDiagnosisEngine, LinkMismatch,
};
pub use ledger::{
    CallArg, Confirmation, LedgerCall, LedgerWriter, ReadError, RegistryReader, Rejection,
    SimulationOutcome, SubmitError, TxHash,
};
pub use lifecycle::{LifecycleFacts, ReportLifecycleModel};
pub use mock_ledger::{MockLedger, MockSigner};
pub use orchestrator::{ContractCallOrchestrator, OrchestratorError, TransactionHandle};
pub use reconciler::{Provenance, ReconciledVerdict, ValidationReconciler, VerdictView};
pub use role::{Membership, RoleIndex, RoleResolver};
pub use rpc::RpcLedger;
pub use sanitizer::{FieldIssue, ResponseSanitizer, Sanitized};
