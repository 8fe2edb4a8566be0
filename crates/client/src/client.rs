//! # Ledger Client
//!
//! The surface the UI calls. Wires every component from one
//! [`ClientConfig`] plus the two capabilities handed in by the
//! environment.
//!
//! | Operation | Writes? | Component |
//! |-----------|---------|-----------|
//! | [`resolve_role`](LedgerClient::resolve_role) | no | `RoleResolver` |
//! | [`execute`](LedgerClient::execute) | yes | `ContractCallOrchestrator` (+ diagnosis) |
//! | [`diagnose`](LedgerClient::diagnose) | no | `FaultDiagnosisEngine` |
//! | [`get_reconciled_verdict`](LedgerClient::get_reconciled_verdict) | no | `ValidationReconciler` |
//! | [`await_confirmation`](LedgerClient::await_confirmation) | no | `ContractCallOrchestrator` |
//! | [`dashboard`](LedgerClient::dashboard) | no | `DashboardBuilder` |
//!
//! ## Risky actions
//!
//! Appeals and appeal finalization run a preflight diagnosis after their
//! client-side guards pass. With `block_on_preflight_misconfiguration`
//! set, a cross-registry mismatch refuses the write before submission.
//! A failed submission of a risky action, or any failure classified
//! `CrossRegistryMisconfiguration` or `Unknown`, comes back with a
//! diagnosis attached.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use lapor_common::{Address, ClientConfig, ErrorKind, PreconditionError, ReportId, Role};

use crate::action::Action;
use crate::classifier::{ClassifiedFailure, FailureClassifier};
use crate::cost::CostPolicy;
use crate::dashboard::{Dashboard, DashboardBuilder};
use crate::diagnosis::{Diagnosis, FaultDiagnosisEngine};
use crate::ledger::{methods, Confirmation, LedgerWriter, ReadError, RegistryReader};
use crate::lifecycle::ReportLifecycleModel;
use crate::orchestrator::{ContractCallOrchestrator, OrchestratorError, TransactionHandle};
use crate::reconciler::{ReconciledVerdict, ValidationReconciler};
use crate::role::{Membership, RoleResolver};
use crate::rpc::RpcLedger;
use crate::sanitizer::ResponseSanitizer;

#[derive(Debug, Clone, Error)]
pub enum ExecuteError {
    /// Client-side guard failed; nothing reached the ledger.
    #[error("precondition failed: {0}")]
    Precondition(#[from] PreconditionError),

    /// A live-state read needed by a guard failed.
    #[error("state read failed: {0}")]
    Read(#[from] ReadError),

    #[error("{failure}")]
    Failed {
        failure: ClassifiedFailure,
        diagnosis: Option<Diagnosis>,
    },
}

impl ExecuteError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExecuteError::Precondition(_) => ErrorKind::Precondition,
            ExecuteError::Read(_) => ErrorKind::NetworkError,
            ExecuteError::Failed { failure, .. } => failure.kind,
        }
    }

    #[must_use]
    pub fn diagnosis(&self) -> Option<&Diagnosis> {
        match self {
            ExecuteError::Failed { diagnosis, .. } => diagnosis.as_ref(),
            _ => None,
        }
    }
}

impl From<OrchestratorError> for ExecuteError {
    fn from(e: OrchestratorError) -> Self {
        match e {
            OrchestratorError::Precondition(p) => ExecuteError::Precondition(p),
            OrchestratorError::Read(r) => ExecuteError::Read(r),
            OrchestratorError::Submission(failure) => ExecuteError::Failed {
                failure,
                diagnosis: None,
            },
        }
    }
}

fn changes_membership(method: &str) -> bool {
    matches!(
        method,
        methods::REGISTER_INSTITUTION | methods::ADD_VALIDATOR | methods::ADD_REPORTER
    )
}

pub struct LedgerClient {
    config: ClientConfig,
    reader: Arc<dyn RegistryReader>,
    roles: Arc<RoleResolver>,
    orchestrator: ContractCallOrchestrator,
    diagnosis: FaultDiagnosisEngine,
    reconciler: ValidationReconciler,
    dashboard: DashboardBuilder,
}

impl LedgerClient {
    #[must_use]
    pub fn new(
        config: ClientConfig,
        reader: Arc<dyn RegistryReader>,
        writer: Arc<dyn LedgerWriter>,
    ) -> Self {
        let lifecycle = ReportLifecycleModel::new(config.assignment_policy);
        let classifier = FailureClassifier::new(config.rejection_table.clone());
        let roles = Arc::new(RoleResolver::new(config.owner, Arc::clone(&reader)));
        let reconciler = ValidationReconciler::new(ResponseSanitizer::default());

        let orchestrator = ContractCallOrchestrator::new(
            Arc::clone(&reader),
            writer,
            config.deployment.clone(),
            lifecycle,
            CostPolicy::new(config.cost.clone()),
            classifier.clone(),
        );
        let diagnosis = FaultDiagnosisEngine::new(
            Arc::clone(&reader),
            Arc::clone(&roles),
            config.deployment.clone(),
            lifecycle,
            classifier,
            config.expected_links.clone(),
            config.token_decimals,
            config.token_symbol.clone(),
        );
        let dashboard = DashboardBuilder::new(Arc::clone(&reader), Arc::clone(&roles), reconciler.clone());

        Self {
            config,
            reader,
            roles,
            orchestrator,
            diagnosis,
            reconciler,
            dashboard,
        }
    }

    /// Client over the JSON-RPC gateway at `config.rpc_url`, signing as
    /// `signer`.
    pub fn connect(config: ClientConfig, signer: Address) -> Result<Self, ReadError> {
        let ledger = Arc::new(RpcLedger::new(&config, signer)?);
        info!(rpc_url = %config.rpc_url, %signer, "ledger client connected");
        Ok(Self::new(
            config,
            Arc::clone(&ledger) as Arc<dyn RegistryReader>,
            ledger,
        ))
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Identity writes are signed with.
    #[must_use]
    pub fn caller(&self) -> Address {
        self.orchestrator.caller()
    }

    #[must_use]
    pub fn roles(&self) -> &RoleResolver {
        &self.roles
    }

    // ── Consumer surface ─────────────────────────────────────────────────

    /// Global role of `address` from a live scan.
    pub async fn resolve_role(&self, address: Address) -> Result<Role, ReadError> {
        self.roles.resolve(address).await
    }

    /// Every (institution, role) pair `address` holds.
    pub async fn memberships(&self, address: Address) -> Result<Vec<Membership>, ReadError> {
        self.roles.memberships(address).await
    }

    /// Submits `action` signed by [`caller`](Self::caller). Returns as
    /// soon as the ledger accepted the transaction.
    pub async fn execute(&self, action: Action) -> Result<TransactionHandle, ExecuteError> {
        let caller = self.caller();

        let mut checked = None;
        if action.is_risky() {
            let next_status = self
                .orchestrator
                .check_preconditions(caller, &action)
                .await
                .map_err(ExecuteError::from)?;

            let preflight = self.diagnosis.diagnose(caller, &action, None).await;
            if preflight.is_cross_registry() && self.config.block_on_preflight_misconfiguration {
                let failure = self.preflight_failure(&action, &preflight);
                warn!(
                    action = action.label(),
                    %caller,
                    pair = ?failure.registry_pair,
                    "write refused: registries disagree"
                );
                return Err(ExecuteError::Failed {
                    failure,
                    diagnosis: Some(preflight),
                });
            }
            checked = Some(next_status);
        }

        let submitted = match checked {
            Some(next_status) => self.orchestrator.submit_checked(&action, next_status).await,
            None => self.orchestrator.execute(&action).await,
        };
        match submitted {
            Ok(handle) => {
                if changes_membership(handle.call.method) {
                    self.roles.invalidate();
                }
                Ok(handle)
            }
            Err(OrchestratorError::Submission(failure)) => {
                let wants_diagnosis = action.is_risky()
                    || matches!(
                        failure.kind,
                        ErrorKind::CrossRegistryMisconfiguration | ErrorKind::Unknown
                    );
                let diagnosis = if wants_diagnosis {
                    Some(self.diagnosis.diagnose(caller, &action, Some(&failure)).await)
                } else {
                    None
                };
                Err(ExecuteError::Failed { failure, diagnosis })
            }
            Err(e) => Err(e.into()),
        }
    }

    fn preflight_failure(&self, action: &Action, preflight: &Diagnosis) -> ClassifiedFailure {
        let reason = match preflight.link_mismatches.first() {
            Some(m) => format!("preflight: {m}"),
            None => "preflight: registries disagree".to_string(),
        };
        ClassifiedFailure {
            kind: ErrorKind::CrossRegistryMisconfiguration,
            reason,
            target: action.target(),
            rejected_by: preflight.rejected_by,
            registry_pair: preflight.registry_pair,
            matched: None,
            table_version: self.orchestrator.classifier().table_version().to_string(),
        }
    }

    /// Read-only fault localization for `caller` performing `action`.
    pub async fn diagnose(&self, caller: Address, action: &Action) -> Diagnosis {
        self.diagnosis.diagnose(caller, action, None).await
    }

    pub async fn get_reconciled_verdict(&self, report_id: ReportId) -> Result<ReconciledVerdict, ReadError> {
        let report = self.reader.report(report_id).await?;
        let record = self.reader.verdict_record(report_id).await;
        self.reconciler.reconcile(&report, record)
    }

    /// Waits for finality of `handle`. Never resubmits.
    pub async fn await_confirmation(&self, handle: &TransactionHandle) -> Result<Confirmation, ClassifiedFailure> {
        let confirmation = self.orchestrator.await_confirmation(handle).await?;
        if changes_membership(handle.call.method) {
            self.roles.invalidate();
        }
        Ok(confirmation)
    }

    pub async fn dashboard(&self, caller: Address) -> Result<Dashboard, ReadError> {
        self.dashboard.build(caller).await
    }
}
