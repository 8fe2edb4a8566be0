//! # Contract Call Orchestrator
//!
//! Executes one state-changing [`Action`] against the ledger.
//!
//! ## Pipeline
//!
//! ```text
//! Action
//!   │ 1. precondition    (lifecycle guards on LIVE state, or shape check)
//!   │ 2. cost ceiling    (estimate + margin, or class fallback)
//!   │ 3. submit          (returns a pending handle, never waits)
//!   │ 4. classify        (only on synchronous submission failure)
//!   ▼
//! TransactionHandle | OrchestratorError
//! ```
//!
//! A precondition failure makes no estimation, simulation or submission
//! call. Guard reads always go to the ledger; no cache is consulted.
//!
//! ## No Retry
//!
//! Every step runs once. Retrying is the user's decision.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use lapor_common::{
    Address, Deployment, ErrorKind, Institution, InstitutionId, PreconditionError, RegistryKind,
    Report, ReportId, ReportStatus,
};

use crate::action::{Action, Transition};
use crate::classifier::{ClassifiedFailure, FailureClassifier};
use crate::cost::{CostDecision, CostPolicy};
use crate::ledger::{
    Confirmation, LedgerCall, LedgerWriter, ReadError, RegistryReader, SubmitError, TxHash,
};
use crate::lifecycle::{LifecycleFacts, ReportLifecycleModel};

// ════════════════════════════════════════════════════════════════════════════════
// TYPES
// ════════════════════════════════════════════════════════════════════════════════

/// A submitted, not yet confirmed, transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionHandle {
    pub tx_hash: TxHash,
    pub action: &'static str,
    pub call: LedgerCall,
    pub cost: CostDecision,
    pub submitted_by: Address,
    /// Report and the status the transaction should move it to.
    pub expected: Option<(ReportId, ReportStatus)>,
}

#[derive(Debug, Clone, Error)]
pub enum OrchestratorError {
    #[error("precondition failed: {0}")]
    Precondition(#[from] PreconditionError),

    /// A live-state read needed by a guard failed.
    #[error("state read failed: {0}")]
    Read(#[from] ReadError),

    #[error("submission failed: {0}")]
    Submission(ClassifiedFailure),
}

impl OrchestratorError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            OrchestratorError::Precondition(_) => ErrorKind::Precondition,
            OrchestratorError::Read(_) => ErrorKind::NetworkError,
            OrchestratorError::Submission(f) => f.kind,
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// LIVE FACTS
// ════════════════════════════════════════════════════════════════════════════════

fn report_lookup(id: ReportId, result: Result<Report, ReadError>) -> Result<Report, OrchestratorError> {
    match result {
        Ok(r) => Ok(r),
        Err(ReadError::NotFound(_)) => Err(PreconditionError::UnknownReport(id).into()),
        Err(e) => Err(e.into()),
    }
}

async fn institution_lookup(
    reader: &dyn RegistryReader,
    id: InstitutionId,
) -> Result<Option<Institution>, ReadError> {
    match reader.institution(id).await {
        Ok(i) => Ok(Some(i)),
        Err(ReadError::NotFound(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Reads the live state the guards for `transition` depend on.
///
/// Missing reports and institutions surface as [`PreconditionError`];
/// other read failures as [`ReadError`].
pub async fn load_facts(
    reader: &dyn RegistryReader,
    caller: Address,
    action: &Action,
    transition: Transition,
) -> Result<LifecycleFacts, OrchestratorError> {
    let mut facts = LifecycleFacts {
        caller,
        ..LifecycleFacts::default()
    };

    if let Action::SubmitReport { institution_id, .. } = action {
        let (institution, is_reporter) = futures::try_join!(
            institution_lookup(reader, *institution_id),
            reader.is_reporter(*institution_id, caller),
        )?;
        facts.institution =
            Some(institution.ok_or(PreconditionError::UnknownInstitution(*institution_id))?);
        facts.caller_is_institution_reporter = is_reporter;
        return Ok(facts);
    }

    let Some(report_id) = action.report_id() else {
        return Ok(facts);
    };
    let report = report_lookup(report_id, reader.report(report_id).await)?;
    let institution_id = report.institution_id;

    match transition {
        Transition::Create => {}
        Transition::Verdict { .. } => {
            facts.caller_is_institution_validator =
                reader.is_validator(institution_id, caller).await?;
        }
        Transition::Appeal => {
            let (balance, stake) =
                futures::try_join!(reader.token_balance(caller), reader.appeal_stake())?;
            facts.caller_balance = balance;
            facts.required_stake = stake;
        }
        Transition::Finalize { .. } => {
            facts.institution = institution_lookup(reader, institution_id).await?;
        }
    }
    facts.report = Some(report);
    Ok(facts)
}

// ════════════════════════════════════════════════════════════════════════════════
// ORCHESTRATOR
// ════════════════════════════════════════════════════════════════════════════════

pub struct ContractCallOrchestrator {
    reader: Arc<dyn RegistryReader>,
    writer: Arc<dyn LedgerWriter>,
    deployment: Deployment,
    lifecycle: ReportLifecycleModel,
    cost: CostPolicy,
    classifier: FailureClassifier,
}

impl ContractCallOrchestrator {
    #[must_use]
    pub fn new(
        reader: Arc<dyn RegistryReader>,
        writer: Arc<dyn LedgerWriter>,
        deployment: Deployment,
        lifecycle: ReportLifecycleModel,
        cost: CostPolicy,
        classifier: FailureClassifier,
    ) -> Self {
        Self {
            reader,
            writer,
            deployment,
            lifecycle,
            cost,
            classifier,
        }
    }

    /// Identity every submission is signed with.
    #[must_use]
    pub fn caller(&self) -> Address {
        self.writer.signer()
    }

    #[must_use]
    pub fn classifier(&self) -> &FailureClassifier {
        &self.classifier
    }

    #[must_use]
    pub fn deployment(&self) -> &Deployment {
        &self.deployment
    }

    /// Step 1 alone. Returns the status a lifecycle action moves its
    /// report to.
    pub async fn check_preconditions(
        &self,
        caller: Address,
        action: &Action,
    ) -> Result<Option<ReportStatus>, OrchestratorError> {
        action.check_shape()?;
        let Some(transition) = action.transition() else {
            return Ok(None);
        };
        let facts = load_facts(self.reader.as_ref(), caller, action, transition).await?;
        let next = self.lifecycle.check(transition, &facts)?;
        Ok(Some(next))
    }

    /// Step 2 alone. Never fails.
    pub async fn resolve_cost(&self, action: &Action, call: &LedgerCall) -> CostDecision {
        match self.writer.estimate_cost(call).await {
            Ok(estimate) => self.cost.from_estimate(estimate),
            Err(e) => {
                let decision = self.cost.fallback(action.complexity(), e.to_string());
                warn!(
                    action = action.label(),
                    error = %e,
                    ceiling = decision.ceiling,
                    "cost estimation failed, using fallback ceiling"
                );
                decision
            }
        }
    }

    /// Runs the full pipeline for `action`, signed by [`caller`](Self::caller).
    pub async fn execute(&self, action: &Action) -> Result<TransactionHandle, OrchestratorError> {
        let caller = self.writer.signer();

        // ── Step 1: Preconditions on live state ────────────────────────
        let next_status = match self.check_preconditions(caller, action).await {
            Ok(next) => next,
            Err(e) => {
                warn!(action = action.label(), %caller, error = %e, "action refused before submission");
                return Err(e);
            }
        };

        self.submit_checked(action, next_status).await
    }

    /// Steps 2 to 4 for an action whose preconditions the caller already
    /// checked. `next_status` is what [`check_preconditions`](Self::check_preconditions)
    /// returned. The ledger still enforces its own guards at submission.
    pub async fn submit_checked(
        &self,
        action: &Action,
        next_status: Option<ReportStatus>,
    ) -> Result<TransactionHandle, OrchestratorError> {
        let caller = self.writer.signer();

        // ── Step 2: Cost ceiling ───────────────────────────────────────
        let call = action.to_call(&self.deployment);
        let cost = self.resolve_cost(action, &call).await;

        // ── Step 3: Submit ─────────────────────────────────────────────
        info!(
            action = action.label(),
            %caller,
            ceiling = cost.ceiling,
            fallback = cost.is_fallback(),
            "submitting {}",
            call
        );
        let tx_hash = match self.writer.submit(&call, cost.ceiling).await {
            Ok(tx) => tx,
            // ── Step 4: Classify ───────────────────────────────────────
            Err(e) => {
                let failure = self.classify(call.target, &e);
                warn!(
                    action = action.label(),
                    kind = %failure.kind,
                    reason = %failure.reason,
                    "submission failed"
                );
                return Err(OrchestratorError::Submission(failure));
            }
        };

        info!(action = action.label(), tx = %tx_hash, "submitted");
        Ok(TransactionHandle {
            tx_hash,
            action: action.label(),
            call,
            cost,
            submitted_by: caller,
            expected: action.report_id().zip(next_status),
        })
    }

    #[must_use]
    pub fn classify(&self, target: RegistryKind, error: &SubmitError) -> ClassifiedFailure {
        self.classifier.classify_submit(target, error)
    }

    /// Waits for `handle`'s receipt. A revert is classified with the same
    /// table as a synchronous rejection.
    pub async fn await_confirmation(
        &self,
        handle: &TransactionHandle,
    ) -> Result<Confirmation, ClassifiedFailure> {
        let target = handle.call.target;
        match self.writer.await_receipt(&handle.tx_hash).await {
            Ok(Confirmation::Reverted { rejection }) => {
                let failure = self.classifier.classify_rejection(target, &rejection);
                warn!(tx = %handle.tx_hash, kind = %failure.kind, "transaction reverted");
                Err(failure)
            }
            Ok(confirmed) => {
                info!(tx = %handle.tx_hash, "transaction confirmed");
                Ok(confirmed)
            }
            Err(e) => Err(self.classify(target, &e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock_ledger::MockLedger;
    use lapor_common::{AssignmentPolicy, CostConfig, RejectionTable};

    const ADMIN: Address = Address::new([0x0a; 20]);
    const REPORTER: Address = Address::new([0x0b; 20]);
    const VALIDATOR: Address = Address::new([0x0c; 20]);

    fn seeded() -> Arc<MockLedger> {
        let ledger = Arc::new(MockLedger::new());
        let inst = ledger.add_institution("Transport Agency", ADMIN, Address::repeat(0x0d));
        ledger.add_validator(inst, VALIDATOR);
        ledger.add_reporter(inst, REPORTER);
        ledger.insert_report(Report {
            id: 1,
            institution_id: inst,
            title: "Pothole".into(),
            description: "Deep pothole on 5th".into(),
            reporter: REPORTER,
            assigned_validator: Some(VALIDATOR),
            status: ReportStatus::Pending,
            appealed: false,
            created_at: 1_700_000_000,
        });
        ledger
    }

    fn orchestrator(ledger: &Arc<MockLedger>, signer: Address) -> ContractCallOrchestrator {
        ContractCallOrchestrator::new(
            Arc::clone(ledger) as Arc<dyn RegistryReader>,
            Arc::new(ledger.signer(signer)),
            ledger.deployment(),
            ReportLifecycleModel::new(AssignmentPolicy::AssignedOnly),
            CostPolicy::new(CostConfig::default()),
            FailureClassifier::new(RejectionTable::default()),
        )
    }

    #[tokio::test]
    async fn verdict_submits_with_margin() {
        let ledger = seeded();
        let o = orchestrator(&ledger, VALIDATOR);
        let handle = o
            .execute(&Action::SubmitVerdict {
                report_id: 1,
                is_valid: true,
                description: "Verified".into(),
            })
            .await
            .unwrap();
        assert!(!handle.cost.is_fallback());
        assert_eq!(handle.cost.ceiling, 172_500);
        assert_eq!(handle.expected, Some((1, ReportStatus::Valid)));
        assert_eq!(ledger.report_snapshot(1).unwrap().status, ReportStatus::Valid);
    }

    #[tokio::test]
    async fn precondition_failure_makes_no_ledger_write_calls() {
        let ledger = seeded();
        let o = orchestrator(&ledger, REPORTER);
        let err = o
            .execute(&Action::SubmitVerdict {
                report_id: 1,
                is_valid: true,
                description: "Self-validation".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::Precondition(PreconditionError::Unauthorized { .. })));
        assert_eq!(err.kind(), ErrorKind::Precondition);
        assert_eq!(ledger.estimate_calls(), 0);
        assert_eq!(ledger.simulate_calls(), 0);
        assert!(ledger.submitted().is_empty());
    }

    #[tokio::test]
    async fn unknown_report_is_precondition() {
        let ledger = seeded();
        let o = orchestrator(&ledger, REPORTER);
        let err = o.execute(&Action::Appeal { report_id: 99 }).await.unwrap_err();
        assert!(matches!(
            err,
            OrchestratorError::Precondition(PreconditionError::UnknownReport(99))
        ));
    }

    #[tokio::test]
    async fn estimation_failure_falls_back() {
        let ledger = seeded();
        ledger.push_estimate_failure(SubmitError::Transport("estimator refused".into()));
        let o = orchestrator(&ledger, VALIDATOR);
        let handle = o
            .execute(&Action::SubmitVerdict {
                report_id: 1,
                is_valid: false,
                description: "Duplicate".into(),
            })
            .await
            .unwrap();
        assert!(handle.cost.is_fallback());
        assert_eq!(handle.cost.ceiling, CostConfig::default().heavy_ceiling);
        assert_eq!(ledger.submitted().len(), 1);
    }

    #[tokio::test]
    async fn submission_failure_is_classified() {
        let ledger = seeded();
        ledger.push_submit_failure(SubmitError::Timeout);
        let o = orchestrator(&ledger, VALIDATOR);
        let err = o
            .execute(&Action::SubmitVerdict {
                report_id: 1,
                is_valid: true,
                description: "ok".into(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NetworkError);
    }

    #[tokio::test]
    async fn ledger_rejection_of_stale_view() {
        let ledger = seeded();
        ledger.set_balance(REPORTER, 10);
        let o = orchestrator(&ledger, REPORTER);
        // No guard covers token transfers beyond shape; the ledger refuses.
        let err = o
            .execute(&Action::TransferToken {
                to: ADMIN,
                amount: 50,
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientFunds);
    }

    #[tokio::test]
    async fn revert_at_receipt_is_classified() {
        let ledger = seeded();
        ledger.set_revert_on_receipt(true);
        ledger.set_balance(REPORTER, 10);
        let o = orchestrator(&ledger, REPORTER);
        let handle = o
            .execute(&Action::TransferToken {
                to: ADMIN,
                amount: 50,
            })
            .await;
        // The estimator sees the revert, the fallback ceiling is used and
        // the transaction is accepted.
        let handle = handle.unwrap();
        assert!(handle.cost.is_fallback());
        let failure = o.await_confirmation(&handle).await.unwrap_err();
        assert_eq!(failure.kind, ErrorKind::Unknown);
        assert_eq!(failure.reason, "execution reverted");
    }
}
