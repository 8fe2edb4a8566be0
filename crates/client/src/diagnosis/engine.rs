//! Probe execution and classification.

use std::sync::Arc;

use tracing::{debug, info};

use lapor_common::{
    format_units, Address, Deployment, ErrorKind, ExpectedLink, PreconditionError, RegistryKind,
    Role,
};

use crate::action::Action;
use crate::classifier::{ClassifiedFailure, FailureClassifier, RegistryPair};
use crate::ledger::{ReadError, RegistryReader, SimulationOutcome};
use crate::lifecycle::{LifecycleFacts, ReportLifecycleModel};
use crate::orchestrator::{load_facts, OrchestratorError};
use crate::role::RoleResolver;

use super::{CheckStatus, Diagnosis, DiagnosisCheck, LinkMismatch};

const ROLE_FRESHNESS: &str = "role_freshness";
const AUTHORIZATION: &str = "authorization";
const LIFECYCLE_STATE: &str = "lifecycle_state";
const FUNDS: &str = "funds";
const SIMULATION: &str = "simulation";

/// Facts load outcome shared by the authorization and lifecycle probes.
enum FactsOutcome {
    NotLifecycle,
    Loaded(LifecycleFacts),
    Missing(PreconditionError),
    Unreadable(ReadError),
}

pub struct FaultDiagnosisEngine {
    reader: Arc<dyn RegistryReader>,
    roles: Arc<RoleResolver>,
    deployment: Deployment,
    lifecycle: ReportLifecycleModel,
    classifier: FailureClassifier,
    expected_links: Vec<ExpectedLink>,
    token_decimals: u32,
    token_symbol: String,
}

impl FaultDiagnosisEngine {
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        reader: Arc<dyn RegistryReader>,
        roles: Arc<RoleResolver>,
        deployment: Deployment,
        lifecycle: ReportLifecycleModel,
        classifier: FailureClassifier,
        expected_links: Vec<ExpectedLink>,
        token_decimals: u32,
        token_symbol: String,
    ) -> Self {
        Self {
            reader,
            roles,
            deployment,
            lifecycle,
            classifier,
            expected_links,
            token_decimals,
            token_symbol,
        }
    }

    fn amount(&self, value: u128) -> String {
        format!("{} {}", format_units(value, self.token_decimals), self.token_symbol)
    }

    /// Runs every probe for `caller` performing `action`.
    ///
    /// `failure` is the classified submission failure that prompted the
    /// run, if any. It is the classification of last resort.
    pub async fn diagnose(
        &self,
        caller: Address,
        action: &Action,
        failure: Option<&ClassifiedFailure>,
    ) -> Diagnosis {
        let mut checks = Vec::new();

        // ════════════════════════════════════════════════════════════
        // CHECK 1: Role freshness
        // ════════════════════════════════════════════════════════════
        let cached = self.roles.cached(&caller);
        let (freshness, stale) = self.probe_role_freshness(caller, cached).await;
        checks.push(freshness);

        // ════════════════════════════════════════════════════════════
        // CHECK 2 + 3: Authorization and lifecycle on fresh state
        // ════════════════════════════════════════════════════════════
        let facts = match action.transition() {
            None => FactsOutcome::NotLifecycle,
            Some(t) => match load_facts(self.reader.as_ref(), caller, action, t).await {
                Ok(f) => FactsOutcome::Loaded(f),
                Err(OrchestratorError::Precondition(e)) => FactsOutcome::Missing(e),
                Err(OrchestratorError::Read(e)) => FactsOutcome::Unreadable(e),
                Err(OrchestratorError::Submission(f)) => {
                    FactsOutcome::Unreadable(ReadError::Network(f.reason))
                }
            },
        };
        checks.push(self.probe_authorization(caller, action, &facts).await);
        checks.push(self.probe_lifecycle(action, &facts));

        // ════════════════════════════════════════════════════════════
        // CHECK 4: Registry cross-references
        // ════════════════════════════════════════════════════════════
        let mut mismatches = Vec::new();
        for link in self.relevant_links(action) {
            let (check, mismatch) = self.probe_link(link).await;
            checks.push(check);
            mismatches.extend(mismatch);
        }

        // ════════════════════════════════════════════════════════════
        // CHECK 5: Funds
        // ════════════════════════════════════════════════════════════
        checks.push(self.probe_funds(caller, action).await);

        // ════════════════════════════════════════════════════════════
        // CHECK 6: Simulation of the exact call
        // ════════════════════════════════════════════════════════════
        let call = action.to_call(&self.deployment);
        let simulated = match self.reader.simulate(caller, &call).await {
            Ok(SimulationOutcome::WouldSucceed) => {
                checks.push(DiagnosisCheck::passed(SIMULATION, "dry run succeeds"));
                None
            }
            Ok(SimulationOutcome::WouldRevert(rejection)) => {
                let classified = self.classifier.classify_rejection(call.target, &rejection);
                checks.push(DiagnosisCheck::failed(
                    SIMULATION,
                    Some(classified.kind),
                    rejection.to_string(),
                ));
                Some(classified)
            }
            Err(e) => {
                checks.push(DiagnosisCheck::inconclusive(SIMULATION, e.to_string()));
                None
            }
        };

        for c in &checks {
            debug!(check = %c.name, status = %c.status, detail = ?c.detail, "diagnosis probe");
        }

        let diagnosis = self.conclude(caller, action, checks, mismatches, simulated, failure, stale);
        info!(summary = %diagnosis.summary(), "diagnosis complete");
        diagnosis
    }

    #[allow(clippy::too_many_arguments)]
    fn conclude(
        &self,
        caller: Address,
        action: &Action,
        checks: Vec<DiagnosisCheck>,
        mismatches: Vec<LinkMismatch>,
        simulated: Option<ClassifiedFailure>,
        failure: Option<&ClassifiedFailure>,
        stale_role: bool,
    ) -> Diagnosis {
        let first_failed_kind = |name: &str| {
            checks
                .iter()
                .find(|c| c.name == name && c.status == CheckStatus::Failed)
                .and_then(|c| c.kind)
        };

        let classification = if !mismatches.is_empty() {
            Some(ErrorKind::CrossRegistryMisconfiguration)
        } else {
            first_failed_kind(AUTHORIZATION)
                .or_else(|| first_failed_kind(LIFECYCLE_STATE))
                .or_else(|| first_failed_kind(FUNDS))
                .or_else(|| simulated.as_ref().map(|s| s.kind))
                .or_else(|| failure.map(|f| f.kind))
        };

        // Prefer the pair the rejection itself names when a link probe
        // confirms it.
        let named_pair = simulated
            .as_ref()
            .and_then(|s| s.registry_pair)
            .or_else(|| failure.and_then(|f| f.registry_pair));
        let registry_pair = match classification {
            Some(ErrorKind::CrossRegistryMisconfiguration) => named_pair
                .filter(|p| mismatches.iter().any(|m| m.pair == *p))
                .or_else(|| mismatches.first().map(|m| m.pair))
                .or(named_pair),
            _ => None,
        };

        let rejected_by = simulated
            .as_ref()
            .and_then(|s| s.rejected_by)
            .or_else(|| failure.and_then(|f| f.rejected_by));
        let simulated_reason = simulated.as_ref().map(|s| s.reason.clone());

        let recommendation = self.recommend(
            classification,
            registry_pair,
            &mismatches,
            &checks,
            simulated_reason.as_deref().or(failure.map(|f| f.reason.as_str())),
            stale_role,
        );

        Diagnosis {
            action: action.clone(),
            caller,
            checks,
            classification,
            registry_pair,
            link_mismatches: mismatches,
            rejected_by,
            simulated_reason,
            recommendation,
        }
    }

    fn recommend(
        &self,
        classification: Option<ErrorKind>,
        pair: Option<RegistryPair>,
        mismatches: &[LinkMismatch],
        checks: &[DiagnosisCheck],
        reason: Option<&str>,
        stale_role: bool,
    ) -> String {
        let detail_of = |kind: ErrorKind| {
            checks
                .iter()
                .find(|c| c.status == CheckStatus::Failed && c.kind == Some(kind))
                .and_then(|c| c.detail.clone())
                .unwrap_or_default()
        };

        let inconclusive = checks
            .iter()
            .filter(|c| c.status == CheckStatus::Inconclusive)
            .count();

        let mut text = match classification {
            None if inconclusive > 0 => format!(
                "Could not verify: {inconclusive} of {} checks inconclusive. Check ledger connectivity and diagnose again before relying on this result.",
                checks.len()
            ),
            None => "No fault found; the action is expected to succeed.".to_string(),
            Some(ErrorKind::CrossRegistryMisconfiguration) => {
                let mismatch = pair.and_then(|p| mismatches.iter().find(|m| m.pair == p));
                match (pair, mismatch) {
                    (Some(p), Some(m)) => format!(
                        "{} does not accept {} ({}). {}. An operator must re-point {}'s reference to {} at {}; resubmitting will not help.",
                        p.from, p.to, m.purpose, m, p.from, p.to, m.expected
                    ),
                    (Some(p), None) => format!(
                        "{} rejected a call relayed by {}. The registries disagree about each other; an operator must fix the reference, resubmitting will not help.",
                        p.from, p.to
                    ),
                    (None, _) => "Registries disagree about each other; an operator must fix the deployment, resubmitting will not help.".to_string(),
                }
            }
            Some(ErrorKind::AuthorizationRejected) => format!(
                "The caller is not authorized: {}. Use an account holding the required role.",
                detail_of(ErrorKind::AuthorizationRejected)
            ),
            Some(ErrorKind::PreconditionViolatedOnChain) => format!(
                "Ledger state differs from the client's view: {}. Refresh before deciding whether to retry.",
                detail_of(ErrorKind::PreconditionViolatedOnChain)
            ),
            Some(ErrorKind::InsufficientFunds) => format!(
                "{}. Fund the account or raise the allowance, then retry.",
                detail_of(ErrorKind::InsufficientFunds)
            ),
            Some(ErrorKind::NetworkError) => {
                "The ledger could not be reached. Retry once connectivity returns.".to_string()
            }
            Some(ErrorKind::Precondition) => {
                "The action failed a client-side guard; fix the input and retry.".to_string()
            }
            Some(ErrorKind::Unknown) => format!(
                "The ledger refused the call without a recognised reason ({}). Escalate with this diagnosis attached.",
                reason.unwrap_or("no reason given")
            ),
        };
        if stale_role {
            text.push_str(" The session's cached role was stale; reload it.");
        }
        text
    }

    // ── Probes ───────────────────────────────────────────────────────────

    async fn probe_role_freshness(&self, caller: Address, cached: Option<Role>) -> (DiagnosisCheck, bool) {
        let fresh = match self.roles.resolve(caller).await {
            Ok(role) => role,
            Err(e) => return (DiagnosisCheck::inconclusive(ROLE_FRESHNESS, e.to_string()), false),
        };
        match cached {
            None => (
                DiagnosisCheck::skipped(ROLE_FRESHNESS, format!("no cached role; ledger says {fresh}")),
                false,
            ),
            Some(c) if c == fresh => (DiagnosisCheck::passed(ROLE_FRESHNESS, format!("role {fresh}")), false),
            Some(c) => (
                DiagnosisCheck::failed(
                    ROLE_FRESHNESS,
                    None,
                    format!("cached role {c}, ledger says {fresh}"),
                ),
                true,
            ),
        }
    }

    async fn probe_authorization(&self, caller: Address, action: &Action, facts: &FactsOutcome) -> DiagnosisCheck {
        match facts {
            FactsOutcome::Loaded(f) => {
                let Some(t) = action.transition() else {
                    return DiagnosisCheck::skipped(AUTHORIZATION, "not a lifecycle action");
                };
                // Balance is the funds probe's concern.
                let f = LifecycleFacts {
                    caller_balance: u128::MAX,
                    ..f.clone()
                };
                match self.lifecycle.check_caller(t, &f) {
                    Ok(()) => DiagnosisCheck::passed(AUTHORIZATION, "caller holds the required role"),
                    Err(e) => DiagnosisCheck::failed(
                        AUTHORIZATION,
                        Some(ErrorKind::AuthorizationRejected),
                        e.to_string(),
                    ),
                }
            }
            FactsOutcome::Missing(e) => DiagnosisCheck::skipped(AUTHORIZATION, e.to_string()),
            FactsOutcome::Unreadable(e) => DiagnosisCheck::inconclusive(AUTHORIZATION, e.to_string()),
            FactsOutcome::NotLifecycle => self.probe_registration_authority(caller, action).await,
        }
    }

    /// Authorization for non-lifecycle actions.
    async fn probe_registration_authority(&self, caller: Address, action: &Action) -> DiagnosisCheck {
        let owner = self.roles.owner();
        match action {
            Action::RegisterInstitution { .. } => {
                if caller == owner {
                    DiagnosisCheck::passed(AUTHORIZATION, "caller is the owner")
                } else {
                    DiagnosisCheck::failed(
                        AUTHORIZATION,
                        Some(ErrorKind::AuthorizationRejected),
                        format!("{caller} is not the owner"),
                    )
                }
            }
            Action::RegisterValidator { institution_id, .. }
            | Action::RegisterReporter { institution_id, .. } => {
                match self.reader.institution(*institution_id).await {
                    Ok(i) if caller == i.admin || caller == owner => {
                        DiagnosisCheck::passed(AUTHORIZATION, format!("caller administers institution {}", i.id))
                    }
                    Ok(i) => DiagnosisCheck::failed(
                        AUTHORIZATION,
                        Some(ErrorKind::AuthorizationRejected),
                        format!("{caller} is not admin of institution {}", i.id),
                    ),
                    Err(ReadError::NotFound(_)) => DiagnosisCheck::failed(
                        AUTHORIZATION,
                        Some(ErrorKind::PreconditionViolatedOnChain),
                        format!("institution {institution_id} does not exist"),
                    ),
                    Err(e) => DiagnosisCheck::inconclusive(AUTHORIZATION, e.to_string()),
                }
            }
            _ => DiagnosisCheck::skipped(AUTHORIZATION, "no role required"),
        }
    }

    fn probe_lifecycle(&self, action: &Action, facts: &FactsOutcome) -> DiagnosisCheck {
        match facts {
            FactsOutcome::NotLifecycle => DiagnosisCheck::skipped(LIFECYCLE_STATE, "not a lifecycle action"),
            FactsOutcome::Unreadable(e) => DiagnosisCheck::inconclusive(LIFECYCLE_STATE, e.to_string()),
            FactsOutcome::Missing(e) => DiagnosisCheck::failed(
                LIFECYCLE_STATE,
                Some(ErrorKind::PreconditionViolatedOnChain),
                e.to_string(),
            ),
            FactsOutcome::Loaded(f) => {
                let Some(t) = action.transition() else {
                    return DiagnosisCheck::skipped(LIFECYCLE_STATE, "not a lifecycle action");
                };
                match self.lifecycle.check_state(t, f) {
                    Ok(()) => {
                        let detail = match &f.report {
                            Some(r) => format!("report {} is {}", r.id, r.status),
                            None => "institution exists".to_string(),
                        };
                        DiagnosisCheck::passed(LIFECYCLE_STATE, detail)
                    }
                    Err(e) => DiagnosisCheck::failed(
                        LIFECYCLE_STATE,
                        Some(ErrorKind::PreconditionViolatedOnChain),
                        e.to_string(),
                    ),
                }
            }
        }
    }

    fn relevant_links(&self, action: &Action) -> Vec<&ExpectedLink> {
        let involved = action.involved_registries();
        self.expected_links
            .iter()
            .filter(|l| involved.contains(&l.from) && involved.contains(&l.to))
            .collect()
    }

    async fn probe_link(&self, link: &ExpectedLink) -> (DiagnosisCheck, Option<LinkMismatch>) {
        let name = format!("link:{}->{}", link.from, link.to);
        let expected = self.deployment.address_of(link.to);
        let configured = match self.reader.registry_link(link.from, link.to).await {
            Ok(c) => c,
            Err(e) => return (DiagnosisCheck::inconclusive(name, e.to_string()), None),
        };
        if configured == Some(expected) {
            return (DiagnosisCheck::passed(name, format!("{} ({})", expected, link.purpose)), None);
        }
        let mismatch = LinkMismatch {
            pair: RegistryPair::new(link.from, link.to),
            configured,
            expected,
            purpose: link.purpose.clone(),
        };
        (
            DiagnosisCheck::failed(
                name,
                Some(ErrorKind::CrossRegistryMisconfiguration),
                mismatch.to_string(),
            ),
            Some(mismatch),
        )
    }

    async fn probe_funds(&self, caller: Address, action: &Action) -> DiagnosisCheck {
        match self.funds_shortfall(caller, action).await {
            Ok(None) => DiagnosisCheck::skipped(FUNDS, "no funds involved"),
            Ok(Some(Ok(detail))) => DiagnosisCheck::passed(FUNDS, detail),
            Ok(Some(Err(detail))) => {
                DiagnosisCheck::failed(FUNDS, Some(ErrorKind::InsufficientFunds), detail)
            }
            Err(e) => DiagnosisCheck::inconclusive(FUNDS, e.to_string()),
        }
    }

    /// `None`: not applicable. `Some(Ok)`: sufficient. `Some(Err)`: short.
    async fn funds_shortfall(
        &self,
        caller: Address,
        action: &Action,
    ) -> Result<Option<Result<String, String>>, ReadError> {
        let r = self.reader.as_ref();
        let manager = self.deployment.reward_manager;
        let verdict = match action {
            Action::Appeal { .. } => {
                let (stake, balance, allowance) = futures::try_join!(
                    r.appeal_stake(),
                    r.token_balance(caller),
                    r.token_allowance(caller, manager)
                )?;
                if balance < stake {
                    Err(format!(
                        "balance {} below appeal stake {}",
                        self.amount(balance),
                        self.amount(stake)
                    ))
                } else if allowance < stake {
                    Err(format!(
                        "{} allowance {} below appeal stake {}",
                        RegistryKind::RewardManager,
                        self.amount(allowance),
                        self.amount(stake)
                    ))
                } else {
                    Ok(format!("balance and allowance cover stake {}", self.amount(stake)))
                }
            }
            Action::FinalizeAppeal { .. } => {
                let (stake, pool) = futures::try_join!(r.appeal_stake(), r.pool_balance())?;
                if pool < stake {
                    Err(format!(
                        "reward pool holds {}, settlement needs {}",
                        self.amount(pool),
                        self.amount(stake)
                    ))
                } else {
                    Ok(format!("reward pool holds {}", self.amount(pool)))
                }
            }
            Action::Stake { amount } => {
                let (balance, allowance) =
                    futures::try_join!(r.token_balance(caller), r.token_allowance(caller, manager))?;
                if balance < *amount {
                    Err(format!("balance {} below {}", self.amount(balance), self.amount(*amount)))
                } else if allowance < *amount {
                    Err(format!(
                        "{} allowance {} below {}",
                        RegistryKind::RewardManager,
                        self.amount(allowance),
                        self.amount(*amount)
                    ))
                } else {
                    Ok(format!("balance covers {}", self.amount(*amount)))
                }
            }
            Action::Unstake { amount } => {
                let position = r.stake_position(caller).await?;
                if position.staked < *amount {
                    Err(format!(
                        "staked {} below {}",
                        self.amount(position.staked),
                        self.amount(*amount)
                    ))
                } else {
                    Ok(format!("staked {}", self.amount(position.staked)))
                }
            }
            Action::TransferToken { amount, .. } => {
                let balance = r.token_balance(caller).await?;
                if balance < *amount {
                    Err(format!("balance {} below {}", self.amount(balance), self.amount(*amount)))
                } else {
                    Ok(format!("balance covers {}", self.amount(*amount)))
                }
            }
            Action::SubmitVerdict { .. } => {
                let position = r.stake_position(caller).await?;
                if position.is_active() {
                    Ok(format!("validator active, staked {}", self.amount(position.staked)))
                } else {
                    Err(format!(
                        "validator inactive: staked {}, minimum {}",
                        self.amount(position.staked),
                        self.amount(position.minimum)
                    ))
                }
            }
            _ => return Ok(None),
        };
        Ok(Some(verdict))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock_ledger::{MockLedger, DEFAULT_APPEAL_STAKE, MOCK_OWNER};
    use lapor_common::{default_links, AssignmentPolicy, Report, ReportStatus};

    const ADMIN: Address = Address::new([0x0a; 20]);
    const REPORTER: Address = Address::new([0x0b; 20]);
    const VALIDATOR: Address = Address::new([0x0c; 20]);

    fn ledger_with(status: ReportStatus, appealed: bool) -> Arc<MockLedger> {
        let ledger = Arc::new(MockLedger::new());
        let inst = ledger.add_institution("Health Office", ADMIN, Address::repeat(0x0d));
        ledger.add_validator(inst, VALIDATOR);
        ledger.add_reporter(inst, REPORTER);
        ledger.insert_report(Report {
            id: 4,
            institution_id: inst,
            title: "Clinic closed".into(),
            description: "Closed during hours".into(),
            reporter: REPORTER,
            assigned_validator: Some(VALIDATOR),
            status,
            appealed,
            created_at: 1_700_000_000,
        });
        ledger
    }

    fn engine(ledger: &Arc<MockLedger>) -> (FaultDiagnosisEngine, Arc<RoleResolver>) {
        let reader = Arc::clone(ledger) as Arc<dyn RegistryReader>;
        let roles = Arc::new(RoleResolver::new(MOCK_OWNER, Arc::clone(&reader)));
        let engine = FaultDiagnosisEngine::new(
            reader,
            Arc::clone(&roles),
            ledger.deployment(),
            ReportLifecycleModel::new(AssignmentPolicy::AssignedOnly),
            FailureClassifier::default(),
            default_links(),
            18,
            "LPR".into(),
        );
        (engine, roles)
    }

    #[tokio::test]
    async fn clean_finalize_has_no_fault() {
        let ledger = ledger_with(ReportStatus::Appealed, true);
        ledger.set_pool(DEFAULT_APPEAL_STAKE);
        let (e, _) = engine(&ledger);
        let d = e
            .diagnose(ADMIN, &Action::FinalizeAppeal { report_id: 4, is_valid: true }, None)
            .await;
        assert_eq!(d.classification, None, "{}", d.summary());
        assert_eq!(d.check(SIMULATION).unwrap().status, CheckStatus::Passed);
        assert!(d.recommendation.starts_with("No fault found"), "{}", d.recommendation);
        assert_eq!(ledger.submitted().len(), 0);
    }

    #[tokio::test]
    async fn finalize_with_broken_settlement_link_names_pair() {
        let ledger = ledger_with(ReportStatus::Appealed, true);
        ledger.set_pool(DEFAULT_APPEAL_STAKE);
        ledger.set_link(RegistryKind::RewardManager, RegistryKind::ReportRegistry, Address::repeat(0xee));
        let (e, _) = engine(&ledger);
        let d = e
            .diagnose(ADMIN, &Action::FinalizeAppeal { report_id: 4, is_valid: true }, None)
            .await;
        assert_eq!(d.classification, Some(ErrorKind::CrossRegistryMisconfiguration));
        assert_eq!(
            d.registry_pair,
            Some(RegistryPair::new(RegistryKind::RewardManager, RegistryKind::ReportRegistry))
        );
        assert_eq!(d.rejected_by, Some(RegistryKind::RewardManager));
        assert!(d.recommendation.contains("RewardManager"));
        assert_eq!(
            d.check("link:RewardManager->ReportRegistry").unwrap().status,
            CheckStatus::Failed
        );
    }

    #[tokio::test]
    async fn wrong_caller_is_authorization() {
        let ledger = ledger_with(ReportStatus::Appealed, true);
        ledger.set_pool(DEFAULT_APPEAL_STAKE);
        let (e, _) = engine(&ledger);
        let d = e
            .diagnose(REPORTER, &Action::FinalizeAppeal { report_id: 4, is_valid: true }, None)
            .await;
        assert_eq!(d.classification, Some(ErrorKind::AuthorizationRejected));
        assert!(d.registry_pair.is_none());
    }

    #[tokio::test]
    async fn raced_status_is_on_chain_precondition() {
        let ledger = ledger_with(ReportStatus::Valid, true);
        let (e, _) = engine(&ledger);
        let d = e
            .diagnose(ADMIN, &Action::FinalizeAppeal { report_id: 4, is_valid: false }, None)
            .await;
        assert_eq!(d.classification, Some(ErrorKind::PreconditionViolatedOnChain));
        assert!(d.recommendation.contains("Refresh"));
    }

    #[tokio::test]
    async fn empty_pool_is_insufficient_funds() {
        let ledger = ledger_with(ReportStatus::Appealed, true);
        let (e, _) = engine(&ledger);
        let d = e
            .diagnose(ADMIN, &Action::FinalizeAppeal { report_id: 4, is_valid: true }, None)
            .await;
        assert_eq!(d.classification, Some(ErrorKind::InsufficientFunds));
        let funds = d.check(FUNDS).unwrap();
        assert!(funds.detail.as_deref().unwrap().contains("reward pool holds 0 LPR"));
    }

    #[tokio::test]
    async fn appeal_without_allowance() {
        let ledger = ledger_with(ReportStatus::Invalid, false);
        ledger.set_balance(REPORTER, DEFAULT_APPEAL_STAKE);
        let (e, _) = engine(&ledger);
        let d = e.diagnose(REPORTER, &Action::Appeal { report_id: 4 }, None).await;
        assert_eq!(d.classification, Some(ErrorKind::InsufficientFunds));
        assert!(d.check(FUNDS).unwrap().detail.as_deref().unwrap().contains("allowance"));
    }

    #[tokio::test]
    async fn stale_cached_role_is_reported() {
        let ledger = ledger_with(ReportStatus::Pending, false);
        let (e, roles) = engine(&ledger);
        let outsider = Address::repeat(0x77);
        roles.resolve(outsider).await.unwrap();
        ledger.add_validator(1, outsider);

        let d = e.diagnose(outsider, &Action::Stake { amount: 1 }, None).await;
        let check = d.check(ROLE_FRESHNESS).unwrap();
        assert_eq!(check.status, CheckStatus::Failed);
        assert!(check.detail.as_deref().unwrap().contains("cached role reporter"));
        assert!(d.recommendation.contains("stale"));
    }

    #[tokio::test]
    async fn unreadable_ledger_is_inconclusive_not_error() {
        let ledger = ledger_with(ReportStatus::Appealed, true);
        ledger.fail_reads("gateway down");
        let (e, _) = engine(&ledger);
        let d = e
            .diagnose(ADMIN, &Action::FinalizeAppeal { report_id: 4, is_valid: true }, None)
            .await;
        assert!(d
            .checks
            .iter()
            .all(|c| c.status == CheckStatus::Inconclusive));
        assert_eq!(d.classification, None);
        assert!(
            d.recommendation
                .starts_with(&format!("Could not verify: {n} of {n} checks inconclusive", n = d.checks.len())),
            "{}",
            d.recommendation
        );
        assert!(!d.recommendation.contains("expected to succeed"));
    }

    #[tokio::test]
    async fn submission_failure_is_last_resort() {
        let ledger = ledger_with(ReportStatus::Appealed, true);
        ledger.set_pool(DEFAULT_APPEAL_STAKE);
        ledger.fail_reads("gateway down");
        let (e, _) = engine(&ledger);
        let failure = FailureClassifier::default().classify_submit(
            RegistryKind::ReportRegistry,
            &crate::ledger::SubmitError::Timeout,
        );
        let d = e
            .diagnose(ADMIN, &Action::FinalizeAppeal { report_id: 4, is_valid: true }, Some(&failure))
            .await;
        assert_eq!(d.classification, Some(ErrorKind::NetworkError));
    }
}
