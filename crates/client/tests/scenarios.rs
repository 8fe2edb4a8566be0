//! Client Scenario Tests
//!
//! End-to-end scenarios through `LedgerClient` over `MockLedger`:
//! appeal lifecycle, role precedence, verdict reconciliation, cost
//! fallback and cross-registry diagnosis.

use std::sync::Arc;

use lapor_client::{
    Action, CheckStatus, Confirmation, CostPolicy, DiagnosisReport, ExecuteError, LedgerClient,
    MockLedger, Provenance, RegistryPair, RegistryReader, SubmitError,
};
use lapor_client::mock_ledger::DEFAULT_APPEAL_STAKE;
use lapor_common::{
    Address, ErrorKind, PreconditionError, RawVerdictRecord, RegistryKind, Report, ReportStatus,
    Role,
};

const ADMIN: Address = Address::new([0x0a; 20]);
const REPORTER: Address = Address::new([0x0b; 20]);
const VALIDATOR: Address = Address::new([0x0c; 20]);

fn report(id: u64, institution_id: u64, status: ReportStatus) -> Report {
    Report {
        id,
        institution_id,
        title: format!("Report {id}"),
        description: "Street light out for a week".into(),
        reporter: REPORTER,
        assigned_validator: Some(VALIDATOR),
        status,
        appealed: false,
        created_at: 1_700_000_000,
    }
}

fn institution_with_members(ledger: &MockLedger) -> u64 {
    let id = ledger.add_institution("City Works", ADMIN, Address::repeat(0x0d));
    ledger.add_validator(id, VALIDATOR);
    ledger.add_reporter(id, REPORTER);
    id
}

fn client_as(ledger: &Arc<MockLedger>, signer: Address) -> LedgerClient {
    LedgerClient::new(
        ledger.client_config(),
        Arc::clone(ledger) as Arc<dyn RegistryReader>,
        Arc::new(ledger.signer(signer)),
    )
}

// ════════════════════════════════════════════════════════════════════════════════
// A. APPEAL LIFECYCLE
// ════════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_appeal_report_seven_then_repeat_is_refused() {
    let ledger = Arc::new(MockLedger::new());
    let inst = institution_with_members(&ledger);
    ledger.insert_report(report(7, inst, ReportStatus::Invalid));
    let manager = ledger.deployment().reward_manager;
    ledger.set_balance(REPORTER, DEFAULT_APPEAL_STAKE);
    ledger.set_allowance(REPORTER, manager, DEFAULT_APPEAL_STAKE);

    let client = client_as(&ledger, REPORTER);
    let handle = client
        .execute(Action::Appeal { report_id: 7 })
        .await
        .expect("first appeal should be submitted");
    assert_eq!(handle.expected, Some((7, ReportStatus::Appealed)));
    assert!(matches!(
        client.await_confirmation(&handle).await,
        Ok(Confirmation::Confirmed { .. })
    ));

    let after = ledger.report_snapshot(7).unwrap();
    assert_eq!(after.status, ReportStatus::Appealed);
    assert!(after.appealed);
    assert_eq!(ledger.balance_of(REPORTER), 0);
    assert_eq!(ledger.pool(), DEFAULT_APPEAL_STAKE);

    let submitted_before = ledger.submitted().len();
    let err = client
        .execute(Action::Appeal { report_id: 7 })
        .await
        .unwrap_err();
    assert!(
        matches!(err, ExecuteError::Precondition(PreconditionError::AlreadyAppealed { report_id: 7 })),
        "unexpected: {err:?}"
    );
    assert_eq!(err.kind(), ErrorKind::Precondition);
    assert_eq!(ledger.submitted().len(), submitted_before, "nothing reaches the ledger");
}

#[tokio::test]
async fn test_no_direct_jump_to_appealed() {
    let ledger = Arc::new(MockLedger::new());
    let inst = institution_with_members(&ledger);
    ledger.insert_report(report(1, inst, ReportStatus::Pending));
    ledger.insert_report(report(2, inst, ReportStatus::Valid));
    ledger.set_balance(REPORTER, DEFAULT_APPEAL_STAKE * 2);

    let client = client_as(&ledger, REPORTER);
    for id in [1, 2] {
        let err = client.execute(Action::Appeal { report_id: id }).await.unwrap_err();
        assert!(matches!(
            err,
            ExecuteError::Precondition(PreconditionError::WrongStatus { .. })
        ));
    }
    assert!(ledger.submitted().is_empty());
}

#[tokio::test]
async fn test_full_appeal_settles_to_reporter() {
    let ledger = Arc::new(MockLedger::new());
    let inst = institution_with_members(&ledger);
    ledger.insert_report(report(3, inst, ReportStatus::Invalid));
    let manager = ledger.deployment().reward_manager;
    ledger.set_balance(REPORTER, DEFAULT_APPEAL_STAKE);
    ledger.set_allowance(REPORTER, manager, DEFAULT_APPEAL_STAKE);

    client_as(&ledger, REPORTER)
        .execute(Action::Appeal { report_id: 3 })
        .await
        .unwrap();
    let admin = client_as(&ledger, ADMIN);
    let handle = admin
        .execute(Action::FinalizeAppeal {
            report_id: 3,
            is_valid: true,
        })
        .await
        .unwrap();
    admin.await_confirmation(&handle).await.unwrap();

    assert_eq!(ledger.report_snapshot(3).unwrap().status, ReportStatus::Valid);
    assert_eq!(ledger.balance_of(REPORTER), DEFAULT_APPEAL_STAKE);
    assert_eq!(ledger.pool(), 0);

    // Appeal flag persists; a second appeal is impossible.
    let err = client_as(&ledger, REPORTER)
        .execute(Action::Appeal { report_id: 3 })
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ExecuteError::Precondition(PreconditionError::AlreadyAppealed { .. })
    ));
}

// ════════════════════════════════════════════════════════════════════════════════
// B. ROLE PRECEDENCE
// ════════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_admin_of_three_and_validator_of_seven_is_admin() {
    let ledger = Arc::new(MockLedger::new());
    let a = Address::repeat(0xa1);
    for n in 1..=7u8 {
        let admin = if n == 3 { a } else { Address::repeat(0x60 + n) };
        ledger.add_institution(&format!("Institution {n}"), admin, Address::repeat(0x70 + n));
    }
    ledger.add_validator(7, a);

    let client = client_as(&ledger, ADMIN);
    assert_eq!(client.resolve_role(a).await.unwrap(), Role::Admin);
    assert_eq!(client.roles().resolve_indexed(a).await.unwrap(), Role::Admin);

    let memberships = client.memberships(a).await.unwrap();
    let pairs: Vec<(u64, Role)> = memberships.iter().map(|m| (m.institution_id, m.role)).collect();
    assert_eq!(pairs, vec![(3, Role::Admin), (7, Role::Validator)]);
}

#[tokio::test]
async fn test_owner_beats_every_membership() {
    let ledger = Arc::new(MockLedger::new());
    let owner = ledger.client_config().owner;
    let inst = ledger.add_institution("Owner's own", owner, Address::repeat(0x0d));
    ledger.add_validator(inst, owner);

    let client = client_as(&ledger, ADMIN);
    assert_eq!(client.resolve_role(owner).await.unwrap(), Role::Owner);
    assert_eq!(client.resolve_role(Address::repeat(0x99)).await.unwrap(), Role::Reporter);
    assert_eq!(client.resolve_role(Address::ZERO).await.unwrap(), Role::Unknown);
}

// ════════════════════════════════════════════════════════════════════════════════
// C. RECONCILIATION
// ════════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_impossible_validator_address_is_unavailable_and_reconstructed() {
    let ledger = Arc::new(MockLedger::new());
    let inst = institution_with_members(&ledger);
    ledger.insert_report(report(5, inst, ReportStatus::Valid));
    ledger.set_verdict_record(
        5,
        RawVerdictRecord::decoded("0x12zz", false, "Fixed by the city", 1_700_000_500),
    );

    let v = client_as(&ledger, ADMIN).get_reconciled_verdict(5).await.unwrap();
    assert_eq!(v.provenance, Provenance::Reconstructed);
    let verdict = v.verdict.unwrap();
    assert!(verdict.is_valid, "status-derived boolean wins");
    assert_eq!(verdict.validator, "unavailable");
    assert!(verdict.validator_address.is_none());
}

#[tokio::test]
async fn test_undecodable_record_falls_back() {
    let ledger = Arc::new(MockLedger::new());
    let inst = institution_with_members(&ledger);
    ledger.insert_report(report(6, inst, ReportStatus::Invalid));
    ledger.fail_verdict_decode(6, "abi: cannot unmarshal");

    let v = client_as(&ledger, ADMIN).get_reconciled_verdict(6).await.unwrap();
    assert_eq!(v.provenance, Provenance::Fallback);
    let verdict = v.verdict.unwrap();
    assert!(!verdict.is_valid);
    assert_eq!(verdict.validator, "unavailable");
}

#[tokio::test]
async fn test_corrupt_report_text_does_not_fail_reads() {
    let ledger = Arc::new(MockLedger::new());
    let inst = institution_with_members(&ledger);
    ledger.insert_report(Report {
        title: format!("0x{}", "ab".repeat(40)),
        description: "Pothole\u{fffd}\u{fffd}".into(),
        ..report(8, inst, ReportStatus::Invalid)
    });
    let client = client_as(&ledger, REPORTER);

    let dashboard = client.dashboard(REPORTER).await.expect("dashboard despite corrupt text");
    let entry = dashboard
        .own_reports
        .iter()
        .find(|e| e.report.id == 8)
        .expect("own report listed");
    assert_eq!(entry.report.title, "unavailable");
    assert_eq!(entry.report.description, "Pothole");
    assert_eq!(entry.report.status, ReportStatus::Invalid);

    let v = client.get_reconciled_verdict(8).await.unwrap();
    assert!(!v.verdict.unwrap().is_valid);
}

// ════════════════════════════════════════════════════════════════════════════════
// D. COST FALLBACK
// ════════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_estimation_failure_still_submits_with_fallback_ceiling() {
    let ledger = Arc::new(MockLedger::new());
    let inst = institution_with_members(&ledger);
    ledger.insert_report(report(1, inst, ReportStatus::Pending));
    ledger.push_estimate_failure(SubmitError::Transport("estimator offline".into()));

    let client = client_as(&ledger, VALIDATOR);
    let action = Action::SubmitVerdict {
        report_id: 1,
        is_valid: true,
        description: "Verified".into(),
    };
    let expected_ceiling = CostPolicy::new(client.config().cost.clone()).fallback_ceiling(action.complexity());

    let handle = client.execute(action).await.expect("fallback must not abort");
    assert!(handle.cost.is_fallback());
    assert_eq!(handle.cost.ceiling, expected_ceiling);

    let submitted = ledger.submitted();
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].cost_ceiling, expected_ceiling);
    assert_eq!(ledger.report_snapshot(1).unwrap().status, ReportStatus::Valid);
}

// ════════════════════════════════════════════════════════════════════════════════
// E. CROSS-REGISTRY DIAGNOSIS
// ════════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_finalize_diagnosis_names_settlement_pair() {
    let ledger = Arc::new(MockLedger::new());
    let inst = institution_with_members(&ledger);
    let mut appealed = report(9, inst, ReportStatus::Appealed);
    appealed.appealed = true;
    ledger.insert_report(appealed);
    ledger.set_pool(DEFAULT_APPEAL_STAKE);
    ledger.set_link(RegistryKind::RewardManager, RegistryKind::ReportRegistry, Address::repeat(0xee));

    let client = client_as(&ledger, ADMIN);
    let action = Action::FinalizeAppeal {
        report_id: 9,
        is_valid: false,
    };
    let d = client.diagnose(ADMIN, &action).await;

    let pair = RegistryPair::new(RegistryKind::RewardManager, RegistryKind::ReportRegistry);
    assert_eq!(d.classification, Some(ErrorKind::CrossRegistryMisconfiguration));
    assert_eq!(d.registry_pair, Some(pair));
    assert_eq!(d.check("authorization").unwrap().status, CheckStatus::Passed);
    assert_eq!(d.check("lifecycle_state").unwrap().status, CheckStatus::Passed);
    assert!(d.summary().contains("RewardManager -> ReportRegistry"));
    assert!(DiagnosisReport::to_table(&d).contains("Registry pair  : RewardManager -> ReportRegistry"));
    assert!(ledger.submitted().is_empty(), "diagnosis never writes");

    // Executing the same action is refused before submission.
    let err = client.execute(action).await.unwrap_err();
    let ExecuteError::Failed { failure, diagnosis } = err else {
        panic!("expected a classified failure");
    };
    assert_eq!(failure.kind, ErrorKind::CrossRegistryMisconfiguration);
    assert_eq!(failure.registry_pair, Some(pair));
    assert_eq!(diagnosis.unwrap().registry_pair, Some(pair));
    assert!(ledger.submitted().is_empty());
}

#[tokio::test]
async fn test_revert_at_receipt_is_classified() {
    let ledger = Arc::new(MockLedger::new());
    let inst = institution_with_members(&ledger);
    ledger.insert_report(report(1, inst, ReportStatus::Pending));
    ledger.set_revert_on_receipt(true);

    // Stranger passes nothing client-side for a token transfer.
    let stranger = Address::repeat(0x55);
    let client = client_as(&ledger, stranger);
    let handle = client
        .execute(Action::TransferToken {
            to: REPORTER,
            amount: 5,
        })
        .await
        .expect("accepted for inclusion");
    let failure = client.await_confirmation(&handle).await.unwrap_err();
    assert_eq!(failure.kind, ErrorKind::Unknown);
}
