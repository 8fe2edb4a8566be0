//! # Report Lifecycle Model
//!
//! Pure state machine over [`ReportStatus`]. No I/O: callers gather a
//! [`LifecycleFacts`] snapshot from live ledger state and ask the model
//! whether the requested [`Transition`] is allowed.
//!
//! ```text
//!            verdict             appeal              finalize
//!  Pending ──────────► Invalid ─────────► Appealed ──────────► Valid | Invalid
//!     │
//!     └──── verdict ──► Valid
//! ```
//!
//! | Transition | From | Caller | Extra guards |
//! |------------|------|--------|--------------|
//! | Create | - | registered reporter of the institution | institution exists |
//! | Verdict | Pending | assigned validator (policy-dependent) | - |
//! | Appeal | Invalid | original reporter | not yet appealed, balance ≥ stake |
//! | Finalize | Appealed | institution admin | - |
//!
//! Guard order is fixed: state guards run before caller guards, and the
//! appeal flag is checked before the status so a repeated appeal reports
//! `AlreadyAppealed` rather than a status mismatch.

use lapor_common::{
    Address, AssignmentPolicy, Institution, PreconditionError, Report, ReportStatus,
};

use crate::action::Transition;

/// Live-state snapshot the guards are evaluated against.
#[derive(Debug, Clone, Default)]
pub struct LifecycleFacts {
    pub caller: Address,
    /// The report the transition applies to. `None` for `Create`.
    pub report: Option<Report>,
    /// The report's institution (or the target institution for `Create`).
    /// `None` when it does not exist.
    pub institution: Option<Institution>,
    pub caller_is_institution_validator: bool,
    pub caller_is_institution_reporter: bool,
    /// Caller's token balance. Only read for appeals.
    pub caller_balance: u128,
    /// Token stake an appeal requires. Only read for appeals.
    pub required_stake: u128,
}

/// The report state machine and its transition guards.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportLifecycleModel {
    policy: AssignmentPolicy,
}

impl ReportLifecycleModel {
    #[must_use]
    pub fn new(policy: AssignmentPolicy) -> Self {
        Self { policy }
    }

    #[must_use]
    pub fn policy(&self) -> AssignmentPolicy {
        self.policy
    }

    /// Statuses reachable from `from` in one step.
    #[must_use]
    pub fn allowed_transitions(from: ReportStatus) -> &'static [ReportStatus] {
        match from {
            ReportStatus::Pending => &[ReportStatus::Valid, ReportStatus::Invalid],
            ReportStatus::Invalid => &[ReportStatus::Appealed],
            ReportStatus::Appealed => &[ReportStatus::Valid, ReportStatus::Invalid],
            ReportStatus::Valid => &[],
        }
    }

    #[must_use]
    pub fn is_edge(from: ReportStatus, to: ReportStatus) -> bool {
        Self::allowed_transitions(from).contains(&to)
    }

    /// Status a transition starts from. `None` for `Create`.
    #[must_use]
    pub fn source_status(transition: Transition) -> Option<ReportStatus> {
        match transition {
            Transition::Create => None,
            Transition::Verdict { .. } => Some(ReportStatus::Pending),
            Transition::Appeal => Some(ReportStatus::Invalid),
            Transition::Finalize { .. } => Some(ReportStatus::Appealed),
        }
    }

    /// Status a transition ends in.
    #[must_use]
    pub fn target_status(transition: Transition) -> ReportStatus {
        match transition {
            Transition::Create => ReportStatus::Pending,
            Transition::Verdict { is_valid } | Transition::Finalize { is_valid } => {
                if is_valid {
                    ReportStatus::Valid
                } else {
                    ReportStatus::Invalid
                }
            }
            Transition::Appeal => ReportStatus::Appealed,
        }
    }

    /// State guards only: report existence, appeal flag, source status.
    pub fn check_state(
        &self,
        transition: Transition,
        facts: &LifecycleFacts,
    ) -> Result<(), PreconditionError> {
        let Some(expected) = Self::source_status(transition) else {
            return Ok(());
        };
        let Some(report) = facts.report.as_ref() else {
            return Err(PreconditionError::InvalidInput(
                "transition requires a report".to_string(),
            ));
        };

        if transition == Transition::Appeal && report.appealed {
            return Err(PreconditionError::AlreadyAppealed {
                report_id: report.id,
            });
        }

        if report.status != expected {
            return Err(PreconditionError::WrongStatus {
                report_id: report.id,
                expected,
                actual: report.status,
            });
        }
        Ok(())
    }

    /// Caller guards: role for the transition and, for appeals, balance.
    pub fn check_caller(
        &self,
        transition: Transition,
        facts: &LifecycleFacts,
    ) -> Result<(), PreconditionError> {
        let caller = facts.caller;
        let unauthorized = |action: &str, required: &str| PreconditionError::Unauthorized {
            caller,
            action: action.to_string(),
            required: required.to_string(),
        };

        match transition {
            Transition::Create => {
                let institution = facts.institution.as_ref().ok_or_else(|| {
                    PreconditionError::InvalidInput("institution is unknown".to_string())
                })?;
                if !facts.caller_is_institution_reporter {
                    return Err(unauthorized(
                        "submit a report",
                        &format!("registered reporter of institution {}", institution.id),
                    ));
                }
            }
            Transition::Verdict { .. } => {
                let report = Self::report(facts)?;
                let allowed = match (self.policy, report.assigned_validator) {
                    (AssignmentPolicy::AssignedOnly, Some(assigned)) => caller == assigned,
                    (AssignmentPolicy::AssignedOnly, None) => facts.caller_is_institution_validator,
                    (AssignmentPolicy::AnyInstitutionValidator, assigned) => {
                        facts.caller_is_institution_validator || assigned == Some(caller)
                    }
                };
                if !allowed {
                    let required = match (self.policy, report.assigned_validator) {
                        (AssignmentPolicy::AssignedOnly, Some(assigned)) => {
                            format!("assigned validator {assigned}")
                        }
                        _ => format!(
                            "registered validator of institution {}",
                            report.institution_id
                        ),
                    };
                    return Err(unauthorized("submit a verdict", &required));
                }
            }
            Transition::Appeal => {
                let report = Self::report(facts)?;
                if caller != report.reporter {
                    return Err(unauthorized("appeal", "the original reporter"));
                }
                if facts.caller_balance < facts.required_stake {
                    return Err(PreconditionError::InsufficientBalance {
                        required: facts.required_stake,
                        available: facts.caller_balance,
                    });
                }
            }
            Transition::Finalize { .. } => {
                let report = Self::report(facts)?;
                let institution = facts
                    .institution
                    .as_ref()
                    .ok_or(PreconditionError::UnknownInstitution(report.institution_id))?;
                if caller != institution.admin {
                    return Err(unauthorized(
                        "finalize an appeal",
                        &format!("admin of institution {}", institution.id),
                    ));
                }
            }
        }
        Ok(())
    }

    /// All guards, in order. Returns the status the report moves to.
    pub fn check(
        &self,
        transition: Transition,
        facts: &LifecycleFacts,
    ) -> Result<ReportStatus, PreconditionError> {
        self.check_state(transition, facts)?;
        self.check_caller(transition, facts)?;
        Ok(Self::target_status(transition))
    }

    fn report(facts: &LifecycleFacts) -> Result<&Report, PreconditionError> {
        facts.report.as_ref().ok_or_else(|| {
            PreconditionError::InvalidInput("transition requires a report".to_string())
        })
    }
}
