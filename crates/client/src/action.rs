//! # Actions
//!
//! Every state-changing operation the UI can request, with its
//! parameters. Lifecycle actions map onto a [`Transition`] of the report
//! state machine; the rest only get an input-shape check before
//! submission.
//!
//! | Action | Registry | Lifecycle | Complexity |
//! |--------|----------|-----------|------------|
//! | `SubmitReport` | ReportRegistry | create | heavy |
//! | `SubmitVerdict` | ValidatorRegistry | Pending → Valid/Invalid | heavy |
//! | `Appeal` | ReportRegistry | Invalid → Appealed | heavy |
//! | `FinalizeAppeal` | ReportRegistry | Appealed → Valid/Invalid | heavy |
//! | `Stake` / `Unstake` | RewardManager | - | standard |
//! | `TransferToken` / `ApproveToken` | Token | - | simple |
//! | `RegisterInstitution` | InstitutionRegistry | - | standard |
//! | `RegisterValidator` / `RegisterReporter` | InstitutionRegistry | - | standard |

use serde::{Deserialize, Serialize};

use lapor_common::{Address, Deployment, InstitutionId, PreconditionError, RegistryKind, ReportId};

use crate::ledger::{methods, CallArg, LedgerCall};

/// Cost class used for the fallback ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    Simple,
    Standard,
    Heavy,
}

/// Report state-machine edge an action asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    /// A new report enters `Pending`.
    Create,
    /// `Pending → Valid | Invalid`.
    Verdict { is_valid: bool },
    /// `Invalid → Appealed`.
    Appeal,
    /// `Appealed → Valid | Invalid`.
    Finalize { is_valid: bool },
}

/// A state-changing request together with its parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    SubmitReport {
        institution_id: InstitutionId,
        title: String,
        description: String,
    },
    SubmitVerdict {
        report_id: ReportId,
        is_valid: bool,
        description: String,
    },
    Appeal {
        report_id: ReportId,
    },
    FinalizeAppeal {
        report_id: ReportId,
        is_valid: bool,
    },
    Stake {
        amount: u128,
    },
    Unstake {
        amount: u128,
    },
    TransferToken {
        to: Address,
        amount: u128,
    },
    ApproveToken {
        spender: Address,
        amount: u128,
    },
    RegisterInstitution {
        name: String,
        admin: Address,
        treasury: Address,
    },
    RegisterValidator {
        institution_id: InstitutionId,
        validator: Address,
    },
    RegisterReporter {
        institution_id: InstitutionId,
        reporter: Address,
    },
}

impl Action {
    /// Short name for logs and diagnostics.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Action::SubmitReport { .. } => "submit_report",
            Action::SubmitVerdict { .. } => "submit_verdict",
            Action::Appeal { .. } => "appeal",
            Action::FinalizeAppeal { .. } => "finalize_appeal",
            Action::Stake { .. } => "stake",
            Action::Unstake { .. } => "unstake",
            Action::TransferToken { .. } => "transfer_token",
            Action::ApproveToken { .. } => "approve_token",
            Action::RegisterInstitution { .. } => "register_institution",
            Action::RegisterValidator { .. } => "register_validator",
            Action::RegisterReporter { .. } => "register_reporter",
        }
    }

    /// State-machine edge, for lifecycle actions.
    #[must_use]
    pub fn transition(&self) -> Option<Transition> {
        match self {
            Action::SubmitReport { .. } => Some(Transition::Create),
            Action::SubmitVerdict { is_valid, .. } => Some(Transition::Verdict { is_valid: *is_valid }),
            Action::Appeal { .. } => Some(Transition::Appeal),
            Action::FinalizeAppeal { is_valid, .. } => Some(Transition::Finalize { is_valid: *is_valid }),
            _ => None,
        }
    }

    /// Report the action operates on.
    #[must_use]
    pub fn report_id(&self) -> Option<ReportId> {
        match self {
            Action::SubmitVerdict { report_id, .. }
            | Action::Appeal { report_id }
            | Action::FinalizeAppeal { report_id, .. } => Some(*report_id),
            _ => None,
        }
    }

    #[must_use]
    pub fn complexity(&self) -> Complexity {
        match self {
            Action::TransferToken { .. } | Action::ApproveToken { .. } => Complexity::Simple,
            Action::Stake { .. }
            | Action::Unstake { .. }
            | Action::RegisterInstitution { .. }
            | Action::RegisterValidator { .. }
            | Action::RegisterReporter { .. } => Complexity::Standard,
            Action::SubmitReport { .. }
            | Action::SubmitVerdict { .. }
            | Action::Appeal { .. }
            | Action::FinalizeAppeal { .. } => Complexity::Heavy,
        }
    }

    /// Actions that move pooled funds through a second registry. These
    /// get a preflight diagnosis.
    #[must_use]
    pub fn is_risky(&self) -> bool {
        matches!(self, Action::Appeal { .. } | Action::FinalizeAppeal { .. })
    }

    /// Registry the call is sent to.
    #[must_use]
    pub fn target(&self) -> RegistryKind {
        match self {
            Action::SubmitReport { .. } | Action::Appeal { .. } | Action::FinalizeAppeal { .. } => {
                RegistryKind::ReportRegistry
            }
            Action::SubmitVerdict { .. } => RegistryKind::ValidatorRegistry,
            Action::Stake { .. } | Action::Unstake { .. } => RegistryKind::RewardManager,
            Action::TransferToken { .. } | Action::ApproveToken { .. } => RegistryKind::Token,
            Action::RegisterInstitution { .. }
            | Action::RegisterValidator { .. }
            | Action::RegisterReporter { .. } => RegistryKind::InstitutionRegistry,
        }
    }

    /// Every registry the call reaches, directly or one hop away.
    #[must_use]
    pub fn involved_registries(&self) -> Vec<RegistryKind> {
        use RegistryKind::*;
        match self {
            Action::SubmitReport { .. } => vec![ReportRegistry, InstitutionRegistry],
            Action::SubmitVerdict { .. } => {
                vec![ValidatorRegistry, ReportRegistry, InstitutionRegistry, RewardManager]
            }
            Action::Appeal { .. } | Action::FinalizeAppeal { .. } => {
                vec![ReportRegistry, InstitutionRegistry, RewardManager, Token]
            }
            Action::Stake { .. } | Action::Unstake { .. } => vec![RewardManager, Token],
            Action::TransferToken { .. } | Action::ApproveToken { .. } => vec![Token],
            Action::RegisterInstitution { .. }
            | Action::RegisterValidator { .. }
            | Action::RegisterReporter { .. } => vec![InstitutionRegistry],
        }
    }

    /// Input-shape check. Makes no ledger call.
    pub fn check_shape(&self) -> Result<(), PreconditionError> {
        fn non_blank(field: &str, value: &str) -> Result<(), PreconditionError> {
            if value.trim().is_empty() {
                return Err(PreconditionError::InvalidInput(format!("{field} is empty")));
            }
            Ok(())
        }
        fn positive_id(field: &str, id: u64) -> Result<(), PreconditionError> {
            if id == 0 {
                return Err(PreconditionError::InvalidInput(format!("{field} must be positive")));
            }
            Ok(())
        }
        fn positive_amount(amount: u128) -> Result<(), PreconditionError> {
            if amount == 0 {
                return Err(PreconditionError::InvalidInput("amount must be positive".to_string()));
            }
            Ok(())
        }
        fn non_zero(field: &str, address: &Address) -> Result<(), PreconditionError> {
            if address.is_zero() {
                return Err(PreconditionError::InvalidInput(format!("{field} is the zero address")));
            }
            Ok(())
        }

        match self {
            Action::SubmitReport {
                institution_id,
                title,
                description,
            } => {
                positive_id("institution id", *institution_id)?;
                non_blank("title", title)?;
                non_blank("description", description)
            }
            Action::SubmitVerdict {
                report_id,
                description,
                ..
            } => {
                positive_id("report id", *report_id)?;
                non_blank("verdict description", description)
            }
            Action::Appeal { report_id } | Action::FinalizeAppeal { report_id, .. } => {
                positive_id("report id", *report_id)
            }
            Action::Stake { amount } | Action::Unstake { amount } => positive_amount(*amount),
            Action::TransferToken { to, amount } => {
                non_zero("recipient", to)?;
                positive_amount(*amount)
            }
            Action::ApproveToken { spender, .. } => non_zero("spender", spender),
            Action::RegisterInstitution {
                name,
                admin,
                treasury,
            } => {
                non_blank("institution name", name)?;
                non_zero("admin", admin)?;
                non_zero("treasury", treasury)
            }
            Action::RegisterValidator {
                institution_id,
                validator: member,
            }
            | Action::RegisterReporter {
                institution_id,
                reporter: member,
            } => {
                positive_id("institution id", *institution_id)?;
                non_zero("member", member)
            }
        }
    }

    /// Builds the concrete contract call against `deployment`.
    #[must_use]
    pub fn to_call(&self, deployment: &Deployment) -> LedgerCall {
        let (method, args) = match self {
            Action::SubmitReport {
                institution_id,
                title,
                description,
            } => (
                methods::CREATE_REPORT,
                vec![
                    CallArg::Uint(u128::from(*institution_id)),
                    CallArg::Text(title.clone()),
                    CallArg::Text(description.clone()),
                ],
            ),
            Action::SubmitVerdict {
                report_id,
                is_valid,
                description,
            } => (
                methods::VALIDATE_REPORT,
                vec![
                    CallArg::Uint(u128::from(*report_id)),
                    CallArg::Bool(*is_valid),
                    CallArg::Text(description.clone()),
                ],
            ),
            Action::Appeal { report_id } => (
                methods::SUBMIT_APPEAL,
                vec![CallArg::Uint(u128::from(*report_id))],
            ),
            Action::FinalizeAppeal {
                report_id,
                is_valid,
            } => (
                methods::FINALIZE_APPEAL,
                vec![CallArg::Uint(u128::from(*report_id)), CallArg::Bool(*is_valid)],
            ),
            Action::Stake { amount } => (methods::STAKE, vec![CallArg::Uint(*amount)]),
            Action::Unstake { amount } => (methods::UNSTAKE, vec![CallArg::Uint(*amount)]),
            Action::TransferToken { to, amount } => (
                methods::TRANSFER,
                vec![CallArg::Address(*to), CallArg::Uint(*amount)],
            ),
            Action::ApproveToken { spender, amount } => (
                methods::APPROVE,
                vec![CallArg::Address(*spender), CallArg::Uint(*amount)],
            ),
            Action::RegisterInstitution {
                name,
                admin,
                treasury,
            } => (
                methods::REGISTER_INSTITUTION,
                vec![
                    CallArg::Text(name.clone()),
                    CallArg::Address(*admin),
                    CallArg::Address(*treasury),
                ],
            ),
            Action::RegisterValidator {
                institution_id,
                validator,
            } => (
                methods::ADD_VALIDATOR,
                vec![CallArg::Uint(u128::from(*institution_id)), CallArg::Address(*validator)],
            ),
            Action::RegisterReporter {
                institution_id,
                reporter,
            } => (
                methods::ADD_REPORTER,
                vec![CallArg::Uint(u128::from(*institution_id)), CallArg::Address(*reporter)],
            ),
        };

        let target = self.target();
        LedgerCall {
            target,
            to: deployment.address_of(target),
            method,
            args,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deployment() -> Deployment {
        Deployment {
            institution_registry: Address::repeat(0x11),
            report_registry: Address::repeat(0x22),
            validator_registry: Address::repeat(0x33),
            reward_manager: Address::repeat(0x44),
            token: Address::repeat(0x55),
        }
    }

    #[test]
    fn lifecycle_actions_have_transitions() {
        let a = Action::Appeal { report_id: 7 };
        assert_eq!(a.transition(), Some(Transition::Appeal));
        assert_eq!(a.report_id(), Some(7));
        assert!(a.is_risky());

        let s = Action::Stake { amount: 5 };
        assert_eq!(s.transition(), None);
        assert!(!s.is_risky());
    }

    #[test]
    fn call_targets_deployment_address() {
        let d = deployment();
        let call = Action::SubmitVerdict {
            report_id: 3,
            is_valid: true,
            description: "confirmed".into(),
        }
        .to_call(&d);
        assert_eq!(call.target, RegistryKind::ValidatorRegistry);
        assert_eq!(call.to, d.validator_registry);
        assert_eq!(call.method, methods::VALIDATE_REPORT);
        assert_eq!(call.arg_uint(0), Some(3));
        assert_eq!(call.arg_bool(1), Some(true));
    }

    #[test]
    fn shape_check_rejects_bad_input() {
        assert!(matches!(
            Action::Stake { amount: 0 }.check_shape(),
            Err(PreconditionError::InvalidInput(_))
        ));
        assert!(Action::TransferToken {
            to: Address::ZERO,
            amount: 1
        }
        .check_shape()
        .is_err());
        assert!(Action::SubmitReport {
            institution_id: 1,
            title: "   ".into(),
            description: "x".into()
        }
        .check_shape()
        .is_err());
        assert!(Action::Appeal { report_id: 0 }.check_shape().is_err());
        assert!(Action::ApproveToken {
            spender: Address::repeat(1),
            amount: 0
        }
        .check_shape()
        .is_ok());
    }

    #[test]
    fn complexity_classes() {
        assert_eq!(Action::Stake { amount: 1 }.complexity(), Complexity::Standard);
        assert_eq!(Action::Appeal { report_id: 1 }.complexity(), Complexity::Heavy);
        assert_eq!(
            Action::TransferToken {
                to: Address::repeat(1),
                amount: 1
            }
            .complexity(),
            Complexity::Simple
        );
    }

    #[test]
    fn serde_tagging() {
        let a = Action::FinalizeAppeal {
            report_id: 9,
            is_valid: false,
        };
        let json = serde_json::to_value(&a).unwrap();
        assert_eq!(json["action"], "finalize_appeal");
        assert_eq!(json["report_id"], 9);
    }
}
