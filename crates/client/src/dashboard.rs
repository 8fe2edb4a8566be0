//! # Dashboard Read Path
//!
//! One concurrent scan over every report id, folded into:
//!
//! - per-institution status counts
//! - the caller's own reports (as reporter or assigned validator), each
//!   with a reconciled verdict
//! - the caller's stake position
//!
//! The scan is an eventually-consistent snapshot: reports are read
//! concurrently and may reflect different ledger heights. Ids that read
//! as `NotFound` are skipped.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::try_join_all;
use serde::Serialize;
use tracing::{debug, info};

use lapor_common::{Address, InstitutionId, Report, ReportStatus, Role, StakePosition};

use crate::ledger::{ReadError, RegistryReader};
use crate::reconciler::{Provenance, ReconciledVerdict, ValidationReconciler};
use crate::role::RoleResolver;

/// Status counts for one institution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InstitutionSummary {
    pub institution_id: InstitutionId,
    pub pending: u64,
    pub valid: u64,
    pub invalid: u64,
    pub appealed: u64,
}

impl InstitutionSummary {
    #[must_use]
    pub fn total(&self) -> u64 {
        self.pending + self.valid + self.invalid + self.appealed
    }

    fn count(&mut self, status: ReportStatus) {
        match status {
            ReportStatus::Pending => self.pending += 1,
            ReportStatus::Valid => self.valid += 1,
            ReportStatus::Invalid => self.invalid += 1,
            ReportStatus::Appealed => self.appealed += 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardEntry {
    pub report: Report,
    pub verdict: ReconciledVerdict,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dashboard {
    pub caller: Address,
    pub role: Role,
    /// Reports actually read; skipped ids are not counted.
    pub reports_scanned: u64,
    /// Ordered by institution id.
    pub institutions: Vec<InstitutionSummary>,
    /// Ordered by report id.
    pub own_reports: Vec<DashboardEntry>,
    pub stake: StakePosition,
}

impl Dashboard {
    /// `stake.is_active()`, surfaced for validators.
    #[must_use]
    pub fn validator_eligible(&self) -> bool {
        self.stake.is_active()
    }

    #[must_use]
    pub fn institution(&self, id: InstitutionId) -> Option<&InstitutionSummary> {
        self.institutions.iter().find(|s| s.institution_id == id)
    }

    /// Own reports whose verdict is not `clean`.
    pub fn degraded(&self) -> impl Iterator<Item = &DashboardEntry> {
        self.own_reports
            .iter()
            .filter(|e| e.verdict.provenance != Provenance::Clean)
    }
}

pub struct DashboardBuilder {
    reader: Arc<dyn RegistryReader>,
    roles: Arc<RoleResolver>,
    reconciler: ValidationReconciler,
}

impl DashboardBuilder {
    #[must_use]
    pub fn new(
        reader: Arc<dyn RegistryReader>,
        roles: Arc<RoleResolver>,
        reconciler: ValidationReconciler,
    ) -> Self {
        Self {
            reader,
            roles,
            reconciler,
        }
    }

    pub async fn build(&self, caller: Address) -> Result<Dashboard, ReadError> {
        // ── Step 1: Scan every report concurrently ──
        let count = self.reader.report_count().await?;
        let reader = &self.reader;
        let reports = try_join_all((1..=count).map(|id| async move {
            match reader.report(id).await {
                Ok(r) => Ok(Some(r)),
                Err(ReadError::NotFound(_)) => {
                    debug!(report_id = id, "report id skipped");
                    Ok(None)
                }
                Err(e) => Err(e),
            }
        }))
        .await?;
        let reports: Vec<Report> = reports.into_iter().flatten().collect();

        // ── Step 2: Per-institution counts ──
        let mut by_institution: BTreeMap<InstitutionId, InstitutionSummary> = BTreeMap::new();
        for r in &reports {
            by_institution
                .entry(r.institution_id)
                .or_insert_with(|| InstitutionSummary {
                    institution_id: r.institution_id,
                    ..InstitutionSummary::default()
                })
                .count(r.status);
        }

        // ── Step 3: Own reports with reconciled verdicts ──
        let own: Vec<&Report> = reports
            .iter()
            .filter(|r| r.reporter == caller || r.assigned_validator == Some(caller))
            .collect();
        let reconciler = &self.reconciler;
        let own_reports = try_join_all(own.into_iter().map(|report| async move {
            let record = reader.verdict_record(report.id).await;
            let verdict = reconciler.reconcile(report, record)?;
            Ok::<_, ReadError>(DashboardEntry {
                report: reconciler.clean_report(report),
                verdict,
            })
        }))
        .await?;

        // ── Step 4: Role and stake ──
        let (role, stake) = futures::try_join!(
            self.roles.resolve_indexed(caller),
            self.reader.stake_position(caller),
        )?;

        let dashboard = Dashboard {
            caller,
            role,
            reports_scanned: reports.len() as u64,
            institutions: by_institution.into_values().collect(),
            own_reports,
            stake,
        };
        info!(
            caller = %caller,
            role = %dashboard.role,
            reports = dashboard.reports_scanned,
            own = dashboard.own_reports.len(),
            degraded = dashboard.degraded().count(),
            "dashboard built"
        );
        Ok(dashboard)
    }
}
