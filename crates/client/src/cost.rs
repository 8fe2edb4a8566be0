//! Execution-cost ceiling resolution.
//!
//! A successful estimate gets the configured safety margin on top. A
//! failed estimate is not treated as a failed action: some ledger nodes
//! refuse to estimate calls they would still accept, so the action's
//! complexity class supplies a fixed ceiling and submission proceeds.

use serde::Serialize;

use lapor_common::CostConfig;

use crate::action::Complexity;

/// Where a ceiling came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum CostSource {
    Estimated { estimate: u64, margin_percent: u8 },
    Fallback { reason: String },
}

/// Resolved ceiling for one submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CostDecision {
    pub ceiling: u64,
    #[serde(flatten)]
    pub source: CostSource,
}

impl CostDecision {
    #[must_use]
    pub fn is_fallback(&self) -> bool {
        matches!(self.source, CostSource::Fallback { .. })
    }
}

#[derive(Debug, Clone)]
pub struct CostPolicy {
    config: CostConfig,
}

impl CostPolicy {
    #[must_use]
    pub fn new(config: CostConfig) -> Self {
        Self { config }
    }

    /// Fixed ceiling for a complexity class.
    #[must_use]
    pub fn fallback_ceiling(&self, complexity: Complexity) -> u64 {
        match complexity {
            Complexity::Simple => self.config.simple_ceiling,
            Complexity::Standard => self.config.standard_ceiling,
            Complexity::Heavy => self.config.heavy_ceiling,
        }
    }

    /// `estimate` plus margin, rounded up. Saturates at `u64::MAX`.
    #[must_use]
    pub fn with_margin(&self, estimate: u64) -> u64 {
        let margin = u64::from(self.config.effective_margin());
        let extra = estimate
            .checked_mul(margin)
            .map(|m| m.div_ceil(100))
            .unwrap_or_else(|| (estimate / 100).saturating_mul(margin).saturating_add(1));
        estimate.saturating_add(extra)
    }

    /// Ceiling from a successful estimate.
    #[must_use]
    pub fn from_estimate(&self, estimate: u64) -> CostDecision {
        CostDecision {
            ceiling: self.with_margin(estimate),
            source: CostSource::Estimated {
                estimate,
                margin_percent: self.config.effective_margin(),
            },
        }
    }

    /// Ceiling after estimation failed.
    #[must_use]
    pub fn fallback(&self, complexity: Complexity, reason: impl Into<String>) -> CostDecision {
        CostDecision {
            ceiling: self.fallback_ceiling(complexity),
            source: CostSource::Fallback {
                reason: reason.into(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn margin_applied_to_estimate() {
        let policy = CostPolicy::new(CostConfig::default());
        let d = policy.from_estimate(100_000);
        assert_eq!(d.ceiling, 115_000);
        assert!(!d.is_fallback());
    }

    #[test]
    fn margin_rounds_up() {
        let policy = CostPolicy::new(CostConfig {
            margin_percent: 10,
            ..CostConfig::default()
        });
        assert_eq!(policy.with_margin(101), 112);
    }

    #[test]
    fn out_of_band_margin_is_clamped() {
        let policy = CostPolicy::new(CostConfig {
            margin_percent: 90,
            ..CostConfig::default()
        });
        assert_eq!(policy.with_margin(1_000), 1_200);
    }

    #[test]
    fn huge_estimate_saturates() {
        let policy = CostPolicy::new(CostConfig::default());
        assert_eq!(policy.with_margin(u64::MAX), u64::MAX);
    }

    #[test]
    fn fallback_uses_class_ceiling() {
        let cfg = CostConfig::default();
        let policy = CostPolicy::new(cfg.clone());
        let d = policy.fallback(Complexity::Heavy, "execution reverted");
        assert_eq!(d.ceiling, cfg.heavy_ceiling);
        assert!(d.is_fallback());
        assert_eq!(policy.fallback_ceiling(Complexity::Simple), cfg.simple_ceiling);
    }
}
