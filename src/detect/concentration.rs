//! Concentration-Risk Detector
//!
//! Flags over-reliance on the two largest lenders by disbursal share. This is
//! a structural portfolio check, so it only runs on the unfiltered lender
//! view and never against a single-lender scope.

use smallvec::SmallVec;

use crate::alert::{Alert, AlertCategory, AlertStatus, Severity};

use super::{AnomalyDetector, DetectorContext, Findings};

pub struct ConcentrationRiskDetector;

impl AnomalyDetector for ConcentrationRiskDetector {
    fn name(&self) -> &'static str {
        "concentration-risk"
    }

    fn category(&self) -> AlertCategory {
        AlertCategory::Concentration
    }

    fn detect(&self, ctx: &DetectorContext<'_>) -> Findings {
        let mut out: Findings = SmallVec::new();
        if ctx.filters.lender.is_some() {
            return out;
        }

        let t = &ctx.config.thresholds.concentration;

        let mut by_lender: Vec<(&str, u64)> = Vec::new();
        for d in ctx.disbursals {
            match by_lender.iter_mut().find(|(l, _)| *l == d.lender.as_str()) {
                Some((_, count)) => *count += d.disbursed_count,
                None => by_lender.push((d.lender.as_str(), d.disbursed_count)),
            }
        }

        let total: u64 = by_lender.iter().map(|(_, c)| c).sum();
        if total == 0 || by_lender.len() < 2 {
            return out;
        }

        by_lender.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
        let top2: u64 = by_lender.iter().take(2).map(|(_, c)| c).sum();
        let share = top2 as f64 / total as f64 * 100.0;
        if share <= t.top2_share_trigger_pct {
            return out;
        }

        let severity = if share > t.top2_share_high_pct {
            Severity::High
        } else {
            Severity::Medium
        };
        let names: Vec<&str> = by_lender.iter().take(2).map(|(l, _)| *l).collect();

        out.push(
            Alert::builder(AlertCategory::Concentration, severity)
                .status(AlertStatus::Known)
                .title(format!(
                    "{:.0}% of disbursals concentrated in {} and {}",
                    share, names[0], names[1]
                ))
                .description(format!(
                    "Top-2 lender share is {:.1}% of {} disbursals; a pricing or policy \
                     change at either lender moves the whole book.",
                    share, total
                ))
                .metrics(share, t.top2_share_trigger_pct, share - t.top2_share_trigger_pct)
                .impact_weight(share.min(100.0) as u8)
                .build(),
        );
        out
    }
}
