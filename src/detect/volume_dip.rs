//! Volume-Dip Detector
//!
//! Compares raw stage volume against the comparison window. Overall, every
//! funnel stage is checked; per lender only the entry stage of that lender's
//! series is checked, which is where acquisition problems show first. A zero
//! comparison volume is no prior signal and never divides.

use smallvec::SmallVec;

use crate::aggregate::StageSeries;
use crate::alert::{Alert, AlertCategory, AlertStatus, Severity};
use crate::impact::{downstream_conversion_pct, estimate_impact};

use super::{AnomalyDetector, DetectorContext, Findings};

pub struct VolumeDipDetector;

struct StageCheck<'a> {
    stage_index: i64,
    stage_name: &'a str,
    current: u64,
    comparison: u64,
}

impl VolumeDipDetector {
    fn weight(rel_change: f64) -> u8 {
        (rel_change.abs() * 2.5).min(100.0) as u8
    }

    fn check(
        &self,
        check: &StageCheck<'_>,
        series: &StageSeries,
        lender: Option<&str>,
        ctx: &DetectorContext<'_>,
    ) -> Option<Alert> {
        if check.comparison == 0 {
            return None;
        }
        let rel = (check.current as f64 - check.comparison as f64) / check.comparison as f64 * 100.0;

        let t = &ctx.config.thresholds.volume;
        let severity = match lender {
            None if rel < t.overall_trigger_pct => {
                if rel <= t.overall_critical_pct {
                    Severity::Critical
                } else if rel <= t.overall_high_pct {
                    Severity::High
                } else {
                    Severity::Medium
                }
            }
            Some(_) if rel < t.lender_trigger_pct => {
                if rel <= t.lender_high_pct {
                    Severity::High
                } else {
                    Severity::Medium
                }
            }
            _ => return None,
        };

        let lead_delta = check.comparison as f64 - check.current as f64;
        let downstream = downstream_conversion_pct(series, check.stage_index);
        let impact = estimate_impact(lead_delta, downstream, ctx.config.avg_ticket_lakhs);

        let scope = lender.unwrap_or("Overall");
        let mut builder = Alert::builder(AlertCategory::VolumeDip, severity)
            .status(AlertStatus::New)
            .title(format!(
                "{scope}: {} volume down {:.0}%",
                check.stage_name, -rel
            ))
            .description(format!(
                "{} leads at {} vs {} last period ({:.1}% change).",
                check.current, check.stage_name, check.comparison, rel
            ))
            .stage(check.stage_name, check.stage_index)
            .metrics(check.current as f64, check.comparison as f64, rel)
            .impact(impact.lost_loans, impact.impact_cr)
            .impact_weight(Self::weight(rel));
        if let Some(l) = lender {
            builder = builder.lender(l);
        }
        Some(builder.build())
    }
}

impl AnomalyDetector for VolumeDipDetector {
    fn name(&self) -> &'static str {
        "volume-dip"
    }

    fn category(&self) -> AlertCategory {
        AlertCategory::VolumeDip
    }

    fn detect(&self, ctx: &DetectorContext<'_>) -> Findings {
        let mut out: Findings = SmallVec::new();

        for idx in ctx.stage_order {
            let current = ctx.overall_current.get(idx);
            let comparison = ctx.overall_comparison.get(idx);
            let name = current
                .or(comparison)
                .map(|t| t.stage_name.as_str())
                .unwrap_or("unknown");
            let check = StageCheck {
                stage_index: *idx,
                stage_name: name,
                current: current.map(|t| t.lead_count).unwrap_or(0),
                comparison: comparison.map(|t| t.lead_count).unwrap_or(0),
            };
            if let Some(alert) = self.check(&check, ctx.overall_current, None, ctx) {
                out.push(alert);
            }
        }

        for (lender, series) in ctx.lender_series {
            let Some(entry_idx) = series.order.first() else {
                continue;
            };
            let current = series.current.get(entry_idx);
            let comparison = series.comparison.get(entry_idx);
            let name = current
                .or(comparison)
                .map(|t| t.stage_name.as_str())
                .unwrap_or("unknown");
            let check = StageCheck {
                stage_index: *entry_idx,
                stage_name: name,
                current: current.map(|t| t.lead_count).unwrap_or(0),
                comparison: comparison.map(|t| t.lead_count).unwrap_or(0),
            };
            if let Some(alert) = self.check(&check, &series.current, Some(lender), ctx) {
                out.push(alert);
            }
        }

        out
    }
}
