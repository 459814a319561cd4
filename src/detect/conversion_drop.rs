//! Conversion-Drop Detector
//!
//! Fires when a stage-to-stage conversion falls period-over-period beyond
//! the trigger band, overall (−3pp) or per lender (−5pp). A zero comparison
//! percentage means no prior signal and is suppressed.

use smallvec::SmallVec;

use crate::alert::{Alert, AlertCategory, AlertStatus, Severity};
use crate::config::ConversionThresholds;
use crate::impact::{downstream_conversion_pct, estimate_impact};
use crate::model::ConversionPoint;

use super::{AnomalyDetector, DetectorContext, Findings, LenderSeries};

pub struct ConversionDropDetector;

impl ConversionDropDetector {
    // Bands are inclusive: a drop landing exactly on a band edge takes the
    // more severe classification.
    fn classify(delta: f64, critical_pp: f64, high_pp: f64) -> Severity {
        if delta <= critical_pp {
            Severity::Critical
        } else if delta <= high_pp {
            Severity::High
        } else {
            Severity::Medium
        }
    }

    /// New when the baseline was healthy and the drop is deep; otherwise the
    /// degradation already existed last period.
    fn status(point: &ConversionPoint, t: &ConversionThresholds) -> AlertStatus {
        if point.comparison_pct > t.healthy_baseline_pct && -point.delta_pct > t.new_drop_pp {
            AlertStatus::New
        } else {
            AlertStatus::Recurring
        }
    }

    fn weight(delta: f64) -> u8 {
        (delta.abs() * 6.0).min(100.0) as u8
    }

    fn evaluate(
        &self,
        points: &[ConversionPoint],
        current: &crate::aggregate::StageSeries,
        lender: Option<&str>,
        ctx: &DetectorContext<'_>,
        out: &mut Findings,
    ) {
        let t = &ctx.config.thresholds.conversion;
        let (trigger, critical, high) = match lender {
            Some(_) => (t.lender_trigger_pp, t.lender_critical_pp, t.lender_high_pp),
            None => (t.overall_trigger_pp, t.overall_critical_pp, t.overall_high_pp),
        };

        for point in points {
            if point.comparison_pct == 0.0 || point.delta_pct >= trigger {
                continue;
            }

            let severity = Self::classify(point.delta_pct, critical, high);
            let prev_count = current
                .get(&point.from_index)
                .map(|s| s.lead_count)
                .unwrap_or(0);
            let lead_delta = prev_count as f64 * -point.delta_pct / 100.0;
            let downstream = downstream_conversion_pct(current, point.to_index);
            let impact = estimate_impact(lead_delta, downstream, ctx.config.avg_ticket_lakhs);

            let scope = lender.unwrap_or("Overall");
            let mut builder = Alert::builder(AlertCategory::ConversionDrop, severity)
                .status(Self::status(point, t))
                .title(format!(
                    "{scope}: {} conversion down {:.1}pp",
                    point.to_stage, -point.delta_pct
                ))
                .description(format!(
                    "{} to {} conversion moved from {:.1}% to {:.1}% period-over-period, \
                     roughly {} leads at today's downstream efficiency.",
                    point.from_stage,
                    point.to_stage,
                    point.comparison_pct,
                    point.current_pct,
                    lead_delta.round() as u64
                ))
                .stage(point.to_stage.clone(), point.to_index)
                .metrics(point.current_pct, point.comparison_pct, point.delta_pct)
                .impact(impact.lost_loans, impact.impact_cr)
                .impact_weight(Self::weight(point.delta_pct));
            if let Some(l) = lender {
                builder = builder.lender(l);
            }
            out.push(builder.build());
        }
    }
}

impl AnomalyDetector for ConversionDropDetector {
    fn name(&self) -> &'static str {
        "conversion-drop"
    }

    fn category(&self) -> AlertCategory {
        AlertCategory::ConversionDrop
    }

    fn detect(&self, ctx: &DetectorContext<'_>) -> Findings {
        let mut out: Findings = SmallVec::new();
        self.evaluate(ctx.conversions, ctx.overall_current, None, ctx, &mut out);
        for (lender, series) in ctx.lender_series {
            let LenderSeries { conversions, current, .. } = series;
            self.evaluate(conversions, current, Some(lender), ctx, &mut out);
        }
        out
    }
}
