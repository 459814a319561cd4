//! Stuck-Rate Spike Detector
//!
//! Watches sub-stage dwell rates. Fires when the stuck share is elevated
//! (>25%) and either jumped versus the baseline window (>5pp) or is
//! absolutely high (>40%). Rates above 50% demand attention.

use smallvec::SmallVec;

use crate::alert::{Alert, AlertCategory, AlertStatus, Severity};
use crate::impact::{downstream_conversion_pct, estimate_impact};

use super::{AnomalyDetector, DetectorContext, Findings};

pub struct StuckSpikeDetector;

impl StuckSpikeDetector {
    fn weight(stuck: f64, delta: f64) -> u8 {
        (stuck + delta.max(0.0)).min(100.0) as u8
    }
}

impl AnomalyDetector for StuckSpikeDetector {
    fn name(&self) -> &'static str {
        "stuck-spike"
    }

    fn category(&self) -> AlertCategory {
        AlertCategory::StuckSpike
    }

    fn detect(&self, ctx: &DetectorContext<'_>) -> Findings {
        let mut out: Findings = SmallVec::new();
        let t = &ctx.config.thresholds.stuck;

        for ((stage_index, sub_stage), totals) in ctx.sub_current {
            let stuck = totals.stuck_pct;
            let baseline = ctx
                .sub_comparison
                .get(&(*stage_index, sub_stage.clone()))
                .map(|s| s.stuck_pct)
                .unwrap_or(0.0);
            let delta = stuck - baseline;

            let fired = stuck > t.min_stuck_pct
                && (delta > t.delta_trigger_pp || stuck > t.absolute_trigger_pct);
            if !fired {
                continue;
            }

            let severity = if stuck > t.high_pct {
                Severity::High
            } else {
                Severity::Medium
            };
            // already elevated last period => a tracked, known condition
            let status = if baseline > t.min_stuck_pct {
                AlertStatus::Known
            } else {
                AlertStatus::New
            };

            let lead_delta = totals.lead_count as f64 * delta.max(0.0) / 100.0;
            let downstream = downstream_conversion_pct(ctx.overall_current, *stage_index);
            let impact = estimate_impact(lead_delta, downstream, ctx.config.avg_ticket_lakhs);

            out.push(
                Alert::builder(AlertCategory::StuckSpike, severity)
                    .status(status)
                    .title(format!("{sub_stage}: {:.0}% of leads stuck", stuck))
                    .description(format!(
                        "{:.1}% of {} leads are dwelling at {} beyond the expected time \
                         (baseline {:.1}%, {:+.1}pp).",
                        stuck, totals.lead_count, sub_stage, baseline, delta
                    ))
                    .stage(sub_stage.clone(), *stage_index)
                    .metrics(stuck, baseline, delta)
                    .impact(impact.lost_loans, impact.impact_cr)
                    .impact_weight(Self::weight(stuck, delta))
                    .needs_attention(stuck > t.high_pct)
                    .build(),
            );
        }

        out
    }
}
