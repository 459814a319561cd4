//! AOP Pacing Detector
//!
//! Projects period-to-date disbursals to a full-month run rate and compares
//! it against each lender's Annual Operating Plan. Disbursed counts convert
//! to Crores via the average ticket size.
//!
//! projection = mtd_amount / (day_of_month / days_in_month)
//! gap        = (projection − monthly_target) / monthly_target × 100

use chrono::{Datelike, NaiveDate};
use smallvec::SmallVec;
use std::collections::BTreeMap;

use crate::alert::{Alert, AlertCategory, AlertStatus, Severity};
use crate::config::AopThresholds;

use super::{AnomalyDetector, DetectorContext, Findings};

pub struct AopPacingDetector;

struct Pacing {
    mtd_cr: f64,
    projected_cr: f64,
    monthly_target_cr: f64,
    gap_pct: f64,
}

fn days_in_month(d: NaiveDate) -> f64 {
    let (y, m) = (d.year(), d.month());
    let first = NaiveDate::from_ymd_opt(y, m, 1);
    let next = if m == 12 {
        NaiveDate::from_ymd_opt(y + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(y, m + 1, 1)
    };
    match (first, next) {
        (Some(a), Some(b)) => (b - a).num_days() as f64,
        _ => 30.0,
    }
}

impl AopPacingDetector {
    fn pace(mtd_cr: f64, annual_target_cr: f64, as_of: NaiveDate) -> Option<Pacing> {
        if annual_target_cr <= 0.0 {
            return None;
        }
        let monthly_target_cr = annual_target_cr / 12.0;
        let elapsed = as_of.day() as f64 / days_in_month(as_of);
        let projected_cr = mtd_cr / elapsed;
        Some(Pacing {
            mtd_cr,
            projected_cr,
            monthly_target_cr,
            gap_pct: (projected_cr - monthly_target_cr) / monthly_target_cr * 100.0,
        })
    }

    fn classify(gap: f64, trigger: f64, critical: f64, high: f64) -> Option<Severity> {
        if gap >= trigger {
            return None;
        }
        Some(if gap <= critical {
            Severity::Critical
        } else if gap <= high {
            Severity::High
        } else {
            Severity::Medium
        })
    }

    fn weight(gap: f64) -> u8 {
        (gap.abs() * 2.0).min(100.0) as u8
    }

    fn build_alert(
        pacing: &Pacing,
        severity: Severity,
        lender: Option<&str>,
        t: &AopThresholds,
        avg_ticket_lakhs: f64,
    ) -> Alert {
        let shortfall_cr = (pacing.monthly_target_cr - pacing.projected_cr).max(0.0);
        let shortfall_loans = if avg_ticket_lakhs > 0.0 {
            (shortfall_cr * 100.0 / avg_ticket_lakhs).round() as u64
        } else {
            0
        };

        let scope = lender.unwrap_or("Overall");
        let mut builder = Alert::builder(AlertCategory::AopRisk, severity)
            .status(AlertStatus::Known)
            .title(format!(
                "{scope}: pacing {:.0}% behind AOP",
                -pacing.gap_pct
            ))
            .description(format!(
                "{:.1} Cr disbursed MTD projects to {:.1} Cr against a {:.1} Cr monthly \
                 target ({:.1}% gap).",
                pacing.mtd_cr, pacing.projected_cr, pacing.monthly_target_cr, pacing.gap_pct
            ))
            .metrics(pacing.projected_cr, pacing.monthly_target_cr, pacing.gap_pct)
            .impact(shortfall_loans, shortfall_cr)
            .impact_weight(Self::weight(pacing.gap_pct))
            .needs_attention(pacing.gap_pct < t.attention_gap_pct);
        if let Some(l) = lender {
            builder = builder.lender(l);
        }
        builder.build()
    }
}

impl AnomalyDetector for AopPacingDetector {
    fn name(&self) -> &'static str {
        "aop-pacing"
    }

    fn category(&self) -> AlertCategory {
        AlertCategory::AopRisk
    }

    fn detect(&self, ctx: &DetectorContext<'_>) -> Findings {
        let mut out: Findings = SmallVec::new();
        let t = &ctx.config.thresholds.aop;
        let ticket = ctx.config.avg_ticket_lakhs;

        // Period-to-date disbursed Crores per lender.
        let mut mtd_by_lender: BTreeMap<&str, f64> = BTreeMap::new();
        for d in ctx.disbursals {
            *mtd_by_lender.entry(d.lender.as_str()).or_insert(0.0) +=
                d.disbursed_count as f64 * ticket / 100.0;
        }

        let mut targeted = 0usize;
        let mut total_mtd = 0.0;
        let mut total_annual = 0.0;

        for (lender, annual) in &ctx.config.annual_targets_cr {
            if ctx.filters.lender.as_ref().is_some_and(|only| only != lender) {
                continue;
            }
            let mtd = mtd_by_lender.get(lender.as_str()).copied().unwrap_or(0.0);
            let Some(pacing) = Self::pace(mtd, *annual, ctx.as_of) else {
                continue;
            };
            targeted += 1;
            total_mtd += mtd;
            total_annual += *annual;

            if let Some(severity) = Self::classify(
                pacing.gap_pct,
                t.lender_trigger_pct,
                t.lender_critical_pct,
                t.lender_high_pct,
            ) {
                out.push(Self::build_alert(&pacing, severity, Some(lender), t, ticket));
            }
        }

        // Portfolio-level pacing is only meaningful across several plans.
        if targeted > 1 {
            if let Some(pacing) = Self::pace(total_mtd, total_annual, ctx.as_of) {
                if let Some(severity) = Self::classify(
                    pacing.gap_pct,
                    t.overall_trigger_pct,
                    t.overall_critical_pct,
                    t.overall_high_pct,
                ) {
                    out.push(Self::build_alert(&pacing, severity, None, t, ticket));
                }
            }
        }

        out
    }
}
