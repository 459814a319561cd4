//! Business Impact Estimation
//!
//! Converts lead-count deltas into estimated lost loans and currency impact.
//! The downstream conversion percentage is the current-period ratio of
//! final-stage volume to volume at the stage under analysis — "if these leads
//! had not been lost, how many would plausibly reach disbursal at today's
//! efficiency". It is an approximation, not a causal estimate.

use crate::aggregate::StageSeries;
use crate::conversion::stage_ratio;

/// Estimated loan and currency loss for one alert.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Impact {
    pub lost_loans: u64,
    pub impact_cr: f64,
}

impl Impact {
    pub const ZERO: Impact = Impact {
        lost_loans: 0,
        impact_cr: 0.0,
    };
}

/// Estimate impact of losing `lead_delta` leads at a stage whose downstream
/// conversion to disbursal is `downstream_conversion_pct`. Monotonic in
/// `lead_delta` at fixed conversion; negative deltas clamp to zero.
pub fn estimate_impact(lead_delta: f64, downstream_conversion_pct: f64, avg_ticket_lakhs: f64) -> Impact {
    if lead_delta <= 0.0 {
        return Impact::ZERO;
    }
    let lost_loans = (lead_delta * downstream_conversion_pct / 100.0).round().max(0.0) as u64;
    Impact {
        lost_loans,
        impact_cr: lost_loans as f64 * avg_ticket_lakhs / 100.0,
    }
}

/// Current-period conversion from `at_stage` to the final stage of the
/// series, as a percentage. Zero when the series is empty or the stage has
/// no volume.
pub fn downstream_conversion_pct(current: &StageSeries, at_stage: i64) -> f64 {
    let Some((_, last)) = current.iter().next_back() else {
        return 0.0;
    };
    let at_count = current.get(&at_stage).map(|t| t.lead_count).unwrap_or(0);
    stage_ratio(last.lead_count, at_count)
}
