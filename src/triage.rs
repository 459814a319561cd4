//! Alert Ranking and Priority Bucketing
//!
//! Ranking is a stable total order: severity priority ascending, then
//! currency impact descending, ties keeping input order — re-ranking an
//! already-ranked list is a no-op. Bucketing maps each alert to the
//! actionable tier an operations lead works from.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::alert::{Alert, AlertStatus, Tone};

/// Actionable tier for one alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityBucket {
    P0,
    P1,
    P2,
    P3,
    /// Small-impact warning on a previously-stable dimension; watch, don't page.
    Emerging,
    /// Good or informational findings surfaced alongside the problems.
    Positive,
}

/// Minimum impact weight for the P2 tier; warns below it on a stable
/// dimension are emerging rather than actionable.
const P2_WEIGHT: u8 = 35;
const P1_WEIGHT: u8 = 60;
const P0_WEIGHT: u8 = 80;

/// Stable in-place sort by (severity priority asc, impact_cr desc).
pub fn rank_alerts(alerts: &mut [Alert]) {
    alerts.sort_by(|a, b| {
        a.severity
            .priority()
            .cmp(&b.severity.priority())
            .then_with(|| {
                b.impact_cr
                    .partial_cmp(&a.impact_cr)
                    .unwrap_or(Ordering::Equal)
            })
    });
}

/// Assign one alert to its tier from tone + the detector's opaque impact
/// weight (carried through as-is, never recomputed here).
pub fn bucket(alert: &Alert) -> PriorityBucket {
    match alert.tone {
        Tone::Good | Tone::Info => PriorityBucket::Positive,
        Tone::Warn if alert.impact_weight < P2_WEIGHT && alert.status == AlertStatus::New => {
            PriorityBucket::Emerging
        }
        Tone::Bad if alert.impact_weight >= P0_WEIGHT => PriorityBucket::P0,
        Tone::Bad => PriorityBucket::P1,
        Tone::Warn if alert.impact_weight >= P1_WEIGHT => PriorityBucket::P1,
        Tone::Warn if alert.impact_weight >= P2_WEIGHT => PriorityBucket::P2,
        Tone::Warn => PriorityBucket::P3,
    }
}

/// Bucket a ranked alert list, preserving rank order inside each tier.
pub fn bucket_all(alerts: &[Alert]) -> BTreeMap<PriorityBucket, Vec<String>> {
    let mut out: BTreeMap<PriorityBucket, Vec<String>> = BTreeMap::new();
    for alert in alerts {
        out.entry(bucket(alert)).or_default().push(alert.id.clone());
    }
    out
}
