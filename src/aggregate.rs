//! Stage Series Aggregation
//!
//! Groups raw rows by stage index, period, and dimension scope into ordered
//! stage totals. Top-level aggregation takes only rows without a sub-stage
//! and with a real (non-sentinel) stage index; sub-stage rows aggregate
//! separately for stuck-rate analysis. Pure functions, no side effects.

use std::collections::BTreeMap;

use crate::model::{FunnelFilters, LeadStageRecord, Period, StageTotals, SubStageTotals};

/// Ordered top-level totals, keyed by stage index.
pub type StageSeries = BTreeMap<i64, StageTotals>;

/// Sub-stage totals keyed by (stage index, sub-stage name).
pub type SubStageSeries = BTreeMap<(i64, String), SubStageTotals>;

/// Count of malformed rows (non-integral or negative stage index) in a
/// record set. Sentinel bookkeeping rows are excluded by design and are not
/// malformed.
pub fn count_malformed(records: &[LeadStageRecord]) -> u64 {
    records.iter().filter(|r| r.stage_key().is_none()).count() as u64
}

/// Aggregate top-level stage totals for one period under a filter scope.
pub fn aggregate(records: &[LeadStageRecord], period: Period, filters: &FunnelFilters) -> StageSeries {
    let mut totals = StageSeries::new();

    for record in records {
        if record.period != period || record.sub_stage.is_some() || !filters.matches(record) {
            continue;
        }
        let Some(idx) = record.stage_key() else {
            continue; // malformed, surfaced via count_malformed
        };
        if LeadStageRecord::is_sentinel_stage(idx) {
            continue;
        }

        totals
            .entry(idx)
            .and_modify(|t| t.lead_count += record.lead_count)
            .or_insert_with(|| StageTotals {
                period,
                stage_index: idx,
                stage_name: record.stage_name.clone(),
                lead_count: record.lead_count,
            });
    }

    totals
}

/// Aggregate sub-stage rows for one period, producing a lead-weighted stuck
/// percentage per (stage, sub-stage). Rows without a stuck reading still
/// contribute volume with an implied 0% stuck share.
pub fn aggregate_sub_stages(
    records: &[LeadStageRecord],
    period: Period,
    filters: &FunnelFilters,
) -> SubStageSeries {
    // (weighted stuck sum, lead sum) accumulated per key
    let mut acc: BTreeMap<(i64, String), (f64, u64, String)> = BTreeMap::new();

    for record in records {
        if record.period != period || !filters.matches(record) {
            continue;
        }
        let Some(sub) = record.sub_stage.as_ref() else {
            continue;
        };
        let Some(idx) = record.stage_key() else {
            continue;
        };
        if LeadStageRecord::is_sentinel_stage(idx) {
            continue;
        }

        let stuck = record.stuck_pct.unwrap_or(0.0);
        let entry = acc
            .entry((idx, sub.clone()))
            .or_insert_with(|| (0.0, 0, sub.clone()));
        entry.0 += stuck * record.lead_count as f64;
        entry.1 += record.lead_count;
    }

    acc.into_iter()
        .map(|((idx, _), (weighted, leads, sub))| {
            let stuck_pct = if leads > 0 {
                weighted / leads as f64
            } else {
                0.0
            };
            (
                (idx, sub.clone()),
                SubStageTotals {
                    stage_index: idx,
                    sub_stage: sub,
                    lead_count: leads,
                    stuck_pct,
                },
            )
        })
        .collect()
}

/// The ordered stage-index sequence for a pair of period series: the sorted
/// union of both key sets. Callers pass this to the conversion calculator so
/// adjacency stays reproducible under dimension filters.
pub fn stage_order(current: &StageSeries, comparison: &StageSeries) -> Vec<i64> {
    let mut order: Vec<i64> = current.keys().chain(comparison.keys()).copied().collect();
    order.sort_unstable();
    order.dedup();
    order
}
