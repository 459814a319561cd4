//! Core Data Model for the Two-Period Funnel Snapshot
//!
//! Raw stage/lead rows arrive from the ingestion collaborator already split
//! into a current and a comparison window. Everything in this module is plain
//! serializable data; derived entities are recomputed fresh on every run and
//! carry no cross-run identity.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Reporting window a record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    /// MTD: the in-progress reporting window.
    Current,
    /// LMTD: the prior-equivalent baseline window.
    Comparison,
}

/// Stage indexes at or above this value are bookkeeping placeholders.
pub const SENTINEL_STAGE_MIN: i64 = 1000;
/// A lone reserved index inside the normal range, also a placeholder.
pub const SENTINEL_STAGE_RESERVED: i64 = 1;

/// One raw fact row: lead count at a funnel stage for one dimension tuple.
///
/// `stage_index` is kept as the raw floating value the tabular source
/// delivers; non-integral or negative indexes are treated as malformed and
/// skipped (but counted) during aggregation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeadStageRecord {
    pub period: Period,
    pub stage_index: f64,
    pub stage_name: String,
    /// Sub-stage rows aggregate separately for stuck-rate analysis.
    #[serde(default)]
    pub sub_stage: Option<String>,
    pub lender: String,
    pub product_type: String,
    pub flow: String,
    pub lead_count: u64,
    /// Share of leads dwelling at this sub-stage beyond expected time.
    #[serde(default)]
    pub stuck_pct: Option<f64>,
}

impl LeadStageRecord {
    /// Integral stage key, or None for malformed indexes.
    pub fn stage_key(&self) -> Option<i64> {
        if !self.stage_index.is_finite() || self.stage_index.fract() != 0.0 {
            return None;
        }
        let idx = self.stage_index as i64;
        if idx < 0 { None } else { Some(idx) }
    }

    /// Whether the integral index denotes a bookkeeping placeholder.
    pub fn is_sentinel_stage(idx: i64) -> bool {
        idx == SENTINEL_STAGE_RESERVED || idx >= SENTINEL_STAGE_MIN
    }
}

/// Period-to-date disbursal rollup per dimension tuple, consumed by the
/// AOP-pacing and concentration detectors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisbursalSummary {
    pub lender: String,
    pub product_type: String,
    pub flow: String,
    pub disbursed_count: u64,
    pub child_lead_count: u64,
}

/// Dimension filters, each `None` = "All", applied as a conjunction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunnelFilters {
    #[serde(default)]
    pub lender: Option<String>,
    #[serde(default)]
    pub product_type: Option<String>,
    #[serde(default)]
    pub flow: Option<String>,
}

impl FunnelFilters {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn for_lender(lender: impl Into<String>) -> Self {
        Self {
            lender: Some(lender.into()),
            ..Self::default()
        }
    }

    pub fn matches(&self, record: &LeadStageRecord) -> bool {
        let dim_ok = |want: &Option<String>, have: &str| match want {
            Some(v) => v == have,
            None => true,
        };
        dim_ok(&self.lender, &record.lender)
            && dim_ok(&self.product_type, &record.product_type)
            && dim_ok(&self.flow, &record.flow)
    }
}

/// Aggregated lead count for one stage within a period and filter scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageTotals {
    pub period: Period,
    pub stage_index: i64,
    pub stage_name: String,
    pub lead_count: u64,
}

/// Aggregated sub-stage totals with a lead-weighted stuck percentage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubStageTotals {
    pub stage_index: i64,
    pub sub_stage: String,
    pub lead_count: u64,
    pub stuck_pct: f64,
}

/// Stage-to-stage conversion with its period-over-period delta.
///
/// Percentages are always finite: a zero prior-stage count resolves to 0.0
/// so downstream threshold comparisons stay well-defined.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionPoint {
    pub from_index: i64,
    pub to_index: i64,
    pub from_stage: String,
    pub to_stage: String,
    pub current_pct: f64,
    pub comparison_pct: f64,
    /// current − comparison, in percentage points.
    pub delta_pct: f64,
}

/// Distinct dimension values observed in a snapshot, sorted and deduped.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DimensionCatalog {
    pub lenders: Vec<String>,
    pub product_types: Vec<String>,
    pub flows: Vec<String>,
}

impl DimensionCatalog {
    pub fn from_snapshot(records: &[LeadStageRecord], disbursals: &[DisbursalSummary]) -> Self {
        let mut lenders: Vec<String> = Vec::new();
        let mut product_types: Vec<String> = Vec::new();
        let mut flows: Vec<String> = Vec::new();

        for r in records {
            lenders.push(r.lender.clone());
            product_types.push(r.product_type.clone());
            flows.push(r.flow.clone());
        }
        for d in disbursals {
            lenders.push(d.lender.clone());
            product_types.push(d.product_type.clone());
            flows.push(d.flow.clone());
        }

        for list in [&mut lenders, &mut product_types, &mut flows] {
            list.sort();
            list.dedup();
        }

        Self {
            lenders,
            product_types,
            flows,
        }
    }
}

/// Immutable input to one analysis run: the two-period record set, the
/// disbursal rollup, and the as-of date the run is anchored to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunnelSnapshot {
    pub records: Vec<LeadStageRecord>,
    #[serde(default)]
    pub disbursals: Vec<DisbursalSummary>,
    pub as_of: NaiveDate,
}
