//! Anomaly Detector Catalog
//!
//! Detectors are an open set of pure rules sharing one signature. The engine
//! runs whatever list is registered — the five built-ins plus any custom
//! detector — so each rule is independently testable and replaceable.

use chrono::NaiveDate;
use smallvec::SmallVec;
use std::collections::BTreeMap;

use crate::aggregate::{self, StageSeries, SubStageSeries};
use crate::alert::{Alert, AlertCategory};
use crate::config::AnalyticsConfig;
use crate::conversion::compute_conversions;
use crate::model::{ConversionPoint, DimensionCatalog, DisbursalSummary, FunnelFilters, LeadStageRecord, Period};

pub mod aop_pacing;
pub mod concentration;
pub mod conversion_drop;
pub mod stuck_spike;
pub mod volume_dip;

pub use aop_pacing::AopPacingDetector;
pub use concentration::ConcentrationRiskDetector;
pub use conversion_drop::ConversionDropDetector;
pub use stuck_spike::StuckSpikeDetector;
pub use volume_dip::VolumeDipDetector;

/// Detector output buffer; most rules emit a handful of alerts per run.
pub type Findings = SmallVec<[Alert; 4]>;

/// Aggregated two-period view for a single lender.
#[derive(Debug, Clone)]
pub struct LenderSeries {
    pub lender: String,
    pub current: StageSeries,
    pub comparison: StageSeries,
    pub order: Vec<i64>,
    pub conversions: Vec<ConversionPoint>,
}

/// Everything a detector may consult, prepared once per run.
pub struct DetectorContext<'a> {
    pub overall_current: &'a StageSeries,
    pub overall_comparison: &'a StageSeries,
    pub stage_order: &'a [i64],
    pub conversions: &'a [ConversionPoint],
    pub lender_series: &'a BTreeMap<String, LenderSeries>,
    pub sub_current: &'a SubStageSeries,
    pub sub_comparison: &'a SubStageSeries,
    pub disbursals: &'a [DisbursalSummary],
    pub catalog: &'a DimensionCatalog,
    pub filters: &'a FunnelFilters,
    pub config: &'a AnalyticsConfig,
    pub as_of: NaiveDate,
}

/// One threshold rule over the aggregated snapshot.
///
/// Implementations must be pure: identical context in, identical findings
/// out. An unmatched dimension scope is an empty finding set, not an error.
pub trait AnomalyDetector: Send + Sync {
    fn name(&self) -> &'static str;
    fn category(&self) -> AlertCategory;
    fn detect(&self, ctx: &DetectorContext<'_>) -> Findings;
}

/// The built-in rule set, in stable registration order.
pub fn default_detectors() -> Vec<Box<dyn AnomalyDetector>> {
    vec![
        Box::new(ConversionDropDetector),
        Box::new(VolumeDipDetector),
        Box::new(StuckSpikeDetector),
        Box::new(AopPacingDetector),
        Box::new(ConcentrationRiskDetector),
    ]
}

/// Build the per-lender two-period series for every lender in the catalog,
/// scoped by the run's filters. Lenders filtered out produce no entry.
pub fn build_lender_series(
    records: &[LeadStageRecord],
    catalog: &DimensionCatalog,
    filters: &FunnelFilters,
) -> BTreeMap<String, LenderSeries> {
    let mut out = BTreeMap::new();

    for lender in &catalog.lenders {
        if let Some(only) = &filters.lender {
            if only != lender {
                continue;
            }
        }
        let scoped = FunnelFilters {
            lender: Some(lender.clone()),
            product_type: filters.product_type.clone(),
            flow: filters.flow.clone(),
        };
        let current = aggregate::aggregate(records, Period::Current, &scoped);
        let comparison = aggregate::aggregate(records, Period::Comparison, &scoped);
        if current.is_empty() && comparison.is_empty() {
            continue;
        }
        let order = aggregate::stage_order(&current, &comparison);
        let conversions = compute_conversions(&current, &comparison, &order);
        out.insert(
            lender.clone(),
            LenderSeries {
                lender: lender.clone(),
                current,
                comparison,
                order,
                conversions,
            },
        );
    }

    out
}

#[cfg(test)]
pub(crate) mod testutil {
    //! Shared fixtures for detector unit tests.

    use super::*;
    use crate::model::StageTotals;

    pub fn series(period: Period, stages: &[(i64, &str, u64)]) -> StageSeries {
        stages
            .iter()
            .map(|&(idx, name, count)| {
                (
                    idx,
                    StageTotals {
                        period,
                        stage_index: idx,
                        stage_name: name.into(),
                        lead_count: count,
                    },
                )
            })
            .collect()
    }

    /// Minimal owned context backing for tests.
    pub struct CtxParts {
        pub current: StageSeries,
        pub comparison: StageSeries,
        pub order: Vec<i64>,
        pub conversions: Vec<ConversionPoint>,
        pub lender_series: BTreeMap<String, LenderSeries>,
        pub sub_current: SubStageSeries,
        pub sub_comparison: SubStageSeries,
        pub disbursals: Vec<DisbursalSummary>,
        pub catalog: DimensionCatalog,
        pub filters: FunnelFilters,
        pub config: AnalyticsConfig,
        pub as_of: NaiveDate,
    }

    impl CtxParts {
        pub fn new(current: StageSeries, comparison: StageSeries) -> Self {
            let order = aggregate::stage_order(&current, &comparison);
            let conversions = compute_conversions(&current, &comparison, &order);
            Self {
                current,
                comparison,
                order,
                conversions,
                lender_series: BTreeMap::new(),
                sub_current: SubStageSeries::new(),
                sub_comparison: SubStageSeries::new(),
                disbursals: Vec::new(),
                catalog: DimensionCatalog::default(),
                filters: FunnelFilters::all(),
                config: AnalyticsConfig::default(),
                as_of: NaiveDate::from_ymd_opt(2025, 7, 15).unwrap(),
            }
        }

        pub fn ctx(&self) -> DetectorContext<'_> {
            DetectorContext {
                overall_current: &self.current,
                overall_comparison: &self.comparison,
                stage_order: &self.order,
                conversions: &self.conversions,
                lender_series: &self.lender_series,
                sub_current: &self.sub_current,
                sub_comparison: &self.sub_comparison,
                disbursals: &self.disbursals,
                catalog: &self.catalog,
                filters: &self.filters,
                config: &self.config,
                as_of: self.as_of,
            }
        }
    }
}
