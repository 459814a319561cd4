//! Funnel Analysis Engine
//!
//! One entry point wiring the full pipeline: aggregation → conversions and
//! impact → registered detectors → ranking → bucketing → lifecycle. A run is
//! synchronous, pure, and idempotent over its in-memory snapshot; the report
//! carries a fingerprint so a service layer can cache and retry it safely.

use std::collections::BTreeMap;
use tracing::{debug, info};
use xxhash_rust::xxh3::xxh3_64;

use crate::aggregate::{self, SubStageSeries};
use crate::alert::Alert;
use crate::config::AnalyticsConfig;
use crate::conversion::compute_conversions;
use crate::detect::{self, AnomalyDetector, DetectorContext};
use crate::lifecycle::{IssueLifecycleEngine, IssueLifecycleItem, RecoveryLedger};
use crate::model::{
    ConversionPoint, DimensionCatalog, DisbursalSummary, FunnelFilters, FunnelSnapshot, Period,
};
use crate::triage::{self, PriorityBucket};

/// The single error normal operation can produce: a wholly absent required
/// input collection. Everything softer (zero baselines, unmatched filters,
/// malformed rows) degrades to empty or counted results instead, so an
/// ingestion failure is never masked as "no issues found".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    MissingInput { collection: &'static str },
}

impl std::fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingInput { collection } => {
                write!(f, "required input collection is empty: {}", collection)
            }
        }
    }
}

impl std::error::Error for AnalysisError {}

/// Complete output of one analysis run: plain data for rendering or export.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AnalysisReport {
    /// Stable cache key over (records, disbursals, filters, config, as-of).
    pub fingerprint: String,
    pub as_of: chrono::NaiveDate,
    /// Ranked alerts: severity priority ascending, impact descending.
    pub alerts: Vec<Alert>,
    pub buckets: BTreeMap<PriorityBucket, Vec<String>>,
    pub issues: Vec<IssueLifecycleItem>,
    pub recovery: RecoveryLedger,
    /// Overall funnel conversions for the applied filter scope.
    pub conversions: Vec<ConversionPoint>,
    /// Malformed rows excluded from aggregation.
    pub skipped_records: u64,
}

/// Engine instance: configuration plus the registered detector list and the
/// lifecycle engine. Stateless across runs.
pub struct FunnelEngine {
    config: AnalyticsConfig,
    detectors: Vec<Box<dyn AnomalyDetector>>,
    lifecycle: IssueLifecycleEngine,
}

impl Default for FunnelEngine {
    fn default() -> Self {
        Self::new(AnalyticsConfig::default())
    }
}

impl FunnelEngine {
    pub fn new(config: AnalyticsConfig) -> Self {
        Self {
            config,
            detectors: detect::default_detectors(),
            lifecycle: IssueLifecycleEngine::default(),
        }
    }

    /// Register an additional detector after the built-ins.
    pub fn with_detector(mut self, detector: Box<dyn AnomalyDetector>) -> Self {
        self.detectors.push(detector);
        self
    }

    pub fn with_lifecycle(mut self, lifecycle: IssueLifecycleEngine) -> Self {
        self.lifecycle = lifecycle;
        self
    }

    pub fn config(&self) -> &AnalyticsConfig {
        &self.config
    }

    /// Cache key for a run: identical inputs always fingerprint identically.
    pub fn fingerprint(&self, snapshot: &FunnelSnapshot, filters: &FunnelFilters) -> String {
        let mut hasher_input = Vec::new();
        for part in [
            serde_json::to_vec(&snapshot.records),
            serde_json::to_vec(&snapshot.disbursals),
            serde_json::to_vec(&snapshot.as_of),
            serde_json::to_vec(filters),
            serde_json::to_vec(&self.config),
        ] {
            hasher_input.extend(part.unwrap_or_default());
            hasher_input.push(0);
        }
        format!("{:016x}", xxh3_64(&hasher_input))
    }

    /// Execute one full analysis run over the snapshot.
    pub fn run(
        &self,
        snapshot: &FunnelSnapshot,
        filters: &FunnelFilters,
    ) -> Result<AnalysisReport, AnalysisError> {
        if snapshot.records.is_empty() {
            return Err(AnalysisError::MissingInput {
                collection: "lead_stage_records",
            });
        }

        let skipped_records = aggregate::count_malformed(&snapshot.records);
        let overall_current = aggregate::aggregate(&snapshot.records, Period::Current, filters);
        let overall_comparison =
            aggregate::aggregate(&snapshot.records, Period::Comparison, filters);
        let stage_order = aggregate::stage_order(&overall_current, &overall_comparison);
        let conversions = compute_conversions(&overall_current, &overall_comparison, &stage_order);

        let sub_current: SubStageSeries =
            aggregate::aggregate_sub_stages(&snapshot.records, Period::Current, filters);
        let sub_comparison: SubStageSeries =
            aggregate::aggregate_sub_stages(&snapshot.records, Period::Comparison, filters);

        let catalog = DimensionCatalog::from_snapshot(&snapshot.records, &snapshot.disbursals);
        let lender_series = detect::build_lender_series(&snapshot.records, &catalog, filters);
        let disbursals = scope_disbursals(&snapshot.disbursals, filters);

        let ctx = DetectorContext {
            overall_current: &overall_current,
            overall_comparison: &overall_comparison,
            stage_order: &stage_order,
            conversions: &conversions,
            lender_series: &lender_series,
            sub_current: &sub_current,
            sub_comparison: &sub_comparison,
            disbursals: &disbursals,
            catalog: &catalog,
            filters,
            config: &self.config,
            as_of: snapshot.as_of,
        };

        let mut alerts: Vec<Alert> = Vec::new();
        for detector in &self.detectors {
            let findings = detector.detect(&ctx);
            debug!(
                detector = detector.name(),
                findings = findings.len(),
                "detector pass complete"
            );
            alerts.extend(findings);
        }

        triage::rank_alerts(&mut alerts);
        let buckets = triage::bucket_all(&alerts);
        let issues = self.lifecycle.derive(&alerts);
        let recovery = RecoveryLedger::from_items(&issues);

        info!(
            alerts = alerts.len(),
            issues = issues.len(),
            skipped = skipped_records,
            "analysis run complete"
        );

        Ok(AnalysisReport {
            fingerprint: self.fingerprint(snapshot, filters),
            as_of: snapshot.as_of,
            alerts,
            buckets,
            issues,
            recovery,
            conversions,
            skipped_records,
        })
    }
}

/// Disbursal rows narrowed to the run's dimension filters.
fn scope_disbursals(
    disbursals: &[DisbursalSummary],
    filters: &FunnelFilters,
) -> Vec<DisbursalSummary> {
    disbursals
        .iter()
        .filter(|d| {
            let dim_ok = |want: &Option<String>, have: &str| match want {
                Some(v) => v == have,
                None => true,
            };
            dim_ok(&filters.lender, &d.lender)
                && dim_ok(&filters.product_type, &d.product_type)
                && dim_ok(&filters.flow, &d.flow)
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::{AlertCategory, Severity, Tone};
    use crate::detect::Findings;
    use crate::model::LeadStageRecord;
    use chrono::NaiveDate;
    use smallvec::smallvec;

    fn record(period: Period, idx: f64, name: &str, lender: &str, count: u64) -> LeadStageRecord {
        LeadStageRecord {
            period,
            stage_index: idx,
            stage_name: name.into(),
            sub_stage: None,
            lender: lender.into(),
            product_type: "PL".into(),
            flow: "organic".into(),
            lead_count: count,
            stuck_pct: None,
        }
    }

    fn snapshot() -> FunnelSnapshot {
        FunnelSnapshot {
            records: vec![
                record(Period::Current, 2.0, "Workable", "Axio", 10000),
                record(Period::Current, 3.0, "Child", "Axio", 6000),
                record(Period::Current, 5.0, "Disbursed", "Axio", 1200),
                record(Period::Comparison, 2.0, "Workable", "Axio", 10000),
                record(Period::Comparison, 3.0, "Child", "Axio", 6500),
                record(Period::Comparison, 5.0, "Disbursed", "Axio", 1430),
            ],
            disbursals: Vec::new(),
            as_of: NaiveDate::from_ymd_opt(2025, 6, 15).unwrap(),
        }
    }

    #[test]
    fn test_empty_records_is_explicit_error() {
        let engine = FunnelEngine::default();
        let empty = FunnelSnapshot {
            records: Vec::new(),
            disbursals: Vec::new(),
            as_of: NaiveDate::from_ymd_opt(2025, 6, 15).unwrap(),
        };
        let err = engine.run(&empty, &FunnelFilters::all()).unwrap_err();
        assert_eq!(
            err,
            AnalysisError::MissingInput {
                collection: "lead_stage_records"
            }
        );
    }

    #[test]
    fn test_run_is_idempotent() {
        let engine = FunnelEngine::default();
        let snap = snapshot();
        let a = engine.run(&snap, &FunnelFilters::all()).unwrap();
        let b = engine.run(&snap, &FunnelFilters::all()).unwrap();
        assert_eq!(a.fingerprint, b.fingerprint);
        assert_eq!(
            serde_json::to_string(&a.alerts).unwrap(),
            serde_json::to_string(&b.alerts).unwrap()
        );
    }

    #[test]
    fn test_fingerprint_tracks_inputs() {
        let engine = FunnelEngine::default();
        let snap = snapshot();
        let base = engine.fingerprint(&snap, &FunnelFilters::all());

        assert_ne!(
            base,
            engine.fingerprint(&snap, &FunnelFilters::for_lender("Axio"))
        );

        let mut moved = snap.clone();
        moved.as_of = NaiveDate::from_ymd_opt(2025, 6, 16).unwrap();
        assert_ne!(base, engine.fingerprint(&moved, &FunnelFilters::all()));
    }

    #[test]
    fn test_unmatched_filter_yields_empty_not_error() {
        let engine = FunnelEngine::default();
        let report = engine
            .run(&snapshot(), &FunnelFilters::for_lender("NoSuchLender"))
            .unwrap();
        assert!(report.alerts.is_empty());
        assert!(report.issues.is_empty());
    }

    #[test]
    fn test_alerts_ranked_and_issues_parallel() {
        let engine = FunnelEngine::default();
        let report = engine.run(&snapshot(), &FunnelFilters::all()).unwrap();

        assert!(!report.alerts.is_empty());
        for pair in report.alerts.windows(2) {
            assert!(pair[0].severity.priority() <= pair[1].severity.priority());
        }
        // every conversion-drop alert has a lifecycle issue
        let drops = report
            .alerts
            .iter()
            .filter(|a| a.category == AlertCategory::ConversionDrop)
            .count();
        assert_eq!(report.issues.len(), drops);
    }

    #[test]
    fn test_custom_detector_registered() {
        struct AlwaysFires;
        impl AnomalyDetector for AlwaysFires {
            fn name(&self) -> &'static str {
                "always-fires"
            }
            fn category(&self) -> AlertCategory {
                AlertCategory::Anomaly
            }
            fn detect(&self, _ctx: &DetectorContext<'_>) -> Findings {
                smallvec![
                    Alert::builder(AlertCategory::Anomaly, Severity::Low)
                        .tone(Tone::Info)
                        .title("custom probe")
                        .build()
                ]
            }
        }

        let engine = FunnelEngine::default().with_detector(Box::new(AlwaysFires));
        let report = engine.run(&snapshot(), &FunnelFilters::all()).unwrap();
        assert!(
            report
                .alerts
                .iter()
                .any(|a| a.category == AlertCategory::Anomaly)
        );
        // info tone lands in the positive bucket
        assert!(
            report.buckets[&PriorityBucket::Positive]
                .iter()
                .any(|id| id.starts_with("anomaly"))
        );
    }

    #[test]
    fn test_malformed_rows_counted_not_fatal() {
        let mut snap = snapshot();
        snap.records
            .push(record(Period::Current, 2.5, "Broken", "Axio", 50));
        let report = FunnelEngine::default()
            .run(&snap, &FunnelFilters::all())
            .unwrap();
        assert_eq!(report.skipped_records, 1);
        assert!(!report.alerts.is_empty());
    }
}
