//! funnel-core: Loan-Funnel Anomaly Detection and Issue Lifecycle
//!
//! Deterministic, threshold-based analytics core for a lending aggregator's
//! operations dashboard. Two-stage shape:
//! 1. Detection: aggregate a two-period snapshot, run the registered
//!    detector catalog, rank and bucket the resulting alerts.
//! 2. Lifecycle: track conversion and stuck findings through a five-phase
//!    resolution lifecycle with quantified recovery.
//!
//! The crate performs no I/O; `FunnelEngine::run` is pure over its snapshot
//! and safe to re-execute on every filter change.

pub mod aggregate;
pub mod alert;
pub mod config;
pub mod conversion;
pub mod detect;
pub mod engine;
pub mod impact;
pub mod lifecycle;
pub mod model;
pub mod triage;

// Re-exports for convenience
pub use alert::{Alert, AlertCategory, AlertStatus, Severity, Tone};
pub use config::{AnalyticsConfig, Thresholds};
pub use detect::{AnomalyDetector, DetectorContext, Findings};
pub use engine::{AnalysisError, AnalysisReport, FunnelEngine};
pub use lifecycle::{
    IssueLifecycleEngine, IssueLifecycleItem, IssuePhase, LifecyclePhaseProvider, PlaybookCatalog,
    RecoveryLedger, SeededPhaseProvider,
};
pub use model::{
    DimensionCatalog, DisbursalSummary, FunnelFilters, FunnelSnapshot, LeadStageRecord, Period,
};
pub use triage::PriorityBucket;
