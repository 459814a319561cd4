//! Opsdesk: Stateless Analysis Server
//!
//! Thin HTTP surface over the funnel engine for the dashboard frontend:
//! - POST /v1/analyze  - run detection + lifecycle over a posted snapshot
//! - GET  /healthz     - health check
//! - GET  /metrics     - Prometheus metrics
//!
//! Every run is idempotent and side-effect free, so responses are cached in
//! memory by the run fingerprint and safely retryable.

use axum::{
    Json, Router,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use once_cell::sync::Lazy;
use prometheus::{Counter, Encoder, Histogram, TextEncoder};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::net::TcpListener;
use tracing::{info, warn};

use funnel_core::{
    AnalysisError, AnalysisReport, AnalyticsConfig, FunnelEngine, FunnelFilters, FunnelSnapshot,
};

// ============================================================================
// METRICS
// ============================================================================

static RUNS_TOTAL: Lazy<Counter> = Lazy::new(|| {
    let c = Counter::new("opsdesk_runs_total", "Total analysis runs executed").unwrap();
    prometheus::register(Box::new(c.clone())).unwrap();
    c
});

static ALERTS_TOTAL: Lazy<Counter> = Lazy::new(|| {
    let c = Counter::new("opsdesk_alerts_total", "Total alerts emitted").unwrap();
    prometheus::register(Box::new(c.clone())).unwrap();
    c
});

static CACHE_HITS: Lazy<Counter> = Lazy::new(|| {
    let c = Counter::new("opsdesk_cache_hits_total", "Analyze responses served from cache").unwrap();
    prometheus::register(Box::new(c.clone())).unwrap();
    c
});

static REJECTED_TOTAL: Lazy<Counter> = Lazy::new(|| {
    let c = Counter::new("opsdesk_rejected_total", "Analyze requests rejected as invalid").unwrap();
    prometheus::register(Box::new(c.clone())).unwrap();
    c
});

static RUN_LATENCY: Lazy<Histogram> = Lazy::new(|| {
    let h = Histogram::with_opts(prometheus::HistogramOpts::new(
        "opsdesk_run_duration_seconds",
        "Histogram of analysis run latency",
    ))
    .unwrap();
    prometheus::register(Box::new(h.clone())).unwrap();
    h
});

// ============================================================================
// STATE & DATA TYPES
// ============================================================================

/// Fingerprint-keyed response cache. Runs are pure, so an entry never goes
/// stale; a changed snapshot, filter set, or config changes the key.
static REPORT_CACHE: Lazy<RwLock<HashMap<String, Arc<AnalysisReport>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

#[derive(Debug, Clone, Deserialize)]
struct AnalyzeRequest {
    #[serde(flatten)]
    snapshot: FunnelSnapshot,
    #[serde(default)]
    filters: FunnelFilters,
    /// Optional per-request config override (thresholds, ticket size, AOP
    /// targets); omitted fields keep the parity defaults.
    #[serde(default)]
    config: Option<AnalyticsConfig>,
}

enum AnalyzeFailure {
    Invalid(AnalysisError),
}

impl IntoResponse for AnalyzeFailure {
    fn into_response(self) -> Response {
        match self {
            Self::Invalid(err) => {
                REJECTED_TOTAL.inc();
                (StatusCode::UNPROCESSABLE_ENTITY, err.to_string()).into_response()
            }
        }
    }
}

// ============================================================================
// HANDLERS
// ============================================================================

async fn analyze(
    Json(request): Json<AnalyzeRequest>,
) -> Result<Json<Arc<AnalysisReport>>, AnalyzeFailure> {
    let engine = match request.config {
        Some(config) => FunnelEngine::new(config),
        None => FunnelEngine::default(),
    };

    let fingerprint = engine.fingerprint(&request.snapshot, &request.filters);
    if let Ok(cache) = REPORT_CACHE.read() {
        if let Some(report) = cache.get(&fingerprint) {
            CACHE_HITS.inc();
            return Ok(Json(Arc::clone(report)));
        }
    }

    let timer = RUN_LATENCY.start_timer();
    let report = engine
        .run(&request.snapshot, &request.filters)
        .map_err(|err| {
            warn!(%err, "analyze request rejected");
            AnalyzeFailure::Invalid(err)
        })?;
    timer.observe_duration();

    RUNS_TOTAL.inc();
    ALERTS_TOTAL.inc_by(report.alerts.len() as f64);
    info!(
        fingerprint = %report.fingerprint,
        alerts = report.alerts.len(),
        issues = report.issues.len(),
        "analysis served"
    );

    let report = Arc::new(report);
    if let Ok(mut cache) = REPORT_CACHE.write() {
        cache.insert(fingerprint, Arc::clone(&report));
    }
    Ok(Json(report))
}

async fn metrics_handler() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}

async fn health_handler() -> &'static str {
    "OK"
}

// ============================================================================
// MAIN
// ============================================================================

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    info!("Initializing opsdesk analysis server");

    // Initialize metrics
    let _ = &*RUNS_TOTAL;
    let _ = &*ALERTS_TOTAL;
    let _ = &*CACHE_HITS;
    let _ = &*REJECTED_TOTAL;
    let _ = &*RUN_LATENCY;

    let app = Router::new()
        .route("/v1/analyze", post(analyze))
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(health_handler));

    let addr = std::env::var("OPSDESK_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let listener = TcpListener::bind(&addr).await.expect("Failed to bind port");

    info!(%addr, "Opsdesk listening.");
    info!("Endpoints:");
    info!("  POST /v1/analyze - Run detection + lifecycle over a snapshot");
    info!("  GET  /metrics    - Prometheus metrics");
    info!("  GET  /healthz    - Health check");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::signal::ctrl_c()
                .await
                .expect("failed to install CTRL+C handler");
            info!("Shutting down.");
        })
        .await
        .expect("Server crash");
}
