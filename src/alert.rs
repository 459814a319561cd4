//! Typed Alert Model
//!
//! Alerts are the detection engine's only output: one immutable value per
//! detector firing per run. Runs are idempotent, so alert ids are derived
//! from the category and dimension scope instead of random identifiers —
//! identical inputs always reproduce the identical alert set.

use serde::{Deserialize, Serialize};

/// What kind of deviation a detector found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertCategory {
    ConversionDrop,
    VolumeDip,
    StuckSpike,
    AopRisk,
    Concentration,
    /// Open slot for registered custom detectors.
    Anomaly,
}

impl AlertCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConversionDrop => "conversion_drop",
            Self::VolumeDip => "volume_dip",
            Self::StuckSpike => "stuck_spike",
            Self::AopRisk => "aop_risk",
            Self::Concentration => "concentration",
            Self::Anomaly => "anomaly",
        }
    }
}

/// Severity levels, totally ordered for ranking.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical = 0,
    High = 1,
    Medium = 2,
    Low = 3,
}

impl Severity {
    /// Ranking priority: critical first.
    pub fn priority(&self) -> u8 {
        *self as u8
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

/// Whether the condition is fresh, was already degraded last period, or is a
/// tracked structural metric. Inferred within a single run from current vs
/// comparison values, never from historical alert identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    New,
    Recurring,
    Known,
}

/// Editorial tone of the alert, consumed by the priority bucketer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    Bad,
    Warn,
    Info,
    Good,
}

impl Tone {
    /// Default mapping used by the built-in detectors; custom detectors may
    /// assign Good/Info tones for positive findings.
    pub fn from_severity(severity: Severity) -> Self {
        match severity {
            Severity::Critical | Severity::High => Tone::Bad,
            Severity::Medium | Severity::Low => Tone::Warn,
        }
    }
}

/// One detector finding with severity, business impact, and attribution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    /// Deterministic id: `category:scope:stage`.
    pub id: String,
    pub category: AlertCategory,
    pub severity: Severity,
    pub status: AlertStatus,
    pub tone: Tone,
    pub title: String,
    pub description: String,
    /// Estimated leads lost to the deviation.
    pub impact_leads: u64,
    /// Estimated currency impact in Crores.
    pub impact_cr: f64,
    pub lender: Option<String>,
    pub program: Option<String>,
    pub stage: Option<String>,
    pub stage_index: Option<i64>,
    pub metric_value: f64,
    pub baseline_value: f64,
    pub change_pct: f64,
    /// Opaque 0–100 score assigned by each detector's own heuristic; carried
    /// through to bucketing, never recomputed centrally.
    pub impact_weight: u8,
    pub needs_attention: bool,
}

impl Alert {
    pub fn builder(category: AlertCategory, severity: Severity) -> AlertBuilder {
        AlertBuilder::new(category, severity)
    }
}

/// Builder keeping detector code free of two-page struct literals.
pub struct AlertBuilder {
    alert: Alert,
}

impl AlertBuilder {
    pub fn new(category: AlertCategory, severity: Severity) -> Self {
        Self {
            alert: Alert {
                id: String::new(),
                category,
                severity,
                status: AlertStatus::New,
                tone: Tone::from_severity(severity),
                title: String::new(),
                description: String::new(),
                impact_leads: 0,
                impact_cr: 0.0,
                lender: None,
                program: None,
                stage: None,
                stage_index: None,
                metric_value: 0.0,
                baseline_value: 0.0,
                change_pct: 0.0,
                impact_weight: 0,
                needs_attention: severity == Severity::Critical,
            },
        }
    }

    pub fn status(mut self, status: AlertStatus) -> Self {
        self.alert.status = status;
        self
    }

    pub fn tone(mut self, tone: Tone) -> Self {
        self.alert.tone = tone;
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.alert.title = title.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.alert.description = description.into();
        self
    }

    pub fn lender(mut self, lender: impl Into<String>) -> Self {
        self.alert.lender = Some(lender.into());
        self
    }

    pub fn program(mut self, program: impl Into<String>) -> Self {
        self.alert.program = Some(program.into());
        self
    }

    pub fn stage(mut self, name: impl Into<String>, index: i64) -> Self {
        self.alert.stage = Some(name.into());
        self.alert.stage_index = Some(index);
        self
    }

    pub fn metrics(mut self, metric_value: f64, baseline_value: f64, change_pct: f64) -> Self {
        self.alert.metric_value = metric_value;
        self.alert.baseline_value = baseline_value;
        self.alert.change_pct = change_pct;
        self
    }

    pub fn impact(mut self, leads: u64, cr: f64) -> Self {
        self.alert.impact_leads = leads;
        self.alert.impact_cr = cr;
        self
    }

    pub fn impact_weight(mut self, weight: u8) -> Self {
        self.alert.impact_weight = weight.min(100);
        self
    }

    pub fn needs_attention(mut self, flag: bool) -> Self {
        self.alert.needs_attention = flag || self.alert.severity == Severity::Critical;
        self
    }

    pub fn build(mut self) -> Alert {
        let scope = self.alert.lender.as_deref().unwrap_or("overall");
        let stage = self
            .alert
            .stage_index
            .map(|i| i.to_string())
            .unwrap_or_else(|| "-".into());
        self.alert.id = format!("{}:{}:{}", self.alert.category.as_str(), scope, stage);
        self.alert
    }
}
