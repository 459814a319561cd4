//! Externally Overridable Analytics Configuration
//!
//! Every detection threshold, the average-ticket-size constant, and the
//! per-lender annual AOP targets live here. Defaults reproduce the dashboard
//! parity table exactly; partial JSON overrides are accepted field-by-field
//! via serde defaults.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Top-level configuration for one engine instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// Average disbursed ticket size in Lakhs, used to turn lead deltas into
    /// currency impact (1 Cr = 100 Lakhs).
    pub avg_ticket_lakhs: f64,
    /// Per-lender Annual Operating Plan targets in Crores per year.
    pub annual_targets_cr: BTreeMap<String, f64>,
    pub thresholds: Thresholds,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            avg_ticket_lakhs: 5.0,
            annual_targets_cr: BTreeMap::new(),
            thresholds: Thresholds::default(),
        }
    }
}

impl AnalyticsConfig {
    pub fn with_target(mut self, lender: impl Into<String>, annual_cr: f64) -> Self {
        self.annual_targets_cr.insert(lender.into(), annual_cr);
        self
    }
}

/// All detector thresholds in one overridable block.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub conversion: ConversionThresholds,
    pub volume: VolumeThresholds,
    pub stuck: StuckThresholds,
    pub aop: AopThresholds,
    pub concentration: ConcentrationThresholds,
}

/// Conversion-drop bands, in percentage points of delta.
///
/// The overall funnel and the per-lender view intentionally carry different
/// trigger points (−3pp vs −5pp); both are preserved verbatim for parity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionThresholds {
    pub overall_trigger_pp: f64,
    pub overall_critical_pp: f64,
    pub overall_high_pp: f64,
    pub lender_trigger_pp: f64,
    pub lender_critical_pp: f64,
    pub lender_high_pp: f64,
    /// Comparison-period conversion above this is considered healthy; a drop
    /// from a healthy baseline deeper than `new_drop_pp` is a New issue.
    pub healthy_baseline_pct: f64,
    pub new_drop_pp: f64,
}

impl Default for ConversionThresholds {
    fn default() -> Self {
        Self {
            overall_trigger_pp: -3.0,
            overall_critical_pp: -10.0,
            overall_high_pp: -5.0,
            lender_trigger_pp: -5.0,
            lender_critical_pp: -15.0,
            lender_high_pp: -8.0,
            healthy_baseline_pct: 70.0,
            new_drop_pp: 5.0,
        }
    }
}

/// Volume-dip bands, in relative percent change vs the comparison period.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeThresholds {
    pub overall_trigger_pct: f64,
    pub overall_critical_pct: f64,
    pub overall_high_pct: f64,
    pub lender_trigger_pct: f64,
    pub lender_high_pct: f64,
}

impl Default for VolumeThresholds {
    fn default() -> Self {
        Self {
            overall_trigger_pct: -10.0,
            overall_critical_pct: -25.0,
            overall_high_pct: -15.0,
            lender_trigger_pct: -20.0,
            lender_high_pct: -40.0,
        }
    }
}

/// Stuck-rate spike bands, in stuck percentage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StuckThresholds {
    pub min_stuck_pct: f64,
    pub delta_trigger_pp: f64,
    pub absolute_trigger_pct: f64,
    pub high_pct: f64,
}

impl Default for StuckThresholds {
    fn default() -> Self {
        Self {
            min_stuck_pct: 25.0,
            delta_trigger_pp: 5.0,
            absolute_trigger_pct: 40.0,
            high_pct: 50.0,
        }
    }
}

/// AOP pacing-gap bands, in percent of the monthly target.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AopThresholds {
    pub lender_trigger_pct: f64,
    pub lender_critical_pct: f64,
    pub lender_high_pct: f64,
    pub overall_trigger_pct: f64,
    pub overall_critical_pct: f64,
    pub overall_high_pct: f64,
    /// Gaps below this flag needs_attention even when not critical.
    pub attention_gap_pct: f64,
}

impl Default for AopThresholds {
    fn default() -> Self {
        Self {
            lender_trigger_pct: -15.0,
            lender_critical_pct: -40.0,
            lender_high_pct: -25.0,
            overall_trigger_pct: -10.0,
            overall_critical_pct: -30.0,
            overall_high_pct: -20.0,
            attention_gap_pct: -30.0,
        }
    }
}

/// Lender concentration bands, in percent of total disbursals.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConcentrationThresholds {
    pub top2_share_trigger_pct: f64,
    pub top2_share_high_pct: f64,
}

impl Default for ConcentrationThresholds {
    fn default() -> Self {
        Self {
            top2_share_trigger_pct: 65.0,
            top2_share_high_pct: 80.0,
        }
    }
}
