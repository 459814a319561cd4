//! Issue Lifecycle Engine
//!
//! Tracks every detected conversion-drop or stuck-spike finding through a
//! five-phase resolution lifecycle with quantified recovery. Phase state in
//! this reference implementation is simulated deterministically from a hash
//! of (lender, stage index) behind the `LifecyclePhaseProvider` trait, so a
//! production deployment can substitute event-sourced workflow state without
//! touching detection.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use xxhash_rust::xxh3::xxh3_64;

use crate::alert::{Alert, AlertCategory};

/// Resolution phases, totally ordered and forward-only.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssuePhase {
    Identified = 1,
    RcaInProgress = 2,
    FixDeployed = 3,
    Validated = 4,
    Closed = 5,
}

impl IssuePhase {
    pub fn order(&self) -> u8 {
        *self as u8
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Identified => "identified",
            Self::RcaInProgress => "rca_in_progress",
            Self::FixDeployed => "fix_deployed",
            Self::Validated => "validated",
            Self::Closed => "closed",
        }
    }
}

/// Phase and recovery state for one issue, plus the seed that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhaseAssignment {
    pub phase: IssuePhase,
    /// Share of the lost metric recovered so far, 0–100.
    pub recovery_pct: f64,
    pub seed: u64,
}

/// Source of lifecycle state. The seeded implementation below simulates a
/// workflow store; production implementations read real resolution events
/// and must preserve the phase total order and recovery semantics.
pub trait LifecyclePhaseProvider: Send + Sync {
    fn assign(&self, lender: &str, stage_index: i64) -> PhaseAssignment;
}

/// Deterministic reference provider: `seed = xxh3(lender, stage) mod 10`
/// mapped onto the phase ladder. Identical inputs always produce identical
/// assignments.
pub struct SeededPhaseProvider;

impl SeededPhaseProvider {
    fn from_seed(seed: u64) -> PhaseAssignment {
        let (phase, recovery_pct) = match seed {
            0 | 1 => (IssuePhase::Identified, 0.0),
            2 | 3 => (IssuePhase::RcaInProgress, 0.0),
            4..=6 => (IssuePhase::FixDeployed, 30.0 + (seed - 4) as f64 * 28.0),
            7 | 8 => (IssuePhase::Validated, 60.0 + (seed - 7) as f64 * 36.0),
            _ => (IssuePhase::Closed, 95.0),
        };
        PhaseAssignment {
            phase,
            recovery_pct,
            seed,
        }
    }
}

impl LifecyclePhaseProvider for SeededPhaseProvider {
    fn assign(&self, lender: &str, stage_index: i64) -> PhaseAssignment {
        let key = format!("{lender}#{stage_index}");
        Self::from_seed(xxh3_64(key.as_bytes()) % 10)
    }
}

/// One root-cause/fix pairing from the operations playbook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybookEntry {
    pub root_cause: String,
    pub fix: String,
}

/// Injected content catalogs, keyed by issue category and consumed
/// round-robin. The defaults are dashboard placeholder copy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybookCatalog {
    pub owners: Vec<String>,
    pub conversion: Vec<PlaybookEntry>,
    pub stuck: Vec<PlaybookEntry>,
}

fn entry(root_cause: &str, fix: &str) -> PlaybookEntry {
    PlaybookEntry {
        root_cause: root_cause.into(),
        fix: fix.into(),
    }
}

impl Default for PlaybookCatalog {
    fn default() -> Self {
        Self {
            owners: vec![
                "Priya".into(),
                "Rahul".into(),
                "Sneha".into(),
                "Arjun".into(),
            ],
            conversion: vec![
                entry(
                    "Lender tightened credit policy for thin-file applicants",
                    "Reroute the affected segment to alternate lenders until the policy is revisited",
                ),
                entry(
                    "Bureau pull failures spiking on the lender integration",
                    "Enable fallback bureau and raise an incident with the lender's API team",
                ),
                entry(
                    "New consent screen adding friction mid-funnel",
                    "Shorten consent copy and prefill applicant data on the screen",
                ),
                entry(
                    "Offer page latency regression after the last release",
                    "Roll back the offer service to the previous build and re-run the journey",
                ),
            ],
            stuck: vec![
                entry(
                    "KYC vendor queue backed up beyond SLA",
                    "Shift overflow verification traffic to the secondary vendor",
                ),
                entry(
                    "Bank statement upload failing for large files",
                    "Raise the upload size limit and compress client-side",
                ),
                entry(
                    "Manual underwriting queue understaffed for current volume",
                    "Auto-approve the low-risk band and add a weekend shift",
                ),
            ],
        }
    }
}

/// One tracked issue derived from an originating alert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueLifecycleItem {
    pub id: String,
    pub alert_id: String,
    pub category: AlertCategory,
    pub lender: Option<String>,
    pub stage: Option<String>,
    pub stage_index: Option<i64>,
    pub phase: IssuePhase,
    pub age_days: u32,
    pub owner: String,
    pub root_cause: String,
    pub fix: String,
    /// Metric at the moment the drop was detected.
    pub before_metric: f64,
    /// Metric implied by the recovery achieved so far.
    pub after_metric: f64,
    /// Metric once fully recovered to the baseline.
    pub target_metric: f64,
    pub recovery_pct: f64,
    /// Currency recovered so far: impact × recovery share.
    pub recovered_cr: f64,
}

/// Recovered currency rolled up per owner and per phase.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecoveryLedger {
    pub by_owner: BTreeMap<String, f64>,
    pub by_phase: BTreeMap<String, f64>,
    pub total_recovered_cr: f64,
}

impl RecoveryLedger {
    pub fn from_items(items: &[IssueLifecycleItem]) -> Self {
        let mut ledger = Self::default();
        for item in items {
            *ledger.by_owner.entry(item.owner.clone()).or_insert(0.0) += item.recovered_cr;
            *ledger
                .by_phase
                .entry(item.phase.name().to_string())
                .or_insert(0.0) += item.recovered_cr;
            ledger.total_recovered_cr += item.recovered_cr;
        }
        ledger
    }
}

const CONVERSION_AGE_CAP: u32 = 30;
const STUCK_AGE_CAP: u32 = 20;

/// Derives lifecycle items from the run's alert list.
pub struct IssueLifecycleEngine {
    provider: Box<dyn LifecyclePhaseProvider>,
    catalog: PlaybookCatalog,
}

impl Default for IssueLifecycleEngine {
    fn default() -> Self {
        Self::new(Box::new(SeededPhaseProvider), PlaybookCatalog::default())
    }
}

impl IssueLifecycleEngine {
    pub fn new(provider: Box<dyn LifecyclePhaseProvider>, catalog: PlaybookCatalog) -> Self {
        Self { provider, catalog }
    }

    /// Build lifecycle items for every conversion-drop and stuck-spike alert,
    /// in alert order. Pure: identical alert lists yield identical items.
    pub fn derive(&self, alerts: &[Alert]) -> Vec<IssueLifecycleItem> {
        let mut items = Vec::new();
        let mut conversion_rr = 0usize;
        let mut stuck_rr = 0usize;

        for alert in alerts {
            let playbook = match alert.category {
                AlertCategory::ConversionDrop => {
                    let i = conversion_rr;
                    conversion_rr += 1;
                    pick(&self.catalog.conversion, i)
                }
                AlertCategory::StuckSpike => {
                    let i = stuck_rr;
                    stuck_rr += 1;
                    pick(&self.catalog.stuck, i)
                }
                _ => continue,
            };
            let Some(playbook) = playbook else { continue };

            let lender = alert.lender.as_deref().unwrap_or("overall");
            let stage_index = alert.stage_index.unwrap_or(0);
            let assignment = self.provider.assign(lender, stage_index);
            let recovery = assignment.recovery_pct / 100.0;

            let (age_days, after_metric, target_metric) = match alert.category {
                AlertCategory::ConversionDrop => {
                    let drop = alert.change_pct.abs();
                    let age = (drop.round() as u64 + assignment.seed).min(CONVERSION_AGE_CAP as u64);
                    (
                        age as u32,
                        alert.metric_value + drop * recovery,
                        alert.metric_value + drop,
                    )
                }
                _ => {
                    let improvement = alert.change_pct.max(0.0);
                    let raw_age = (alert.baseline_value - alert.change_pct).round().max(0.0);
                    let age = (raw_age as u64 + assignment.seed).min(STUCK_AGE_CAP as u64);
                    (
                        age as u32,
                        alert.metric_value - improvement * recovery,
                        alert.metric_value - improvement,
                    )
                }
            };

            let owner = pick(&self.catalog.owners, items.len())
                .cloned()
                .unwrap_or_default();

            items.push(IssueLifecycleItem {
                id: format!("issue:{}", alert.id),
                alert_id: alert.id.clone(),
                category: alert.category,
                lender: alert.lender.clone(),
                stage: alert.stage.clone(),
                stage_index: alert.stage_index,
                phase: assignment.phase,
                age_days,
                owner,
                root_cause: playbook.root_cause.clone(),
                fix: playbook.fix.clone(),
                before_metric: alert.metric_value,
                after_metric,
                target_metric,
                recovery_pct: assignment.recovery_pct,
                recovered_cr: alert.impact_cr * recovery,
            });
        }

        items
    }
}

fn pick<T>(pool: &[T], index: usize) -> Option<&T> {
    if pool.is_empty() {
        None
    } else {
        Some(&pool[index % pool.len()])
    }
}
