//! Stage-to-Stage Conversion Calculator
//!
//! Derives conversion percentages and period-over-period deltas from
//! aggregated stage totals. The ordered stage-index sequence is caller
//! supplied, never inferred from the totals themselves, so adjacency stays
//! reproducible when a dimension-scoped view starts later in the funnel.

use crate::aggregate::StageSeries;
use crate::model::ConversionPoint;

/// Ratio of two stage counts as a percentage; exactly 0.0 (never NaN) when
/// the denominator is zero, so threshold comparisons stay well-defined.
pub fn stage_ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64 * 100.0
    }
}

fn count_at(series: &StageSeries, idx: i64) -> u64 {
    series.get(&idx).map(|t| t.lead_count).unwrap_or(0)
}

fn name_at(current: &StageSeries, comparison: &StageSeries, idx: i64) -> String {
    current
        .get(&idx)
        .or_else(|| comparison.get(&idx))
        .map(|t| t.stage_name.clone())
        .unwrap_or_else(|| format!("stage {idx}"))
}

/// Compute conversion points for every adjacent pair in `order`.
pub fn compute_conversions(
    current: &StageSeries,
    comparison: &StageSeries,
    order: &[i64],
) -> Vec<ConversionPoint> {
    order
        .windows(2)
        .map(|pair| {
            let (prev, cur) = (pair[0], pair[1]);
            let current_pct = stage_ratio(count_at(current, cur), count_at(current, prev));
            let comparison_pct = stage_ratio(count_at(comparison, cur), count_at(comparison, prev));
            ConversionPoint {
                from_index: prev,
                to_index: cur,
                from_stage: name_at(current, comparison, prev),
                to_stage: name_at(current, comparison, cur),
                current_pct,
                comparison_pct,
                delta_pct: current_pct - comparison_pct,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Period, StageTotals};
    use std::collections::BTreeMap;

    fn series(period: Period, stages: &[(i64, &str, u64)]) -> StageSeries {
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

    #[test]
    fn test_ratio_zero_denominator_is_zero() {
        assert_eq!(stage_ratio(100, 0), 0.0);
        assert_eq!(stage_ratio(0, 0), 0.0);
        assert!((stage_ratio(60, 100) - 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_conversions_adjacent_pairs() {
        let current = series(
            Period::Current,
            &[(2, "Workable", 10000), (3, "Child", 6000), (5, "Disbursed", 1200)],
        );
        let comparison = series(
            Period::Comparison,
            &[(2, "Workable", 10000), (3, "Child", 6500), (5, "Disbursed", 1430)],
        );

        let points = compute_conversions(&current, &comparison, &[2, 3, 5]);
        assert_eq!(points.len(), 2);

        let child = &points[0];
        assert_eq!(child.from_stage, "Workable");
        assert_eq!(child.to_stage, "Child");
        assert!((child.current_pct - 60.0).abs() < 1e-9);
        assert!((child.comparison_pct - 65.0).abs() < 1e-9);
        assert!((child.delta_pct + 5.0).abs() < 1e-9);

        let disb = &points[1];
        assert!((disb.current_pct - 20.0).abs() < 1e-9);
        assert!((disb.comparison_pct - 22.0).abs() < 1e-9);
    }

    #[test]
    fn test_conversions_never_nan() {
        let current = series(Period::Current, &[(2, "Workable", 0), (3, "Child", 0)]);
        let comparison = series(Period::Comparison, &[(2, "Workable", 0), (3, "Child", 10)]);

        let points = compute_conversions(&current, &comparison, &[2, 3]);
        assert_eq!(points[0].current_pct, 0.0);
        assert_eq!(points[0].comparison_pct, 0.0);
        assert!(points[0].delta_pct.is_finite());
    }

    #[test]
    fn test_missing_stage_treated_as_zero() {
        let current = series(Period::Current, &[(2, "Workable", 100)]);
        let comparison = series(Period::Comparison, &[(2, "Workable", 100), (3, "Child", 50)]);

        let points = compute_conversions(&current, &comparison, &[2, 3]);
        assert_eq!(points[0].current_pct, 0.0);
        assert!((points[0].comparison_pct - 50.0).abs() < 1e-9);
    }
}
