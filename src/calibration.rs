//! Confidence calibration
//!
//! Provides:
//! - Coverage confidence: base plus a fixed increment per observed input category
//! - Informativeness adjustments (large surprise, failed provider groups)
//! - Imputation discount for z-score models
//! - Reliability binning of confidence against realized hit rate

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::features::InputCoverage;
use crate::model::params::ConfidenceParams;

/// Hard ceiling on any stored confidence
pub const MAX_CONFIDENCE: Decimal = dec!(0.95);

/// How much the observed inputs say, beyond mere presence
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Informativeness {
    pub large_surprise: bool,
    /// Provider groups that failed or timed out
    pub unavailable_groups: usize,
}

#[derive(Debug, Clone)]
pub struct ConfidenceCalibrator {
    params: ConfidenceParams,
}

impl ConfidenceCalibrator {
    pub fn new(params: ConfidenceParams) -> Self {
        Self { params }
    }

    pub fn with_defaults() -> Self {
        Self::new(ConfidenceParams::default())
    }

    /// Independent of the score itself: only what was supplied counts
    pub fn from_coverage(&self, coverage: &InputCoverage, info: &Informativeness) -> Decimal {
        let p = &self.params;
        let mut confidence = p.base;

        let increments = [
            (coverage.earnings, p.earnings),
            (coverage.guidance, p.guidance),
            (coverage.risk_sentiment, p.risk_sentiment),
            (coverage.concern, p.concern),
            (coverage.ticker_history, p.ticker_history),
            (coverage.analyst_coverage, p.analyst_coverage),
        ];
        for (observed, step) in increments {
            if observed {
                confidence += step;
            }
        }

        if info.large_surprise && coverage.earnings {
            confidence += p.large_surprise_bonus;
        }
        confidence -= p.unavailable_penalty * Decimal::from(info.unavailable_groups as i64);

        bound(confidence, p.cap)
    }

    /// Shrink a model's confidence by the share of its inputs that were imputed.
    /// A fully imputed vector keeps half.
    pub fn discount_imputed(&self, confidence: Decimal, imputed: usize, total: usize) -> Decimal {
        if total == 0 {
            return bound(confidence, self.params.cap);
        }
        let share = Decimal::from(imputed as i64) / Decimal::from(total as i64);
        bound(confidence * (dec!(1) - dec!(0.5) * share), self.params.cap)
    }
}

/// Clamp into [0, min(cap, 0.95)]
pub fn bound(confidence: Decimal, cap: Decimal) -> Decimal {
    confidence.max(Decimal::ZERO).min(cap.min(MAX_CONFIDENCE))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReliabilityBin {
    pub lower: Decimal,
    pub upper: Decimal,
    pub count: usize,
    pub mean_confidence: Decimal,
    pub hit_rate: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReliabilityReport {
    pub bins: Vec<ReliabilityBin>,
    /// Count-weighted mean |confidence - hit rate|
    pub expected_calibration_error: Decimal,
    pub samples: usize,
}

/// Bin (confidence, direction_correct) pairs into `bins` equal-width buckets
pub fn reliability(pairs: &[(Decimal, bool)], bins: usize) -> ReliabilityReport {
    let bins = bins.max(1);
    let width = dec!(1) / Decimal::from(bins as i64);
    // (sum_conf, hits, count)
    let mut acc = vec![(Decimal::ZERO, 0usize, 0usize); bins];

    for &(confidence, hit) in pairs {
        let c = confidence.max(Decimal::ZERO).min(dec!(1));
        let idx = (c / width).floor().to_usize().unwrap_or(0).min(bins - 1);
        let slot = &mut acc[idx];
        slot.0 += c;
        slot.1 += usize::from(hit);
        slot.2 += 1;
    }

    let total = pairs.len();
    let mut ece = Decimal::ZERO;
    let mut out = Vec::new();
    for (i, (sum_conf, hits, count)) in acc.into_iter().enumerate() {
        if count == 0 {
            continue;
        }
        let n = Decimal::from(count as i64);
        let mean_confidence = sum_conf / n;
        let hit_rate = Decimal::from(hits as i64) / n;
        ece += n / Decimal::from(total as i64) * (mean_confidence - hit_rate).abs();
        out.push(ReliabilityBin {
            lower: width * Decimal::from(i as i64),
            upper: width * Decimal::from(i as i64 + 1),
            count,
            mean_confidence,
            hit_rate,
        });
    }

    ReliabilityReport {
        bins: out,
        expected_calibration_error: ece,
        samples: total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_coverage() -> InputCoverage {
        InputCoverage {
            earnings: true,
            guidance: true,
            risk_sentiment: true,
            concern: true,
            ticker_history: true,
            analyst_coverage: true,
        }
    }

    #[test]
    fn test_base_only() {
        let calibrator = ConfidenceCalibrator::with_defaults();
        let c = calibrator.from_coverage(&InputCoverage::default(), &Informativeness::default());
        assert_eq!(c, dec!(0.40));
    }

    #[test]
    fn test_full_coverage_is_capped() {
        let calibrator = ConfidenceCalibrator::with_defaults();
        // 0.40 + 0.50 = 0.90, + 0.03 surprise bonus = 0.93
        let info = Informativeness {
            large_surprise: true,
            unavailable_groups: 0,
        };
        assert_eq!(calibrator.from_coverage(&full_coverage(), &info), dec!(0.93));

        let mut generous = ConfidenceParams::default();
        generous.base = dec!(0.6);
        let calibrator = ConfidenceCalibrator::new(generous);
        assert_eq!(calibrator.from_coverage(&full_coverage(), &info), dec!(0.95));
    }

    #[test]
    fn test_unavailable_groups_reduce_confidence() {
        let calibrator = ConfidenceCalibrator::with_defaults();
        let coverage = InputCoverage {
            earnings: true,
            ..Default::default()
        };
        let info = Informativeness {
            large_surprise: false,
            unavailable_groups: 2,
        };
        assert_eq!(calibrator.from_coverage(&coverage, &info), dec!(0.48));
    }

    #[test]
    fn test_discount_imputed() {
        let calibrator = ConfidenceCalibrator::with_defaults();
        assert_eq!(calibrator.discount_imputed(dec!(0.60), 0, 8), dec!(0.60));
        assert_eq!(calibrator.discount_imputed(dec!(0.60), 8, 8), dec!(0.30));
        assert_eq!(calibrator.discount_imputed(dec!(0.80), 4, 8), dec!(0.60));
    }

    #[test]
    fn test_reliability_bins() {
        let pairs = vec![
            (dec!(0.45), false),
            (dec!(0.42), true),
            (dec!(0.75), true),
            (dec!(0.78), true),
        ];
        let report = reliability(&pairs, 10);
        assert_eq!(report.samples, 4);
        assert_eq!(report.bins.len(), 2);
        assert_eq!(report.bins[0].count, 2);
        assert_eq!(report.bins[0].hit_rate, dec!(0.5));
        assert_eq!(report.bins[1].hit_rate, dec!(1));
        assert!(report.expected_calibration_error > Decimal::ZERO);
    }

    #[test]
    fn test_reliability_handles_confidence_of_one() {
        let report = reliability(&[(dec!(1), true)], 10);
        assert_eq!(report.bins[0].lower, dec!(0.9));
    }

    #[test]
    fn test_reliability_clamps_out_of_range_confidence() {
        let pairs = [(dec!(-0.2), false), (dec!(1.3), true)];
        let report = reliability(&pairs, 10);
        assert_eq!(report.bins.len(), 2);
        assert_eq!(report.bins[0].mean_confidence, Decimal::ZERO);
        assert_eq!(report.bins[1].mean_confidence, dec!(1));
        assert_eq!(report.expected_calibration_error, Decimal::ZERO);
    }
}
