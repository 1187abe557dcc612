//! Multi-factor heuristic engine
//!
//! Scoring runs in two phases:
//! 1. Baseline plus every additive factor, folded into an intermediate score
//! 2. Interaction stages in fixed order: regime, global damping, mega-cap floor, clamp
//!
//! Every step lands in `trace`, so the trace always sums to `value`. Only
//! entries above the materiality threshold make it into `reasoning`.
//! Confidence comes from input coverage alone, never from the score.

pub mod factors;

#[cfg(test)]
mod tests;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::calibration::{ConfidenceCalibrator, Informativeness};
use crate::features::HeuristicFeatures;
use crate::model::params::HeuristicParameters;
use crate::signals::SignalBundle;
use crate::types::{MarketCapTier, MarketRegime, ReasoningEntry};

pub use factors::{Factor, ADDITIVE_FACTORS};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeuristicScore {
    pub version: String,
    /// Final bounded forecast, percent
    pub value: Decimal,
    /// Sum of baseline and additive factors, before interactions
    pub intermediate: Decimal,
    pub confidence: Decimal,
    /// Every non-zero step; sums to `value`
    pub trace: Vec<ReasoningEntry>,
    /// Material steps only
    pub reasoning: Vec<ReasoningEntry>,
}

pub struct HeuristicEngine<'p> {
    params: &'p HeuristicParameters,
    calibrator: ConfidenceCalibrator,
}

impl<'p> HeuristicEngine<'p> {
    pub fn new(params: &'p HeuristicParameters) -> Self {
        Self {
            params,
            calibrator: ConfidenceCalibrator::new(params.confidence.clone()),
        }
    }

    pub fn params(&self) -> &HeuristicParameters {
        self.params
    }

    /// Extract features and score in one go
    pub fn score_bundle(&self, bundle: &SignalBundle) -> HeuristicScore {
        let features = HeuristicFeatures::extract(bundle);
        let info = Informativeness {
            large_surprise: features.eps_surprise_pct.abs() > self.params.earnings.large_threshold_pct,
            unavailable_groups: bundle.unavailable.len(),
        };
        self.score(&features, &info)
    }

    pub fn score(&self, features: &HeuristicFeatures, info: &Informativeness) -> HeuristicScore {
        let p = self.params;
        if let Ok(vector) = features.to_vector() {
            debug!(
                version = %p.version,
                imputed = vector.imputed_count(),
                inputs = ?vector.features(),
                "Heuristic inputs"
            );
        }
        let mut trace = Vec::new();

        if !p.baseline.is_zero() {
            trace.push(ReasoningEntry::new(
                "baseline",
                p.baseline,
                format!("Empirical mean reaction ({})", p.version),
            ));
        }
        trace.extend(ADDITIVE_FACTORS.iter().filter_map(|factor| factor(features, p)));
        let intermediate: Decimal = trace.iter().map(|e| e.impact).sum();

        let after_regime = regime_interaction(intermediate, features.regime, p);
        push_stage(&mut trace, "market_regime", after_regime - intermediate, || {
            regime_explanation(features.regime, intermediate)
        });

        let after_damping = after_regime * p.damping;
        push_stage(&mut trace, "damping", after_damping - after_regime, || {
            format!("Global damping x{}", p.damping)
        });

        let after_floor = mega_cap_floor(after_damping, features.cap_tier, features.regime, p);
        push_stage(&mut trace, "institutional_floor", after_floor - after_damping, || {
            format!("Mega-cap institutional support floor at {:.1}% in {} regime", after_floor, features.regime)
        });

        let value = clamp_bound(after_floor, p.bound);
        push_stage(&mut trace, "bound", value - after_floor, || {
            format!("Clamped to +/-{}%", p.bound)
        });

        let reasoning = trace
            .iter()
            .filter(|e| e.impact.abs() >= p.materiality)
            .cloned()
            .collect();
        // ticker history only counts once the history factor would use it
        let mut coverage = features.coverage;
        coverage.ticker_history &= features.ticker_sample_count >= p.history.min_ticker_samples;
        let confidence = self.calibrator.from_coverage(&coverage, info);

        debug!(
            version = %p.version,
            intermediate = %intermediate,
            value = %value,
            confidence = %confidence,
            "Heuristic score"
        );

        HeuristicScore {
            version: p.version.clone(),
            value,
            intermediate,
            confidence,
            trace,
            reasoning,
        }
    }
}

fn push_stage<F: FnOnce() -> String>(
    trace: &mut Vec<ReasoningEntry>,
    name: &str,
    delta: Decimal,
    explain: F,
) {
    if !delta.is_zero() {
        trace.push(ReasoningEntry::new(name, delta, explain()));
    }
}

fn regime_explanation(regime: MarketRegime, intermediate: Decimal) -> String {
    match (regime, intermediate >= Decimal::ZERO) {
        (MarketRegime::Bull, true) => "Bull regime amplifies positive setup".to_string(),
        (MarketRegime::Bull, false) => "Bull regime dampens negative setup (buy the dip)".to_string(),
        (MarketRegime::Bear, true) => "Bear regime dampens positive setup".to_string(),
        (MarketRegime::Bear, false) => "Bear regime amplifies negative setup".to_string(),
        (MarketRegime::Flat, _) => "Flat regime".to_string(),
    }
}

/// Piecewise regime interaction on the intermediate score
pub fn regime_interaction(score: Decimal, regime: MarketRegime, p: &HeuristicParameters) -> Decimal {
    let r = &p.regime;
    match regime {
        MarketRegime::Bull if score < Decimal::ZERO => score * r.bull_negative,
        MarketRegime::Bull => score * r.bull_positive,
        MarketRegime::Bear if score > Decimal::ZERO => score * r.bear_positive,
        MarketRegime::Bear => score * r.bear_negative,
        MarketRegime::Flat => score,
    }
}

/// Mega caps never fall below their regime floor
pub fn mega_cap_floor(
    score: Decimal,
    tier: MarketCapTier,
    regime: MarketRegime,
    p: &HeuristicParameters,
) -> Decimal {
    if tier != MarketCapTier::Mega {
        return score;
    }
    let floor = match regime {
        MarketRegime::Bull => p.mega_floor.bull,
        MarketRegime::Flat => p.mega_floor.flat,
        MarketRegime::Bear => p.mega_floor.bear,
    };
    score.max(floor)
}

pub fn clamp_bound(score: Decimal, bound: Decimal) -> Decimal {
    score.max(-bound).min(bound)
}
