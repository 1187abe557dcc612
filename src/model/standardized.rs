//! Standardized linear model with frozen percentile bands
//!
//! raw = Σ weight · (value − mean) / std over the parameter set's features.
//! The raw score is classified against percentiles fixed at calibration time,
//! so the same vector always lands in the same band.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use super::weighted_z_scores;
use crate::calibration::{bound, MAX_CONFIDENCE};
use crate::error::Result;
use crate::features::{extract_standardized, FeatureVector};
use crate::model::params::{PercentileBands, StandardizedParameters};
use crate::signals::SignalBundle;
use crate::types::TradeSignal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceBand {
    High,
    Medium,
    Low,
}

impl fmt::Display for ConfidenceBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfidenceBand::High => write!(f, "high"),
            ConfidenceBand::Medium => write!(f, "medium"),
            ConfidenceBand::Low => write!(f, "low"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureContribution {
    pub feature: String,
    pub contribution: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardizedScore {
    pub version: String,
    pub raw_score: Decimal,
    /// raw score plus the long-run market baseline, percent
    pub expected_alpha: Decimal,
    pub signal: TradeSignal,
    pub band: ConfidenceBand,
    pub confidence: Decimal,
    pub contributions: Vec<FeatureContribution>,
    /// Features that fell back to their training mean
    pub imputed: usize,
    pub total: usize,
}

/// Map a raw score onto (signal, band). Upper edges are exclusive on the long
/// side and lower edges inclusive on the short side.
pub fn classify(raw: Decimal, bands: &PercentileBands) -> (TradeSignal, ConfidenceBand) {
    if raw > bands.p90 {
        (TradeSignal::Long, ConfidenceBand::High)
    } else if raw > bands.p75 {
        (TradeSignal::Long, ConfidenceBand::Medium)
    } else if raw < bands.p10 {
        (TradeSignal::Short, ConfidenceBand::High)
    } else if raw < bands.p25 {
        (TradeSignal::Short, ConfidenceBand::Medium)
    } else {
        (TradeSignal::Neutral, ConfidenceBand::Low)
    }
}

pub struct StandardizedModel<'p> {
    params: &'p StandardizedParameters,
}

impl<'p> StandardizedModel<'p> {
    pub fn new(params: &'p StandardizedParameters) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &StandardizedParameters {
        self.params
    }

    pub fn score_bundle(&self, bundle: &SignalBundle) -> Result<StandardizedScore> {
        let vector = extract_standardized(bundle, self.params)?;
        self.score(&vector)
    }

    pub fn score(&self, vector: &FeatureVector) -> Result<StandardizedScore> {
        let p = self.params;
        let weighted = weighted_z_scores(&p.version, &p.features, vector)?;
        let raw_score: Decimal = weighted.iter().map(|(_, c)| *c).sum();
        let (signal, band) = classify(raw_score, &p.percentiles);
        let confidence = match band {
            ConfidenceBand::High => p.band_confidence.high,
            ConfidenceBand::Medium => p.band_confidence.medium,
            ConfidenceBand::Low => p.band_confidence.low,
        };

        debug!(
            version = %p.version,
            raw = %raw_score,
            signal = %signal,
            band = %band,
            "Standardized score"
        );

        Ok(StandardizedScore {
            version: p.version.clone(),
            raw_score,
            expected_alpha: raw_score + p.market_baseline_pct,
            signal,
            band,
            confidence: bound(confidence, MAX_CONFIDENCE),
            contributions: weighted
                .into_iter()
                .map(|(feature, contribution)| FeatureContribution {
                    feature,
                    contribution,
                })
                .collect(),
            imputed: vector.imputed_count(),
            total: vector.len(),
        })
    }
}
