//! Earnings-only logistic baseline
//!
//! Used when a bundle is too thin for the richer models. The probability of
//! an up move maps to an expected return through the mean up and down moves.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use super::weighted_z_scores;
use crate::calibration::bound;
use crate::error::Result;
use crate::features::{extract_baseline, FeatureVector};
use crate::model::params::BaselineParameters;
use crate::numeric::sigmoid;
use crate::signals::SignalBundle;
use crate::types::TradeSignal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PositionSize {
    Full,
    Half,
    Small,
}

impl fmt::Display for PositionSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositionSize::Full => write!(f, "FULL"),
            PositionSize::Half => write!(f, "HALF"),
            PositionSize::Small => write!(f, "SMALL"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineScore {
    pub version: String,
    /// P(up move)
    pub probability_up: Decimal,
    /// Expected return, percent
    pub forecast: Decimal,
    pub signal: TradeSignal,
    pub position_size: PositionSize,
    pub confidence: Decimal,
}

pub struct BaselineModel<'p> {
    params: &'p BaselineParameters,
}

impl<'p> BaselineModel<'p> {
    pub fn new(params: &'p BaselineParameters) -> Self {
        Self { params }
    }

    pub fn score_bundle(&self, bundle: &SignalBundle) -> Result<BaselineScore> {
        let vector = extract_baseline(bundle)?;
        self.score(&vector)
    }

    pub fn score(&self, vector: &FeatureVector) -> Result<BaselineScore> {
        let p = self.params;
        let logit: Decimal = p.intercept
            + weighted_z_scores(&p.version, &p.features, vector)?
                .iter()
                .map(|(_, c)| *c)
                .sum::<Decimal>();
        let probability_up = sigmoid(logit);
        let forecast = probability_up * p.up_return_pct
            + (Decimal::ONE - probability_up) * p.down_return_pct;

        let signal = if probability_up >= p.long_threshold {
            TradeSignal::Long
        } else if probability_up <= p.short_threshold {
            TradeSignal::Short
        } else {
            TradeSignal::Neutral
        };
        let position_size = if probability_up >= p.full_size_threshold {
            PositionSize::Full
        } else if probability_up >= p.long_threshold || probability_up <= p.short_threshold {
            PositionSize::Half
        } else {
            PositionSize::Small
        };
        let confidence = bound(probability_up.max(Decimal::ONE - probability_up), p.confidence_cap);

        debug!(
            version = %p.version,
            probability_up = %probability_up,
            signal = %signal,
            "Baseline score"
        );

        Ok(BaselineScore {
            version: p.version.clone(),
            probability_up,
            forecast,
            signal,
            position_size,
            confidence,
        })
    }
}
