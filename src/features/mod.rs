//! Feature extraction
//!
//! Every feature name has exactly one canonical scale across the crate. A ratio
//! (0.86) and a percentage (86.0) of the same quantity can never share a name,
//! and pushing a value under the wrong scale is an `InvalidScale` error.
//!
//! Extractors:
//! - `heuristic`: typed inputs for the multi-factor engine
//! - `standardized`: named vectors for the z-score models (8-factor and drift)
//! - `baseline`: earnings-surprise-only vector

pub mod baseline;
pub mod heuristic;
pub mod standardized;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::error;

use crate::error::{ForecastError, Result};

pub use baseline::extract_baseline;
pub use heuristic::{HeuristicFeatures, InputCoverage, ValuationTier};
pub use standardized::extract_standardized;

/// Bound on percentage surprises; guards near-zero consensus estimates
pub const MAX_SURPRISE_PCT: Decimal = dec!(1000);

/// Unit a feature value is expressed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scale {
    /// Plain ratio, 1.0 = parity
    Ratio,
    /// Percent, 1.0 = one percent
    Percent,
    /// Points on an upstream score scale
    Points,
    /// Dimensionless score
    Unit,
    Count,
    /// 0 or 1
    Binary,
    /// Natural log of a USD amount
    LogUsd,
}

impl fmt::Display for Scale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Scale::Ratio => "ratio",
            Scale::Percent => "percent",
            Scale::Points => "points",
            Scale::Unit => "unit",
            Scale::Count => "count",
            Scale::Binary => "binary",
            Scale::LogUsd => "log_usd",
        };
        write!(f, "{}", label)
    }
}

/// Canonical scale for every feature name the crate knows
pub fn canonical_scale(name: &str) -> Option<Scale> {
    let scale = match name {
        "eps_surprise_pct" => Scale::Percent,
        "surprise_magnitude_pct" => Scale::Percent,
        "eps_beat" | "eps_miss" | "large_beat" | "large_miss" => Scale::Binary,
        "risk_score_delta" => Scale::Points,
        "sentiment_score" => Scale::Unit,
        "concern_level" => Scale::Points,
        "net_analyst_upgrades" => Scale::Count,
        "consensus_score" => Scale::Points,
        "upside_to_target_pct" => Scale::Percent,
        "price_to_52w_high" => Scale::Ratio,
        "market_momentum_30d_pct" => Scale::Percent,
        "log_market_cap" => Scale::LogUsd,
        "sue" => Scale::Unit,
        "announcement_return_pct" => Scale::Percent,
        "relative_strength_60d_pct" => Scale::Percent,
        "earnings_yield_pct" => Scale::Percent,
        "beta" => Scale::Ratio,
        "ticker_mean_return_pct" | "generic_mean_return_pct" => Scale::Percent,
        _ => return None,
    };
    Some(scale)
}

/// Fail if `name` is unknown or declared with a non-canonical scale
pub fn check_scale(name: &str, declared: Scale) -> Result<()> {
    match canonical_scale(name) {
        Some(expected) if expected == declared => Ok(()),
        Some(expected) => {
            error!(feature = name, %expected, actual = %declared, "Feature scale mismatch");
            Err(ForecastError::InvalidScale {
                feature: name.to_string(),
                expected: expected.to_string(),
                actual: declared.to_string(),
            })
        }
        None => Err(ForecastError::InvalidScale {
            feature: name.to_string(),
            expected: "registered feature".to_string(),
            actual: declared.to_string(),
        }),
    }
}

pub fn clamp_surprise_pct(pct: Decimal) -> Decimal {
    pct.max(-MAX_SURPRISE_PCT).min(MAX_SURPRISE_PCT)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub name: String,
    pub scale: Scale,
    pub value: Decimal,
    /// True when the value is a fallback constant rather than an observed input
    pub imputed: bool,
}

/// Ordered, fully populated named vector
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    features: Vec<Feature>,
}

impl FeatureVector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: &str, scale: Scale, value: Decimal, imputed: bool) -> Result<()> {
        check_scale(name, scale)?;
        if self.get(name).is_some() {
            return Err(ForecastError::InvalidScale {
                feature: name.to_string(),
                expected: "unique feature name".to_string(),
                actual: "duplicate".to_string(),
            });
        }
        self.features.push(Feature {
            name: name.to_string(),
            scale,
            value,
            imputed,
        });
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Decimal> {
        self.features.iter().find(|f| f.name == name).map(|f| f.value)
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn names(&self) -> Vec<&str> {
        self.features.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn values(&self) -> Vec<Decimal> {
        self.features.iter().map(|f| f.value).collect()
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn imputed_count(&self) -> usize {
        self.features.iter().filter(|f| f.imputed).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_rejects_wrong_scale() {
        let mut v = FeatureVector::new();
        let err = v
            .push("price_to_52w_high", Scale::Percent, dec!(86), false)
            .unwrap_err();
        match err {
            ForecastError::InvalidScale { feature, expected, actual } => {
                assert_eq!(feature, "price_to_52w_high");
                assert_eq!(expected, "ratio");
                assert_eq!(actual, "percent");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_push_rejects_unknown_and_duplicate() {
        let mut v = FeatureVector::new();
        assert!(v.push("mystery", Scale::Unit, dec!(1), false).is_err());
        v.push("beta", Scale::Ratio, dec!(1.1), false).unwrap();
        assert!(v.push("beta", Scale::Ratio, dec!(1.2), false).is_err());
    }

    #[test]
    fn test_vector_accessors() {
        let mut v = FeatureVector::new();
        v.push("eps_surprise_pct", Scale::Percent, dec!(4.2), false).unwrap();
        v.push("sentiment_score", Scale::Unit, dec!(0.08), true).unwrap();
        assert_eq!(v.len(), 2);
        assert_eq!(v.get("eps_surprise_pct"), Some(dec!(4.2)));
        assert_eq!(v.names(), vec!["eps_surprise_pct", "sentiment_score"]);
        assert_eq!(v.imputed_count(), 1);
    }

    #[test]
    fn test_surprise_clamp() {
        assert_eq!(clamp_surprise_pct(dec!(25000)), dec!(1000));
        assert_eq!(clamp_surprise_pct(dec!(-1500)), dec!(-1000));
        assert_eq!(clamp_surprise_pct(dec!(12.5)), dec!(12.5));
    }
}
