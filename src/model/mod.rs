//! Scoring models
//!
//! Every model is a pure function of a feature vector (or signal bundle) and
//! an explicitly passed, frozen parameter set.

pub mod baseline;
pub mod heuristic;
pub mod params;
pub mod standardized;

pub use baseline::{BaselineModel, BaselineScore, PositionSize};
pub use heuristic::{HeuristicEngine, HeuristicScore};
pub use params::{
    BaselineParameters, HeuristicParameters, ModelParameters, ParameterRegistry,
    StandardizedParameters,
};
pub use standardized::{ConfidenceBand, StandardizedModel, StandardizedScore};

use rust_decimal::Decimal;

use crate::error::{ForecastError, Result};
use crate::features::FeatureVector;
use crate::model::params::FeatureStat;

/// Per-feature z-score times weight, in parameter order.
/// The vector must carry exactly the parameter set's features, in the same order.
pub(crate) fn weighted_z_scores(
    version: &str,
    stats: &[FeatureStat],
    vector: &FeatureVector,
) -> Result<Vec<(String, Decimal)>> {
    if vector.len() != stats.len() {
        return Err(ForecastError::InvalidScale {
            feature: version.to_string(),
            expected: format!("{} features", stats.len()),
            actual: format!("{} features", vector.len()),
        });
    }
    stats
        .iter()
        .zip(vector.features())
        .map(|(stat, feature)| {
            if stat.name != feature.name || stat.scale != feature.scale {
                return Err(ForecastError::InvalidScale {
                    feature: feature.name.clone(),
                    expected: format!("{} ({})", stat.name, stat.scale),
                    actual: format!("{} ({})", feature.name, feature.scale),
                });
            }
            let z = (feature.value - stat.mean) / stat.std;
            Ok((stat.name.clone(), z * stat.weight))
        })
        .collect()
}
