//! Frozen, versioned model parameters
//!
//! A parameter set is configuration: it is built once, validated, wrapped in an
//! `Arc` and shared read-only. Recalibrating produces a new version id; the
//! registry refuses to overwrite one that already exists.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::error::{ForecastError, Result};
use crate::features::{check_scale, Scale};

// ---------------------------------------------------------------------------
// Heuristic engine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConcernParams {
    /// At or above: positive tone is inverted
    pub high_threshold: Decimal,
    /// At or above (and below high): positive tone is damped
    pub elevated_threshold: Decimal,
    pub inversion_factor: Decimal,
    pub elevated_damping: Decimal,
    /// Weight of (midpoint - concern)
    pub centered_weight: Decimal,
    pub midpoint: Decimal,
}

impl Default for ConcernParams {
    fn default() -> Self {
        Self {
            high_threshold: dec!(7.0),
            elevated_threshold: dec!(5.5),
            inversion_factor: dec!(0.5),
            elevated_damping: dec!(0.5),
            centered_weight: dec!(0.3),
            midpoint: dec!(5.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EarningsParams {
    pub beat: Decimal,
    pub large_beat_bonus: Decimal,
    pub miss: Decimal,
    pub large_miss_penalty: Decimal,
    /// |surprise| beyond this is "large", percent
    pub large_threshold_pct: Decimal,
    pub inline: Decimal,
    pub revenue_beat: Decimal,
    pub revenue_miss: Decimal,
}

impl Default for EarningsParams {
    fn default() -> Self {
        Self {
            beat: dec!(1.0),
            large_beat_bonus: dec!(0.8),
            miss: dec!(-1.0),
            large_miss_penalty: dec!(-0.7),
            large_threshold_pct: dec!(10),
            inline: dec!(0.6),
            revenue_beat: dec!(0.8),
            revenue_miss: dec!(-1.5),
        }
    }
}

/// Earnings reaction multiplier by P/E tier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValuationMultipliers {
    pub value: Decimal,
    pub fair: Decimal,
    pub growth: Decimal,
    pub premium: Decimal,
    pub unknown: Decimal,
}

impl Default for ValuationMultipliers {
    fn default() -> Self {
        Self {
            value: dec!(0.8),
            fair: dec!(1.0),
            growth: dec!(1.2),
            premium: dec!(1.4),
            unknown: dec!(1.0),
        }
    }
}

/// Earnings reaction multiplier by market-cap tier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiquidityMultipliers {
    pub small: Decimal,
    pub mid: Decimal,
    pub large: Decimal,
    pub mega: Decimal,
    pub unknown: Decimal,
}

impl Default for LiquidityMultipliers {
    fn default() -> Self {
        Self {
            small: dec!(0.9),
            mid: dec!(1.0),
            large: dec!(1.15),
            mega: dec!(1.3),
            unknown: dec!(1.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuidanceParams {
    pub raised: Decimal,
    pub lowered: Decimal,
    pub initiated: Decimal,
    pub maintained: Decimal,
}

impl Default for GuidanceParams {
    fn default() -> Self {
        Self {
            raised: dec!(3.5),
            lowered: dec!(-4.0),
            initiated: dec!(1.0),
            maintained: dec!(0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilingTypeParams {
    pub annual: Decimal,
    pub quarterly: Decimal,
    pub earnings_announcement: Decimal,
    pub earnings_with_financials: Decimal,
    pub material_event: Decimal,
    pub other: Decimal,
}

impl Default for FilingTypeParams {
    fn default() -> Self {
        Self {
            annual: dec!(0.1),
            quarterly: dec!(0.0),
            earnings_announcement: dec!(0.4),
            earnings_with_financials: dec!(0.6),
            material_event: dec!(-0.3),
            other: dec!(0.0),
        }
    }
}

/// Non-monotonic market-cap curve, thresholds in USD
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SizeCurveParams {
    pub sweet_spot_low_usd: Decimal,
    pub sweet_spot_high_usd: Decimal,
    pub mega_usd: Decimal,
    pub below_sweet_spot: Decimal,
    pub sweet_spot: Decimal,
    pub sweet_spot_bull_bonus: Decimal,
    pub upper: Decimal,
    pub mega: Decimal,
}

impl Default for SizeCurveParams {
    fn default() -> Self {
        Self {
            sweet_spot_low_usd: dec!(200_000_000_000),
            sweet_spot_high_usd: dec!(500_000_000_000),
            mega_usd: dec!(1_000_000_000_000),
            below_sweet_spot: dec!(-0.5),
            sweet_spot: dec!(1.0),
            sweet_spot_bull_bonus: dec!(0.5),
            upper: dec!(0.3),
            mega: dec!(0.5),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MacroFlowParams {
    pub weak_dollar: Decimal,
    pub strong_dollar: Decimal,
    pub expanding: Decimal,
    pub contracting: Decimal,
    /// Shift applied to large/mega (+) and small/mid (-) in elevated volatility
    pub flight_to_quality: Decimal,
}

impl Default for MacroFlowParams {
    fn default() -> Self {
        Self {
            weak_dollar: dec!(0.3),
            strong_dollar: dec!(-0.3),
            expanding: dec!(0.3),
            contracting: dec!(-0.4),
            flight_to_quality: dec!(0.5),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalystParams {
    pub upgrade: Decimal,
    pub major_upgrade: Decimal,
    pub upgrade_cap: Decimal,
    pub downgrade: Decimal,
    pub major_downgrade: Decimal,
    pub downgrade_cap: Decimal,
    pub strong_buy_threshold: Decimal,
    pub strong_buy: Decimal,
    pub buy_threshold: Decimal,
    pub buy: Decimal,
    pub sell_threshold: Decimal,
    pub sell: Decimal,
    pub upside_per_pct: Decimal,
    pub upside_cap: Decimal,
}

impl Default for AnalystParams {
    fn default() -> Self {
        Self {
            upgrade: dec!(0.3),
            major_upgrade: dec!(0.6),
            upgrade_cap: dec!(1.5),
            downgrade: dec!(0.4),
            major_downgrade: dec!(0.8),
            downgrade_cap: dec!(2.0),
            strong_buy_threshold: dec!(1.8),
            strong_buy: dec!(0.5),
            buy_threshold: dec!(2.5),
            buy: dec!(0.2),
            sell_threshold: dec!(3.5),
            sell: dec!(-0.5),
            upside_per_pct: dec!(0.04),
            upside_cap: dec!(0.8),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryParams {
    pub ticker_weight: Decimal,
    pub min_ticker_samples: u32,
    pub generic_weight: Decimal,
}

impl Default for HistoryParams {
    fn default() -> Self {
        Self {
            ticker_weight: dec!(0.4),
            min_ticker_samples: 3,
            generic_weight: dec!(0.15),
        }
    }
}

/// Multipliers applied to the intermediate score by regime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegimeParams {
    pub bull_negative: Decimal,
    pub bull_positive: Decimal,
    pub bear_positive: Decimal,
    pub bear_negative: Decimal,
}

impl Default for RegimeParams {
    fn default() -> Self {
        Self {
            bull_negative: dec!(0.3),
            bull_positive: dec!(1.1),
            bear_positive: dec!(0.5),
            bear_negative: dec!(1.2),
        }
    }
}

/// Lowest score a mega cap may reach, by regime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MegaCapFloor {
    pub bull: Decimal,
    pub flat: Decimal,
    pub bear: Decimal,
}

impl Default for MegaCapFloor {
    fn default() -> Self {
        Self {
            bull: dec!(-1.5),
            flat: dec!(-3.0),
            bear: dec!(-5.0),
        }
    }
}

/// Input-coverage confidence increments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceParams {
    pub base: Decimal,
    pub earnings: Decimal,
    pub guidance: Decimal,
    pub risk_sentiment: Decimal,
    pub concern: Decimal,
    pub ticker_history: Decimal,
    pub analyst_coverage: Decimal,
    /// Added when the EPS surprise is large
    pub large_surprise_bonus: Decimal,
    /// Subtracted per provider group that failed during assembly
    pub unavailable_penalty: Decimal,
    pub cap: Decimal,
}

impl Default for ConfidenceParams {
    fn default() -> Self {
        Self {
            base: dec!(0.40),
            earnings: dec!(0.12),
            guidance: dec!(0.10),
            risk_sentiment: dec!(0.08),
            concern: dec!(0.05),
            ticker_history: dec!(0.08),
            analyst_coverage: dec!(0.07),
            large_surprise_bonus: dec!(0.03),
            unavailable_penalty: dec!(0.02),
            cap: dec!(0.95),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeuristicParameters {
    pub version: String,
    pub description: String,
    /// Empirical mean reaction the score starts from
    pub baseline: Decimal,
    pub risk_weight: Decimal,
    pub sentiment_weight: Decimal,
    pub concern: ConcernParams,
    pub earnings: EarningsParams,
    pub valuation: ValuationMultipliers,
    pub liquidity: LiquidityMultipliers,
    pub guidance: GuidanceParams,
    pub filing_type: FilingTypeParams,
    pub size_curve: SizeCurveParams,
    pub macro_flow: MacroFlowParams,
    pub analysts: AnalystParams,
    pub history: HistoryParams,
    pub regime: RegimeParams,
    pub mega_floor: MegaCapFloor,
    pub damping: Decimal,
    pub bound: Decimal,
    /// Entries smaller than this stay out of the reasoning trace
    pub materiality: Decimal,
    pub confidence: ConfidenceParams,
}

impl Default for HeuristicParameters {
    fn default() -> Self {
        Self::v2()
    }
}

impl HeuristicParameters {
    /// Recalibrated engine with +0.83 empirical baseline. Canonical.
    pub fn v2() -> Self {
        Self {
            version: "heuristic-v2".to_string(),
            description: "Multi-factor engine, +0.83 baseline, risk weight 0.8".to_string(),
            baseline: dec!(0.83),
            risk_weight: dec!(0.8),
            sentiment_weight: dec!(5.0),
            concern: ConcernParams::default(),
            earnings: EarningsParams::default(),
            valuation: ValuationMultipliers::default(),
            liquidity: LiquidityMultipliers::default(),
            guidance: GuidanceParams::default(),
            filing_type: FilingTypeParams::default(),
            size_curve: SizeCurveParams::default(),
            macro_flow: MacroFlowParams::default(),
            analysts: AnalystParams::default(),
            history: HistoryParams::default(),
            regime: RegimeParams::default(),
            mega_floor: MegaCapFloor::default(),
            damping: dec!(0.85),
            bound: dec!(10),
            materiality: dec!(0.05),
            confidence: ConfidenceParams::default(),
        }
    }

    /// First revision: zero baseline, lighter risk weight
    pub fn v1() -> Self {
        Self {
            version: "heuristic-v1".to_string(),
            description: "Multi-factor engine, zero baseline, risk weight 0.3".to_string(),
            baseline: dec!(0.0),
            risk_weight: dec!(0.3),
            sentiment_weight: dec!(4.0),
            ..Self::v2()
        }
    }

    /// Risk-heavy revision
    pub fn v3() -> Self {
        Self {
            version: "heuristic-v3".to_string(),
            description: "Multi-factor engine, +0.83 baseline, risk weight 1.2".to_string(),
            risk_weight: dec!(1.2),
            ..Self::v2()
        }
    }

    pub fn validate(&self) -> Result<()> {
        let fail = |reason: &str| Err(ForecastError::invalid_parameters(&self.version, reason));
        if self.bound <= Decimal::ZERO {
            return fail("bound must be positive");
        }
        if self.damping <= Decimal::ZERO || self.damping > dec!(1) {
            return fail("damping must lie in (0, 1]");
        }
        if self.materiality < Decimal::ZERO {
            return fail("materiality cannot be negative");
        }
        if self.concern.elevated_threshold > self.concern.high_threshold {
            return fail("elevated concern threshold above high threshold");
        }
        if self.size_curve.sweet_spot_low_usd >= self.size_curve.sweet_spot_high_usd
            || self.size_curve.sweet_spot_high_usd >= self.size_curve.mega_usd
        {
            return fail("size curve thresholds must increase");
        }
        let floors = &self.mega_floor;
        if floors.bull < -self.bound || floors.flat < -self.bound || floors.bear < -self.bound {
            return fail("mega-cap floor below output bound");
        }
        if self.confidence.cap <= Decimal::ZERO || self.confidence.cap > dec!(0.95) {
            return fail("confidence cap must lie in (0, 0.95]");
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Standardized z-score models
// ---------------------------------------------------------------------------

/// Frozen training statistics and weight for one feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureStat {
    pub name: String,
    pub scale: Scale,
    pub mean: Decimal,
    pub std: Decimal,
    pub weight: Decimal,
}

impl FeatureStat {
    pub fn new(name: &str, scale: Scale, mean: Decimal, std: Decimal, weight: Decimal) -> Self {
        Self {
            name: name.to_string(),
            scale,
            mean,
            std,
            weight,
        }
    }
}

/// Raw-score percentiles computed at calibration time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PercentileBands {
    pub p10: Decimal,
    pub p25: Decimal,
    pub p50: Decimal,
    pub p75: Decimal,
    pub p90: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandConfidence {
    pub high: Decimal,
    pub medium: Decimal,
    pub low: Decimal,
}

impl Default for BandConfidence {
    fn default() -> Self {
        Self {
            high: dec!(0.75),
            medium: dec!(0.60),
            low: dec!(0.40),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardizedParameters {
    pub version: String,
    #[serde(default)]
    pub description: String,
    pub features: Vec<FeatureStat>,
    pub percentiles: PercentileBands,
    /// Long-run market drift added to the raw score, percent
    pub market_baseline_pct: Decimal,
    #[serde(default)]
    pub band_confidence: BandConfidence,
}

impl StandardizedParameters {
    pub fn standardized_v1() -> Self {
        Self {
            version: "standardized-v1".to_string(),
            description: "8-factor z-score model with frozen percentile bands".to_string(),
            features: vec![
                FeatureStat::new("eps_surprise_pct", Scale::Percent, dec!(2.8), dec!(14.0), dec!(0.42)),
                FeatureStat::new("risk_score_delta", Scale::Points, dec!(0.1), dec!(1.4), dec!(-0.31)),
                FeatureStat::new("sentiment_score", Scale::Unit, dec!(0.08), dec!(0.35), dec!(0.27)),
                FeatureStat::new("concern_level", Scale::Points, dec!(4.9), dec!(1.8), dec!(-0.22)),
                FeatureStat::new("net_analyst_upgrades", Scale::Count, dec!(0.3), dec!(1.6), dec!(0.18)),
                FeatureStat::new("price_to_52w_high", Scale::Ratio, dec!(0.86), dec!(0.11), dec!(0.15)),
                FeatureStat::new("market_momentum_30d_pct", Scale::Percent, dec!(1.1), dec!(4.2), dec!(0.20)),
                FeatureStat::new("log_market_cap", Scale::LogUsd, dec!(25.3), dec!(1.6), dec!(0.12)),
            ],
            percentiles: PercentileBands {
                p10: dec!(-0.62),
                p25: dec!(-0.28),
                p50: dec!(0.02),
                p75: dec!(0.31),
                p90: dec!(0.66),
            },
            market_baseline_pct: dec!(0.20),
            band_confidence: BandConfidence::default(),
        }
    }

    /// Post-filing drift factor set
    pub fn drift_v1() -> Self {
        Self {
            version: "drift-v1".to_string(),
            description: "Post-earnings-announcement drift factors".to_string(),
            features: vec![
                FeatureStat::new("sue", Scale::Unit, dec!(0.2), dec!(1.0), dec!(0.35)),
                FeatureStat::new("announcement_return_pct", Scale::Percent, dec!(0.3), dec!(4.5), dec!(0.25)),
                FeatureStat::new("relative_strength_60d_pct", Scale::Percent, dec!(2.0), dec!(12.0), dec!(0.10)),
                FeatureStat::new("log_market_cap", Scale::LogUsd, dec!(25.3), dec!(1.6), dec!(-0.08)),
                FeatureStat::new("earnings_yield_pct", Scale::Percent, dec!(4.5), dec!(3.0), dec!(0.12)),
                FeatureStat::new("beta", Scale::Ratio, dec!(1.1), dec!(0.35), dec!(-0.05)),
            ],
            percentiles: PercentileBands {
                p10: dec!(-0.55),
                p25: dec!(-0.25),
                p50: dec!(0.00),
                p75: dec!(0.27),
                p90: dec!(0.58),
            },
            market_baseline_pct: dec!(0.15),
            band_confidence: BandConfidence::default(),
        }
    }

    pub fn feature_names(&self) -> Vec<&str> {
        self.features.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn validate(&self) -> Result<()> {
        if self.features.is_empty() {
            return Err(ForecastError::invalid_parameters(&self.version, "no features"));
        }
        for stat in &self.features {
            check_scale(&stat.name, stat.scale)?;
            if stat.std <= Decimal::ZERO {
                return Err(ForecastError::invalid_parameters(
                    &self.version,
                    format!("std for `{}` must be positive", stat.name),
                ));
            }
        }
        let p = &self.percentiles;
        if !(p.p10 < p.p25 && p.p25 < p.p50 && p.p50 < p.p75 && p.p75 < p.p90) {
            return Err(ForecastError::invalid_parameters(
                &self.version,
                "percentile boundaries must be strictly increasing",
            ));
        }
        let c = &self.band_confidence;
        if c.high > dec!(0.95) || c.low < Decimal::ZERO || c.low > c.medium || c.medium > c.high {
            return Err(ForecastError::invalid_parameters(
                &self.version,
                "band confidences must satisfy 0 <= low <= medium <= high <= 0.95",
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Earnings-only logistic baseline
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineParameters {
    pub version: String,
    #[serde(default)]
    pub description: String,
    /// Scaler statistics, `weight` is the logistic coefficient
    pub features: Vec<FeatureStat>,
    pub intercept: Decimal,
    /// Mean realized return of up moves, percent
    pub up_return_pct: Decimal,
    /// Mean realized return of down moves, percent
    pub down_return_pct: Decimal,
    pub long_threshold: Decimal,
    pub short_threshold: Decimal,
    pub full_size_threshold: Decimal,
    pub confidence_cap: Decimal,
}

impl BaselineParameters {
    pub fn baseline_v1() -> Self {
        Self {
            version: "baseline-v1".to_string(),
            description: "Earnings-surprise logistic baseline".to_string(),
            features: vec![
                FeatureStat::new("eps_surprise_pct", Scale::Percent, dec!(3.2), dec!(15.5), dec!(0.18)),
                FeatureStat::new("surprise_magnitude_pct", Scale::Percent, dec!(8.7), dec!(13.1), dec!(-0.12)),
                FeatureStat::new("eps_beat", Scale::Binary, dec!(0.68), dec!(0.47), dec!(0.31)),
                FeatureStat::new("eps_miss", Scale::Binary, dec!(0.22), dec!(0.41), dec!(-0.28)),
                FeatureStat::new("large_beat", Scale::Binary, dec!(0.18), dec!(0.38), dec!(0.09)),
                FeatureStat::new("large_miss", Scale::Binary, dec!(0.07), dec!(0.26), dec!(-0.21)),
            ],
            intercept: dec!(0.24),
            up_return_pct: dec!(3.1),
            down_return_pct: dec!(-3.4),
            long_threshold: dec!(0.55),
            short_threshold: dec!(0.35),
            full_size_threshold: dec!(0.65),
            confidence_cap: dec!(0.95),
        }
    }

    pub fn validate(&self) -> Result<()> {
        for stat in &self.features {
            check_scale(&stat.name, stat.scale)?;
            if stat.std <= Decimal::ZERO {
                return Err(ForecastError::invalid_parameters(
                    &self.version,
                    format!("std for `{}` must be positive", stat.name),
                ));
            }
        }
        if self.short_threshold >= self.long_threshold {
            return Err(ForecastError::invalid_parameters(
                &self.version,
                "short threshold must sit below long threshold",
            ));
        }
        if self.confidence_cap > dec!(0.95) {
            return Err(ForecastError::invalid_parameters(&self.version, "confidence cap above 0.95"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ModelParameters {
    Heuristic(HeuristicParameters),
    Standardized(StandardizedParameters),
    Baseline(BaselineParameters),
}

impl ModelParameters {
    pub fn version(&self) -> &str {
        match self {
            ModelParameters::Heuristic(p) => &p.version,
            ModelParameters::Standardized(p) => &p.version,
            ModelParameters::Baseline(p) => &p.version,
        }
    }

    /// Model family
    pub fn model_id(&self) -> &'static str {
        match self {
            ModelParameters::Heuristic(_) => "heuristic",
            ModelParameters::Standardized(_) => "standardized",
            ModelParameters::Baseline(_) => "baseline",
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.version().trim().is_empty() {
            return Err(ForecastError::invalid_parameters("", "empty version id"));
        }
        match self {
            ModelParameters::Heuristic(p) => p.validate(),
            ModelParameters::Standardized(p) => p.validate(),
            ModelParameters::Baseline(p) => p.validate(),
        }
    }
}

/// On-disk layout: `[[parameters]]` tables with a `kind` key
#[derive(Debug, Default, Serialize, Deserialize)]
struct ParameterFile {
    #[serde(default)]
    parameters: Vec<ModelParameters>,
}

#[derive(Debug, Clone, Default)]
pub struct ParameterRegistry {
    versions: BTreeMap<String, Arc<ModelParameters>>,
}

impl ParameterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in version
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        let builtins = [
            ModelParameters::Heuristic(HeuristicParameters::v1()),
            ModelParameters::Heuristic(HeuristicParameters::v2()),
            ModelParameters::Heuristic(HeuristicParameters::v3()),
            ModelParameters::Standardized(StandardizedParameters::standardized_v1()),
            ModelParameters::Standardized(StandardizedParameters::drift_v1()),
            ModelParameters::Baseline(BaselineParameters::baseline_v1()),
        ];
        for params in builtins {
            let version = params.version().to_string();
            registry.versions.insert(version, Arc::new(params));
        }
        registry
    }

    pub fn register(&mut self, params: ModelParameters) -> Result<Arc<ModelParameters>> {
        params.validate()?;
        let version = params.version().to_string();
        if self.versions.contains_key(&version) {
            return Err(ForecastError::invalid_parameters(
                version,
                "version already registered; publish a new version instead",
            ));
        }
        let shared = Arc::new(params);
        self.versions.insert(version, Arc::clone(&shared));
        Ok(shared)
    }

    pub fn get(&self, version: &str) -> Result<Arc<ModelParameters>> {
        self.versions
            .get(version)
            .cloned()
            .ok_or_else(|| ForecastError::UnknownModelVersion(version.to_string()))
    }

    pub fn versions(&self) -> Vec<&str> {
        self.versions.keys().map(|k| k.as_str()).collect()
    }

    pub fn load_toml_str(&mut self, raw: &str) -> Result<usize> {
        let file: ParameterFile = toml::from_str(raw)?;
        let count = file.parameters.len();
        for params in file.parameters {
            let version = params.version().to_string();
            self.register(params)?;
            info!(version = %version, "Registered model parameters");
        }
        Ok(count)
    }

    pub fn load_toml(&mut self, path: impl AsRef<Path>) -> Result<usize> {
        let raw = std::fs::read_to_string(path)?;
        self.load_toml_str(&raw)
    }

    /// Dump versions as a parameter file; all versions when `version` is `None`
    pub fn to_toml(&self, version: Option<&str>) -> Result<String> {
        let parameters = match version {
            Some(v) => vec![self.get(v)?.as_ref().clone()],
            None => self.versions.values().map(|p| p.as_ref().clone()).collect(),
        };
        toml::to_string(&ParameterFile { parameters })
            .map_err(|e| ForecastError::config(format!("cannot serialize parameters: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_validate() {
        let registry = ParameterRegistry::with_builtins();
        assert_eq!(registry.versions().len(), 6);
        for version in registry.versions() {
            registry.get(version).unwrap().validate().unwrap();
        }
    }

    #[test]
    fn test_revisions_coexist() {
        let registry = ParameterRegistry::with_builtins();
        let v1 = registry.get("heuristic-v1").unwrap();
        let v3 = registry.get("heuristic-v3").unwrap();
        match (v1.as_ref(), v3.as_ref()) {
            (ModelParameters::Heuristic(a), ModelParameters::Heuristic(b)) => {
                assert_eq!(a.baseline, dec!(0.0));
                assert_eq!(a.risk_weight, dec!(0.3));
                assert_eq!(b.baseline, dec!(0.83));
                assert_eq!(b.risk_weight, dec!(1.2));
            }
            _ => panic!("expected heuristic parameters"),
        }
    }

    #[test]
    fn test_register_refuses_overwrite() {
        let mut registry = ParameterRegistry::with_builtins();
        let err = registry
            .register(ModelParameters::Heuristic(HeuristicParameters::v2()))
            .unwrap_err();
        assert!(matches!(err, ForecastError::InvalidParameters { .. }));
    }

    #[test]
    fn test_unknown_version() {
        let registry = ParameterRegistry::with_builtins();
        assert!(matches!(
            registry.get("heuristic-v9"),
            Err(ForecastError::UnknownModelVersion(_))
        ));
    }

    #[test]
    fn test_rejects_non_positive_std() {
        let mut params = StandardizedParameters::standardized_v1();
        params.version = "standardized-broken".to_string();
        params.features[2].std = Decimal::ZERO;
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_rejects_non_canonical_scale() {
        let mut params = StandardizedParameters::standardized_v1();
        params.features[5].scale = Scale::Percent;
        assert!(matches!(params.validate(), Err(ForecastError::InvalidScale { .. })));
    }

    #[test]
    fn test_rejects_unordered_percentiles() {
        let mut params = StandardizedParameters::standardized_v1();
        params.percentiles.p75 = dec!(0.70);
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_toml_round_trip_through_registry() {
        let source = ParameterRegistry::with_builtins();
        let dumped = source.to_toml(Some("heuristic-v2")).unwrap();
        let renamed = dumped.replace("heuristic-v2", "heuristic-v2-canary");

        let mut registry = ParameterRegistry::with_builtins();
        assert_eq!(registry.load_toml_str(&renamed).unwrap(), 1);
        let loaded = registry.get("heuristic-v2-canary").unwrap();
        match loaded.as_ref() {
            ModelParameters::Heuristic(p) => assert_eq!(p.baseline, dec!(0.83)),
            _ => panic!("expected heuristic parameters"),
        }
    }

    #[test]
    fn test_partial_heuristic_toml_uses_v2_defaults() {
        let raw = r#"
            [[parameters]]
            kind = "heuristic"
            version = "heuristic-lowrisk"
            risk_weight = "0.5"
        "#;
        let mut registry = ParameterRegistry::new();
        registry.load_toml_str(raw).unwrap();
        match registry.get("heuristic-lowrisk").unwrap().as_ref() {
            ModelParameters::Heuristic(p) => {
                assert_eq!(p.risk_weight, dec!(0.5));
                assert_eq!(p.guidance.raised, dec!(3.5));
            }
            _ => panic!("expected heuristic parameters"),
        }
    }
}
