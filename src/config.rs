//! Runtime configuration
//!
//! Everything here is operational tuning. Frozen model constants live in
//! `model::params` and are versioned separately.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ForecastError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    pub tracker: TrackerConfig,
    pub assembly: AssemblyConfig,
    pub router: RouterConfig,
    pub backtest: BacktestConfig,
    /// Extra parameter versions to register on top of the built-ins
    pub parameters_path: Option<PathBuf>,
}

/// Accuracy resolution gates
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Calendar days that must pass after the filing before resolving
    pub min_calendar_days: i64,
    /// Trading-day observations between anchor and target price
    pub horizon_trading_days: usize,
    /// How far the anchor observation may sit from the filing date
    pub max_anchor_gap_days: i64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            min_calendar_days: 10,
            horizon_trading_days: 7,
            max_anchor_gap_days: 5,
        }
    }
}

/// Signal assembly limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssemblyConfig {
    /// Per provider call
    pub provider_timeout_ms: u64,
    /// Minimum delay between sequential replay calls
    pub min_call_interval_ms: u64,
}

impl Default for AssemblyConfig {
    fn default() -> Self {
        Self {
            provider_timeout_ms: 5_000,
            min_call_interval_ms: 250,
        }
    }
}

impl AssemblyConfig {
    pub fn provider_timeout(&self) -> Duration {
        Duration::from_millis(self.provider_timeout_ms)
    }

    pub fn min_call_interval(&self) -> Duration {
        Duration::from_millis(self.min_call_interval_ms)
    }
}

/// One weighted leg of a blended route
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlendWeight {
    pub version: String,
    pub weight: Decimal,
}

impl BlendWeight {
    pub fn new(version: impl Into<String>, weight: Decimal) -> Self {
        Self {
            version: version.into(),
            weight,
        }
    }
}

/// Which parameter version answers for which filing segment
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// 10-K
    pub annual_version: String,
    /// 10-Q for large and mega caps
    pub quarterly_liquid_version: String,
    /// 10-Q for everything else
    pub quarterly_version: String,
    /// 8-K blend legs
    pub current_report_blend: Vec<BlendWeight>,
    /// Forms the router does not otherwise recognise
    pub other_version: String,
    /// Used whenever the bundle carries earnings data or less
    pub degraded_version: String,
    /// Scale of the disagreement penalty, in forecast percentage points
    pub disagreement_scale: Decimal,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            annual_version: "heuristic-v2".to_string(),
            quarterly_liquid_version: "standardized-v1".to_string(),
            quarterly_version: "heuristic-v2".to_string(),
            current_report_blend: vec![
                BlendWeight::new("heuristic-v2", dec!(0.6)),
                BlendWeight::new("standardized-v1", dec!(0.4)),
            ],
            other_version: "heuristic-v2".to_string(),
            degraded_version: "baseline-v1".to_string(),
            disagreement_scale: dec!(4),
        }
    }
}

/// Trading simulation and sweep settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    /// Minimum |forecast| in percent to take a trade
    pub min_edge_pct: Decimal,
    pub min_confidence: Decimal,
    /// Annualisation factor for Sharpe (weekly holding period by default)
    pub periods_per_year: u32,
    pub confidence_thresholds: Vec<Decimal>,
    /// Minimum share of records a sweep threshold must keep to be eligible
    pub min_sweep_coverage: Decimal,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            min_edge_pct: dec!(0.5),
            min_confidence: Decimal::ZERO,
            periods_per_year: 52,
            confidence_thresholds: vec![
                dec!(0.50),
                dec!(0.55),
                dec!(0.60),
                dec!(0.65),
                dec!(0.70),
                dec!(0.75),
                dec!(0.80),
                dec!(0.85),
                dec!(0.90),
            ],
            min_sweep_coverage: dec!(0.20),
        }
    }
}

impl ForecastConfig {
    pub fn from_toml(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: ForecastConfig = toml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults with `FORECAST_*` environment overrides applied
    pub fn from_env_or_default() -> Result<Self> {
        let mut config = ForecastConfig::default();

        if let Some(v) = env_parse::<i64>("FORECAST_MIN_CALENDAR_DAYS")? {
            config.tracker.min_calendar_days = v;
        }
        if let Some(v) = env_parse::<usize>("FORECAST_HORIZON_TRADING_DAYS")? {
            config.tracker.horizon_trading_days = v;
        }
        if let Some(v) = env_parse::<u64>("FORECAST_PROVIDER_TIMEOUT_MS")? {
            config.assembly.provider_timeout_ms = v;
        }
        if let Some(v) = env_parse::<u64>("FORECAST_MIN_CALL_INTERVAL_MS")? {
            config.assembly.min_call_interval_ms = v;
        }
        if let Ok(path) = env::var("FORECAST_PARAMETERS_PATH") {
            if !path.is_empty() {
                config.parameters_path = Some(PathBuf::from(path));
            }
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.tracker.min_calendar_days < 0 {
            return Err(ForecastError::config("min_calendar_days cannot be negative"));
        }
        if self.tracker.horizon_trading_days == 0 {
            return Err(ForecastError::config("horizon_trading_days must be at least 1"));
        }
        if self.tracker.max_anchor_gap_days < 0 {
            return Err(ForecastError::config("max_anchor_gap_days cannot be negative"));
        }
        if self.assembly.provider_timeout_ms == 0 {
            return Err(ForecastError::config("provider_timeout_ms must be positive"));
        }

        let blend = &self.router.current_report_blend;
        if blend.is_empty() {
            return Err(ForecastError::config("current_report_blend cannot be empty"));
        }
        if blend.iter().any(|b| b.weight <= Decimal::ZERO) {
            return Err(ForecastError::config("blend weights must be positive"));
        }
        let total: Decimal = blend.iter().map(|b| b.weight).sum();
        if total != dec!(1) {
            return Err(ForecastError::config(format!(
                "blend weights must sum to 1, got {}",
                total
            )));
        }
        if self.router.disagreement_scale <= Decimal::ZERO {
            return Err(ForecastError::config("disagreement_scale must be positive"));
        }

        if self.backtest.periods_per_year == 0 {
            return Err(ForecastError::config("periods_per_year must be positive"));
        }
        if self.backtest.min_edge_pct < Decimal::ZERO {
            return Err(ForecastError::config("min_edge_pct cannot be negative"));
        }
        if self
            .backtest
            .confidence_thresholds
            .iter()
            .any(|t| *t < Decimal::ZERO || *t > dec!(1))
        {
            return Err(ForecastError::config("confidence thresholds must lie in [0, 1]"));
        }

        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ForecastError::config(format!("Invalid {}: {:?}", key, raw))),
        Err(_) => Ok(None),
    }
}
