//! Signal bundle: the typed boundary between upstream providers and scoring
//!
//! - Groups are independently optional; a missing group means "skip the factor"
//! - `validate()` rejects out-of-range payloads at ingestion, never at scoring
//! - Derived fallbacks (regime, dollar strength, GDP sentiment) are computed here
//!   once so models never re-derive them

pub mod assembler;
pub mod source;


use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::{ForecastError, Result};
use crate::tracker::PriceSeries;
use crate::types::{FilingEvent, MarketCapTier, MarketRegime};

pub use assembler::SignalAssembler;
pub use source::SignalSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SurpriseKind {
    Beat,
    Miss,
    Inline,
}

impl SurpriseKind {
    /// Beyond +/-2% counts as a beat or miss
    pub fn from_surprise_pct(pct: Decimal) -> Self {
        if pct > dec!(2) {
            SurpriseKind::Beat
        } else if pct < dec!(-2) {
            SurpriseKind::Miss
        } else {
            SurpriseKind::Inline
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GuidanceChange {
    Raised,
    Lowered,
    /// Newly issued guidance
    Initiated,
    Maintained,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DollarStrength {
    Strong,
    Neutral,
    Weak,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GdpSentiment {
    Expanding,
    Stable,
    Contracting,
}

/// Scores produced by the upstream text-analysis step
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilingAnalysis {
    /// Change in risk score versus the previous filing, in points
    pub risk_score_delta: Option<Decimal>,
    /// Tone in [-1, 1]
    pub sentiment_score: Option<Decimal>,
    /// Synthesized concern in [0, 10]
    pub concern_level: Option<Decimal>,
    pub guidance: Option<GuidanceChange>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EarningsSurprise {
    pub eps: Option<SurpriseKind>,
    /// Percent, (actual - estimate) / |estimate| * 100
    pub eps_surprise_pct: Option<Decimal>,
    pub revenue: Option<SurpriseKind>,
}

impl EarningsSurprise {
    /// Explicit classification, else derived from the percentage
    pub fn eps_kind(&self) -> Option<SurpriseKind> {
        self.eps
            .or_else(|| self.eps_surprise_pct.map(SurpriseKind::from_surprise_pct))
    }
}

/// Trailing-30-day analyst aggregates
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalystActivity {
    pub upgrades_30d: u32,
    pub downgrades_30d: u32,
    /// Subset of upgrades from major firms
    pub major_upgrades_30d: u32,
    pub major_downgrades_30d: u32,
    /// 1 = strong buy .. 5 = strong sell
    pub consensus_score: Option<Decimal>,
    /// Number of covering analysts
    pub coverage: u32,
}

impl AnalystActivity {
    pub fn net_upgrades(&self) -> i64 {
        self.upgrades_30d as i64 - self.downgrades_30d as i64
    }

    pub fn has_coverage(&self) -> bool {
        self.coverage > 0
            || self.upgrades_30d > 0
            || self.downgrades_30d > 0
            || self.consensus_score.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Fundamentals {
    pub market_cap_usd: Option<Decimal>,
    pub pe_ratio: Option<Decimal>,
    pub beta: Option<Decimal>,
    pub current_price: Option<Decimal>,
    pub fifty_two_week_high: Option<Decimal>,
    pub fifty_two_week_low: Option<Decimal>,
    pub dividend_yield_pct: Option<Decimal>,
    pub analyst_target_price: Option<Decimal>,
}

impl Fundamentals {
    /// Ratio (not percent) of current price to the 52-week high
    pub fn price_to_52w_high(&self) -> Option<Decimal> {
        match (self.current_price, self.fifty_two_week_high) {
            (Some(price), Some(high)) if high > Decimal::ZERO => Some(price / high),
            _ => None,
        }
    }

    /// Percent upside to the consensus target
    pub fn upside_to_target_pct(&self) -> Option<Decimal> {
        match (self.current_price, self.analyst_target_price) {
            (Some(price), Some(target)) if price > Decimal::ZERO => {
                Some((target - price) / price * dec!(100))
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MacroSnapshot {
    pub regime: Option<MarketRegime>,
    pub spx_return_30d_pct: Option<Decimal>,
    pub vix: Option<Decimal>,
    /// Annualised index volatility, percent
    pub market_volatility_pct: Option<Decimal>,
    pub treasury_10y_pct: Option<Decimal>,
    /// 30-day change of the 10y yield, percentage points
    pub treasury_10y_change_30d: Option<Decimal>,
    /// 10y minus 2y, percentage points
    pub yield_curve_spread: Option<Decimal>,
    /// Dollar index versus its one-year average, percent
    pub dollar_vs_year_avg_pct: Option<Decimal>,
    pub dollar_strength: Option<DollarStrength>,
    pub gdp_sentiment: Option<GdpSentiment>,
}

impl MacroSnapshot {
    /// Supplied regime, else a vote over index momentum, VIX and rate trend.
    /// `None` when nothing to vote with.
    pub fn resolved_regime(&self) -> Option<MarketRegime> {
        if let Some(regime) = self.regime {
            return Some(regime);
        }
        if self.spx_return_30d_pct.is_none()
            && self.vix.is_none()
            && self.treasury_10y_change_30d.is_none()
        {
            return None;
        }

        let mut score = 0i32;
        if let Some(spx) = self.spx_return_30d_pct {
            score += if spx > dec!(5) {
                2
            } else if spx > Decimal::ZERO {
                1
            } else if spx < dec!(-5) {
                -2
            } else if spx < Decimal::ZERO {
                -1
            } else {
                0
            };
        }
        if let Some(vix) = self.vix {
            if vix < dec!(15) {
                score += 1;
            } else if vix > dec!(25) {
                score -= 1;
            }
        }
        if let Some(change) = self.treasury_10y_change_30d {
            if change < dec!(-0.25) {
                score += 1;
            } else if change > dec!(0.25) {
                score -= 1;
            }
        }
        Some(MarketRegime::from_score(score))
    }

    pub fn resolved_dollar(&self) -> Option<DollarStrength> {
        self.dollar_strength.or_else(|| {
            self.dollar_vs_year_avg_pct.map(|pct| {
                if pct > dec!(3) {
                    DollarStrength::Strong
                } else if pct < dec!(-3) {
                    DollarStrength::Weak
                } else {
                    DollarStrength::Neutral
                }
            })
        })
    }

    pub fn resolved_gdp(&self) -> Option<GdpSentiment> {
        self.gdp_sentiment.or_else(|| {
            self.yield_curve_spread.map(|spread| {
                if spread < Decimal::ZERO {
                    GdpSentiment::Contracting
                } else if spread < dec!(0.5) {
                    GdpSentiment::Stable
                } else {
                    GdpSentiment::Expanding
                }
            })
        })
    }

    pub fn volatility_elevated(&self) -> bool {
        self.vix.map_or(false, |v| v > dec!(25))
            || self.market_volatility_pct.map_or(false, |v| v > dec!(20))
    }
}

/// Company-specific reaction history
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoricalPattern {
    pub ticker_mean_return_pct: Option<Decimal>,
    pub ticker_sample_count: u32,
    /// Average reaction across all tickers for this filing type
    pub generic_mean_return_pct: Option<Decimal>,
}

/// Everything known about one filing at forecast time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalBundle {
    pub filing: FilingEvent,
    #[serde(default)]
    pub analysis: Option<FilingAnalysis>,
    #[serde(default)]
    pub earnings: Option<EarningsSurprise>,
    #[serde(default)]
    pub analyst: Option<AnalystActivity>,
    #[serde(default)]
    pub fundamentals: Option<Fundamentals>,
    #[serde(default)]
    pub macro_snapshot: Option<MacroSnapshot>,
    #[serde(default)]
    pub history: Option<HistoricalPattern>,
    #[serde(default)]
    pub price_history: Option<PriceSeries>,
    /// Provider groups that failed or timed out during assembly
    #[serde(default)]
    pub unavailable: Vec<String>,
}

impl SignalBundle {
    pub fn new(filing: FilingEvent) -> Self {
        Self {
            filing,
            analysis: None,
            earnings: None,
            analyst: None,
            fundamentals: None,
            macro_snapshot: None,
            history: None,
            price_history: None,
            unavailable: Vec::new(),
        }
    }

    pub fn market_cap_usd(&self) -> Option<Decimal> {
        self.fundamentals.as_ref().and_then(|f| f.market_cap_usd)
    }

    pub fn market_cap_tier(&self) -> MarketCapTier {
        MarketCapTier::from_market_cap(self.market_cap_usd())
    }

    pub fn regime(&self) -> Option<MarketRegime> {
        self.macro_snapshot.as_ref().and_then(|m| m.resolved_regime())
    }

    pub fn guidance(&self) -> Option<GuidanceChange> {
        self.analysis.as_ref().and_then(|a| a.guidance)
    }

    /// Earnings data or less: nothing for the richer models to work with
    pub fn is_degraded(&self) -> bool {
        let has_analysis = self.analysis.as_ref().map_or(false, |a| {
            a.risk_score_delta.is_some()
                || a.sentiment_score.is_some()
                || a.concern_level.is_some()
                || a.guidance.is_some()
        });
        let has_analysts = self.analyst.as_ref().map_or(false, |a| a.has_coverage());
        !has_analysis && !has_analysts && self.fundamentals.is_none()
    }

    /// Strict range checks on every present group
    pub fn validate(&self) -> Result<()> {
        if self.filing.ticker.trim().is_empty() {
            return Err(ForecastError::malformed("filing.ticker", "empty ticker"));
        }
        if let Some(analysis) = &self.analysis {
            analysis.validate()?;
        }
        if let Some(earnings) = &self.earnings {
            earnings.validate()?;
        }
        if let Some(analyst) = &self.analyst {
            analyst.validate()?;
        }
        if let Some(fundamentals) = &self.fundamentals {
            fundamentals.validate()?;
        }
        if let Some(snapshot) = &self.macro_snapshot {
            snapshot.validate()?;
        }
        Ok(())
    }
}

fn check_range(field: &str, value: Option<Decimal>, lo: Decimal, hi: Decimal) -> Result<()> {
    match value {
        Some(v) if v < lo || v > hi => Err(ForecastError::malformed(
            field,
            format!("{} outside [{}, {}]", v, lo, hi),
        )),
        _ => Ok(()),
    }
}

fn check_positive(field: &str, value: Option<Decimal>) -> Result<()> {
    match value {
        Some(v) if v <= Decimal::ZERO => {
            Err(ForecastError::malformed(field, format!("{} must be positive", v)))
        }
        _ => Ok(()),
    }
}

impl FilingAnalysis {
    pub fn validate(&self) -> Result<()> {
        check_range("analysis.sentiment_score", self.sentiment_score, dec!(-1), dec!(1))?;
        check_range("analysis.concern_level", self.concern_level, dec!(0), dec!(10))?;
        check_range("analysis.risk_score_delta", self.risk_score_delta, dec!(-10), dec!(10))
    }
}

impl EarningsSurprise {
    pub fn validate(&self) -> Result<()> {
        if let (Some(kind), Some(pct)) = (self.eps, self.eps_surprise_pct) {
            let contradicts = (kind == SurpriseKind::Beat && pct < Decimal::ZERO)
                || (kind == SurpriseKind::Miss && pct > Decimal::ZERO);
            if contradicts {
                return Err(ForecastError::malformed(
                    "earnings.eps",
                    format!("{:?} contradicts surprise of {}%", kind, pct),
                ));
            }
        }
        Ok(())
    }
}

impl AnalystActivity {
    pub fn validate(&self) -> Result<()> {
        if self.major_upgrades_30d > self.upgrades_30d {
            return Err(ForecastError::malformed(
                "analyst.major_upgrades_30d",
                "exceeds total upgrades",
            ));
        }
        if self.major_downgrades_30d > self.downgrades_30d {
            return Err(ForecastError::malformed(
                "analyst.major_downgrades_30d",
                "exceeds total downgrades",
            ));
        }
        check_range("analyst.consensus_score", self.consensus_score, dec!(1), dec!(5))
    }
}

impl Fundamentals {
    pub fn validate(&self) -> Result<()> {
        check_positive("fundamentals.market_cap_usd", self.market_cap_usd)?;
        check_positive("fundamentals.current_price", self.current_price)?;
        check_positive("fundamentals.fifty_two_week_high", self.fifty_two_week_high)?;
        check_positive("fundamentals.fifty_two_week_low", self.fifty_two_week_low)?;
        check_positive("fundamentals.analyst_target_price", self.analyst_target_price)?;
        if let (Some(high), Some(low)) = (self.fifty_two_week_high, self.fifty_two_week_low) {
            if low > high {
                return Err(ForecastError::malformed(
                    "fundamentals.fifty_two_week_low",
                    format!("low {} above high {}", low, high),
                ));
            }
        }
        match self.dividend_yield_pct {
            Some(y) if y < Decimal::ZERO => Err(ForecastError::malformed(
                "fundamentals.dividend_yield_pct",
                "negative yield",
            )),
            _ => Ok(()),
        }
    }
}

impl MacroSnapshot {
    pub fn validate(&self) -> Result<()> {
        match self.vix {
            Some(v) if v < Decimal::ZERO => {
                return Err(ForecastError::malformed("macro.vix", "negative VIX"))
            }
            _ => {}
        }
        match self.market_volatility_pct {
            Some(v) if v < Decimal::ZERO => {
                Err(ForecastError::malformed("macro.market_volatility_pct", "negative volatility"))
            }
            _ => Ok(()),
        }
    }
}
