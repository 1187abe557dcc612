//! Inputs for the multi-factor heuristic engine
//!
//! Numeric fields are always populated; absent inputs take neutral values that
//! make their factor contribute nothing (concern sits at the 5.0 midpoint,
//! consensus at 3.0 hold). `InputCoverage` records what was actually observed,
//! which is what confidence is built from.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::{clamp_surprise_pct, FeatureVector, Scale};
use crate::error::Result;
use crate::signals::{DollarStrength, GdpSentiment, GuidanceChange, SignalBundle, SurpriseKind};
use crate::types::{FilingEventKind, FilingType, MarketCapTier, MarketRegime};

/// Neutral concern level, midpoint of the 0-10 scale
pub const NEUTRAL_CONCERN: Decimal = dec!(5);
/// Hold on the 1-5 consensus scale
pub const NEUTRAL_CONSENSUS: Decimal = dec!(3);

/// P/E bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValuationTier {
    Unknown,
    Value,   // < 15
    Fair,    // 15 - 25
    Growth,  // 25 - 40
    Premium, // >= 40
}

impl ValuationTier {
    pub fn from_pe(pe: Option<Decimal>) -> Self {
        match pe {
            Some(pe) if pe <= Decimal::ZERO => ValuationTier::Unknown,
            Some(pe) if pe < dec!(15) => ValuationTier::Value,
            Some(pe) if pe < dec!(25) => ValuationTier::Fair,
            Some(pe) if pe < dec!(40) => ValuationTier::Growth,
            Some(_) => ValuationTier::Premium,
            None => ValuationTier::Unknown,
        }
    }
}

/// Which input categories were observed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputCoverage {
    pub earnings: bool,
    pub guidance: bool,
    pub risk_sentiment: bool,
    pub concern: bool,
    pub ticker_history: bool,
    pub analyst_coverage: bool,
}

impl InputCoverage {
    pub fn observed_count(&self) -> usize {
        [
            self.earnings,
            self.guidance,
            self.risk_sentiment,
            self.concern,
            self.ticker_history,
            self.analyst_coverage,
        ]
        .iter()
        .filter(|b| **b)
        .count()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeuristicFeatures {
    pub filing_type: FilingType,
    pub event_kind: Option<FilingEventKind>,

    pub risk_score_delta: Decimal,
    pub sentiment_score: Decimal,
    pub concern_level: Decimal,
    pub guidance: Option<GuidanceChange>,

    pub eps: Option<SurpriseKind>,
    pub eps_surprise_pct: Decimal,
    pub revenue: Option<SurpriseKind>,

    pub valuation: ValuationTier,
    /// Zero when unknown; check `cap_tier`
    pub market_cap_usd: Decimal,
    pub cap_tier: MarketCapTier,

    /// Flat when unknown
    pub regime: MarketRegime,
    pub volatility_elevated: bool,
    pub dollar: DollarStrength,
    pub gdp: GdpSentiment,

    pub upgrades: u32,
    pub downgrades: u32,
    pub major_upgrades: u32,
    pub major_downgrades: u32,
    pub consensus_score: Decimal,
    pub upside_to_target_pct: Decimal,

    pub ticker_mean_return_pct: Decimal,
    pub ticker_sample_count: u32,
    pub generic_mean_return_pct: Decimal,

    pub coverage: InputCoverage,
}

impl HeuristicFeatures {
    pub fn extract(bundle: &SignalBundle) -> Self {
        let analysis = bundle.analysis.clone().unwrap_or_default();
        let earnings = bundle.earnings.clone().unwrap_or_default();
        let analyst = bundle.analyst.clone().unwrap_or_default();
        let fundamentals = bundle.fundamentals.clone().unwrap_or_default();
        let snapshot = bundle.macro_snapshot.clone().unwrap_or_default();
        let history = bundle.history.clone().unwrap_or_default();

        let eps = earnings.eps_kind();
        let coverage = InputCoverage {
            earnings: eps.is_some() || earnings.revenue.is_some(),
            guidance: analysis.guidance.is_some(),
            risk_sentiment: analysis.risk_score_delta.is_some()
                || analysis.sentiment_score.is_some(),
            concern: analysis.concern_level.is_some(),
            ticker_history: history.ticker_mean_return_pct.is_some()
                && history.ticker_sample_count > 0,
            analyst_coverage: bundle.analyst.as_ref().map_or(false, |a| a.has_coverage()),
        };

        Self {
            filing_type: bundle.filing.filing_type,
            event_kind: bundle.filing.event_kind(),

            risk_score_delta: analysis.risk_score_delta.unwrap_or(Decimal::ZERO),
            sentiment_score: analysis.sentiment_score.unwrap_or(Decimal::ZERO),
            concern_level: analysis.concern_level.unwrap_or(NEUTRAL_CONCERN),
            guidance: analysis.guidance,

            eps,
            eps_surprise_pct: earnings
                .eps_surprise_pct
                .map(clamp_surprise_pct)
                .unwrap_or(Decimal::ZERO),
            revenue: earnings.revenue,

            valuation: ValuationTier::from_pe(fundamentals.pe_ratio),
            market_cap_usd: fundamentals.market_cap_usd.unwrap_or(Decimal::ZERO),
            cap_tier: bundle.market_cap_tier(),

            regime: snapshot.resolved_regime().unwrap_or(MarketRegime::Flat),
            volatility_elevated: snapshot.volatility_elevated(),
            dollar: snapshot.resolved_dollar().unwrap_or(DollarStrength::Neutral),
            gdp: snapshot.resolved_gdp().unwrap_or(GdpSentiment::Stable),

            upgrades: analyst.upgrades_30d,
            downgrades: analyst.downgrades_30d,
            major_upgrades: analyst.major_upgrades_30d,
            major_downgrades: analyst.major_downgrades_30d,
            consensus_score: analyst.consensus_score.unwrap_or(NEUTRAL_CONSENSUS),
            upside_to_target_pct: fundamentals
                .upside_to_target_pct()
                .map(clamp_surprise_pct)
                .unwrap_or(Decimal::ZERO),

            ticker_mean_return_pct: history.ticker_mean_return_pct.unwrap_or(Decimal::ZERO),
            ticker_sample_count: history.ticker_sample_count,
            generic_mean_return_pct: history.generic_mean_return_pct.unwrap_or(Decimal::ZERO),

            coverage,
        }
    }

    /// Numeric view for audit logs, with canonical scales
    pub fn to_vector(&self) -> Result<FeatureVector> {
        let c = &self.coverage;
        let mut v = FeatureVector::new();
        v.push("risk_score_delta", Scale::Points, self.risk_score_delta, !c.risk_sentiment)?;
        v.push("sentiment_score", Scale::Unit, self.sentiment_score, !c.risk_sentiment)?;
        v.push("concern_level", Scale::Points, self.concern_level, !c.concern)?;
        v.push("eps_surprise_pct", Scale::Percent, self.eps_surprise_pct, !c.earnings)?;
        v.push(
            "net_analyst_upgrades",
            Scale::Count,
            Decimal::from(self.upgrades as i64 - self.downgrades as i64),
            !c.analyst_coverage,
        )?;
        v.push("consensus_score", Scale::Points, self.consensus_score, !c.analyst_coverage)?;
        v.push(
            "upside_to_target_pct",
            Scale::Percent,
            self.upside_to_target_pct,
            !c.analyst_coverage,
        )?;
        v.push(
            "ticker_mean_return_pct",
            Scale::Percent,
            self.ticker_mean_return_pct,
            !c.ticker_history,
        )?;
        v.push(
            "generic_mean_return_pct",
            Scale::Percent,
            self.generic_mean_return_pct,
            false,
        )?;
        Ok(v)
    }
}
