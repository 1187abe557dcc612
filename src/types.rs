//! Core domain types shared by every stage of the forecast pipeline

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ForecastError;

/// Regulatory filing form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilingType {
    #[serde(rename = "10-K")]
    TenK,
    #[serde(rename = "10-Q")]
    TenQ,
    #[serde(rename = "8-K")]
    EightK,
    #[serde(other)]
    Other,
}

impl fmt::Display for FilingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilingType::TenK => write!(f, "10-K"),
            FilingType::TenQ => write!(f, "10-Q"),
            FilingType::EightK => write!(f, "8-K"),
            FilingType::Other => write!(f, "other"),
        }
    }
}

impl FromStr for FilingType {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "10-K" | "10K" => Ok(FilingType::TenK),
            "10-Q" | "10Q" => Ok(FilingType::TenQ),
            "8-K" | "8K" => Ok(FilingType::EightK),
            "" => Err(ForecastError::malformed("filing_type", "empty filing type")),
            _ => Ok(FilingType::Other),
        }
    }
}

/// What an 8-K actually reports, read from its item codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilingEventKind {
    /// Item 2.02 alone
    EarningsAnnouncement,
    /// Item 2.02 with financial exhibits (9.01)
    EarningsWithFinancials,
    /// Anything else
    MaterialEvent,
}

/// A single filing, as handed over by ingestion. Read-only here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilingEvent {
    pub id: String,
    pub ticker: String,
    pub filing_type: FilingType,
    pub filing_date: NaiveDate,
    #[serde(default)]
    pub report_date: Option<NaiveDate>,
    /// 8-K item codes such as "2.02" or "9.01"
    #[serde(default)]
    pub items: Vec<String>,
}

impl FilingEvent {
    pub fn new(
        id: impl Into<String>,
        ticker: impl Into<String>,
        filing_type: FilingType,
        filing_date: NaiveDate,
    ) -> Self {
        Self {
            id: id.into(),
            ticker: ticker.into(),
            filing_type,
            filing_date,
            report_date: None,
            items: Vec::new(),
        }
    }

    pub fn with_items(mut self, items: &[&str]) -> Self {
        self.items = items.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Sub-classification used by 8-K filings. Other forms report `None`.
    pub fn event_kind(&self) -> Option<FilingEventKind> {
        if self.filing_type != FilingType::EightK {
            return None;
        }
        let has = |code: &str| self.items.iter().any(|i| i.trim() == code);
        let kind = match (has("2.02"), has("9.01")) {
            (true, true) => FilingEventKind::EarningsWithFinancials,
            (true, false) => FilingEventKind::EarningsAnnouncement,
            _ => FilingEventKind::MaterialEvent,
        };
        Some(kind)
    }
}

/// Coarse market condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketRegime {
    Bull,
    Flat,
    Bear,
}

impl MarketRegime {
    /// Map a summed regime score: >= 1 bull, <= -1 bear
    pub fn from_score(score: i32) -> Self {
        if score >= 1 {
            MarketRegime::Bull
        } else if score <= -1 {
            MarketRegime::Bear
        } else {
            MarketRegime::Flat
        }
    }
}

impl fmt::Display for MarketRegime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarketRegime::Bull => write!(f, "bull"),
            MarketRegime::Flat => write!(f, "flat"),
            MarketRegime::Bear => write!(f, "bear"),
        }
    }
}

/// Market capitalization bucket used for routing and liquidity weighting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketCapTier {
    Unknown,
    Small, // < $10B
    Mid,   // $10B - $200B
    Large, // $200B - $1T
    Mega,  // >= $1T
}

impl MarketCapTier {
    pub fn from_market_cap(market_cap_usd: Option<Decimal>) -> Self {
        match market_cap_usd {
            Some(cap) if cap >= dec!(1_000_000_000_000) => MarketCapTier::Mega,
            Some(cap) if cap >= dec!(200_000_000_000) => MarketCapTier::Large,
            Some(cap) if cap >= dec!(10_000_000_000) => MarketCapTier::Mid,
            Some(cap) if cap > Decimal::ZERO => MarketCapTier::Small,
            _ => MarketCapTier::Unknown,
        }
    }

    pub fn is_large_or_mega(&self) -> bool {
        matches!(self, MarketCapTier::Large | MarketCapTier::Mega)
    }
}

impl fmt::Display for MarketCapTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarketCapTier::Unknown => write!(f, "unknown"),
            MarketCapTier::Small => write!(f, "small"),
            MarketCapTier::Mid => write!(f, "mid"),
            MarketCapTier::Large => write!(f, "large"),
            MarketCapTier::Mega => write!(f, "mega"),
        }
    }
}

/// Directional call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeSignal {
    Long,
    Short,
    Neutral,
}

impl TradeSignal {
    pub fn from_forecast(value: Decimal) -> Self {
        if value > Decimal::ZERO {
            TradeSignal::Long
        } else if value < Decimal::ZERO {
            TradeSignal::Short
        } else {
            TradeSignal::Neutral
        }
    }
}

impl fmt::Display for TradeSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeSignal::Long => write!(f, "LONG"),
            TradeSignal::Short => write!(f, "SHORT"),
            TradeSignal::Neutral => write!(f, "NEUTRAL"),
        }
    }
}

/// One line of the explainable trace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningEntry {
    pub factor: String,
    pub impact: Decimal,
    pub explanation: String,
}

impl ReasoningEntry {
    pub fn new(factor: impl Into<String>, impact: Decimal, explanation: impl Into<String>) -> Self {
        Self {
            factor: factor.into(),
            impact,
            explanation: explanation.into(),
        }
    }
}

/// A model that fed into a stored prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelContribution {
    /// Model family, e.g. "heuristic"
    pub model_id: String,
    /// Parameter version, e.g. "heuristic-v2"
    pub version: String,
    pub weight: Decimal,
    pub forecast: Decimal,
    pub confidence: Decimal,
}

/// System-of-record forecast for one (filing, model version) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub filing_id: String,
    pub ticker: String,
    /// Route label: a version id, or `blend:` followed by `id@weight` pairs
    pub model_version: String,
    pub forecast_return_pct: Decimal,
    /// In [0, 0.95]
    pub confidence: Decimal,
    pub signal: Option<TradeSignal>,
    pub reasoning: Vec<ReasoningEntry>,
    pub contributors: Vec<ModelContribution>,
    pub created_at: DateTime<Utc>,
}

impl Prediction {
    pub fn contributor_ids(&self) -> impl Iterator<Item = &str> {
        self.contributors.iter().map(|c| c.model_id.as_str())
    }
}
