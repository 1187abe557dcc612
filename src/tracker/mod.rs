//! Accuracy tracking
//!
//! Each prediction moves through Pending -> AwaitingPriceData -> Resolved.
//! Resolution is a pure function of (prediction, filing date, price series,
//! as-of date), so re-running it always yields the same result.

pub mod prices;
pub mod store;


pub use prices::{add_business_days, trading_days_between, PricePoint, PriceSeries};
pub use store::{AccuracyStore, InMemoryAccuracyStore, UpsertOutcome};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

use crate::config::TrackerConfig;
use crate::numeric::{mean, median, ratio_pct};
use crate::types::Prediction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ErrorBand {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl ErrorBand {
    /// Absolute error in percentage points
    pub fn from_error(abs_error: Decimal) -> Self {
        if abs_error < dec!(1) {
            ErrorBand::Excellent
        } else if abs_error < dec!(2) {
            ErrorBand::Good
        } else if abs_error < dec!(4) {
            ErrorBand::Fair
        } else {
            ErrorBand::Poor
        }
    }
}

impl fmt::Display for ErrorBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorBand::Excellent => write!(f, "Excellent"),
            ErrorBand::Good => write!(f, "Good"),
            ErrorBand::Fair => write!(f, "Fair"),
            ErrorBand::Poor => write!(f, "Poor"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccuracyResult {
    pub filing_id: String,
    pub model_version: String,
    pub days_elapsed: i64,
    pub predicted_return: Decimal,
    pub realized_return: Decimal,
    pub absolute_error: Decimal,
    pub error_band: ErrorBand,
    pub direction_correct: bool,
    pub anchor_date: NaiveDate,
    pub target_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TrackingStatus {
    Pending { days_elapsed: i64 },
    AwaitingPriceData { days_elapsed: i64 },
    Resolved(AccuracyResult),
}

impl TrackingStatus {
    pub fn result(&self) -> Option<&AccuracyResult> {
        match self {
            TrackingStatus::Resolved(r) => Some(r),
            _ => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, TrackingStatus::Resolved(_))
    }
}

fn sign(d: Decimal) -> i8 {
    if d > Decimal::ZERO {
        1
    } else if d < Decimal::ZERO {
        -1
    } else {
        0
    }
}

/// A zero forecast only matches a zero return
pub fn direction_matches(predicted: Decimal, realized: Decimal) -> bool {
    sign(predicted) == sign(realized)
}

pub struct AccuracyTracker {
    config: TrackerConfig,
}

impl AccuracyTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(TrackerConfig::default())
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn resolve(
        &self,
        prediction: &Prediction,
        filing_date: NaiveDate,
        series: &PriceSeries,
        as_of: NaiveDate,
    ) -> TrackingStatus {
        let days_elapsed = (as_of - filing_date).num_days();
        if days_elapsed < self.config.min_calendar_days
            || as_of < prediction.created_at.date_naive()
        {
            return TrackingStatus::Pending { days_elapsed };
        }

        let awaiting = TrackingStatus::AwaitingPriceData { days_elapsed };
        let visible = series.visible_until(as_of);

        let Some((anchor_idx, gap)) = visible
            .iter()
            .enumerate()
            .map(|(i, p)| (i, (p.date - filing_date).num_days().abs()))
            .min_by_key(|&(i, gap)| (gap, i))
        else {
            debug!(filing_id = %prediction.filing_id, "No prices visible yet");
            return awaiting;
        };
        if gap > self.config.max_anchor_gap_days {
            debug!(filing_id = %prediction.filing_id, gap, "No anchor price near filing date");
            return awaiting;
        }

        let Some(target) = visible.get(anchor_idx + self.config.horizon_trading_days) else {
            debug!(
                filing_id = %prediction.filing_id,
                have = visible.len() - anchor_idx - 1,
                need = self.config.horizon_trading_days,
                "Insufficient trading days after anchor"
            );
            return awaiting;
        };
        let anchor = visible[anchor_idx];
        let Some(realized_return) = ratio_pct(target.close - anchor.close, anchor.close) else {
            return awaiting;
        };

        let predicted_return = prediction.forecast_return_pct;
        let absolute_error = (predicted_return - realized_return).abs();
        let result = AccuracyResult {
            filing_id: prediction.filing_id.clone(),
            model_version: prediction.model_version.clone(),
            days_elapsed,
            predicted_return,
            realized_return,
            absolute_error,
            error_band: ErrorBand::from_error(absolute_error),
            direction_correct: direction_matches(predicted_return, realized_return),
            anchor_date: anchor.date,
            target_date: target.date,
        };

        debug!(
            filing_id = %result.filing_id,
            model_version = %result.model_version,
            realized = %result.realized_return,
            error = %result.absolute_error,
            band = %result.error_band,
            "Prediction resolved"
        );
        TrackingStatus::Resolved(result)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BandCounts {
    pub excellent: usize,
    pub good: usize,
    pub fair: usize,
    pub poor: usize,
}

impl BandCounts {
    fn add(&mut self, band: ErrorBand) {
        match band {
            ErrorBand::Excellent => self.excellent += 1,
            ErrorBand::Good => self.good += 1,
            ErrorBand::Fair => self.fair += 1,
            ErrorBand::Poor => self.poor += 1,
        }
    }
}

/// Aggregate over Resolved outcomes only; unresolved ones are counted, never averaged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccuracySummary {
    pub total: usize,
    pub resolved: usize,
    pub pending: usize,
    pub awaiting_price_data: usize,
    pub mean_absolute_error: Option<Decimal>,
    pub median_absolute_error: Option<Decimal>,
    /// Mean of predicted minus realized
    pub mean_bias: Option<Decimal>,
    pub direction_accuracy: Option<Decimal>,
    pub bands: BandCounts,
}

impl AccuracySummary {
    pub fn from_outcomes<'a, I>(outcomes: I) -> Self
    where
        I: IntoIterator<Item = &'a TrackingStatus>,
    {
        let mut summary = AccuracySummary::default();
        let mut errors = Vec::new();
        let mut biases = Vec::new();
        let mut correct = 0usize;

        for status in outcomes {
            summary.total += 1;
            match status {
                TrackingStatus::Pending { .. } => summary.pending += 1,
                TrackingStatus::AwaitingPriceData { .. } => summary.awaiting_price_data += 1,
                TrackingStatus::Resolved(r) => {
                    summary.resolved += 1;
                    errors.push(r.absolute_error);
                    biases.push(r.predicted_return - r.realized_return);
                    correct += usize::from(r.direction_correct);
                    summary.bands.add(r.error_band);
                }
            }
        }

        summary.mean_absolute_error = mean(&errors);
        summary.median_absolute_error = median(&errors);
        summary.mean_bias = mean(&biases);
        if summary.resolved > 0 {
            summary.direction_accuracy =
                Some(Decimal::from(correct as i64) / Decimal::from(summary.resolved as i64));
        }
        summary
    }
}

/// Summaries keyed by contributing model id. A blended prediction counts
/// toward every model that fed it.
pub fn summarize_by_model(
    outcomes: &[(Prediction, TrackingStatus)],
) -> BTreeMap<String, AccuracySummary> {
    let mut grouped: BTreeMap<String, Vec<&TrackingStatus>> = BTreeMap::new();
    for (prediction, status) in outcomes {
        let mut ids: Vec<&str> = prediction.contributor_ids().collect();
        if ids.is_empty() {
            ids.push(prediction.model_version.as_str());
        }
        ids.sort_unstable();
        ids.dedup();
        for id in ids {
            grouped.entry(id.to_string()).or_default().push(status);
        }
    }
    grouped
        .into_iter()
        .map(|(id, statuses)| (id, AccuracySummary::from_outcomes(statuses)))
        .collect()
}
