//! Backtest harness
//!
//! Aggregates (forecast, confidence, realized) records into direction
//! accuracy, error statistics, a simple trading simulation, per-segment
//! slices and a confidence-threshold sweep.

pub mod runner;

pub use runner::{BacktestRunner, ReplayCase};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

use crate::calibration::{reliability, ReliabilityReport};
use crate::config::BacktestConfig;
use crate::numeric::{mean, median, sqrt_decimal, std_dev};
use crate::tracker::direction_matches;
use crate::types::{FilingType, MarketCapTier, MarketRegime};

const RELIABILITY_BINS: usize = 10;

/// One resolved historical forecast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestRecord {
    pub filing_id: String,
    pub ticker: String,
    pub filing_type: FilingType,
    pub filing_date: NaiveDate,
    /// Contributing model ids joined with `+`
    pub model_id: String,
    pub model_version: String,
    pub forecast_pct: Decimal,
    pub confidence: Decimal,
    pub realized_pct: Decimal,
    #[serde(default)]
    pub regime: Option<MarketRegime>,
    #[serde(default = "unknown_tier")]
    pub cap_tier: MarketCapTier,
}

fn unknown_tier() -> MarketCapTier {
    MarketCapTier::Unknown
}

impl BacktestRecord {
    pub fn direction_correct(&self) -> bool {
        direction_matches(self.forecast_pct, self.realized_pct)
    }

    pub fn absolute_error(&self) -> Decimal {
        (self.forecast_pct - self.realized_pct).abs()
    }

    /// Long for a positive forecast, short otherwise
    pub fn trade_return(&self) -> Decimal {
        if self.forecast_pct > Decimal::ZERO {
            self.realized_pct
        } else {
            -self.realized_pct
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TradingStats {
    pub trades: usize,
    pub wins: usize,
    pub win_rate: Option<Decimal>,
    pub avg_return_pct: Option<Decimal>,
    /// Gross profit over gross loss; absent with no losing trade
    pub profit_factor: Option<Decimal>,
    /// Compounded over trades in filing-date order
    pub total_return_pct: Decimal,
    pub max_drawdown_pct: Decimal,
    /// Equity left the representable range; totals stop at the last trade that fit
    #[serde(default)]
    pub compounding_saturated: bool,
    pub sharpe_ratio: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SliceStats {
    pub count: usize,
    pub direction_accuracy: Option<Decimal>,
    pub mean_absolute_error: Option<Decimal>,
    pub mean_realized_pct: Option<Decimal>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Slices {
    pub by_regime: BTreeMap<String, SliceStats>,
    pub by_cap_tier: BTreeMap<String, SliceStats>,
    pub by_filing_type: BTreeMap<String, SliceStats>,
    pub by_model: BTreeMap<String, SliceStats>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepRow {
    pub threshold: Decimal,
    pub trades: usize,
    /// Share of all records that clear the threshold
    pub coverage: Decimal,
    pub accuracy: Option<Decimal>,
    pub mean_return_pct: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestReport {
    pub records: usize,
    pub direction_accuracy: Option<Decimal>,
    /// Accuracy of always calling an up move
    pub always_long_accuracy: Option<Decimal>,
    pub mean_absolute_error: Option<Decimal>,
    pub median_absolute_error: Option<Decimal>,
    pub trading: TradingStats,
    pub slices: Slices,
    pub sweep: Vec<SweepRow>,
    pub optimal_threshold: Option<SweepRow>,
    pub reliability: ReliabilityReport,
}

fn share(part: usize, whole: usize) -> Option<Decimal> {
    if whole == 0 {
        None
    } else {
        Some(Decimal::from(part as i64) / Decimal::from(whole as i64))
    }
}

impl BacktestReport {
    pub fn from_records(records: &[BacktestRecord], config: &BacktestConfig) -> Self {
        let total = records.len();
        let correct = records.iter().filter(|r| r.direction_correct()).count();
        let ups = records.iter().filter(|r| r.realized_pct > Decimal::ZERO).count();
        let errors: Vec<Decimal> = records.iter().map(|r| r.absolute_error()).collect();

        let sweep = sweep(records, &config.confidence_thresholds);
        let optimal_threshold = optimal(&sweep, config.min_sweep_coverage);
        let pairs: Vec<(Decimal, bool)> = records
            .iter()
            .map(|r| (r.confidence, r.direction_correct()))
            .collect();

        Self {
            records: total,
            direction_accuracy: share(correct, total),
            always_long_accuracy: share(ups, total),
            mean_absolute_error: mean(&errors),
            median_absolute_error: median(&errors),
            trading: simulate(records, config),
            slices: Slices {
                by_regime: slice(records, |r| {
                    r.regime.map_or_else(|| "unknown".to_string(), |g| g.to_string())
                }),
                by_cap_tier: slice(records, |r| r.cap_tier.to_string()),
                by_filing_type: slice(records, |r| r.filing_type.to_string()),
                by_model: slice(records, |r| r.model_id.clone()),
            },
            sweep,
            optimal_threshold,
            reliability: reliability(&pairs, RELIABILITY_BINS),
        }
    }
}

/// Trade when |forecast| clears the edge and confidence clears the floor
pub fn simulate(records: &[BacktestRecord], config: &BacktestConfig) -> TradingStats {
    let mut trades: Vec<&BacktestRecord> = records
        .iter()
        .filter(|r| r.forecast_pct.abs() >= config.min_edge_pct && r.confidence >= config.min_confidence)
        .filter(|r| !r.forecast_pct.is_zero())
        .collect();
    trades.sort_by_key(|r| r.filing_date);
    let returns: Vec<Decimal> = trades.iter().map(|r| r.trade_return()).collect();

    let wins = returns.iter().filter(|r| **r > Decimal::ZERO).count();
    let gross_profit: Decimal = returns.iter().filter(|r| **r > Decimal::ZERO).sum();
    let gross_loss: Decimal = returns.iter().filter(|r| **r < Decimal::ZERO).map(|r| r.abs()).sum();

    let mut equity = dec!(1);
    let mut peak = dec!(1);
    let mut max_drawdown_pct = Decimal::ZERO;
    let mut compounding_saturated = false;
    for (i, r) in returns.iter().enumerate() {
        let Some(next) = (dec!(1) + *r / dec!(100)).checked_mul(equity) else {
            warn!(trade = i, equity = %equity, "Equity curve overflowed, compounding stopped");
            compounding_saturated = true;
            break;
        };
        equity = next;
        peak = peak.max(equity);
        if peak > Decimal::ZERO {
            max_drawdown_pct = max_drawdown_pct.max((peak - equity) / peak * dec!(100));
        }
    }

    let sharpe_ratio = match (mean(&returns), std_dev(&returns)) {
        (Some(m), Some(sd)) if returns.len() > 1 && sd > Decimal::ZERO => {
            m / sd * sqrt_decimal(Decimal::from(config.periods_per_year))
        }
        _ => Decimal::ZERO,
    };

    TradingStats {
        trades: returns.len(),
        wins,
        win_rate: share(wins, returns.len()),
        avg_return_pct: mean(&returns),
        profit_factor: if gross_loss > Decimal::ZERO {
            Some(gross_profit / gross_loss)
        } else {
            None
        },
        total_return_pct: (equity - dec!(1)).checked_mul(dec!(100)).unwrap_or(Decimal::MAX),
        max_drawdown_pct,
        compounding_saturated,
        sharpe_ratio,
    }
}

fn slice<F>(records: &[BacktestRecord], key: F) -> BTreeMap<String, SliceStats>
where
    F: Fn(&BacktestRecord) -> String,
{
    let mut groups: BTreeMap<String, Vec<&BacktestRecord>> = BTreeMap::new();
    for r in records {
        groups.entry(key(r)).or_default().push(r);
    }
    groups
        .into_iter()
        .map(|(k, group)| {
            let errors: Vec<Decimal> = group.iter().map(|r| r.absolute_error()).collect();
            let realized: Vec<Decimal> = group.iter().map(|r| r.realized_pct).collect();
            let correct = group.iter().filter(|r| r.direction_correct()).count();
            let stats = SliceStats {
                count: group.len(),
                direction_accuracy: share(correct, group.len()),
                mean_absolute_error: mean(&errors),
                mean_realized_pct: mean(&realized),
            };
            (k, stats)
        })
        .collect()
}

pub fn sweep(records: &[BacktestRecord], thresholds: &[Decimal]) -> Vec<SweepRow> {
    thresholds
        .iter()
        .map(|&threshold| {
            let taken: Vec<&BacktestRecord> = records
                .iter()
                .filter(|r| r.confidence >= threshold && !r.forecast_pct.is_zero())
                .collect();
            let correct = taken.iter().filter(|r| r.direction_correct()).count();
            let returns: Vec<Decimal> = taken.iter().map(|r| r.trade_return()).collect();
            SweepRow {
                threshold,
                trades: taken.len(),
                coverage: share(taken.len(), records.len()).unwrap_or(Decimal::ZERO),
                accuracy: share(correct, taken.len()),
                mean_return_pct: mean(&returns),
            }
        })
        .collect()
}

/// Best accuracy among thresholds with enough coverage; ties keep the lower threshold
pub fn optimal(rows: &[SweepRow], min_coverage: Decimal) -> Option<SweepRow> {
    let mut best: Option<&SweepRow> = None;
    for row in rows.iter().filter(|r| r.coverage >= min_coverage) {
        let Some(acc) = row.accuracy else { continue };
        match best.and_then(|b| b.accuracy) {
            Some(best_acc) if acc <= best_acc => {}
            _ => best = Some(row),
        }
    }
    best.cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(i: u32, forecast: Decimal, confidence: Decimal, realized: Decimal) -> BacktestRecord {
        BacktestRecord {
            filing_id: format!("f-{}", i),
            ticker: "T".to_string(),
            filing_type: if i % 2 == 0 { FilingType::TenQ } else { FilingType::EightK },
            filing_date: NaiveDate::from_ymd_opt(2024, 1, 1 + i).unwrap(),
            model_id: if i % 2 == 0 { "heuristic".to_string() } else { "heuristic+standardized".to_string() },
            model_version: "heuristic-v2".to_string(),
            forecast_pct: forecast,
            confidence,
            realized_pct: realized,
            regime: Some(if i < 3 { MarketRegime::Bull } else { MarketRegime::Bear }),
            cap_tier: MarketCapTier::Large,
        }
    }

    fn sample() -> Vec<BacktestRecord> {
        vec![
            record(1, dec!(2), dec!(0.70), dec!(3)),
            record(2, dec!(-1), dec!(0.60), dec!(-2)),
            record(3, dec!(1.5), dec!(0.55), dec!(-1)),
            record(4, dec!(0.2), dec!(0.90), dec!(1)),
            record(5, dec!(-3), dec!(0.80), dec!(4)),
        ]
    }

    #[test]
    fn test_accuracy_and_errors() {
        let report = BacktestReport::from_records(&sample(), &BacktestConfig::default());
        assert_eq!(report.records, 5);
        assert_eq!(report.direction_accuracy, Some(dec!(0.6)));
        assert_eq!(report.always_long_accuracy, Some(dec!(0.6)));
        assert_eq!(report.mean_absolute_error, Some(dec!(2.46)));
        assert_eq!(report.median_absolute_error, Some(dec!(1)));
    }

    #[test]
    fn test_trading_simulation() {
        let stats = simulate(&sample(), &BacktestConfig::default());
        // record 4 is below the 0.5% edge
        assert_eq!(stats.trades, 4);
        assert_eq!(stats.wins, 2);
        assert_eq!(stats.win_rate, Some(dec!(0.5)));
        assert_eq!(stats.avg_return_pct, Some(Decimal::ZERO));
        assert_eq!(stats.profit_factor, Some(dec!(1)));
        // 1.03 * 1.02 * 0.99 * 0.96
        assert_eq!(stats.total_return_pct, dec!(-0.150976));
        assert_eq!(stats.max_drawdown_pct, dec!(4.96));
        assert_eq!(stats.sharpe_ratio, Decimal::ZERO);
    }

    #[test]
    fn test_long_winning_streak_saturates_instead_of_overflowing() {
        let records: Vec<BacktestRecord> = (0..250)
            .map(|i| {
                let mut r = record(1, dec!(2), dec!(0.7), dec!(35));
                r.filing_id = format!("streak-{}", i);
                r.filing_date = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap() + chrono::Duration::days(i);
                r
            })
            .collect();
        let stats = simulate(&records, &BacktestConfig::default());
        assert_eq!(stats.trades, 250);
        assert_eq!(stats.wins, 250);
        assert!(stats.compounding_saturated);
        assert!(stats.total_return_pct > dec!(1_000_000));
        assert_eq!(stats.max_drawdown_pct, Decimal::ZERO);
    }

    #[test]
    fn test_min_confidence_filters_trades() {
        let config = BacktestConfig {
            min_confidence: dec!(0.65),
            ..BacktestConfig::default()
        };
        let stats = simulate(&sample(), &config);
        assert_eq!(stats.trades, 2);
        assert_eq!(stats.profit_factor, Some(dec!(0.75)));
    }

    #[test]
    fn test_sweep_and_optimal_threshold() {
        let config = BacktestConfig::default();
        let rows = sweep(&sample(), &config.confidence_thresholds);
        let at = |t: Decimal| rows.iter().find(|r| r.threshold == t).unwrap();
        assert_eq!(at(dec!(0.50)).trades, 5);
        assert_eq!(at(dec!(0.60)).accuracy, Some(dec!(0.75)));
        assert_eq!(at(dec!(0.60)).coverage, dec!(0.8));
        assert_eq!(at(dec!(0.85)).trades, 1);

        let best = optimal(&rows, config.min_sweep_coverage).unwrap();
        assert_eq!(best.threshold, dec!(0.85));
        assert_eq!(best.accuracy, Some(dec!(1)));

        let strict = optimal(&rows, dec!(0.5)).unwrap();
        assert_eq!(strict.threshold, dec!(0.60));
    }

    #[test]
    fn test_slices() {
        let report = BacktestReport::from_records(&sample(), &BacktestConfig::default());
        assert_eq!(report.slices.by_regime["bull"].count, 2);
        assert_eq!(report.slices.by_regime["bear"].count, 3);
        assert_eq!(report.slices.by_filing_type["10-Q"].count, 2);
        assert_eq!(report.slices.by_model["heuristic+standardized"].count, 3);
        assert_eq!(report.slices.by_cap_tier["large"].count, 5);
    }

    #[test]
    fn test_empty_records() {
        let report = BacktestReport::from_records(&[], &BacktestConfig::default());
        assert_eq!(report.direction_accuracy, None);
        assert_eq!(report.trading.trades, 0);
        assert_eq!(report.trading.total_return_pct, Decimal::ZERO);
        assert!(report.optimal_threshold.is_none());
    }

    #[test]
    fn test_records_parse_from_json() {
        let raw = r#"[{
            "filing_id": "f-1", "ticker": "AAPL", "filing_type": "10-K",
            "filing_date": "2024-02-02", "model_id": "heuristic",
            "model_version": "heuristic-v2", "forecast_pct": "1.2",
            "confidence": "0.7", "realized_pct": "2.5", "regime": "bull"
        }]"#;
        let records: Vec<BacktestRecord> = serde_json::from_str(raw).unwrap();
        assert_eq!(records[0].cap_tier, MarketCapTier::Unknown);
        assert!(records[0].direction_correct());
    }
}
