//! Daily close series and trading-day arithmetic

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{ForecastError, Result};
use crate::numeric::ratio_pct;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: Decimal,
}

impl PricePoint {
    pub fn new(date: NaiveDate, close: Decimal) -> Self {
        Self { date, close }
    }
}

/// Ordered closes for one ticker: strictly increasing dates, positive prices.
/// Only trading days appear, so index distance is trading-day distance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<PricePoint>", into = "Vec<PricePoint>")]
pub struct PriceSeries {
    points: Vec<PricePoint>,
}

impl PriceSeries {
    pub fn new(points: Vec<PricePoint>) -> Result<Self> {
        for (i, point) in points.iter().enumerate() {
            if point.close <= Decimal::ZERO {
                return Err(ForecastError::malformed(
                    "price_history",
                    format!("non-positive close {} on {}", point.close, point.date),
                ));
            }
            if i > 0 && points[i - 1].date >= point.date {
                return Err(ForecastError::malformed(
                    "price_history",
                    format!("dates not strictly increasing at {}", point.date),
                ));
            }
        }
        Ok(Self { points })
    }

    pub fn from_pairs(pairs: &[(NaiveDate, Decimal)]) -> Result<Self> {
        Self::new(pairs.iter().map(|(d, c)| PricePoint::new(*d, *c)).collect())
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Prefix of observations dated on or before `as_of`
    pub fn visible_until(&self, as_of: NaiveDate) -> &[PricePoint] {
        let end = self.points.partition_point(|p| p.date <= as_of);
        &self.points[..end]
    }

    /// Latest observation on or before `date`
    pub fn last_on_or_before(&self, date: NaiveDate) -> Option<&PricePoint> {
        self.visible_until(date).last()
    }

    /// Percent return over the `lookback` observations ending at or before `end`
    pub fn trailing_return_pct(&self, end: NaiveDate, lookback: usize) -> Option<Decimal> {
        let visible = self.visible_until(end);
        if lookback == 0 || visible.len() <= lookback {
            return None;
        }
        let last = visible[visible.len() - 1];
        let first = visible[visible.len() - 1 - lookback];
        ratio_pct(last.close - first.close, first.close)
    }

    /// Return from the last close before `date` to the first close on or after it
    pub fn reaction_return_pct(&self, date: NaiveDate) -> Option<Decimal> {
        let idx = self.points.partition_point(|p| p.date < date);
        if idx == 0 || idx >= self.points.len() {
            return None;
        }
        let before = self.points[idx - 1];
        let after = self.points[idx];
        ratio_pct(after.close - before.close, before.close)
    }
}

impl TryFrom<Vec<PricePoint>> for PriceSeries {
    type Error = ForecastError;

    fn try_from(points: Vec<PricePoint>) -> Result<Self> {
        PriceSeries::new(points)
    }
}

impl From<PriceSeries> for Vec<PricePoint> {
    fn from(series: PriceSeries) -> Self {
        series.points
    }
}

/// Observations strictly after `from` and on or before `to`
pub fn trading_days_between(series: &PriceSeries, from: NaiveDate, to: NaiveDate) -> usize {
    if to <= from {
        return 0;
    }
    series
        .points()
        .iter()
        .filter(|p| p.date > from && p.date <= to)
        .count()
}

/// Step forward `n` weekdays. Holidays are not modelled; the price series is
/// the authority on which days actually traded.
pub fn add_business_days(date: NaiveDate, n: u32) -> NaiveDate {
    let mut current = date;
    let mut remaining = n;
    while remaining > 0 {
        current += Duration::days(1);
        if !matches!(current.weekday(), Weekday::Sat | Weekday::Sun) {
            remaining -= 1;
        }
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn weekday_series(start: NaiveDate, closes: &[Decimal]) -> PriceSeries {
        let mut points = Vec::new();
        let mut day = start;
        for close in closes {
            while matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
                day += Duration::days(1);
            }
            points.push(PricePoint::new(day, *close));
            day += Duration::days(1);
        }
        PriceSeries::new(points).unwrap()
    }

    #[test]
    fn test_rejects_unordered_dates() {
        let result = PriceSeries::from_pairs(&[
            (date(2024, 1, 3), dec!(10)),
            (date(2024, 1, 2), dec!(11)),
        ]);
        assert!(matches!(result, Err(ForecastError::MalformedSignal { .. })));
    }

    #[test]
    fn test_rejects_duplicate_dates_and_bad_prices() {
        assert!(PriceSeries::from_pairs(&[
            (date(2024, 1, 2), dec!(10)),
            (date(2024, 1, 2), dec!(11)),
        ])
        .is_err());
        assert!(PriceSeries::from_pairs(&[(date(2024, 1, 2), dec!(0))]).is_err());
    }

    #[test]
    fn test_serde_validates() {
        let bad = r#"[{"date":"2024-01-03","close":"10"},{"date":"2024-01-02","close":"10"}]"#;
        assert!(serde_json::from_str::<PriceSeries>(bad).is_err());
        let good = r#"[{"date":"2024-01-02","close":"10"},{"date":"2024-01-03","close":"10.5"}]"#;
        let series: PriceSeries = serde_json::from_str(good).unwrap();
        assert_eq!(series.len(), 2);
    }

    #[test]
    fn test_visible_until() {
        let series = weekday_series(date(2024, 1, 1), &[dec!(10), dec!(11), dec!(12)]);
        assert_eq!(series.visible_until(date(2024, 1, 2)).len(), 2);
        assert_eq!(series.visible_until(date(2023, 12, 31)).len(), 0);
        assert_eq!(series.last_on_or_before(date(2024, 1, 10)).unwrap().close, dec!(12));
    }

    #[test]
    fn test_trailing_return() {
        let series = weekday_series(date(2024, 1, 1), &[dec!(100), dec!(105), dec!(110)]);
        assert_eq!(series.trailing_return_pct(date(2024, 1, 3), 2), Some(dec!(10)));
        assert_eq!(series.trailing_return_pct(date(2024, 1, 3), 3), None);
    }

    #[test]
    fn test_reaction_return() {
        let series = weekday_series(date(2024, 1, 1), &[dec!(100), dec!(95), dec!(99)]);
        assert_eq!(series.reaction_return_pct(date(2024, 1, 2)), Some(dec!(-5)));
        assert_eq!(series.reaction_return_pct(date(2024, 1, 1)), None);
    }

    #[test]
    fn test_add_business_days_skips_weekend() {
        // 2024-01-05 is a Friday
        assert_eq!(add_business_days(date(2024, 1, 5), 1), date(2024, 1, 8));
        assert_eq!(add_business_days(date(2024, 1, 5), 7), date(2024, 1, 16));
        assert_eq!(add_business_days(date(2024, 1, 5), 0), date(2024, 1, 5));
    }

    #[test]
    fn test_trading_days_between() {
        let series = weekday_series(date(2024, 1, 1), &[dec!(1), dec!(2), dec!(3), dec!(4), dec!(5), dec!(6)]);
        // Mon 1st .. Mon 8th: Tue, Wed, Thu, Fri, Mon
        assert_eq!(trading_days_between(&series, date(2024, 1, 1), date(2024, 1, 8)), 5);
        assert_eq!(trading_days_between(&series, date(2024, 1, 8), date(2024, 1, 1)), 0);
    }
}
