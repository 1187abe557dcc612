//! Decimal helpers shared across models
//!
//! Scores are kept in `Decimal` so threshold comparisons are exact. Anything
//! transcendental goes through f64 and comes back rounded to six places; a
//! non-finite intermediate maps to zero so NaN never leaks into a forecast.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::str::FromStr;

pub fn decimal_to_f64(d: Decimal) -> f64 {
    f64::from_str(&d.to_string()).unwrap_or(0.0)
}

pub fn f64_to_decimal(f: f64) -> Decimal {
    if f.is_nan() || f.is_infinite() {
        return Decimal::ZERO;
    }
    Decimal::from_str(&format!("{:.6}", f)).unwrap_or(Decimal::ZERO)
}

pub fn sigmoid(x: Decimal) -> Decimal {
    let x_f = decimal_to_f64(x);
    f64_to_decimal(1.0 / (1.0 + (-x_f).exp()))
}

/// Natural log; non-positive input yields zero.
pub fn ln_decimal(x: Decimal) -> Decimal {
    if x <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    f64_to_decimal(decimal_to_f64(x).ln())
}

/// Newton-Raphson square root
pub fn sqrt_decimal(x: Decimal) -> Decimal {
    if x <= Decimal::ZERO {
        return Decimal::ZERO;
    }

    let mut guess = if x > dec!(1) { x / dec!(2) } else { dec!(1) };
    for _ in 0..20 {
        if guess == Decimal::ZERO {
            return Decimal::ZERO;
        }
        guess = (guess + x / guess) / dec!(2);
    }
    guess
}

pub fn mean(values: &[Decimal]) -> Option<Decimal> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().copied().sum::<Decimal>() / Decimal::from(values.len() as i64))
}

pub fn median(values: &[Decimal]) -> Option<Decimal> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort();
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / dec!(2))
    } else {
        Some(sorted[mid])
    }
}

/// Population standard deviation
pub fn std_dev(values: &[Decimal]) -> Option<Decimal> {
    let m = mean(values)?;
    let variance = values.iter().map(|v| (*v - m) * (*v - m)).sum::<Decimal>()
        / Decimal::from(values.len() as i64);
    Some(sqrt_decimal(variance))
}

/// `numerator / denominator` in percent, `None` when the denominator is zero.
pub fn ratio_pct(numerator: Decimal, denominator: Decimal) -> Option<Decimal> {
    if denominator.is_zero() {
        None
    } else {
        Some(numerator / denominator * dec!(100))
    }
}
