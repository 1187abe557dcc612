//! Named vectors for the z-score models
//!
//! The parameter set decides which features are wanted and in what order. A
//! feature that cannot be observed takes its frozen training mean, so its
//! z-score is exactly zero and it neither helps nor hurts.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::{clamp_surprise_pct, FeatureVector};
use crate::error::{ForecastError, Result};
use crate::model::params::StandardizedParameters;
use crate::numeric::ln_decimal;
use crate::signals::SignalBundle;

/// Cross-sectional dispersion of EPS surprises, percent; SUE denominator
pub const SURPRISE_DISPERSION_PCT: Decimal = dec!(14.0);

/// Sessions in the relative-strength window
pub const RELATIVE_STRENGTH_WINDOW: usize = 60;

pub fn extract_standardized(
    bundle: &SignalBundle,
    params: &StandardizedParameters,
) -> Result<FeatureVector> {
    let mut vector = FeatureVector::new();
    for stat in &params.features {
        let observed = observe(&stat.name, bundle).ok_or_else(|| {
            ForecastError::invalid_parameters(
                &params.version,
                format!("no extractor for feature `{}`", stat.name),
            )
        })?;
        match observed {
            Some(value) => vector.push(&stat.name, stat.scale, value, false)?,
            None => vector.push(&stat.name, stat.scale, stat.mean, true)?,
        }
    }
    Ok(vector)
}

/// Outer `None`: unknown feature. Inner `None`: known but not observed.
fn observe(name: &str, bundle: &SignalBundle) -> Option<Option<Decimal>> {
    let analysis = bundle.analysis.as_ref();
    let fundamentals = bundle.fundamentals.as_ref();
    let surprise = bundle
        .earnings
        .as_ref()
        .and_then(|e| e.eps_surprise_pct)
        .map(clamp_surprise_pct);
    let filing_date = bundle.filing.filing_date;

    let value = match name {
        "eps_surprise_pct" => surprise,
        "risk_score_delta" => analysis.and_then(|a| a.risk_score_delta),
        "sentiment_score" => analysis.and_then(|a| a.sentiment_score),
        "concern_level" => analysis.and_then(|a| a.concern_level),
        "net_analyst_upgrades" => bundle
            .analyst
            .as_ref()
            .filter(|a| a.has_coverage())
            .map(|a| Decimal::from(a.net_upgrades())),
        "price_to_52w_high" => fundamentals.and_then(|f| f.price_to_52w_high()),
        "market_momentum_30d_pct" => bundle
            .macro_snapshot
            .as_ref()
            .and_then(|m| m.spx_return_30d_pct),
        "log_market_cap" => bundle.market_cap_usd().map(ln_decimal),
        "sue" => surprise.map(|s| s / SURPRISE_DISPERSION_PCT),
        "announcement_return_pct" => bundle
            .price_history
            .as_ref()
            .and_then(|p| p.reaction_return_pct(filing_date)),
        "relative_strength_60d_pct" => bundle.price_history.as_ref().and_then(|p| {
            let day_before = filing_date.pred_opt()?;
            p.trailing_return_pct(day_before, RELATIVE_STRENGTH_WINDOW)
        }),
        "earnings_yield_pct" => fundamentals
            .and_then(|f| f.pe_ratio)
            .filter(|pe| *pe > Decimal::ZERO)
            .map(|pe| dec!(100) / pe),
        "beta" => fundamentals.and_then(|f| f.beta),
        _ => return None,
    };
    Some(value)
}
