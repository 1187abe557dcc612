//! Earnings-surprise-only feature set for the logistic baseline.
//! No surprise on record reads as an inline quarter: every feature is zero.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::{clamp_surprise_pct, FeatureVector, Scale};
use crate::error::Result;
use crate::signals::{SignalBundle, SurpriseKind};

/// |surprise| at or beyond this counts as large, percent
pub const LARGE_SURPRISE_PCT: Decimal = dec!(10);

pub fn extract_baseline(bundle: &SignalBundle) -> Result<FeatureVector> {
    let earnings = bundle.earnings.as_ref();
    let pct = earnings.and_then(|e| e.eps_surprise_pct).map(clamp_surprise_pct);
    let kind = earnings.and_then(|e| e.eps_kind());
    let imputed = pct.is_none();

    let surprise = pct.unwrap_or(Decimal::ZERO);
    let magnitude = surprise.abs();
    let beat = kind == Some(SurpriseKind::Beat);
    let miss = kind == Some(SurpriseKind::Miss);
    let flag = |b: bool| if b { Decimal::ONE } else { Decimal::ZERO };

    let mut v = FeatureVector::new();
    v.push("eps_surprise_pct", Scale::Percent, surprise, imputed)?;
    v.push("surprise_magnitude_pct", Scale::Percent, magnitude, imputed)?;
    v.push("eps_beat", Scale::Binary, flag(beat), kind.is_none())?;
    v.push("eps_miss", Scale::Binary, flag(miss), kind.is_none())?;
    v.push(
        "large_beat",
        Scale::Binary,
        flag(beat && magnitude >= LARGE_SURPRISE_PCT),
        imputed,
    )?;
    v.push(
        "large_miss",
        Scale::Binary,
        flag(miss && magnitude >= LARGE_SURPRISE_PCT),
        imputed,
    )?;
    Ok(v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::EarningsSurprise;
    use crate::types::{FilingEvent, FilingType};
    use chrono::NaiveDate;

    fn bundle_with(pct: Option<Decimal>) -> SignalBundle {
        let mut b = SignalBundle::new(FilingEvent::new(
            "f-1",
            "KO",
            FilingType::EightK,
            NaiveDate::from_ymd_opt(2024, 4, 30).unwrap(),
        ));
        b.earnings = pct.map(|p| EarningsSurprise {
            eps: None,
            eps_surprise_pct: Some(p),
            revenue: None,
        });
        b
    }

    #[test]
    fn test_missing_surprise_is_all_zeros() {
        let v = extract_baseline(&bundle_with(None)).unwrap();
        assert!(v.values().iter().all(|x| x.is_zero()));
        assert_eq!(v.imputed_count(), 6);
    }

    #[test]
    fn test_large_miss_flags() {
        let v = extract_baseline(&bundle_with(Some(dec!(-12)))).unwrap();
        assert_eq!(v.get("surprise_magnitude_pct"), Some(dec!(12)));
        assert_eq!(v.get("eps_miss"), Some(dec!(1)));
        assert_eq!(v.get("large_miss"), Some(dec!(1)));
        assert_eq!(v.get("large_beat"), Some(dec!(0)));
    }

    #[test]
    fn test_large_threshold_inclusive() {
        let v = extract_baseline(&bundle_with(Some(dec!(10)))).unwrap();
        assert_eq!(v.get("large_beat"), Some(dec!(1)));
        let small = extract_baseline(&bundle_with(Some(dec!(9.99)))).unwrap();
        assert_eq!(small.get("large_beat"), Some(dec!(0)));
        assert_eq!(small.get("eps_beat"), Some(dec!(1)));
    }
}
