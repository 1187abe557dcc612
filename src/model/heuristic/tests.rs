//! Tests for the heuristic engine

#[cfg(test)]
mod tests {
    use crate::calibration::Informativeness;
    use crate::features::HeuristicFeatures;
    use crate::model::heuristic::factors;
    use crate::model::heuristic::*;
    use crate::model::params::HeuristicParameters;
    use crate::signals::*;
    use crate::types::{FilingEvent, FilingType, MarketCapTier, MarketRegime};
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn bundle(filing_type: FilingType) -> SignalBundle {
        SignalBundle::new(FilingEvent::new(
            "f-1",
            "ACME",
            filing_type,
            NaiveDate::from_ymd_opt(2024, 10, 25).unwrap(),
        ))
    }

    /// +12% beat, P/E 50, $300B, bull, +2 upgrades, raised guidance
    fn bullish_bundle() -> SignalBundle {
        let mut b = bundle(FilingType::TenQ);
        b.earnings = Some(EarningsSurprise {
            eps: Some(SurpriseKind::Beat),
            eps_surprise_pct: Some(dec!(12)),
            revenue: None,
        });
        b.analysis = Some(FilingAnalysis {
            guidance: Some(GuidanceChange::Raised),
            ..Default::default()
        });
        b.fundamentals = Some(Fundamentals {
            market_cap_usd: Some(dec!(300_000_000_000)),
            pe_ratio: Some(dec!(50)),
            ..Default::default()
        });
        b.macro_snapshot = Some(MacroSnapshot {
            regime: Some(MarketRegime::Bull),
            ..Default::default()
        });
        b.analyst = Some(AnalystActivity {
            upgrades_30d: 2,
            coverage: 12,
            ..Default::default()
        });
        b
    }

    fn bearish_bundle() -> SignalBundle {
        let mut b = bullish_bundle();
        b.earnings = Some(EarningsSurprise {
            eps: Some(SurpriseKind::Miss),
            eps_surprise_pct: Some(dec!(-12)),
            revenue: None,
        });
        b.analysis = Some(FilingAnalysis {
            guidance: Some(GuidanceChange::Lowered),
            ..Default::default()
        });
        b.macro_snapshot = Some(MacroSnapshot {
            regime: Some(MarketRegime::Bear),
            ..Default::default()
        });
        b
    }

    fn find<'a>(score: &'a HeuristicScore, factor: &str) -> Option<&'a crate::types::ReasoningEntry> {
        score.trace.iter().find(|e| e.factor == factor)
    }

    #[test]
    fn test_bullish_scenario() {
        let params = HeuristicParameters::v2();
        let score = HeuristicEngine::new(&params).score_bundle(&bullish_bundle());

        assert!(score.value > Decimal::ZERO);
        let text: Vec<String> = score
            .reasoning
            .iter()
            .map(|e| e.explanation.to_lowercase())
            .collect();
        assert!(text.iter().any(|t| t.contains("beat")));
        assert!(text.iter().any(|t| t.contains("raised")));

        let regime = find(&score, "market_regime").expect("regime entry");
        assert!(regime.impact > Decimal::ZERO);
    }

    #[test]
    fn test_bullish_scenario_values() {
        let params = HeuristicParameters::v2();
        let score = HeuristicEngine::new(&params).score_bundle(&bullish_bundle());
        // 1.8 * 1.4 * 1.15
        assert_eq!(find(&score, "earnings_surprise").unwrap().impact, dec!(2.898));
        // sweet spot 1.0 + bull bonus 0.5
        assert_eq!(find(&score, "market_cap").unwrap().impact, dec!(1.5));
        assert_eq!(find(&score, "analyst_actions").unwrap().impact, dec!(0.6));
        // 0.83 + 2.898 + 3.5 + 1.5 + 0.6
        assert_eq!(score.intermediate, dec!(9.328));
        // x1.1 then x0.85
        assert_eq!(score.value, dec!(9.328) * dec!(1.1) * dec!(0.85));
    }

    #[test]
    fn test_bearish_scenario_flips_and_amplifies() {
        let params = HeuristicParameters::v2();
        let engine = HeuristicEngine::new(&params);
        let bull = engine.score_bundle(&bullish_bundle());
        let bear = engine.score_bundle(&bearish_bundle());

        assert!(bull.value > Decimal::ZERO);
        assert!(bear.value < Decimal::ZERO);

        let miss = find(&bear, "earnings_surprise").unwrap().impact;
        assert!(miss < Decimal::ZERO);
        assert!(bear.value.abs() > miss.abs());

        let regime = find(&bear, "market_regime").unwrap();
        assert!(regime.impact < Decimal::ZERO);
        assert!(regime.explanation.contains("amplifies"));
    }

    #[test]
    fn test_high_concern_inverts_positive_tone() {
        let mut b = bundle(FilingType::TenK);
        b.analysis = Some(FilingAnalysis {
            sentiment_score: Some(dec!(0.6)),
            concern_level: Some(dec!(8)),
            ..Default::default()
        });
        let params = HeuristicParameters::v2();
        let score = HeuristicEngine::new(&params).score_bundle(&b);

        let sentiment = find(&score, "sentiment").unwrap();
        assert_eq!(sentiment.impact, dec!(-1.5));
        assert!(sentiment.explanation.contains("misalignment"));
        assert!(score.reasoning.iter().any(|e| e.factor == "sentiment"));

        // concern contributes independently: (5 - 8) * 0.3
        assert_eq!(find(&score, "concern_level").unwrap().impact, dec!(-0.9));
    }

    #[test]
    fn test_elevated_concern_damps_tone() {
        let mut b = bundle(FilingType::TenK);
        b.analysis = Some(FilingAnalysis {
            sentiment_score: Some(dec!(0.4)),
            concern_level: Some(dec!(6)),
            ..Default::default()
        });
        let params = HeuristicParameters::v2();
        let score = HeuristicEngine::new(&params).score_bundle(&b);
        // 0.4 * 5 * 0.5
        assert_eq!(find(&score, "sentiment").unwrap().impact, dec!(1.0));
    }

    #[test]
    fn test_mega_cap_floor_end_to_end() {
        let mut b = bundle(FilingType::TenQ);
        b.earnings = Some(EarningsSurprise {
            eps: Some(SurpriseKind::Miss),
            eps_surprise_pct: Some(dec!(-15)),
            revenue: Some(SurpriseKind::Miss),
        });
        b.analysis = Some(FilingAnalysis {
            guidance: Some(GuidanceChange::Lowered),
            ..Default::default()
        });
        b.fundamentals = Some(Fundamentals {
            market_cap_usd: Some(dec!(2_000_000_000_000)),
            pe_ratio: Some(dec!(50)),
            ..Default::default()
        });
        b.analyst = Some(AnalystActivity {
            downgrades_30d: 3,
            major_downgrades_30d: 3,
            coverage: 40,
            ..Default::default()
        });
        b.macro_snapshot = Some(MacroSnapshot {
            regime: Some(MarketRegime::Bull),
            ..Default::default()
        });

        let params = HeuristicParameters::v2();
        let score = HeuristicEngine::new(&params).score_bundle(&b);
        assert!(score.intermediate < dec!(-8));
        assert_eq!(score.value, dec!(-1.5));
        assert!(find(&score, "institutional_floor").is_some());
    }

    #[test]
    fn test_floor_stage_with_intermediate_minus_eight() {
        let p = HeuristicParameters::v2();
        assert_eq!(
            mega_cap_floor(dec!(-8), MarketCapTier::Mega, MarketRegime::Bull, &p),
            dec!(-1.5)
        );
        assert_eq!(
            mega_cap_floor(dec!(-8), MarketCapTier::Mega, MarketRegime::Bear, &p),
            dec!(-5.0)
        );
        assert_eq!(
            mega_cap_floor(dec!(-8), MarketCapTier::Large, MarketRegime::Bull, &p),
            dec!(-8)
        );
    }

    #[test]
    fn test_regime_interaction_polarity() {
        let p = HeuristicParameters::v2();
        assert_eq!(regime_interaction(dec!(-4), MarketRegime::Bull, &p), dec!(-1.2));
        assert_eq!(regime_interaction(dec!(4), MarketRegime::Bull, &p), dec!(4.4));
        assert_eq!(regime_interaction(dec!(4), MarketRegime::Bear, &p), dec!(2.0));
        assert_eq!(regime_interaction(dec!(-4), MarketRegime::Bear, &p), dec!(-4.8));
        assert_eq!(regime_interaction(dec!(-4), MarketRegime::Flat, &p), dec!(-4));
    }

    #[test]
    fn test_trace_sums_to_value() {
        let params = HeuristicParameters::v2();
        for b in [bullish_bundle(), bearish_bundle(), bundle(FilingType::EightK)] {
            let score = HeuristicEngine::new(&params).score_bundle(&b);
            let total: Decimal = score.trace.iter().map(|e| e.impact).sum();
            assert_eq!(total, score.value);
        }
    }

    #[test]
    fn test_output_and_confidence_bounds() {
        let params = HeuristicParameters::v2();
        let engine = HeuristicEngine::new(&params);

        let mut extreme = bullish_bundle();
        extreme.history = Some(HistoricalPattern {
            ticker_mean_return_pct: Some(dec!(40)),
            ticker_sample_count: 12,
            generic_mean_return_pct: None,
        });
        extreme.analysis = Some(FilingAnalysis {
            risk_score_delta: Some(dec!(-10)),
            sentiment_score: Some(dec!(1)),
            concern_level: Some(dec!(0)),
            guidance: Some(GuidanceChange::Raised),
        });
        let score = engine.score_bundle(&extreme);
        assert_eq!(score.value, dec!(10));
        assert!(score.confidence <= dec!(0.95));
        assert!(score.confidence >= Decimal::ZERO);
        assert!(find(&score, "bound").is_some());
    }

    #[test]
    fn test_empty_bundle_returns_baseline_result() {
        let params = HeuristicParameters::v2();
        let score = HeuristicEngine::new(&params).score_bundle(&bundle(FilingType::TenQ));
        assert_eq!(score.intermediate, dec!(0.83));
        assert_eq!(score.confidence, dec!(0.40));
    }

    #[test]
    fn test_revisions_score_differently() {
        let mut b = bundle(FilingType::TenQ);
        b.analysis = Some(FilingAnalysis {
            risk_score_delta: Some(dec!(2)),
            ..Default::default()
        });
        let v1 = HeuristicParameters::v1();
        let v3 = HeuristicParameters::v3();
        let s1 = HeuristicEngine::new(&v1).score_bundle(&b);
        let s3 = HeuristicEngine::new(&v3).score_bundle(&b);
        assert_eq!(find(&s1, "risk_delta").unwrap().impact, dec!(-0.6));
        assert_eq!(find(&s3, "risk_delta").unwrap().impact, dec!(-2.4));
        assert!(find(&s1, "baseline").is_none());
        assert_eq!(s1.version, "heuristic-v1");
    }

    #[test]
    fn test_materiality_filters_reasoning() {
        let mut b = bundle(FilingType::TenQ);
        b.history = Some(HistoricalPattern {
            ticker_mean_return_pct: None,
            ticker_sample_count: 0,
            generic_mean_return_pct: Some(dec!(0.2)),
        });
        let params = HeuristicParameters::v2();
        let score = HeuristicEngine::new(&params).score_bundle(&b);
        // 0.2 * 0.15 = 0.03 is below 0.05
        assert!(find(&score, "history").is_some());
        assert!(!score.reasoning.iter().any(|e| e.factor == "history"));
    }

    #[test]
    fn test_thin_ticker_history_earns_no_confidence() {
        let params = HeuristicParameters::v2();
        let engine = HeuristicEngine::new(&params);
        let with_samples = |count: u32| {
            let mut b = bundle(FilingType::TenQ);
            b.history = Some(HistoricalPattern {
                ticker_mean_return_pct: Some(dec!(2)),
                ticker_sample_count: count,
                generic_mean_return_pct: None,
            });
            engine.score_bundle(&b)
        };

        let thin = with_samples(1);
        assert!(find(&thin, "history").is_none());
        assert_eq!(thin.confidence, dec!(0.40));

        let enough = with_samples(3);
        assert_eq!(find(&enough, "history").unwrap().impact, dec!(0.8));
        assert_eq!(enough.confidence, dec!(0.48));
    }

    #[test]
    fn test_analyst_caps_are_independent() {
        let p = HeuristicParameters::v2();
        let mut f = HeuristicFeatures::extract(&bundle(FilingType::TenQ));
        f.upgrades = 6;
        f.major_upgrades = 6;
        f.downgrades = 1;
        let entry = factors::analyst_actions(&f, &p).unwrap();
        // 3.6 capped to 1.5, minus 0.4
        assert_eq!(entry.impact, dec!(1.1));
    }

    #[test]
    fn test_eight_k_sub_classification() {
        let p = HeuristicParameters::v2();
        let mut b = bundle(FilingType::EightK);
        b.filing = b.filing.with_items(&["2.02", "9.01"]);
        let f = HeuristicFeatures::extract(&b);
        assert_eq!(factors::filing_type(&f, &p).unwrap().impact, dec!(0.6));

        b.filing = b.filing.with_items(&["1.01"]);
        let f = HeuristicFeatures::extract(&b);
        assert_eq!(factors::filing_type(&f, &p).unwrap().impact, dec!(-0.3));
    }

    #[test]
    fn test_flight_to_quality() {
        let p = HeuristicParameters::v2();
        let mut b = bundle(FilingType::TenQ);
        b.macro_snapshot = Some(MacroSnapshot {
            vix: Some(dec!(31)),
            ..Default::default()
        });
        b.fundamentals = Some(Fundamentals {
            market_cap_usd: Some(dec!(4_000_000_000)),
            ..Default::default()
        });
        let f = HeuristicFeatures::extract(&b);
        assert_eq!(factors::flight_to_quality(&f, &p).unwrap().impact, dec!(-0.5));
    }

    #[test]
    fn test_informativeness_penalises_unavailable_groups() {
        let params = HeuristicParameters::v2();
        let engine = HeuristicEngine::new(&params);
        let features = HeuristicFeatures::extract(&bullish_bundle());
        let healthy = engine.score(&features, &Informativeness::default());
        let degraded = engine.score(
            &features,
            &Informativeness {
                large_surprise: false,
                unavailable_groups: 3,
            },
        );
        assert!(degraded.confidence < healthy.confidence);
        assert_eq!(healthy.value, degraded.value);
    }
}
