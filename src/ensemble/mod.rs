//! Model routing and blending
//!
//! Picks the system-of-record model for a filing by form type and market-cap
//! tier, or blends several with fixed weights. Blended confidence is cut when
//! the legs disagree on direction.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::calibration::{bound, ConfidenceCalibrator, MAX_CONFIDENCE};
use crate::config::{BlendWeight, RouterConfig};
use crate::error::{ForecastError, Result};
use crate::model::{
    BaselineModel, HeuristicEngine, ModelParameters, ParameterRegistry, StandardizedModel,
};
use crate::signals::SignalBundle;
use crate::types::{FilingType, ModelContribution, Prediction, ReasoningEntry, TradeSignal};

/// Which version(s) answer for a bundle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Route {
    Single(String),
    Blend(Vec<BlendWeight>),
}

impl Route {
    /// Stored as `Prediction.model_version`
    pub fn label(&self) -> String {
        match self {
            Route::Single(version) => version.clone(),
            Route::Blend(legs) => {
                let parts: Vec<String> = legs
                    .iter()
                    .map(|leg| format!("{}@{}", leg.version, leg.weight))
                    .collect();
                format!("blend:{}", parts.join(","))
            }
        }
    }
}

/// One model's answer, before routing decides what to keep
#[derive(Debug, Clone, PartialEq)]
pub struct ModelOutput {
    pub model_id: String,
    pub version: String,
    pub forecast: Decimal,
    pub confidence: Decimal,
    pub signal: Option<TradeSignal>,
    pub reasoning: Vec<ReasoningEntry>,
    /// Every step, material or not; sums to `forecast`
    pub trace: Vec<ReasoningEntry>,
}

/// 1 when every forecast shares a sign; otherwise shrinks with the spread.
pub fn agreement(forecasts: &[Decimal], scale: Decimal) -> Decimal {
    let any_up = forecasts.iter().any(|f| *f > Decimal::ZERO);
    let any_down = forecasts.iter().any(|f| *f < Decimal::ZERO);
    if !(any_up && any_down) {
        return dec!(1);
    }
    let max = forecasts.iter().copied().max().unwrap_or(Decimal::ZERO);
    let min = forecasts.iter().copied().min().unwrap_or(Decimal::ZERO);
    let spread = (max - min).abs();
    dec!(1) - spread / (spread + scale)
}

pub struct Router {
    config: RouterConfig,
    registry: Arc<ParameterRegistry>,
    calibrator: ConfidenceCalibrator,
}

impl Router {
    pub fn new(config: RouterConfig, registry: Arc<ParameterRegistry>) -> Self {
        Self {
            config,
            registry,
            calibrator: ConfidenceCalibrator::with_defaults(),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(RouterConfig::default(), Arc::new(ParameterRegistry::with_builtins()))
    }

    pub fn registry(&self) -> &ParameterRegistry {
        &self.registry
    }

    pub fn route(&self, bundle: &SignalBundle) -> Route {
        let c = &self.config;
        if bundle.is_degraded() {
            return Route::Single(c.degraded_version.clone());
        }
        match bundle.filing.filing_type {
            FilingType::TenK => Route::Single(c.annual_version.clone()),
            FilingType::TenQ if bundle.market_cap_tier().is_large_or_mega() => {
                Route::Single(c.quarterly_liquid_version.clone())
            }
            FilingType::TenQ => Route::Single(c.quarterly_version.clone()),
            FilingType::EightK => Route::Blend(c.current_report_blend.clone()),
            FilingType::Other => Route::Single(c.other_version.clone()),
        }
    }

    pub fn predict(&self, bundle: &SignalBundle, created_at: DateTime<Utc>) -> Result<Prediction> {
        let route = self.route(bundle);
        debug!(
            filing_id = %bundle.filing.id,
            filing_type = %bundle.filing.filing_type,
            tier = %bundle.market_cap_tier(),
            route = %route.label(),
            "Routed filing"
        );
        self.run(route, bundle, created_at)
    }

    /// Bypass routing and score with one named version
    pub fn predict_with_version(
        &self,
        bundle: &SignalBundle,
        version: &str,
        created_at: DateTime<Utc>,
    ) -> Result<Prediction> {
        self.run(Route::Single(version.to_string()), bundle, created_at)
    }

    fn run(&self, route: Route, bundle: &SignalBundle, created_at: DateTime<Utc>) -> Result<Prediction> {
        let label = route.label();
        let (forecast, confidence, signal, reasoning, contributors) = match route {
            Route::Single(version) => {
                let out = self.score_version(&version, bundle)?;
                let contribution = contribution(&out, dec!(1));
                (out.forecast, out.confidence, out.signal, out.reasoning, vec![contribution])
            }
            Route::Blend(legs) => self.blend(&legs, bundle)?,
        };

        Ok(Prediction {
            filing_id: bundle.filing.id.clone(),
            ticker: bundle.filing.ticker.clone(),
            model_version: label,
            forecast_return_pct: forecast,
            confidence: bound(confidence, MAX_CONFIDENCE),
            signal,
            reasoning,
            contributors,
            created_at,
        })
    }

    #[allow(clippy::type_complexity)]
    fn blend(
        &self,
        legs: &[BlendWeight],
        bundle: &SignalBundle,
    ) -> Result<(
        Decimal,
        Decimal,
        Option<TradeSignal>,
        Vec<ReasoningEntry>,
        Vec<ModelContribution>,
    )> {
        if legs.is_empty() {
            return Err(ForecastError::config("blend route without legs"));
        }
        let mut outputs = Vec::with_capacity(legs.len());
        for leg in legs {
            outputs.push((leg.weight, self.score_version(&leg.version, bundle)?));
        }

        let forecast: Decimal = outputs.iter().map(|(w, o)| *w * o.forecast).sum();
        let forecasts: Vec<Decimal> = outputs.iter().map(|(_, o)| o.forecast).collect();
        let agree = agreement(&forecasts, self.config.disagreement_scale);
        let weighted_confidence: Decimal = outputs.iter().map(|(w, o)| *w * o.confidence).sum();
        let confidence = bound(weighted_confidence * agree, MAX_CONFIDENCE);
        let signal = outputs
            .iter()
            .find(|(_, o)| o.model_id == "standardized")
            .and_then(|(_, o)| o.signal);

        let mut reasoning = Vec::new();
        for (weight, out) in &outputs {
            reasoning.extend(out.trace.iter().map(|e| {
                ReasoningEntry::new(
                    format!("{}:{}", out.version, e.factor),
                    e.impact * *weight,
                    e.explanation.clone(),
                )
            }));
        }
        if agree < dec!(1) {
            reasoning.push(ReasoningEntry::new(
                "model_disagreement",
                Decimal::ZERO,
                format!("Models disagree on direction; confidence x{:.2}", agree),
            ));
        }

        debug!(
            filing_id = %bundle.filing.id,
            forecast = %forecast,
            agreement = %agree,
            "Blended models"
        );

        let contributors = outputs.iter().map(|(w, o)| contribution(o, *w)).collect();
        Ok((forecast, confidence, signal, reasoning, contributors))
    }

    pub fn score_version(&self, version: &str, bundle: &SignalBundle) -> Result<ModelOutput> {
        let params = self.registry.get(version)?;
        let model_id = params.model_id().to_string();
        let out = match params.as_ref() {
            ModelParameters::Heuristic(p) => {
                let score = HeuristicEngine::new(p).score_bundle(bundle);
                ModelOutput {
                    model_id,
                    version: score.version,
                    forecast: score.value,
                    confidence: score.confidence,
                    signal: None,
                    reasoning: score.reasoning,
                    trace: score.trace,
                }
            }
            ModelParameters::Standardized(p) => {
                let score = StandardizedModel::new(p).score_bundle(bundle)?;
                let confidence =
                    self.calibrator
                        .discount_imputed(score.confidence, score.imputed, score.total);
                let mut reasoning: Vec<ReasoningEntry> = score
                    .contributions
                    .iter()
                    .filter(|c| !c.contribution.is_zero())
                    .map(|c| {
                        ReasoningEntry::new(
                            c.feature.clone(),
                            c.contribution,
                            format!("Standardized contribution of {}", c.feature),
                        )
                    })
                    .collect();
                reasoning.push(ReasoningEntry::new(
                    "market_baseline",
                    p.market_baseline_pct,
                    format!(
                        "Raw score {:.3} in {} band, {} imputed of {}",
                        score.raw_score, score.band, score.imputed, score.total
                    ),
                ));
                ModelOutput {
                    model_id,
                    version: score.version,
                    forecast: score.expected_alpha,
                    confidence,
                    signal: Some(score.signal),
                    trace: reasoning.clone(),
                    reasoning,
                }
            }
            ModelParameters::Baseline(p) => {
                let score = BaselineModel::new(p).score_bundle(bundle)?;
                let reasoning = vec![ReasoningEntry::new(
                    "earnings_surprise",
                    score.forecast,
                    format!(
                        "P(up) {:.3} from earnings surprise alone, {} position",
                        score.probability_up, score.position_size
                    ),
                )];
                ModelOutput {
                    model_id,
                    version: score.version,
                    forecast: score.forecast,
                    confidence: score.confidence,
                    signal: Some(score.signal),
                    trace: reasoning.clone(),
                    reasoning,
                }
            }
        };
        Ok(out)
    }
}

fn contribution(out: &ModelOutput, weight: Decimal) -> ModelContribution {
    ModelContribution {
        model_id: out.model_id.clone(),
        version: out.version.clone(),
        weight,
        forecast: out.forecast,
        confidence: out.confidence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::{AnalystActivity, EarningsSurprise, FilingAnalysis, Fundamentals, GuidanceChange};
    use crate::types::FilingEvent;
    use chrono::{NaiveDate, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 2, 21, 0, 0).unwrap()
    }

    fn bundle(filing_type: FilingType, market_cap: Option<Decimal>) -> SignalBundle {
        let mut b = SignalBundle::new(FilingEvent::new(
            "f-9",
            "NVDA",
            filing_type,
            NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
        ));
        b.analysis = Some(FilingAnalysis {
            sentiment_score: Some(dec!(0.3)),
            concern_level: Some(dec!(3)),
            guidance: Some(GuidanceChange::Raised),
            ..Default::default()
        });
        b.earnings = Some(EarningsSurprise {
            eps: None,
            eps_surprise_pct: Some(dec!(8)),
            revenue: None,
        });
        b.fundamentals = market_cap.map(|cap| Fundamentals {
            market_cap_usd: Some(cap),
            ..Default::default()
        });
        b
    }

    #[test]
    fn test_routes_by_form_and_tier() {
        let router = Router::with_defaults();
        let mega = Some(dec!(2_000_000_000_000));
        let small = Some(dec!(3_000_000_000));
        assert_eq!(router.route(&bundle(FilingType::TenK, mega)).label(), "heuristic-v2");
        assert_eq!(router.route(&bundle(FilingType::TenQ, mega)).label(), "standardized-v1");
        assert_eq!(router.route(&bundle(FilingType::TenQ, small)).label(), "heuristic-v2");
        assert_eq!(router.route(&bundle(FilingType::TenQ, None)).label(), "heuristic-v2");
        assert_eq!(router.route(&bundle(FilingType::Other, mega)).label(), "heuristic-v2");
        assert_eq!(
            router.route(&bundle(FilingType::EightK, mega)).label(),
            "blend:heuristic-v2@0.6,standardized-v1@0.4"
        );
    }

    #[test]
    fn test_degraded_bundle_routes_to_baseline() {
        let router = Router::with_defaults();
        let mut b = bundle(FilingType::TenK, None);
        b.analysis = None;
        assert!(b.is_degraded());
        let prediction = router.predict(&b, now()).unwrap();
        assert_eq!(prediction.model_version, "baseline-v1");
        assert_eq!(prediction.contributors[0].model_id, "baseline");
        assert!(prediction.signal.is_some());
    }

    #[test]
    fn test_single_route_records_contributor() {
        let router = Router::with_defaults();
        let prediction = router.predict(&bundle(FilingType::TenK, None), now()).unwrap();
        assert_eq!(prediction.model_version, "heuristic-v2");
        assert_eq!(prediction.contributors.len(), 1);
        assert_eq!(prediction.contributors[0].weight, dec!(1));
        assert_eq!(prediction.contributors[0].forecast, prediction.forecast_return_pct);
        assert!(prediction.signal.is_none());
        assert_eq!(prediction.created_at, now());
    }

    #[test]
    fn test_blend_weights_forecasts() {
        let router = Router::with_defaults();
        let b = bundle(FilingType::EightK, Some(dec!(300_000_000_000)));
        let prediction = router.predict(&b, now()).unwrap();

        assert_eq!(prediction.contributors.len(), 2);
        let expected: Decimal = prediction
            .contributors
            .iter()
            .map(|c| c.weight * c.forecast)
            .sum();
        assert_eq!(prediction.forecast_return_pct, expected);
        assert!(prediction.signal.is_some());
        assert!(prediction.confidence <= dec!(0.95));
        let ids: Vec<&str> = prediction.contributor_ids().collect();
        assert_eq!(ids, vec!["heuristic", "standardized"]);
        assert!(prediction
            .reasoning
            .iter()
            .any(|e| e.factor.starts_with("heuristic-v2:")));
    }

    #[test]
    fn test_blend_reasoning_sums_to_forecast() {
        let router = Router::with_defaults();
        let mut b = bundle(FilingType::EightK, Some(dec!(300_000_000_000)));
        if let Some(a) = b.analysis.as_mut() {
            // -0.04 impact, below materiality
            a.risk_score_delta = Some(dec!(0.05));
        }
        let prediction = router.predict(&b, now()).unwrap();

        assert!(prediction
            .reasoning
            .iter()
            .any(|e| e.factor == "heuristic-v2:risk_delta"));
        let total: Decimal = prediction.reasoning.iter().map(|e| e.impact).sum();
        assert!((total - prediction.forecast_return_pct).abs() < dec!(0.000001));
    }

    #[test]
    fn test_agreement_penalty() {
        assert_eq!(agreement(&[dec!(3), dec!(1)], dec!(4)), dec!(1));
        assert_eq!(agreement(&[dec!(0), dec!(-2)], dec!(4)), dec!(1));
        // spread 4 against scale 4
        assert_eq!(agreement(&[dec!(3), dec!(-1)], dec!(4)), dec!(0.5));
    }

    #[test]
    fn test_forced_version() {
        let router = Router::with_defaults();
        let prediction = router
            .predict_with_version(&bundle(FilingType::TenK, None), "heuristic-v1", now())
            .unwrap();
        assert_eq!(prediction.model_version, "heuristic-v1");
    }

    #[test]
    fn test_unknown_version_in_config_fails() {
        let config = RouterConfig {
            annual_version: "heuristic-v7".to_string(),
            ..RouterConfig::default()
        };
        let router = Router::new(config, Arc::new(ParameterRegistry::with_builtins()));
        let err = router.predict(&bundle(FilingType::TenK, None), now()).unwrap_err();
        assert!(matches!(err, ForecastError::UnknownModelVersion(_)));
    }

    #[test]
    fn test_analyst_coverage_alone_is_not_degraded() {
        let router = Router::with_defaults();
        let mut b = bundle(FilingType::TenQ, None);
        b.analysis = None;
        b.analyst = Some(AnalystActivity {
            coverage: 5,
            ..Default::default()
        });
        assert_eq!(router.route(&b).label(), "heuristic-v2");
    }
}
