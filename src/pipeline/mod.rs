//! End-to-end service
//!
//! predict: assemble signals -> route and score -> store once per version.
//! resolve: stored prediction + price series -> tracking status -> idempotent upsert.

pub mod store;


pub use store::{InMemoryPredictionStore, PredictionStore};

use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::ForecastConfig;
use crate::ensemble::Router;
use crate::error::{ForecastError, Result};
use crate::model::ParameterRegistry;
use crate::signals::{SignalAssembler, SignalBundle, SignalSource};
use crate::tracker::{AccuracyStore, AccuracyTracker, InMemoryAccuracyStore, PriceSeries, TrackingStatus};
use crate::types::{FilingEvent, Prediction};

/// Registry with every built-in version plus any versions in the configured file
pub fn load_registry(config: &ForecastConfig) -> Result<ParameterRegistry> {
    let mut registry = ParameterRegistry::with_builtins();
    if let Some(path) = &config.parameters_path {
        let added = registry.load_toml(path)?;
        info!(path = %path.display(), added, "Loaded extra model parameters");
    }

    let r = &config.router;
    let mut routed = vec![
        r.annual_version.as_str(),
        r.quarterly_liquid_version.as_str(),
        r.quarterly_version.as_str(),
        r.other_version.as_str(),
        r.degraded_version.as_str(),
    ];
    routed.extend(r.current_report_blend.iter().map(|b| b.version.as_str()));
    for version in routed {
        registry.get(version)?;
    }
    Ok(registry)
}

pub struct ForecastService<S> {
    assembler: SignalAssembler<S>,
    router: Router,
    tracker: AccuracyTracker,
    predictions: Arc<dyn PredictionStore>,
    accuracy: Arc<dyn AccuracyStore>,
}

impl<S: SignalSource> ForecastService<S> {
    /// In-memory stores
    pub fn new(source: Arc<S>, config: &ForecastConfig) -> Result<Self> {
        Self::with_stores(
            source,
            config,
            Arc::new(InMemoryPredictionStore::new()),
            Arc::new(InMemoryAccuracyStore::new()),
        )
    }

    pub fn with_stores(
        source: Arc<S>,
        config: &ForecastConfig,
        predictions: Arc<dyn PredictionStore>,
        accuracy: Arc<dyn AccuracyStore>,
    ) -> Result<Self> {
        config.validate()?;
        let registry = load_registry(config)?;
        Ok(Self {
            assembler: SignalAssembler::new(source, config.assembly.clone()),
            router: Router::new(config.router.clone(), Arc::new(registry)),
            tracker: AccuracyTracker::new(config.tracker.clone()),
            predictions,
            accuracy,
        })
    }

    pub fn assembler(&self) -> &SignalAssembler<S> {
        &self.assembler
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn tracker(&self) -> &AccuracyTracker {
        &self.tracker
    }

    pub fn accuracy_store(&self) -> &Arc<dyn AccuracyStore> {
        &self.accuracy
    }

    /// Score an already-assembled bundle; nothing is stored
    pub fn predict_bundle(&self, bundle: &SignalBundle) -> Result<Prediction> {
        self.predict_bundle_at(bundle, Utc::now())
    }

    /// Score as if issued at `created_at`; replays stamp the filing date
    pub fn predict_bundle_at(&self, bundle: &SignalBundle, created_at: DateTime<Utc>) -> Result<Prediction> {
        self.router.predict(bundle, created_at)
    }

    /// Assemble, score and persist. A repeat call for the same route returns
    /// the prediction stored first.
    pub async fn predict(&self, filing: &FilingEvent) -> Result<Prediction> {
        let bundle = self.assembler.assemble(filing).await?;
        let prediction = self.predict_bundle(&bundle)?;
        let stored = self.predictions.insert_if_absent(prediction.clone()).await?;
        if stored == prediction {
            info!(
                filing_id = %stored.filing_id,
                ticker = %stored.ticker,
                model_version = %stored.model_version,
                forecast = %stored.forecast_return_pct,
                confidence = %stored.confidence,
                "Stored prediction"
            );
        } else {
            debug!(
                filing_id = %stored.filing_id,
                model_version = %stored.model_version,
                "Prediction already stored"
            );
        }
        Ok(stored)
    }

    pub async fn predictions_for(&self, filing_id: &str) -> Result<Vec<Prediction>> {
        self.predictions.for_filing(filing_id).await
    }

    /// Resolve a stored prediction; a Resolved status is upserted
    pub async fn resolve(
        &self,
        filing: &FilingEvent,
        model_version: &str,
        series: &PriceSeries,
        as_of: NaiveDate,
    ) -> Result<TrackingStatus> {
        let prediction = self
            .predictions
            .get(&filing.id, model_version)
            .await?
            .ok_or_else(|| ForecastError::PredictionNotFound {
                filing_id: filing.id.clone(),
                model_version: model_version.to_string(),
            })?;

        let status = self
            .tracker
            .resolve(&prediction, filing.filing_date, series, as_of);
        if let TrackingStatus::Resolved(result) = &status {
            let outcome = self.accuracy.upsert(result.clone()).await?;
            debug!(filing_id = %filing.id, model_version, ?outcome, "Accuracy upsert");
        }
        Ok(status)
    }
}
