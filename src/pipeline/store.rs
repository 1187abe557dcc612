//! Prediction persistence contract
//!
//! A prediction is written once per (filing_id, model_version). Scoring the
//! same filing under a new version adds a record; it never replaces one.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::types::Prediction;

#[async_trait]
pub trait PredictionStore: Send + Sync {
    /// Store unless the key exists; returns whichever record is now stored
    async fn insert_if_absent(&self, prediction: Prediction) -> Result<Prediction>;

    async fn get(&self, filing_id: &str, model_version: &str) -> Result<Option<Prediction>>;

    /// Every version recorded for a filing, oldest first
    async fn for_filing(&self, filing_id: &str) -> Result<Vec<Prediction>>;
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryPredictionStore {
    predictions: Arc<RwLock<HashMap<(String, String), Prediction>>>,
}

impl InMemoryPredictionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PredictionStore for InMemoryPredictionStore {
    async fn insert_if_absent(&self, prediction: Prediction) -> Result<Prediction> {
        let key = (prediction.filing_id.clone(), prediction.model_version.clone());
        let mut predictions = self.predictions.write().await;
        Ok(predictions.entry(key).or_insert(prediction).clone())
    }

    async fn get(&self, filing_id: &str, model_version: &str) -> Result<Option<Prediction>> {
        let predictions = self.predictions.read().await;
        Ok(predictions
            .get(&(filing_id.to_string(), model_version.to_string()))
            .cloned())
    }

    async fn for_filing(&self, filing_id: &str) -> Result<Vec<Prediction>> {
        let predictions = self.predictions.read().await;
        let mut found: Vec<Prediction> = predictions
            .values()
            .filter(|p| p.filing_id == filing_id)
            .cloned()
            .collect();
        found.sort_by_key(|p| p.created_at);
        Ok(found)
    }
}
