//! Accuracy persistence contract
//!
//! Keyed by (filing_id, model_version). Concurrent or repeated resolution of
//! the same prediction converges on one record.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::AccuracyResult;
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    /// Same key, same values
    Unchanged,
    /// Same key, recomputed from a corrected price series
    Replaced,
}

#[async_trait]
pub trait AccuracyStore: Send + Sync {
    async fn upsert(&self, result: AccuracyResult) -> Result<UpsertOutcome>;

    async fn get(&self, filing_id: &str, model_version: &str) -> Result<Option<AccuracyResult>>;

    async fn all(&self) -> Result<Vec<AccuracyResult>>;
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryAccuracyStore {
    results: Arc<RwLock<HashMap<(String, String), AccuracyResult>>>,
}

impl InMemoryAccuracyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccuracyStore for InMemoryAccuracyStore {
    async fn upsert(&self, result: AccuracyResult) -> Result<UpsertOutcome> {
        let key = (result.filing_id.clone(), result.model_version.clone());
        let mut results = self.results.write().await;
        let outcome = match results.get(&key) {
            Some(existing) if *existing == result => return Ok(UpsertOutcome::Unchanged),
            Some(_) => UpsertOutcome::Replaced,
            None => UpsertOutcome::Inserted,
        };
        results.insert(key, result);
        Ok(outcome)
    }

    async fn get(&self, filing_id: &str, model_version: &str) -> Result<Option<AccuracyResult>> {
        let results = self.results.read().await;
        Ok(results
            .get(&(filing_id.to_string(), model_version.to_string()))
            .cloned())
    }

    async fn all(&self) -> Result<Vec<AccuracyResult>> {
        let results = self.results.read().await;
        let mut all: Vec<AccuracyResult> = results.values().cloned().collect();
        all.sort_by(|a, b| {
            (a.filing_id.as_str(), a.model_version.as_str())
                .cmp(&(b.filing_id.as_str(), b.model_version.as_str()))
        });
        Ok(all)
    }
}
