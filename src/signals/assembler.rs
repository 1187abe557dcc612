//! Concurrent signal assembly
//!
//! All provider reads are issued together and joined before scoring starts.
//! A failed or slow provider costs only its own group; a provider that answers
//! with out-of-range data fails the whole assembly.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

use super::{SignalBundle, SignalSource};
use crate::config::AssemblyConfig;
use crate::error::{ForecastError, Result};
use crate::types::FilingEvent;

pub struct SignalAssembler<S> {
    source: Arc<S>,
    config: AssemblyConfig,
}

impl<S: SignalSource> SignalAssembler<S> {
    pub fn new(source: Arc<S>, config: AssemblyConfig) -> Self {
        Self { source, config }
    }

    pub fn with_defaults(source: Arc<S>) -> Self {
        Self::new(source, AssemblyConfig::default())
    }

    pub fn source(&self) -> &Arc<S> {
        &self.source
    }

    pub async fn assemble(&self, filing: &FilingEvent) -> Result<SignalBundle> {
        let limit = self.config.provider_timeout();
        let source = self.source.as_ref();

        let (analysis, earnings, analyst, fundamentals, macro_snapshot, history, prices) = tokio::join!(
            bounded("filing_analysis", limit, source.filing_analysis(filing)),
            bounded("earnings", limit, source.earnings(filing)),
            bounded("analyst_activity", limit, source.analyst_activity(filing)),
            bounded("fundamentals", limit, source.fundamentals(filing)),
            bounded("macro_snapshot", limit, source.macro_snapshot(filing)),
            bounded("historical_pattern", limit, source.historical_pattern(filing)),
            bounded("price_history", limit, source.price_history(filing)),
        );

        let mut bundle = SignalBundle::new(filing.clone());
        let missing = &mut bundle.unavailable;
        bundle.analysis = settle("filing_analysis", analysis, missing);
        bundle.earnings = settle("earnings", earnings, missing);
        bundle.analyst = settle("analyst_activity", analyst, missing);
        bundle.fundamentals = settle("fundamentals", fundamentals, missing);
        bundle.macro_snapshot = settle("macro_snapshot", macro_snapshot, missing);
        bundle.history = settle("historical_pattern", history, missing);
        bundle.price_history = settle("price_history", prices, missing);

        bundle.validate()?;

        debug!(
            filing = %filing.id,
            ticker = %filing.ticker,
            unavailable = bundle.unavailable.len(),
            "Assembled signal bundle"
        );
        Ok(bundle)
    }
}

async fn bounded<T, F>(group: &'static str, limit: Duration, call: F) -> Result<Option<T>>
where
    F: Future<Output = Result<Option<T>>>,
{
    match timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(ForecastError::upstream(
            group,
            format!("timed out after {}ms", limit.as_millis()),
        )),
    }
}

fn settle<T>(group: &str, outcome: Result<Option<T>>, unavailable: &mut Vec<String>) -> Option<T> {
    match outcome {
        Ok(value) => value,
        Err(e) => {
            warn!(group, error = %e, "Signal provider failed, treating group as missing");
            unavailable.push(group.to_string());
            None
        }
    }
}
