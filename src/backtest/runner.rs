//! Historical replay
//!
//! Re-scores past filings as of their filing date and resolves each one
//! against the price history the source returns. Calls are sequential and
//! spaced by the configured interval so a rate-limited source is not hammered.

use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

use super::BacktestRecord;
use crate::error::Result;
use crate::pipeline::ForecastService;
use crate::signals::SignalSource;
use crate::tracker::TrackingStatus;
use crate::types::FilingEvent;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayCase {
    pub filing: FilingEvent,
    /// Prices after this date are never used
    pub as_of: NaiveDate,
}

pub struct BacktestRunner<'a, S> {
    service: &'a ForecastService<S>,
    min_call_interval: Duration,
}

impl<'a, S: SignalSource> BacktestRunner<'a, S> {
    pub fn new(service: &'a ForecastService<S>, min_call_interval: Duration) -> Self {
        Self {
            service,
            min_call_interval,
        }
    }

    /// Cases that fail assembly or never resolve are skipped with a warning.
    /// Scoring errors abort the run; they indicate bad configuration.
    pub async fn replay(&self, cases: &[ReplayCase]) -> Result<Vec<BacktestRecord>> {
        let mut records = Vec::with_capacity(cases.len());
        let mut skipped = 0usize;

        for (i, case) in cases.iter().enumerate() {
            if i > 0 && !self.min_call_interval.is_zero() {
                tokio::time::sleep(self.min_call_interval).await;
            }

            let filing = &case.filing;
            let bundle = match self.service.assembler().assemble(filing).await {
                Ok(b) => b,
                Err(e) => {
                    warn!(filing_id = %filing.id, error = %e, "Skipping filing with malformed signals");
                    skipped += 1;
                    continue;
                }
            };

            let issued = Utc.from_utc_datetime(&filing.filing_date.and_time(NaiveTime::default()));
            let prediction = self.service.predict_bundle_at(&bundle, issued)?;

            let Some(series) = bundle.price_history.as_ref() else {
                warn!(filing_id = %filing.id, "No price history, cannot resolve");
                skipped += 1;
                continue;
            };

            match self
                .service
                .tracker()
                .resolve(&prediction, filing.filing_date, series, case.as_of)
            {
                TrackingStatus::Resolved(result) => {
                    let model_id = prediction.contributor_ids().collect::<Vec<_>>().join("+");
                    records.push(BacktestRecord {
                        filing_id: filing.id.clone(),
                        ticker: filing.ticker.clone(),
                        filing_type: filing.filing_type,
                        filing_date: filing.filing_date,
                        model_id,
                        model_version: prediction.model_version.clone(),
                        forecast_pct: prediction.forecast_return_pct,
                        confidence: prediction.confidence,
                        realized_pct: result.realized_return,
                        regime: bundle.regime(),
                        cap_tier: bundle.market_cap_tier(),
                    });
                }
                other => {
                    warn!(filing_id = %filing.id, status = ?other, "Filing not resolvable as of replay date");
                    skipped += 1;
                }
            }

            if (i + 1) % 25 == 0 {
                info!(done = i + 1, total = cases.len(), "Replay progress");
            }
        }

        info!(resolved = records.len(), skipped, "Replay finished");
        Ok(records)
    }
}
