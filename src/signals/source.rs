//! Upstream signal provider interface
//!
//! Each method answers for one group. `Ok(None)` means the provider has no data
//! for this filing; `Err` means the call itself failed.

use async_trait::async_trait;

use super::{
    AnalystActivity, EarningsSurprise, FilingAnalysis, Fundamentals, HistoricalPattern,
    MacroSnapshot,
};
use crate::error::Result;
use crate::tracker::PriceSeries;
use crate::types::FilingEvent;

#[async_trait]
pub trait SignalSource: Send + Sync {
    async fn filing_analysis(&self, filing: &FilingEvent) -> Result<Option<FilingAnalysis>>;

    async fn earnings(&self, filing: &FilingEvent) -> Result<Option<EarningsSurprise>>;

    async fn analyst_activity(&self, filing: &FilingEvent) -> Result<Option<AnalystActivity>>;

    async fn fundamentals(&self, filing: &FilingEvent) -> Result<Option<Fundamentals>>;

    async fn macro_snapshot(&self, filing: &FilingEvent) -> Result<Option<MacroSnapshot>>;

    async fn historical_pattern(&self, filing: &FilingEvent) -> Result<Option<HistoricalPattern>>;

    /// Daily closes around the filing, used for technical features and resolution
    async fn price_history(&self, filing: &FilingEvent) -> Result<Option<PriceSeries>>;
}
