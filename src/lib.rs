//! Filing forecast engine
//!
//! Turns a regulatory filing plus the market/analyst signals around it into a
//! short-horizon price reaction forecast, and later reconciles that forecast
//! against realized returns.
//!
//! Layout:
//! - `signals`: typed signal bundle, provider trait, concurrent assembler
//! - `features`: per-model feature extractors with one canonical scale per feature
//! - `model`: frozen parameter sets, heuristic engine, standardized and baseline models
//! - `calibration`: input-coverage confidence
//! - `ensemble`: router and blending
//! - `tracker`: accuracy state machine and aggregate statistics
//! - `backtest`: historical replay and trading-style statistics
//! - `pipeline`: end-to-end service wiring and stores

pub mod backtest;
pub mod calibration;
pub mod config;
pub mod ensemble;
pub mod error;
pub mod features;
pub mod model;
pub mod numeric;
pub mod pipeline;
pub mod signals;
pub mod tracker;
pub mod types;

pub use config::ForecastConfig;
pub use error::{ForecastError, Result};
pub use pipeline::ForecastService;
pub use types::{FilingEvent, FilingType, Prediction, TradeSignal};
