//! Forecast CLI
//!
//! Commands:
//! - predict: score a signal bundle read from JSON
//! - resolve: check a stored prediction against a price series
//! - summary: accuracy statistics per contributing model
//! - backtest: report over resolved historical records
//! - params: dump frozen model parameters as TOML

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use filing_forecast::backtest::{BacktestRecord, BacktestReport};
use filing_forecast::ensemble::Router;
use filing_forecast::pipeline::load_registry;
use filing_forecast::signals::SignalBundle;
use filing_forecast::tracker::{summarize_by_model, AccuracyTracker, PriceSeries, TrackingStatus};
use filing_forecast::{ForecastConfig, Prediction};

#[derive(Parser)]
#[command(name = "forecast")]
#[command(about = "Filing price-reaction forecasts and accuracy tracking")]
struct Cli {
    /// TOML config file; defaults plus FORECAST_* env overrides when absent
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score a signal bundle
    Predict {
        /// Signal bundle JSON
        #[arg(short, long)]
        bundle: PathBuf,
        /// Skip routing and use this parameter version
        #[arg(short, long)]
        version: Option<String>,
    },
    /// Resolve a prediction against daily closes
    Resolve {
        /// Prediction JSON
        #[arg(short, long)]
        prediction: PathBuf,
        /// Price series JSON: [{"date": ..., "close": ...}]
        #[arg(long)]
        prices: PathBuf,
        #[arg(long)]
        filing_date: NaiveDate,
        /// Prices after this date are ignored
        #[arg(long)]
        as_of: NaiveDate,
    },
    /// Accuracy summary from [{"prediction": ..., "status": ...}] pairs
    Summary {
        #[arg(short, long)]
        outcomes: PathBuf,
    },
    /// Backtest report from resolved records
    Backtest {
        #[arg(short, long)]
        records: PathBuf,
    },
    /// Print parameter sets as TOML
    Params {
        #[arg(short, long)]
        version: Option<String>,
    },
}

#[derive(Serialize, Deserialize)]
struct Outcome {
    prediction: Prediction,
    status: TrackingStatus,
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<ForecastConfig> {
    let config = match path {
        Some(p) => ForecastConfig::from_toml(p).with_context(|| format!("loading {}", p.display()))?,
        None => ForecastConfig::from_env_or_default()?,
    };
    Ok(config)
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Predict { bundle, version } => {
            let bundle: SignalBundle = read_json(&bundle)?;
            bundle.validate()?;
            let router = Router::new(config.router.clone(), Arc::new(load_registry(&config)?));
            let prediction = match version {
                Some(v) => router.predict_with_version(&bundle, &v, Utc::now())?,
                None => router.predict(&bundle, Utc::now())?,
            };
            info!(
                filing_id = %prediction.filing_id,
                model_version = %prediction.model_version,
                forecast = %prediction.forecast_return_pct,
                "Scored filing"
            );
            print_json(&prediction)
        }
        Commands::Resolve {
            prediction,
            prices,
            filing_date,
            as_of,
        } => {
            let prediction: Prediction = read_json(&prediction)?;
            let series: PriceSeries = read_json(&prices)?;
            let tracker = AccuracyTracker::new(config.tracker.clone());
            print_json(&tracker.resolve(&prediction, filing_date, &series, as_of))
        }
        Commands::Summary { outcomes } => {
            let outcomes: Vec<Outcome> = read_json(&outcomes)?;
            let pairs: Vec<(Prediction, TrackingStatus)> = outcomes
                .into_iter()
                .map(|o| (o.prediction, o.status))
                .collect();
            print_json(&summarize_by_model(&pairs))
        }
        Commands::Backtest { records } => {
            let records: Vec<BacktestRecord> = read_json(&records)?;
            info!(records = records.len(), "Running backtest report");
            print_json(&BacktestReport::from_records(&records, &config.backtest))
        }
        Commands::Params { version } => {
            let registry = load_registry(&config)?;
            print!("{}", registry.to_toml(version.as_deref())?);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_predict_parses() {
        let cli = Cli::parse_from(["forecast", "predict", "--bundle", "b.json", "--version", "baseline-v1"]);
        match cli.command {
            Commands::Predict { bundle, version } => {
                assert_eq!(bundle, PathBuf::from("b.json"));
                assert_eq!(version.as_deref(), Some("baseline-v1"));
            }
            _ => panic!("Expected Predict command"),
        }
    }

    #[test]
    fn test_resolve_parses_dates() {
        let cli = Cli::parse_from([
            "forecast",
            "resolve",
            "--prediction",
            "p.json",
            "--prices",
            "px.json",
            "--filing-date",
            "2024-01-08",
            "--as-of",
            "2024-01-25",
        ]);
        match cli.command {
            Commands::Resolve { filing_date, as_of, .. } => {
                assert_eq!(filing_date, NaiveDate::from_ymd_opt(2024, 1, 8).unwrap());
                assert_eq!(as_of, NaiveDate::from_ymd_opt(2024, 1, 25).unwrap());
            }
            _ => panic!("Expected Resolve command"),
        }
    }

    #[test]
    fn test_global_config_flag() {
        let cli = Cli::parse_from(["forecast", "params", "--config", "forecast.toml"]);
        assert_eq!(cli.config, Some(PathBuf::from("forecast.toml")));
    }
}
