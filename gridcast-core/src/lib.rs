//! Core library for the `gridcast` forecast runner.
//!
//! This crate defines:
//! - Weather and grid-actuals sources (Open-Meteo, PGCB report pages)
//! - Aggregation of per-location weather into a national daily series
//! - The autoregressive day-by-day forecast over LightGBM models
//! - The persisted prediction ledger and its reconciliation with actuals
//!
//! It is used by `gridcast-cli`, but can also be reused by other binaries or services.

pub mod aggregate;
pub mod collect;
pub mod config;
pub mod error;
pub mod features;
pub mod forecaster;
pub mod ledger;
pub mod metrics;
pub mod model;
pub mod pipeline;
pub mod predictor;
pub mod provider;

pub use config::Config;
pub use error::{GridcastError, Result};
pub use forecaster::Forecaster;
pub use ledger::{PredictionLedger, Reconciliation};
pub use model::{ActualDailyPower, DailyForecast, Location, PowerValues, WeatherObservation};
pub use pipeline::{RunContext, RunReport, SeedSource};
pub use predictor::{Predictor, load_model};
pub use provider::{ActualsSource, WeatherSource};
