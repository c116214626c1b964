//! One batch run: fetch, forecast, reconcile, persist.

use std::{fmt, path::Path};

use chrono::{Duration, NaiveDate};
use tracing::{info, warn};

use crate::{
    aggregate::aggregate_daily,
    error::{GridcastError, Result},
    forecaster::Forecaster,
    ledger::{PredictionLedger, Reconciliation},
    model::{DailyForecast, Location, PowerValues},
    predictor::Predictor,
    provider::{ActualsSource, WeatherSource},
};

/// Everything a run reads from. Sources and models are borrowed so tests can
/// substitute in-memory stubs.
#[derive(Debug, Clone, Copy)]
pub struct RunContext<'a> {
    pub weather: &'a dyn WeatherSource,
    pub actuals: &'a dyn ActualsSource,
    pub generation_model: &'a dyn Predictor,
    pub loadshed_model: &'a dyn Predictor,
    pub locations: &'a [Location],
    pub forecast_days: u32,
    pub ledger_path: &'a Path,
}

/// Where the first forecast day's lag features came from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SeedSource {
    /// Yesterday's reported actuals.
    Actual(NaiveDate),
    /// The most recent labeled history entry; yesterday was not reported.
    LastLabel(NaiveDate),
    /// Nothing known at all.
    Zero,
}

impl fmt::Display for SeedSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeedSource::Actual(d) => write!(f, "actuals for {d}"),
            SeedSource::LastLabel(d) => write!(f, "last labeled day {d}"),
            SeedSource::Zero => f.write_str("zero (no actuals known)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub today: NaiveDate,
    pub seed: PowerValues,
    pub seed_source: SeedSource,
    pub forecast: Vec<DailyForecast>,
    pub reconciliation: Reconciliation,
}

/// Run the whole pipeline for `today` and persist the ledger.
///
/// Any failure before the final save returns early and leaves the ledger
/// file untouched.
pub async fn run(ctx: &RunContext<'_>, today: NaiveDate) -> Result<RunReport> {
    let yesterday = today - Duration::days(1);

    let mut ledger = PredictionLedger::load(ctx.ledger_path)?;

    let mut series = Vec::with_capacity(ctx.locations.len());
    for location in ctx.locations {
        series.push(ctx.weather.daily_weather(location, ctx.forecast_days).await?);
    }
    let weather = aggregate_daily(&series);
    if weather.is_empty() {
        return Err(GridcastError::DataShape("weather source returned no days".to_string()));
    }
    info!(
        locations = ctx.locations.len(),
        days = weather.len(),
        first = %weather[0].date,
        "weather aggregated"
    );

    let actual = ctx.actuals.actual_for(yesterday).await?;

    let (seed, seed_source) = match (&actual, ledger.last_label()) {
        (Some(a), _) => (a.as_label(), SeedSource::Actual(a.date)),
        (None, Some((date, label))) => {
            warn!(%yesterday, %date, "no actuals for yesterday, seeding lags from last labeled day");
            (label, SeedSource::LastLabel(date))
        }
        (None, None) => {
            warn!(%yesterday, "no actuals for yesterday and no history, seeding lags with zero");
            (PowerValues::ZERO, SeedSource::Zero)
        }
    };

    let forecast = Forecaster::new(ctx.generation_model, ctx.loadshed_model).forecast(&weather, seed)?;

    let reconciliation = ledger.reconcile_and_replace(forecast.clone(), yesterday, actual.as_ref());
    ledger.save(ctx.ledger_path)?;

    Ok(RunReport { today, seed, seed_source, forecast, reconciliation })
}
