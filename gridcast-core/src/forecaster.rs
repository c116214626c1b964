//! Day-by-day autoregressive forecast loop.
//!
//! Each day's feature row carries the previous day's generation and
//! load-shedding as lag features. For the first day that is the last observed
//! actual; for every later day it is the model's own output for the day
//! before, so the days form a strict chain and are evaluated in order.

use tracing::debug;

use crate::{
    error::{GridcastError, Result},
    features::FeatureRow,
    model::{AggregatedDailyWeather, DailyForecast, PowerValues},
    predictor::Predictor,
};

/// One link of the chain: the row the models saw and what they produced.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastStep {
    pub row: FeatureRow,
    pub forecast: DailyForecast,
}

#[derive(Debug, Clone, Copy)]
pub struct Forecaster<'a> {
    generation_model: &'a dyn Predictor,
    loadshed_model: &'a dyn Predictor,
}

impl<'a> Forecaster<'a> {
    pub fn new(generation_model: &'a dyn Predictor, loadshed_model: &'a dyn Predictor) -> Self {
        Self { generation_model, loadshed_model }
    }

    /// Forecast every day in `weather` (ascending dates), seeding the lags with `seed`.
    ///
    /// A failing model call aborts the whole horizon; no partial forecast is returned.
    pub fn forecast(
        &self,
        weather: &[AggregatedDailyWeather],
        seed: PowerValues,
    ) -> Result<Vec<DailyForecast>> {
        Ok(self.steps(weather, seed)?.into_iter().map(|s| s.forecast).collect())
    }

    /// Same as [`Forecaster::forecast`], keeping the feature row of each step.
    pub fn steps(
        &self,
        weather: &[AggregatedDailyWeather],
        seed: PowerValues,
    ) -> Result<Vec<ForecastStep>> {
        if let Some(pair) = weather.windows(2).find(|w| w[0].date >= w[1].date) {
            return Err(GridcastError::DataShape(format!(
                "weather days must be strictly ascending, found {} before {}",
                pair[0].date, pair[1].date
            )));
        }

        let (_, steps) = weather.iter().try_fold(
            (seed, Vec::with_capacity(weather.len())),
            |(previous, mut steps), day| {
                let (row, prediction) = self.step(day, previous)?;
                steps.push(ForecastStep {
                    row,
                    forecast: DailyForecast::unlabeled(day.date, prediction),
                });
                Ok::<_, GridcastError>((prediction, steps))
            },
        )?;

        Ok(steps)
    }

    fn step(
        &self,
        day: &AggregatedDailyWeather,
        previous: PowerValues,
    ) -> Result<(FeatureRow, PowerValues)> {
        let row = FeatureRow::build(day, previous);

        let generation = checked(day, "generation", self.generation_model.predict_row(&row)?)?;
        let loadshed = checked(day, "loadshed", self.loadshed_model.predict_row(&row)?)?;

        debug!(
            date = %day.date,
            generation_prev = previous.generation,
            loadshed_prev = previous.loadshed,
            generation,
            loadshed,
            "forecast step"
        );

        Ok((row, PowerValues::new(generation, loadshed)))
    }
}

fn checked(day: &AggregatedDailyWeather, target: &str, value: f64) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(GridcastError::ModelInvocation(format!(
            "{target} model produced {value} for {}",
            day.date
        )))
    }
}
