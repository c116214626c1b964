use chrono::{Datelike, NaiveDate};

use crate::{
    error::{GridcastError, Result},
    model::{AggregatedDailyWeather, PowerValues},
};

/// Every feature a [`FeatureRow`] can supply, in the column order of the
/// training frame the gradient-boosted models were fitted on.
pub const DEFAULT_FEATURE_ORDER: [&str; 10] = [
    "Rainfall",
    "Sunshine",
    "Humidity",
    "Temp_mean",
    "Temp_max",
    "Temp_min",
    "Year",
    "Month",
    "loadshed_prev",
    "generation_prev",
];

/// Model input for one day. `date` is bookkeeping only and never reaches the model.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub date: NaiveDate,
    pub rainfall_mm: f64,
    pub sunshine_hours: f64,
    pub humidity_pct: f64,
    pub temp_mean: f64,
    pub temp_max: f64,
    pub temp_min: f64,
    pub year: i32,
    pub month: u32,
    pub generation_prev: f64,
    pub loadshed_prev: f64,
}

impl FeatureRow {
    pub fn build(weather: &AggregatedDailyWeather, previous: PowerValues) -> Self {
        Self {
            date: weather.date,
            rainfall_mm: weather.rainfall_mm,
            sunshine_hours: weather.sunshine_hours,
            humidity_pct: weather.humidity_pct,
            temp_mean: weather.temp_mean,
            temp_max: weather.temp_max,
            temp_min: weather.temp_min,
            year: weather.date.year(),
            month: weather.date.month(),
            generation_prev: previous.generation,
            loadshed_prev: previous.loadshed,
        }
    }

    /// Looks a feature up by the column name used at training time.
    pub fn value(&self, name: &str) -> Option<f64> {
        let v = match name {
            "Rainfall" => self.rainfall_mm,
            "Sunshine" => self.sunshine_hours,
            "Humidity" => self.humidity_pct,
            "Temp_mean" => self.temp_mean,
            "Temp_max" => self.temp_max,
            "Temp_min" => self.temp_min,
            "Year" => f64::from(self.year),
            "Month" => f64::from(self.month),
            "generation_prev" => self.generation_prev,
            "loadshed_prev" => self.loadshed_prev,
            _ => return None,
        };
        Some(v)
    }

    /// Lays the row out in the order a model expects, without the date.
    pub fn to_vector<S: AsRef<str>>(&self, order: &[S]) -> Result<Vec<f64>> {
        order
            .iter()
            .map(|name| {
                let name = name.as_ref();
                self.value(name).ok_or_else(|| {
                    GridcastError::ModelInvocation(format!(
                        "model expects feature '{name}', which is not part of the feature row"
                    ))
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weather() -> AggregatedDailyWeather {
        AggregatedDailyWeather {
            date: NaiveDate::from_ymd_opt(2024, 7, 15).unwrap(),
            rainfall_mm: 12.5,
            sunshine_hours: 4.2,
            humidity_pct: 88.0,
            temp_mean: 29.0,
            temp_max: 32.5,
            temp_min: 26.1,
        }
    }

    #[test]
    fn build_splits_date_and_carries_lags() {
        let row = FeatureRow::build(&weather(), PowerValues::new(13.4, 0.6));

        assert_eq!(row.year, 2024);
        assert_eq!(row.month, 7);
        assert_eq!(row.generation_prev, 13.4);
        assert_eq!(row.loadshed_prev, 0.6);
        assert_eq!(row.date, NaiveDate::from_ymd_opt(2024, 7, 15).unwrap());
    }

    #[test]
    fn vector_follows_training_column_order() {
        let row = FeatureRow::build(&weather(), PowerValues::new(13.4, 0.6));
        let v = row.to_vector(&DEFAULT_FEATURE_ORDER).unwrap();

        assert_eq!(v, vec![12.5, 4.2, 88.0, 29.0, 32.5, 26.1, 2024.0, 7.0, 0.6, 13.4]);
    }

    #[test]
    fn every_listed_feature_resolves() {
        let row = FeatureRow::build(&weather(), PowerValues::ZERO);
        assert!(DEFAULT_FEATURE_ORDER.iter().all(|name| row.value(name).is_some()));
    }

    #[test]
    fn date_never_enters_the_vector() {
        let row = FeatureRow::build(&weather(), PowerValues::ZERO);
        let err = row.to_vector(&["Rainfall", "Date"]).unwrap_err();

        assert!(matches!(err, GridcastError::ModelInvocation(_)));
        assert!(err.to_string().contains("'Date'"));
    }
}
