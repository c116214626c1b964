use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};

use crate::{
    aggregate::sunshine_hours_from_secs,
    error::{GridcastError, Result},
    model::{Location, WeatherObservation},
};

use super::{WeatherSource, get_text};

const SOURCE_NAME: &str = "Open-Meteo";

const DAILY_FIELDS: &str = "relative_humidity_2m_mean,temperature_2m_max,temperature_2m_min,\
                            temperature_2m_mean,rain_sum,sunshine_duration";

#[derive(Debug, Clone)]
pub struct OpenMeteoProvider {
    base_url: String,
    http: Client,
}

impl OpenMeteoProvider {
    pub fn new(base_url: String, http: Client) -> Self {
        Self { base_url, http }
    }
}

#[async_trait]
impl WeatherSource for OpenMeteoProvider {
    async fn daily_weather(&self, location: &Location, days: u32) -> Result<Vec<WeatherObservation>> {
        debug!(location = %location.name, days, "fetching daily weather");

        let body = get_text(
            &self.http,
            SOURCE_NAME,
            &self.base_url,
            &[
                ("latitude", location.latitude.to_string()),
                ("longitude", location.longitude.to_string()),
                ("daily", DAILY_FIELDS.to_string()),
                ("forecast_days", days.to_string()),
                ("timezone", "auto".to_string()),
            ],
        )
        .await?;

        let observations = parse_daily(&body)?;
        info!(location = %location.name, days = observations.len(), "weather fetched");
        Ok(observations)
    }
}

#[derive(Debug, Deserialize)]
struct OmResponse {
    daily: OmDaily,
}

#[derive(Debug, Deserialize)]
struct OmDaily {
    time: Vec<NaiveDate>,
    rain_sum: Vec<Option<f64>>,
    sunshine_duration: Vec<Option<f64>>,
    relative_humidity_2m_mean: Vec<Option<f64>>,
    temperature_2m_mean: Vec<Option<f64>>,
    temperature_2m_max: Vec<Option<f64>>,
    temperature_2m_min: Vec<Option<f64>>,
}

/// Zip the column-oriented `daily` block into one observation per day.
fn parse_daily(body: &str) -> Result<Vec<WeatherObservation>> {
    let parsed: OmResponse = serde_json::from_str(body).map_err(|e| {
        GridcastError::DataShape(format!("failed to parse {SOURCE_NAME} daily JSON: {e}"))
    })?;
    let daily = parsed.daily;
    let n = daily.time.len();

    let columns: [(&str, &[Option<f64>]); 6] = [
        ("rain_sum", &daily.rain_sum),
        ("sunshine_duration", &daily.sunshine_duration),
        ("relative_humidity_2m_mean", &daily.relative_humidity_2m_mean),
        ("temperature_2m_mean", &daily.temperature_2m_mean),
        ("temperature_2m_max", &daily.temperature_2m_max),
        ("temperature_2m_min", &daily.temperature_2m_min),
    ];
    if let Some((name, col)) = columns.iter().find(|(_, col)| col.len() != n) {
        return Err(GridcastError::DataShape(format!(
            "{SOURCE_NAME} '{name}' has {} values for {n} days",
            col.len()
        )));
    }

    let value = |name: &str, col: &[Option<f64>], i: usize| {
        col[i].ok_or_else(|| {
            GridcastError::DataShape(format!("{SOURCE_NAME} '{name}' is null for {}", daily.time[i]))
        })
    };

    (0..n)
        .map(|i| {
            Ok(WeatherObservation {
                date: daily.time[i],
                rainfall_mm: value("rain_sum", &daily.rain_sum, i)?,
                sunshine_hours: sunshine_hours_from_secs(value(
                    "sunshine_duration",
                    &daily.sunshine_duration,
                    i,
                )?),
                humidity_pct: value("relative_humidity_2m_mean", &daily.relative_humidity_2m_mean, i)?,
                temp_mean: value("temperature_2m_mean", &daily.temperature_2m_mean, i)?,
                temp_max: value("temperature_2m_max", &daily.temperature_2m_max, i)?,
                temp_min: value("temperature_2m_min", &daily.temperature_2m_min, i)?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = r#"{
        "latitude": 23.71, "longitude": 90.41, "timezone": "Asia/Dhaka",
        "daily_units": {"time": "iso8601", "rain_sum": "mm", "sunshine_duration": "s"},
        "daily": {
            "time": ["2024-01-10", "2024-01-11"],
            "relative_humidity_2m_mean": [71, 65.5],
            "temperature_2m_max": [24.1, 25.3],
            "temperature_2m_min": [13.2, 14.0],
            "temperature_2m_mean": [18.4, 19.1],
            "rain_sum": [0.0, 1.2],
            "sunshine_duration": [28800.0, 32400.0]
        }
    }"#;

    #[test]
    fn parses_daily_block_and_converts_sunshine() {
        let obs = parse_daily(BODY).unwrap();

        assert_eq!(obs.len(), 2);
        assert_eq!(obs[0].date, NaiveDate::from_ymd_opt(2024, 1, 10).unwrap());
        assert_eq!(obs[0].sunshine_hours, 8.0);
        assert_eq!(obs[1].sunshine_hours, 9.0);
        assert_eq!(obs[0].humidity_pct, 71.0);
        assert_eq!(obs[1].rainfall_mm, 1.2);
    }

    #[test]
    fn null_value_is_a_shape_error() {
        let body = BODY.replace("[0.0, 1.2]", "[0.0, null]");
        let err = parse_daily(&body).unwrap_err();
        assert!(matches!(err, GridcastError::DataShape(_)));
        assert!(err.to_string().contains("rain_sum"));
    }

    #[test]
    fn ragged_columns_are_a_shape_error() {
        let body = BODY.replace("[13.2, 14.0]", "[13.2]");
        let err = parse_daily(&body).unwrap_err();
        assert!(err.to_string().contains("temperature_2m_min"));
    }

    #[test]
    fn missing_column_is_a_shape_error() {
        let body = BODY.replace("\"rain_sum\": [0.0, 1.2],", "");
        assert!(matches!(parse_daily(&body), Err(GridcastError::DataShape(_))));
    }
}
