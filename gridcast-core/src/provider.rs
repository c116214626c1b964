use crate::{
    Config,
    error::{GridcastError, Result},
    model::{ActualDailyPower, Location, RawPowerRow, WeatherObservation},
    provider::{openmeteo::OpenMeteoProvider, pgcb::PgcbProvider},
};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use std::{fmt::Debug, time::Duration};

pub mod openmeteo;
pub mod pgcb;

/// Daily weather per coordinate.
#[async_trait]
pub trait WeatherSource: Send + Sync + Debug {
    /// Observations for `location`, one per day, starting today and covering `days` days.
    async fn daily_weather(&self, location: &Location, days: u32) -> Result<Vec<WeatherObservation>>;
}

/// The grid operator's paginated daily generation report.
#[async_trait]
pub trait ActualsSource: Send + Sync + Debug {
    /// Every row on one report page, most recent page first.
    async fn fetch_page(&self, page: u32) -> Result<Vec<RawPowerRow>>;

    /// Observed totals for `date` from the most recent page, or `None` if the
    /// report does not (yet) list that day.
    async fn actual_for(&self, date: NaiveDate) -> Result<Option<ActualDailyPower>> {
        let rows = self.fetch_page(1).await?;
        Ok(ActualDailyPower::from_rows(date, &rows))
    }
}

/// Build the HTTP-backed sources described by `config`.
pub fn sources_from_config(config: &Config) -> Result<(OpenMeteoProvider, PgcbProvider)> {
    let weather = OpenMeteoProvider::new(config.weather_base_url.clone(), http_client(config)?);
    let actuals = PgcbProvider::new(config.actuals_base_url.clone(), http_client(config)?);
    Ok((weather, actuals))
}

fn http_client(config: &Config) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .danger_accept_invalid_certs(config.accept_invalid_certs)
        .build()
        .map_err(|e| GridcastError::source_unavailable("HTTP client", e.to_string()))
}

/// GET `url` with `query` and return the body, mapping transport errors and
/// non-success statuses to [`GridcastError::SourceUnavailable`].
pub(crate) async fn get_text(
    http: &Client,
    source_name: &str,
    url: &str,
    query: &[(&str, String)],
) -> Result<String> {
    let res = http
        .get(url)
        .query(query)
        .send()
        .await
        .map_err(|e| GridcastError::source_unavailable(source_name, format!("request failed: {e}")))?;

    let status = res.status();
    let body = res.text().await.map_err(|e| {
        GridcastError::source_unavailable(source_name, format!("failed to read response body: {e}"))
    })?;

    if !status.is_success() {
        return Err(GridcastError::source_unavailable(
            source_name,
            format!("request failed with status {}: {}", status, truncate_body(&body)),
        ));
    }

    Ok(body)
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
