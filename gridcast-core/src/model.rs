use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

const MW_PER_GW: f64 = 1000.0;

/// A monitored point whose weather feeds the national average.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl Location {
    pub fn new(name: &str, latitude: f64, longitude: f64) -> Self {
        Self { name: name.to_string(), latitude, longitude }
    }
}

/// One location's weather for one day.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherObservation {
    pub date: NaiveDate,
    pub rainfall_mm: f64,
    pub sunshine_hours: f64,
    pub humidity_pct: f64,
    pub temp_mean: f64,
    pub temp_max: f64,
    pub temp_min: f64,
}

/// National weather for one day, merged across all locations.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedDailyWeather {
    pub date: NaiveDate,
    pub rainfall_mm: f64,
    pub sunshine_hours: f64,
    pub humidity_pct: f64,
    pub temp_mean: f64,
    pub temp_max: f64,
    pub temp_min: f64,
}

/// Generation and load-shedding in GW. Used both for predictions and labels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PowerValues {
    pub generation: f64,
    pub loadshed: f64,
}

impl PowerValues {
    pub const ZERO: PowerValues = PowerValues { generation: 0.0, loadshed: 0.0 };

    pub fn new(generation: f64, loadshed: f64) -> Self {
        Self { generation, loadshed }
    }
}

/// A single day of a forecast run. `label` is filled in once the day has
/// passed and the real values are known.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyForecast {
    pub date: NaiveDate,
    pub prediction: PowerValues,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<PowerValues>,
}

impl DailyForecast {
    pub fn unlabeled(date: NaiveDate, prediction: PowerValues) -> Self {
        Self { date, prediction, label: None }
    }
}

/// A row of the grid operator's daily report, still in megawatts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawPowerRow {
    #[serde(rename = "Date", serialize_with = "serialize_report_date")]
    pub date: NaiveDate,
    #[serde(rename = "Generation(MW)")]
    pub generation_mw: f64,
    #[serde(rename = "Demand(MW)")]
    pub demand_mw: f64,
    #[serde(rename = "Loadshed")]
    pub loadshed_mw: f64,
}

/// Observed national totals for one day, in GW.
#[derive(Debug, Clone, PartialEq)]
pub struct ActualDailyPower {
    pub date: NaiveDate,
    pub generation_gw: f64,
    pub demand_gw: f64,
    pub loadshed_gw: f64,
}

impl ActualDailyPower {
    /// Sums every report row dated `date` and converts to GW.
    ///
    /// Returns `None` when no row matches, so a missing day can never turn
    /// into a zero label.
    pub fn from_rows(date: NaiveDate, rows: &[RawPowerRow]) -> Option<Self> {
        let matching: Vec<&RawPowerRow> = rows.iter().filter(|r| r.date == date).collect();
        if matching.is_empty() {
            return None;
        }

        let sum = |f: fn(&RawPowerRow) -> f64| matching.iter().map(|r| f(r)).sum::<f64>();

        Some(Self {
            date,
            generation_gw: sum(|r| r.generation_mw) / MW_PER_GW,
            demand_gw: sum(|r| r.demand_mw) / MW_PER_GW,
            loadshed_gw: sum(|r| r.loadshed_mw) / MW_PER_GW,
        })
    }

    pub fn as_label(&self) -> PowerValues {
        PowerValues::new(self.generation_gw, self.loadshed_gw)
    }
}

impl From<&RawPowerRow> for ActualDailyPower {
    fn from(row: &RawPowerRow) -> Self {
        Self {
            date: row.date,
            generation_gw: row.generation_mw / MW_PER_GW,
            demand_gw: row.demand_mw / MW_PER_GW,
            loadshed_gw: row.loadshed_mw / MW_PER_GW,
        }
    }
}

/// Date format used by the grid operator's report pages.
pub const REPORT_DATE_FORMAT: &str = "%d-%m-%Y";

fn serialize_report_date<S: serde::Serializer>(date: &NaiveDate, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(&date.format(REPORT_DATE_FORMAT))
}
