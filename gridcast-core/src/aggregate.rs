//! Merges per-location daily weather into one national series.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::model::{AggregatedDailyWeather, WeatherObservation};

const SECONDS_PER_HOUR: f64 = 3600.0;

/// Weather sources report sunshine duration in seconds; the model was trained on hours.
pub fn sunshine_hours_from_secs(secs: f64) -> f64 {
    secs / SECONDS_PER_HOUR
}

#[derive(Debug)]
struct DayAccumulator {
    count: usize,
    rainfall_mm: f64,
    sunshine_hours: f64,
    humidity_pct: f64,
    temp_mean: f64,
    temp_max: f64,
    temp_min: f64,
}

impl DayAccumulator {
    fn new() -> Self {
        Self {
            count: 0,
            rainfall_mm: 0.0,
            sunshine_hours: 0.0,
            humidity_pct: 0.0,
            temp_mean: 0.0,
            temp_max: f64::NEG_INFINITY,
            temp_min: f64::INFINITY,
        }
    }

    fn add(&mut self, obs: &WeatherObservation) {
        self.count += 1;
        self.rainfall_mm += obs.rainfall_mm;
        self.sunshine_hours += obs.sunshine_hours;
        self.humidity_pct += obs.humidity_pct;
        self.temp_mean += obs.temp_mean;
        self.temp_max = self.temp_max.max(obs.temp_max);
        self.temp_min = self.temp_min.min(obs.temp_min);
    }

    fn finish(self, date: NaiveDate) -> AggregatedDailyWeather {
        let n = self.count as f64;
        AggregatedDailyWeather {
            date,
            rainfall_mm: self.rainfall_mm / n,
            sunshine_hours: self.sunshine_hours / n,
            humidity_pct: self.humidity_pct / n,
            temp_mean: self.temp_mean / n,
            temp_max: self.temp_max,
            temp_min: self.temp_min,
        }
    }
}

/// Groups observations from every location by date and aggregates each day:
/// rainfall, sunshine, humidity and mean temperature are averaged, the daily
/// maximum is the hottest location's and the minimum the coldest one's.
///
/// The output has one row per date seen in any series, ascending. A location
/// missing a date simply does not contribute to that day.
pub fn aggregate_daily<S>(series: &[S]) -> Vec<AggregatedDailyWeather>
where
    S: AsRef<[WeatherObservation]>,
{
    let mut days: BTreeMap<NaiveDate, DayAccumulator> = BTreeMap::new();

    for obs in series.iter().flat_map(|s| s.as_ref()) {
        days.entry(obs.date).or_insert_with(DayAccumulator::new).add(obs);
    }

    days.into_iter().map(|(date, acc)| acc.finish(date)).collect()
}
