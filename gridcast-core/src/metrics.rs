//! Accuracy of past forecasts against their labels.

use serde::Serialize;

use crate::model::DailyForecast;

/// Error statistics for one target over the labeled history.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AccuracyMetrics {
    /// Mean Absolute Error (GW)
    pub mae: f64,
    /// Root Mean Square Error (GW)
    pub rmse: f64,
    /// Mean Absolute Percentage Error (%), over days with a non-zero actual.
    pub mape: Option<f64>,
    pub sample_count: usize,
}

impl AccuracyMetrics {
    pub fn calculate(pairs: impl IntoIterator<Item = (f64, f64)>) -> Option<Self> {
        let mut n = 0usize;
        let mut abs_sum = 0.0;
        let mut sq_sum = 0.0;
        let mut pct_sum = 0.0;
        let mut pct_n = 0usize;

        for (actual, predicted) in pairs {
            let error = actual - predicted;
            n += 1;
            abs_sum += error.abs();
            sq_sum += error * error;
            if actual.abs() > 1e-6 {
                pct_sum += error.abs() / actual.abs() * 100.0;
                pct_n += 1;
            }
        }

        if n == 0 {
            return None;
        }

        Some(Self {
            mae: abs_sum / n as f64,
            rmse: (sq_sum / n as f64).sqrt(),
            mape: (pct_n > 0).then(|| pct_sum / pct_n as f64),
            sample_count: n,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HistoryAccuracy {
    pub generation: AccuracyMetrics,
    pub loadshed: AccuracyMetrics,
}

/// Accuracy over every labeled entry of `history`; `None` if nothing is labeled yet.
pub fn history_accuracy(history: &[DailyForecast]) -> Option<HistoryAccuracy> {
    let labeled = || history.iter().filter_map(|h| h.label.map(|l| (l, h.prediction)));

    Some(HistoryAccuracy {
        generation: AccuracyMetrics::calculate(labeled().map(|(l, p)| (l.generation, p.generation)))?,
        loadshed: AccuracyMetrics::calculate(labeled().map(|(l, p)| (l.loadshed, p.loadshed)))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PowerValues;
    use chrono::NaiveDate;

    fn entry(d: u32, predicted: f64, actual: Option<f64>) -> DailyForecast {
        DailyForecast {
            date: NaiveDate::from_ymd_opt(2024, 1, d).unwrap(),
            prediction: PowerValues::new(predicted, 0.0),
            label: actual.map(|a| PowerValues::new(a, 0.0)),
        }
    }

    #[test]
    fn computes_mae_rmse_mape() {
        let m = AccuracyMetrics::calculate([(10.0, 9.0), (10.0, 13.0)]).unwrap();

        assert_eq!(m.mae, 2.0);
        assert!((m.rmse - 5.0f64.sqrt()).abs() < 1e-12);
        assert_eq!(m.mape, Some(20.0));
        assert_eq!(m.sample_count, 2);
    }

    #[test]
    fn zero_actuals_have_no_percentage_error() {
        let m = AccuracyMetrics::calculate([(0.0, 0.5)]).unwrap();
        assert_eq!(m.mape, None);
        assert_eq!(m.mae, 0.5);
    }

    #[test]
    fn history_ignores_unlabeled_entries() {
        let history = vec![entry(1, 9.0, Some(10.0)), entry(2, 20.0, None)];

        let acc = history_accuracy(&history).unwrap();
        assert_eq!(acc.generation.sample_count, 1);
        assert_eq!(acc.generation.mae, 1.0);
    }

    #[test]
    fn empty_history_has_no_accuracy() {
        assert!(history_accuracy(&[]).is_none());
    }
}
