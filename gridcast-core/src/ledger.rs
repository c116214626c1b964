//! The persisted prediction document: labeled history plus the pending forecast.

use std::{
    fmt, fs,
    io::{ErrorKind, Write},
    path::Path,
};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{info, warn};

use crate::{
    error::{GridcastError, Result},
    model::{ActualDailyPower, DailyForecast, PowerValues},
};

/// `{"history": [...], "forecast": [...]}` as read by the dashboard.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PredictionLedger {
    #[serde(default)]
    pub history: Vec<DailyForecast>,
    #[serde(default)]
    pub forecast: Vec<DailyForecast>,
}

/// What happened to the previous run's forecast during reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub enum Reconciliation {
    /// The entry for `date` was labeled and moved into history.
    Labeled { date: NaiveDate },
    /// There was no earlier forecast to label (first run).
    NoPreviousForecast,
    /// No actual value was available for `expected`; history is untouched.
    MissingActual { expected: NaiveDate },
    /// The earlier forecast has no entry for `date` (a run was skipped).
    DateNotInForecast { date: NaiveDate },
    /// History already holds `date` (the job ran twice for the same day).
    AlreadyLabeled { date: NaiveDate },
}

impl Reconciliation {
    pub fn appended(&self) -> bool {
        matches!(self, Reconciliation::Labeled { .. })
    }
}

impl fmt::Display for Reconciliation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reconciliation::Labeled { date } => write!(f, "labeled forecast for {date}"),
            Reconciliation::NoPreviousForecast => f.write_str("no previous forecast to label"),
            Reconciliation::MissingActual { expected } => {
                write!(f, "no actuals for {expected}; history left unchanged")
            }
            Reconciliation::DateNotInForecast { date } => {
                write!(f, "previous forecast has no entry for {date}; history left unchanged")
            }
            Reconciliation::AlreadyLabeled { date } => {
                write!(f, "{date} is already in history; history left unchanged")
            }
        }
    }
}

impl PredictionLedger {
    /// Read the ledger at `path`, or an empty one if the file does not exist yet.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(path = %path.display(), "no ledger yet, starting empty");
                return Ok(Self::default());
            }
            Err(e) => return Err(GridcastError::persistence(path, e)),
        };

        serde_json::from_str(&contents)
            .map_err(|e| GridcastError::persistence(path, format!("invalid ledger JSON: {e}")))
    }

    /// Replace the file at `path` with this ledger.
    ///
    /// The document is written to a temporary file in the same directory and
    /// renamed over the target, so a failure leaves the old file as it was.
    /// The replacement keeps the old file's permissions; a new ledger is
    /// world-readable (0644 on Unix).
    pub fn save(&self, path: &Path) -> Result<()> {
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };

        let json = serde_json::to_string_pretty(self)
            .map_err(|e| GridcastError::persistence(path, format!("serialization failed: {e}")))?;

        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| GridcastError::persistence(path, e))?;
        if let Some(perms) = target_permissions(path) {
            tmp.as_file().set_permissions(perms).map_err(|e| GridcastError::persistence(path, e))?;
        }
        tmp.write_all(json.as_bytes())
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| GridcastError::persistence(path, e))?;
        tmp.persist(path).map_err(|e| GridcastError::persistence(path, e.error))?;

        info!(
            path = %path.display(),
            history = self.history.len(),
            forecast = self.forecast.len(),
            "ledger saved"
        );
        Ok(())
    }

    /// Label the previous forecast's entry for the actual's date, move it into
    /// history, and install `new_forecast`.
    ///
    /// `expected` is the day the caller asked actuals for. The entry to label
    /// is matched on date, not on position, so a skipped or repeated run never
    /// attaches an actual to the wrong day. Whatever happens to history, the
    /// forecast is always replaced.
    pub fn reconcile_and_replace(
        &mut self,
        new_forecast: Vec<DailyForecast>,
        expected: NaiveDate,
        actual: Option<&ActualDailyPower>,
    ) -> Reconciliation {
        let previous = std::mem::replace(&mut self.forecast, new_forecast);
        let outcome = self.reconcile(previous, expected, actual);

        match &outcome {
            Reconciliation::Labeled { date } => info!(%date, "forecast labeled and archived"),
            Reconciliation::NoPreviousForecast => info!("first run, nothing to reconcile"),
            other => warn!("{other}"),
        }
        outcome
    }

    fn reconcile(
        &mut self,
        previous: Vec<DailyForecast>,
        expected: NaiveDate,
        actual: Option<&ActualDailyPower>,
    ) -> Reconciliation {
        if previous.is_empty() {
            return Reconciliation::NoPreviousForecast;
        }
        let Some(actual) = actual else {
            return Reconciliation::MissingActual { expected };
        };

        let date = actual.date;
        if self.history.iter().any(|h| h.date == date) {
            return Reconciliation::AlreadyLabeled { date };
        }
        let Some(mut entry) = previous.into_iter().find(|f| f.date == date) else {
            return Reconciliation::DateNotInForecast { date };
        };

        entry.label = Some(actual.as_label());
        self.history.push(entry);
        Reconciliation::Labeled { date }
    }

    /// Most recent observed values, used to seed lags when fresh actuals are missing.
    pub fn last_label(&self) -> Option<(NaiveDate, PowerValues)> {
        self.history.iter().rev().find_map(|h| h.label.map(|l| (h.date, l)))
    }
}

/// Permissions the saved ledger should carry: the existing file's, else the default.
fn target_permissions(path: &Path) -> Option<fs::Permissions> {
    match fs::metadata(path) {
        Ok(meta) => Some(meta.permissions()),
        Err(_) => default_permissions(),
    }
}

#[cfg(unix)]
fn default_permissions() -> Option<fs::Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Some(fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn default_permissions() -> Option<fs::Permissions> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn actual(d: u32, generation_gw: f64, loadshed_gw: f64) -> ActualDailyPower {
        ActualDailyPower {
            date: day(d),
            generation_gw,
            demand_gw: generation_gw + loadshed_gw,
            loadshed_gw,
        }
    }

    fn week_from(start: u32) -> Vec<DailyForecast> {
        (start..start + 7)
            .map(|d| DailyForecast::unlabeled(day(d), PowerValues::new(10.0 + d as f64, 0.1)))
            .collect()
    }

    #[test]
    fn load_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let ledger = PredictionLedger::load(&dir.path().join("predictions.json")).unwrap();
        assert_eq!(ledger, PredictionLedger::default());
    }

    #[test]
    fn load_corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("predictions.json");
        fs::write(&path, "{not json").unwrap();

        let err = PredictionLedger::load(&path).unwrap_err();
        assert!(matches!(err, GridcastError::Persistence { .. }));
    }

    #[test]
    fn save_then_load_is_identical() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("predictions.json");

        let mut ledger = PredictionLedger { history: vec![], forecast: week_from(10) };
        ledger.reconcile_and_replace(week_from(11), day(10), Some(&actual(10, 9.3, 0.2)));
        ledger.save(&path).unwrap();

        assert_eq!(PredictionLedger::load(&path).unwrap(), ledger);
    }

    #[test]
    fn save_replaces_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("predictions.json");
        fs::write(&path, "old content that is much longer than the new document").unwrap();

        PredictionLedger::default().save(&path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(serde_json::from_str::<PredictionLedger>(&text).unwrap(), PredictionLedger::default());
    }

    #[test]
    fn save_into_missing_directory_fails() {
        let dir = TempDir::new().unwrap();
        let missing_dir = dir.path().join("nope").join("predictions.json");

        let err = PredictionLedger::default().save(&missing_dir).unwrap_err();
        assert!(matches!(err, GridcastError::Persistence { .. }));
        assert!(!missing_dir.exists());
    }

    #[test]
    fn failed_rename_keeps_previous_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("predictions.json");
        // A non-empty directory at the target makes the final rename fail.
        fs::create_dir(&path).unwrap();
        let previous = PredictionLedger { history: vec![], forecast: week_from(10) };
        let inner = path.join("ledger.json");
        fs::write(&inner, serde_json::to_string(&previous).unwrap()).unwrap();
        let before = fs::read(&inner).unwrap();

        let err = PredictionLedger::default().save(&path).unwrap_err();

        assert!(matches!(err, GridcastError::Persistence { .. }));
        assert_eq!(fs::read(&inner).unwrap(), before);
        let leftovers: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(leftovers.len(), 1, "temporary file was not cleaned up");
    }

    #[cfg(unix)]
    #[test]
    fn save_keeps_existing_file_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("predictions.json");
        fs::write(&path, "{}").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o640)).unwrap();

        PredictionLedger::default().save(&path).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o640);

        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();
        PredictionLedger::default().save(&path).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o644);
    }

    #[cfg(unix)]
    #[test]
    fn new_ledger_is_world_readable() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("predictions.json");

        PredictionLedger::default().save(&path).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o644);
    }

    #[test]
    fn example_run_labels_and_archives() {
        let mut ledger: PredictionLedger = serde_json::from_str(
            r#"{"forecast":[{"date":"2024-01-10","prediction":{"generation":9.1,"loadshed":0.3}}],"history":[]}"#,
        )
        .unwrap();
        let new_forecast = week_from(11);

        let outcome =
            ledger.reconcile_and_replace(new_forecast.clone(), day(10), Some(&actual(10, 9.3, 0.2)));

        assert_eq!(outcome, Reconciliation::Labeled { date: day(10) });
        assert_eq!(
            serde_json::to_value(&ledger.history).unwrap(),
            serde_json::json!([{
                "date": "2024-01-10",
                "prediction": {"generation": 9.1, "loadshed": 0.3},
                "label": {"generation": 9.3, "loadshed": 0.2}
            }])
        );
        assert_eq!(ledger.forecast, new_forecast);
    }

    #[test]
    fn first_run_only_installs_forecast() {
        let mut ledger = PredictionLedger::default();

        let outcome = ledger.reconcile_and_replace(week_from(11), day(10), Some(&actual(10, 9.3, 0.2)));

        assert_eq!(outcome, Reconciliation::NoPreviousForecast);
        assert!(ledger.history.is_empty());
        assert_eq!(ledger.forecast.len(), 7);
    }

    #[test]
    fn missing_actual_leaves_history_but_replaces_forecast() {
        let mut ledger = PredictionLedger { history: vec![], forecast: week_from(10) };

        let outcome = ledger.reconcile_and_replace(week_from(11), day(10), None);

        assert_eq!(outcome, Reconciliation::MissingActual { expected: day(10) });
        assert!(!outcome.appended());
        assert!(ledger.history.is_empty());
        assert_eq!(ledger.forecast, week_from(11));
    }

    #[test]
    fn skipped_day_labels_the_matching_entry_not_the_first() {
        // Forecast made on the 9th covers 10..16; job skipped on the 11th,
        // now runs on the 12th with actuals for the 11th.
        let mut ledger = PredictionLedger { history: vec![], forecast: week_from(10) };

        let outcome = ledger.reconcile_and_replace(week_from(12), day(11), Some(&actual(11, 8.8, 0.4)));

        assert_eq!(outcome, Reconciliation::Labeled { date: day(11) });
        assert_eq!(ledger.history[0].date, day(11));
        assert_eq!(ledger.history[0].prediction.generation, 21.0);
    }

    #[test]
    fn actual_outside_previous_horizon_is_skipped() {
        let mut ledger = PredictionLedger { history: vec![], forecast: week_from(10) };

        let outcome = ledger.reconcile_and_replace(week_from(21), day(20), Some(&actual(20, 8.8, 0.4)));

        assert_eq!(outcome, Reconciliation::DateNotInForecast { date: day(20) });
        assert!(ledger.history.is_empty());
    }

    #[test]
    fn second_run_same_day_does_not_duplicate_history() {
        let mut ledger = PredictionLedger { history: vec![], forecast: week_from(10) };
        let a = actual(10, 9.3, 0.2);

        ledger.reconcile_and_replace(week_from(11), day(10), Some(&a));
        // The rerun's stored forecast starts at the 11th, but suppose an older
        // run had still covered the 10th.
        ledger.forecast = week_from(10);
        let outcome = ledger.reconcile_and_replace(week_from(11), day(10), Some(&a));

        assert_eq!(outcome, Reconciliation::AlreadyLabeled { date: day(10) });
        assert_eq!(ledger.history.len(), 1);
    }

    #[test]
    fn history_grows_by_at_most_one_and_is_always_labeled() {
        let mut ledger = PredictionLedger::default();
        let mut before = ledger.history.len();

        for d in 10..15 {
            let outcome = ledger.reconcile_and_replace(week_from(d + 1), day(d), Some(&actual(d, 9.0, 0.1)));
            let grown = ledger.history.len() - before;
            assert_eq!(grown, usize::from(outcome.appended()));
            assert!(ledger.history.iter().all(|h| h.label.is_some()));
            before = ledger.history.len();
        }

        assert_eq!(ledger.history.len(), 4);
        assert_eq!(ledger.last_label(), Some((day(14), PowerValues::new(9.0, 0.1))));
    }
}
