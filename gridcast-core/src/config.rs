use anyhow::{Context, Result, anyhow, bail};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::model::Location;

/// Open-Meteo accepts at most 16 forecast days.
pub const MAX_FORECAST_DAYS: u32 = 16;

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// forecast_days = 7
/// ledger_path = "predictions.json"
///
/// [[locations]]
/// name = "Dhaka"
/// latitude = 23.7104
/// longitude = 90.40744
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub forecast_days: u32,
    pub ledger_path: PathBuf,
    pub generation_model_path: PathBuf,
    pub loadshed_model_path: PathBuf,
    pub weather_base_url: String,
    pub actuals_base_url: String,
    pub request_timeout_secs: u64,
    /// The operator's report site serves an incomplete certificate chain.
    pub accept_invalid_certs: bool,
    /// Points whose weather is averaged into the national series.
    pub locations: Vec<Location>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            forecast_days: 7,
            ledger_path: PathBuf::from("predictions.json"),
            generation_model_path: PathBuf::from("generation_lgbm_model.txt"),
            loadshed_model_path: PathBuf::from("loadshed_lgbm_model.txt"),
            weather_base_url: "https://api.open-meteo.com/v1/forecast".to_string(),
            actuals_base_url: "https://erp.pgcb.gov.bd/w/generations/view_generations".to_string(),
            request_timeout_secs: 30,
            accept_invalid_certs: true,
            locations: vec![
                Location::new("Dhaka", 23.7104, 90.40744),
                Location::new("Chittagong", 22.3384, 91.83168),
                Location::new("Patuakhali", 22.36833, 90.3458),
            ],
        }
    }
}

impl Config {
    /// Load config from the platform config directory, or defaults if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_file_path()?)
    }

    /// Load config from `path`, or defaults if it doesn't exist yet.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            // First run: no config file, use defaults.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        cfg.validate()
            .with_context(|| format!("Invalid config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to the platform config directory.
    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::config_file_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    /// Save config to `path`, creating parent directories as needed.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "gridcast", "gridcast")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    pub fn validate(&self) -> Result<()> {
        if self.locations.is_empty() {
            bail!("At least one location is required to build the national weather series.");
        }
        if !(1..=MAX_FORECAST_DAYS).contains(&self.forecast_days) {
            bail!(
                "forecast_days must be between 1 and {MAX_FORECAST_DAYS}, got {}",
                self.forecast_days
            );
        }
        if self.request_timeout_secs == 0 {
            bail!("request_timeout_secs must be positive.");
        }
        for loc in &self.locations {
            if !(-90.0..=90.0).contains(&loc.latitude) || !(-180.0..=180.0).contains(&loc.longitude)
            {
                bail!(
                    "Location '{}' has invalid coordinates ({}, {})",
                    loc.name,
                    loc.latitude,
                    loc.longitude
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_cover_three_monitored_cities() {
        let cfg = Config::default();

        let names: Vec<&str> = cfg.locations.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, ["Dhaka", "Chittagong", "Patuakhali"]);
        assert_eq!(cfg.forecast_days, 7);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let cfg = Config::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut cfg = Config::default();
        cfg.forecast_days = 5;
        cfg.ledger_path = PathBuf::from("/var/lib/gridcast/predictions.json");
        cfg.save_to(&path).unwrap();

        assert_eq!(Config::load_from(&path).unwrap(), cfg);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "forecast_days = 3\n").unwrap();

        let cfg = Config::load_from(&path).unwrap();
        assert_eq!(cfg.forecast_days, 3);
        assert_eq!(cfg.locations.len(), 3);
    }

    #[test]
    fn invalid_horizon_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "forecast_days = 30\n").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(format!("{err:#}").contains("forecast_days must be between 1 and 16"));
    }

    #[test]
    fn empty_locations_are_rejected() {
        let cfg = Config { locations: vec![], ..Config::default() };
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("At least one location"));
    }
}
