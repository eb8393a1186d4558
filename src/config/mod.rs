//! Configuration module

use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

use crate::core::engine::EngineConfig;
use crate::core::learner::LearningConfig;
use crate::core::predictor::PredictionConfig;
use crate::core::tariff::TariffConfig;

/// Repository directory name
pub const DIR_NAME: &str = ".farefriend";

/// Environment variable overriding the database path
pub const DATABASE_ENV: &str = "FAREFRIEND_DATABASE";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub tariff: TariffConfig,

    #[serde(default)]
    pub learning: LearningConfig,

    #[serde(default)]
    pub prediction: PredictionConfig,

    #[serde(default)]
    pub locale: LocaleConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocaleConfig {
    /// Offset from UTC applied to "now" and to `--at` times without one
    #[serde(default = "default_utc_offset_minutes")]
    pub utc_offset_minutes: i32,
}

impl Default for LocaleConfig {
    fn default() -> Self {
        Self {
            utc_offset_minutes: default_utc_offset_minutes(),
        }
    }
}

/// IST
fn default_utc_offset_minutes() -> i32 {
    330
}

impl LocaleConfig {
    pub fn offset(&self) -> Result<FixedOffset> {
        FixedOffset::east_opt(self.utc_offset_minutes * 60)
            .ok_or_else(|| anyhow!("Invalid UTC offset: {} minutes", self.utc_offset_minutes))
    }

    /// Current local time
    pub fn now(&self) -> Result<DateTime<FixedOffset>> {
        Ok(Utc::now().with_timezone(&self.offset()?))
    }
}

impl Config {
    /// Load config from an explicit file, else from default locations
    pub fn load_with(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::load_from(path),
            None => Self::load(),
        }
    }

    /// Load config from default locations
    pub fn load() -> Result<Self> {
        // Try local config first, then global
        if let Some(local) = Self::find_local_config() {
            return Self::load_from(&local);
        }

        if let Some(global) = Self::global_config_path() {
            if global.exists() {
                return Self::load_from(&global);
            }
        }

        Ok(Self::default())
    }

    /// Load config from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid settings in {}", path.display()))?;
        Ok(config)
    }

    /// Check value ranges that parsing alone cannot enforce
    pub fn validate(&self) -> Result<()> {
        let tariff = &self.tariff;
        let rates = [
            tariff.base_fare,
            tariff.min_distance_km,
            tariff.per_km_rate,
            tariff.night_multiplier,
            tariff.waiting_per_min,
        ];
        if rates.iter().any(|v| !v.is_finite() || *v < 0.0) {
            bail!("tariff values must be finite and non-negative");
        }
        if tariff.base_fare <= 0.0 {
            bail!("tariff.base_fare must be positive, got {}", tariff.base_fare);
        }
        if tariff.night_window.start_hour > 23 || tariff.night_window.end_hour > 24 {
            bail!(
                "tariff.night_window hours out of range: {}..{}",
                tariff.night_window.start_hour,
                tariff.night_window.end_hour
            );
        }

        self.learning.validate()?;
        self.locale.offset()?;
        Ok(())
    }

    /// Save config to a file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Engine settings carried by this config
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            tariff: self.tariff.clone(),
            learning: self.learning.clone(),
            prediction: self.prediction.clone(),
        }
    }

    /// Find local .farefriend/<file> walking up directories
    fn find_local(file: &str) -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;

        loop {
            let candidate = current.join(DIR_NAME).join(file);
            if candidate.exists() {
                return Some(candidate);
            }

            if !current.pop() {
                break;
            }
        }

        None
    }

    pub fn find_local_config() -> Option<PathBuf> {
        Self::find_local("config.toml")
    }

    pub fn find_local_db() -> Option<PathBuf> {
        Self::find_local("data.db")
    }

    /// Global repository directory (~/.farefriend)
    pub fn global_dir() -> Option<PathBuf> {
        directories::UserDirs::new().map(|u| u.home_dir().join(DIR_NAME))
    }

    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_dir().map(|d| d.join("config.toml"))
    }

    pub fn global_db_path() -> Option<PathBuf> {
        Self::global_dir().map(|d| d.join("data.db"))
    }

    /// Database path with priority:
    /// 1. FAREFRIEND_DATABASE env var
    /// 2. Local .farefriend/data.db (walking up from CWD)
    /// 3. Local .farefriend/ holding only a config
    /// 4. Global ~/.farefriend/data.db
    pub fn data_path(&self) -> PathBuf {
        if let Ok(env_path) = std::env::var(DATABASE_ENV) {
            return PathBuf::from(env_path);
        }

        if let Some(local_db) = Self::find_local_db() {
            return local_db;
        }

        if let Some(dir) = Self::find_local_config()
            .as_deref()
            .and_then(Path::parent)
        {
            return dir.join("data.db");
        }

        if let Some(global) = Self::global_db_path() {
            return global;
        }

        PathBuf::from(DIR_NAME).join("data.db")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.tariff.base_fare, 26.0);
        assert_eq!(config.learning.min_reports, 3);
        assert_eq!(config.prediction.formula_confidence, 0.70);
        assert_eq!(config.locale.utc_offset_minutes, 330);
    }

    #[test]
    fn test_partial_file_keeps_defaults() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[tariff]\nper_km_rate = 18.0\n\n[locale]\nutc_offset_minutes = 0\n",
        )?;

        let config = Config::load_from(&path)?;
        assert_eq!(config.tariff.per_km_rate, 18.0);
        assert_eq!(config.tariff.base_fare, 26.0);
        assert_eq!(config.learning.max_factor, 2.0);
        assert_eq!(config.locale.offset()?, FixedOffset::east_opt(0).unwrap());
        Ok(())
    }

    #[test]
    fn test_save_and_reload() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.learning.min_reports = 5;
        config.save_to(&path)?;

        let reloaded = Config::load_from(&path)?;
        assert_eq!(reloaded.learning.min_reports, 5);
        assert_eq!(reloaded.tariff.night_window.end_hour, 5);
        Ok(())
    }

    #[test]
    fn test_validate_rejects_bad_ranges() {
        assert!(Config::default().validate().is_ok());

        let mut inverted = Config::default();
        inverted.learning.min_factor = 3.0;
        assert!(inverted.validate().is_err());

        let mut free_ride = Config::default();
        free_ride.tariff.base_fare = 0.0;
        assert!(free_ride.validate().is_err());

        let mut late = Config::default();
        late.tariff.night_window.start_hour = 30;
        assert!(late.validate().is_err());
    }

    #[test]
    fn test_load_rejects_invalid_learning_bounds() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[learning]
normalizing_fare = 0.0
")?;

        let err = Config::load_from(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("normalizing_fare"));
        Ok(())
    }

    #[test]
    fn test_invalid_offset() {
        let locale = LocaleConfig {
            utc_offset_minutes: 100_000,
        };
        assert!(locale.offset().is_err());
    }
}
