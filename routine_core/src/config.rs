//! Configuration file support for Routine.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/routine/config.toml`.

use crate::{Error, Result, RpeMode};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub calories: CaloriesConfig,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Session execution behaviour
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub rpe_mode: RpeMode,

    /// Rest after an exercise that has no rest configured
    #[serde(default = "default_exercise_rest_seconds")]
    pub default_exercise_rest_seconds: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            rpe_mode: RpeMode::default(),
            default_exercise_rest_seconds: default_exercise_rest_seconds(),
        }
    }
}

/// Calorie estimation settings
///
/// The EPOC multiplier and its thresholds are heuristics; they live here so
/// they can be tuned without a rebuild.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CaloriesConfig {
    #[serde(default = "default_true")]
    pub include_rest: bool,

    #[serde(default = "default_true")]
    pub include_preparation: bool,

    #[serde(default = "default_true")]
    pub epoc_enabled: bool,

    #[serde(default = "default_epoc_multiplier")]
    pub epoc_multiplier: f64,

    #[serde(default = "default_epoc_min_avg_rpe")]
    pub epoc_min_avg_rpe: f64,

    #[serde(default = "default_epoc_min_work_density")]
    pub epoc_min_work_density: f64,
}

impl Default for CaloriesConfig {
    fn default() -> Self {
        Self {
            include_rest: true,
            include_preparation: true,
            epoc_enabled: true,
            epoc_multiplier: default_epoc_multiplier(),
            epoc_min_avg_rpe: default_epoc_min_avg_rpe(),
            epoc_min_work_density: default_epoc_min_work_density(),
        }
    }
}

// Default value functions
fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(|| {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".into());
        PathBuf::from(home).join(".local/share")
    });
    base.join("routine")
}

fn default_exercise_rest_seconds() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

fn default_epoc_multiplier() -> f64 {
    1.06
}

fn default_epoc_min_avg_rpe() -> f64 {
    7.0
}

fn default_epoc_min_work_density() -> f64 {
    0.6
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!(
                "No config file found at {:?}, using defaults",
                config_path
            );
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Reject values the calorie model cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.calories.epoc_multiplier < 1.0 {
            return Err(Error::Config(format!(
                "epoc_multiplier must be >= 1.0, got {}",
                self.calories.epoc_multiplier
            )));
        }
        if !(0.0..=1.0).contains(&self.calories.epoc_min_work_density) {
            return Err(Error::Config(format!(
                "epoc_min_work_density must be within 0..=1, got {}",
                self.calories.epoc_min_work_density
            )));
        }
        Ok(())
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir().unwrap_or_else(|| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".into());
            PathBuf::from(home).join(".config")
        });
        base.join("routine").join("config.toml")
    }

    /// Save the current configuration to the default path
    pub fn save(&self) -> Result<()> {
        let config_path = Self::default_config_path();
        self.save_to(&config_path)
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }
}
