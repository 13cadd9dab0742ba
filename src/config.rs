// ⚙️ Configuration - Budgets, Timezone, Anomaly Model
// Loaded once at startup, then passed by value into the pipeline

use anyhow::{bail, Context as AnyhowContext, Result};
use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Env var naming a JSON config file
pub const CONFIG_PATH_ENV: &str = "EXPENSE_TRACKER_CONFIG";

/// Env var overriding the SQLite database path
pub const DATABASE_PATH_ENV: &str = "EXPENSE_TRACKER_DB";

// ============================================================================
// BUDGET THRESHOLDS
// ============================================================================

/// Fixed spend limits per bucket. Never mutated at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetThresholds {
    pub daily: f64,
    pub weekly: f64,
    pub monthly: f64,
}

impl Default for BudgetThresholds {
    fn default() -> Self {
        BudgetThresholds {
            daily: 250.0,
            weekly: 1750.0,
            monthly: 8000.0,
        }
    }
}

// ============================================================================
// ANOMALY SETTINGS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnomalySettings {
    /// Histories of this size or smaller are not scored
    pub min_history: usize,

    /// Expected outlier fraction
    pub contamination: f64,

    /// Seed for the forest's random source
    pub seed: u64,

    /// Number of isolation trees
    pub n_estimators: usize,

    /// Upper bound on the per-tree sub-sample
    pub max_samples: usize,
}

impl Default for AnomalySettings {
    fn default() -> Self {
        AnomalySettings {
            min_history: 5,
            contamination: 0.1,
            seed: 42,
            n_estimators: 100,
            max_samples: 256,
        }
    }
}

// ============================================================================
// APP CONFIG
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database_path: PathBuf,

    /// Reference timezone for bucket boundaries, as minutes east of UTC
    pub utc_offset_minutes: i32,

    pub budgets: BudgetThresholds,

    pub anomaly: AnomalySettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            database_path: PathBuf::from("expenses.db"),
            utc_offset_minutes: 0,
            budgets: BudgetThresholds::default(),
            anomaly: AnomalySettings::default(),
        }
    }
}

impl AppConfig {
    /// Load config from the environment: optional JSON file, then DB path override
    pub fn load() -> Result<Self> {
        let mut config = match env::var_os(CONFIG_PATH_ENV) {
            Some(path) => AppConfig::from_file(Path::new(&path))?,
            None => AppConfig::default(),
        };

        if let Some(db_path) = env::var_os(DATABASE_PATH_ENV) {
            config.database_path = PathBuf::from(db_path);
        }

        config.validate()?;
        Ok(config)
    }

    /// Load config from a JSON file (missing fields take defaults)
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        let config: AppConfig =
            serde_json::from_str(&content).context("Failed to parse config JSON")?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let b = &self.budgets;
        for (name, value) in [("daily", b.daily), ("weekly", b.weekly), ("monthly", b.monthly)] {
            if !value.is_finite() || value <= 0.0 {
                bail!("{} budget must be a positive number, got {}", name, value);
            }
        }

        let a = &self.anomaly;
        if !(a.contamination > 0.0 && a.contamination <= 0.5) {
            bail!("contamination must be in (0, 0.5], got {}", a.contamination);
        }
        if a.n_estimators == 0 {
            bail!("n_estimators must be at least 1");
        }
        if a.max_samples == 0 {
            bail!("max_samples must be at least 1");
        }

        self.timezone()?;
        Ok(())
    }

    /// Fixed reference timezone used for all bucket boundaries
    pub fn timezone(&self) -> Result<FixedOffset> {
        self.utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .with_context(|| {
                format!("utc_offset_minutes out of range: {}", self.utc_offset_minutes)
            })
    }
}

// ============================================================================
// TESTS
// ============================================================================
