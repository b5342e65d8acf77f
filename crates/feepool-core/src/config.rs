use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::{FEE_THRESHOLD_DIVISOR, MAX_HISTORY_DEPTH};

/// Fee engine policy knobs.
///
/// Thresholds and history depth are consensus parameters; every node on a
/// network must run with the same values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeeConfig {
    /// Pool distributes once it reaches `total_supply / fee_threshold_divisor`.
    pub fee_threshold_divisor: i64,
    /// Blocks of fee cache history kept below the block being written.
    pub max_history_depth: u64,
    /// Persisted protocol state wiped on a fatal fault so the next start
    /// reparses the chain.
    pub persist_dir: Option<PathBuf>,
    /// Keep persisted state on disk after a fatal fault (forensics only).
    pub override_forced_shutdown: bool,
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            fee_threshold_divisor: FEE_THRESHOLD_DIVISOR,
            max_history_depth: MAX_HISTORY_DEPTH,
            persist_dir: None,
            override_forced_shutdown: false,
        }
    }
}

impl FeeConfig {
    /// Load fee config from TOML file
    pub fn load_from_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let content = fs::read_to_string(path)?;
        let config: FeeConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load fee config from environment variables, falling back to defaults
    pub fn load_from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let defaults = Self::default();

        let fee_threshold_divisor = match std::env::var("FEEPOOL_THRESHOLD_DIVISOR") {
            Ok(v) => v.parse()?,
            Err(_) => defaults.fee_threshold_divisor,
        };

        let max_history_depth = match std::env::var("FEEPOOL_MAX_HISTORY_DEPTH") {
            Ok(v) => v.parse()?,
            Err(_) => defaults.max_history_depth,
        };

        let persist_dir = std::env::var("FEEPOOL_PERSIST_DIR").ok().map(PathBuf::from);

        let override_forced_shutdown = match std::env::var("FEEPOOL_OVERRIDE_FORCED_SHUTDOWN") {
            Ok(v) => matches!(v.as_str(), "1" | "true" | "yes"),
            Err(_) => defaults.override_forced_shutdown,
        };

        let config = Self {
            fee_threshold_divisor,
            max_history_depth,
            persist_dir,
            override_forced_shutdown,
        };
        config.validate()?;
        Ok(config)
    }

    /// Save fee config to TOML file
    pub fn save_to_file(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.fee_threshold_divisor < 1 {
            return Err(format!(
                "fee_threshold_divisor must be at least 1, got {}",
                self.fee_threshold_divisor
            ));
        }
        if self.max_history_depth < 1 {
            return Err("max_history_depth must be at least 1".to_string());
        }
        Ok(())
    }
}
