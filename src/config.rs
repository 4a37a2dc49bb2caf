//! Configuration loading from TOML.
//!
//! Reads `config.toml` into strongly-typed sections. Every field has a
//! default, so a partial file (or none at all) still yields a runnable
//! configuration. Payout and phase tables live in their own JSON files,
//! referenced from `[paths]`.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

use crate::strategy::anomaly::{strategy_from_name, AnomalyFilter, FilterConfig};
use crate::strategy::kelly::BetConstraints;
use crate::strategy::portfolio::OptimizerConfig;
use crate::strategy::BatchTargets;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub bankroll: BankrollConfig,
    pub optimizer: OptimizerSection,
    pub filter: FilterSection,
    pub paths: PathsConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BankrollConfig {
    pub bankroll: f64,
    pub min_bet: f64,
    pub max_bet_pct: f64,
}

impl Default for BankrollConfig {
    fn default() -> Self {
        Self {
            bankroll: 1000.0,
            min_bet: 5.0,
            max_bet_pct: 0.10,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct OptimizerSection {
    pub power_target: usize,
    pub flex_target: usize,
    pub beam_width: usize,
    pub max_per_prop: usize,
    /// Cap on search rounds per batch; unset means no cap.
    pub max_rounds: Option<usize>,
    /// Wall-clock budget per batch in milliseconds; unset means none.
    pub time_budget_ms: Option<u64>,
}

impl Default for OptimizerSection {
    fn default() -> Self {
        Self {
            power_target: 5,
            flex_target: 5,
            beam_width: 50,
            max_per_prop: 3,
            max_rounds: None,
            time_budget_ms: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct FilterSection {
    pub tolerance_pct: f64,
    /// `conservative_lower` or `higher`.
    pub two_line_strategy: String,
}

impl Default for FilterSection {
    fn default() -> Self {
        Self {
            tolerance_pct: 15.0,
            two_line_strategy: "conservative_lower".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PathsConfig {
    pub payout_tables: PathBuf,
    pub phase_divisors: PathBuf,
    pub props: PathBuf,
    pub output: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            payout_tables: PathBuf::from("config/payout_tables.json"),
            phase_divisors: PathBuf::from("config/phase_kelly_divisors.json"),
            props: PathBuf::from("data/props.json"),
            output: PathBuf::from("data/slips.json"),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Like [`AppConfig::load`], but a missing file means defaults.
    /// A file that exists and fails to parse is still an error.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            warn!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }
        Self::load(path)
    }

    pub fn filter_config(&self) -> FilterConfig {
        FilterConfig {
            tolerance_pct: self.filter.tolerance_pct,
        }
    }

    /// Build the anomaly filter, falling back to the conservative rule on
    /// an unrecognised strategy name.
    pub fn anomaly_filter(&self) -> AnomalyFilter {
        match strategy_from_name(&self.filter.two_line_strategy) {
            Some(strategy) => AnomalyFilter::with_strategy(self.filter_config(), strategy),
            None => {
                warn!(
                    strategy = %self.filter.two_line_strategy,
                    "Unknown two-line strategy, using conservative_lower"
                );
                AnomalyFilter::new(self.filter_config())
            }
        }
    }

    pub fn optimizer_config(&self) -> OptimizerConfig {
        OptimizerConfig {
            beam_width: self.optimizer.beam_width,
            max_per_prop: self.optimizer.max_per_prop,
            max_rounds: self.optimizer.max_rounds,
            time_budget: self.optimizer.time_budget_ms.map(Duration::from_millis),
        }
    }

    pub fn bet_constraints(&self) -> BetConstraints {
        BetConstraints::new(self.bankroll.min_bet, self.bankroll.max_bet_pct)
    }

    pub fn targets(&self) -> BatchTargets {
        BatchTargets {
            power: self.optimizer.power_target,
            flex: self.optimizer.flex_target,
        }
    }
}
