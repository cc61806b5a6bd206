//! Run configuration, resolved in layers.
//!
//! Resolution order (highest priority first):
//! 1. CLI flags (`CliOverrides`)
//! 2. Environment variables (`WARDEN_*`)
//! 3. Config file (`warden.toml`)
//! 4. Compiled defaults

use crate::analysis::AnalysisPass;
use crate::finding::Severity;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

pub const DEFAULT_COMPUTE_BUDGET: u64 = 200_000;
pub const DEFAULT_BUDGET_PRESSURE_RATIO: f64 = 0.7;
pub const DEFAULT_MAX_SEED_LEN: usize = 32;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Config file not found: {path}")]
    FileNotFound { path: String },
    #[error("Failed to parse {path}: {message}")]
    ParseError { path: String, message: String },
    #[error("Invalid value for {field}: {message}")]
    ValidationFailed { field: String, message: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PassSelection {
    Security,
    Convention,
    Cost,
    #[default]
    All,
}

impl PassSelection {
    pub fn passes(&self) -> Vec<AnalysisPass> {
        match self {
            PassSelection::Security => vec![AnalysisPass::Security],
            PassSelection::Convention => vec![AnalysisPass::Convention],
            PassSelection::Cost => vec![AnalysisPass::Cost],
            PassSelection::All => AnalysisPass::ALL.to_vec(),
        }
    }
}

impl std::str::FromStr for PassSelection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "security" => Ok(PassSelection::Security),
            "convention" => Ok(PassSelection::Convention),
            "cost" => Ok(PassSelection::Cost),
            "all" => Ok(PassSelection::All),
            other => Err(format!("unknown pass: {}", other)),
        }
    }
}

/// Compute-unit estimates per model element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostModel {
    pub base: u64,
    pub per_account: u64,
    pub per_cpi: u64,
    pub per_rederived_pda: u64,
    pub per_state_mutation: u64,
    pub per_arithmetic: u64,
    pub per_emit: u64,
    pub per_log: u64,
    pub loop_multiplier: u64,
}

impl Default for CostModel {
    fn default() -> Self {
        Self {
            base: 1_000,
            per_account: 250,
            per_cpi: 5_000,
            per_rederived_pda: 1_500,
            per_state_mutation: 100,
            per_arithmetic: 10,
            per_emit: 1_000,
            per_log: 100,
            loop_multiplier: 16,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub pass: PassSelection,
    pub severity_threshold: Severity,
    pub compute_budget: u64,
    pub budget_pressure_ratio: f64,
    /// Upper bound written into generated seed-length guards.
    pub max_seed_len: usize,
    pub generate_patch: bool,
    pub cost_model: CostModel,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            pass: PassSelection::All,
            severity_threshold: Severity::Info,
            compute_budget: DEFAULT_COMPUTE_BUDGET,
            budget_pressure_ratio: DEFAULT_BUDGET_PRESSURE_RATIO,
            max_seed_len: DEFAULT_MAX_SEED_LEN,
            generate_patch: false,
            cost_model: CostModel::default(),
        }
    }
}

/// Flag values that override every other layer.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub pass: Option<PassSelection>,
    pub severity_threshold: Option<Severity>,
    pub compute_budget: Option<u64>,
    pub generate_patch: Option<bool>,
}

impl AnalysisConfig {
    pub fn load(path: Option<&Path>, cli: Option<&CliOverrides>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        config.apply_env_overrides(|key| std::env::var(key).ok());

        if let Some(cli) = cli {
            config.apply_cli_overrides(cli);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
            path: path.display().to_string(),
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml_str).map_err(|e| ConfigError::ParseError {
            path: "<string>".to_string(),
            message: e.to_string(),
        })
    }

    /// Applies `WARDEN_*` variables. Unparsable values are ignored.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(pass) = lookup("WARDEN_PASS").and_then(|v| v.parse().ok()) {
            self.pass = pass;
        }
        if let Some(threshold) = lookup("WARDEN_SEVERITY_THRESHOLD").and_then(|v| v.parse().ok()) {
            self.severity_threshold = threshold;
        }
        if let Some(budget) = lookup("WARDEN_COMPUTE_BUDGET").and_then(|v| v.parse().ok()) {
            self.compute_budget = budget;
        }
    }

    pub fn apply_cli_overrides(&mut self, cli: &CliOverrides) {
        if let Some(pass) = cli.pass {
            self.pass = pass;
        }
        if let Some(threshold) = cli.severity_threshold {
            self.severity_threshold = threshold;
        }
        if let Some(budget) = cli.compute_budget {
            self.compute_budget = budget;
        }
        if let Some(patch) = cli.generate_patch {
            self.generate_patch = patch;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.compute_budget == 0 {
            return Err(ConfigError::ValidationFailed {
                field: "compute_budget".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }
        if !(self.budget_pressure_ratio > 0.0 && self.budget_pressure_ratio <= 1.0) {
            return Err(ConfigError::ValidationFailed {
                field: "budget_pressure_ratio".to_string(),
                message: "must be in (0.0, 1.0]".to_string(),
            });
        }
        if self.max_seed_len == 0 || self.max_seed_len > 32 {
            return Err(ConfigError::ValidationFailed {
                field: "max_seed_len".to_string(),
                message: "must be between 1 and 32".to_string(),
            });
        }
        if self.cost_model.loop_multiplier == 0 {
            return Err(ConfigError::ValidationFailed {
                field: "cost_model.loop_multiplier".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }
        Ok(())
    }

    pub fn budget_pressure_limit(&self) -> u64 {
        (self.compute_budget as f64 * self.budget_pressure_ratio) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = AnalysisConfig::default();
        assert_eq!(config.compute_budget, 200_000);
        assert_eq!(config.budget_pressure_limit(), 140_000);
        assert_eq!(config.pass.passes().len(), 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = AnalysisConfig::from_toml(
            r#"
pass = "security"
compute_budget = 400000

[cost_model]
per_cpi = 7000
"#,
        )
        .unwrap();
        assert_eq!(config.pass, PassSelection::Security);
        assert_eq!(config.compute_budget, 400_000);
        assert_eq!(config.cost_model.per_cpi, 7_000);
        assert_eq!(config.cost_model.base, 1_000);
        assert_eq!(config.severity_threshold, Severity::Info);
    }

    #[test]
    fn test_invalid_toml_is_parse_error() {
        let err = AnalysisConfig::from_toml("pass = [").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn test_validation_rejects_zero_budget() {
        let config = AnalysisConfig {
            compute_budget: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationFailed { field, .. }) if field == "compute_budget"
        ));
    }

    #[test]
    fn test_layering_env_then_cli() {
        let env: HashMap<&str, &str> = [
            ("WARDEN_PASS", "cost"),
            ("WARDEN_COMPUTE_BUDGET", "50000"),
            ("WARDEN_SEVERITY_THRESHOLD", "bogus"),
        ]
        .into_iter()
        .collect();

        let mut config = AnalysisConfig::default();
        config.apply_env_overrides(|key| env.get(key).map(|v| v.to_string()));
        assert_eq!(config.pass, PassSelection::Cost);
        assert_eq!(config.compute_budget, 50_000);
        assert_eq!(config.severity_threshold, Severity::Info);

        config.apply_cli_overrides(&CliOverrides {
            pass: Some(PassSelection::All),
            ..Default::default()
        });
        assert_eq!(config.pass, PassSelection::All);
        assert_eq!(config.compute_budget, 50_000);
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "severity_threshold = \"high\"").unwrap();
        let config = AnalysisConfig::from_file(file.path()).unwrap();
        assert_eq!(config.severity_threshold, Severity::High);

        let missing = AnalysisConfig::from_file(Path::new("/nonexistent/warden.toml"));
        assert!(matches!(missing, Err(ConfigError::FileNotFound { .. })));
    }
}
