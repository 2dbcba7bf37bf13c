//! Configuration types for the refactoring broker

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{RefactoringError, Result};
use crate::language::Language;

/// Top-level broker configuration
///
/// Every section is optional in YAML/JSON; missing values take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// Language assumed when a request carries no file path and detection finds nothing
    pub default_language: Language,
    pub health: HealthConfig,
    pub resolver: ResolverConfig,
    pub find: FindConfig,
    pub analysis: AnalysisConfig,
    pub backup: BackupConfig,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            default_language: Language::Python,
            health: HealthConfig::default(),
            resolver: ResolverConfig::default(),
            find: FindConfig::default(),
            analysis: AnalysisConfig::default(),
            backup: BackupConfig::default(),
        }
    }
}

/// Provider health tracking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Health regained by a provider on every non-raising call
    pub recovery_step: f64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            recovery_step: 0.01,
        }
    }
}

/// Symbol resolution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Reject bare names that match more than one definition
    pub strict_qualified_names: bool,
    /// Directory names never scanned (hidden directories are always skipped)
    pub excluded_dirs: Vec<String>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            strict_qualified_names: false,
            excluded_dirs: vec![
                "__pycache__".to_string(),
                "venv".to_string(),
                ".venv".to_string(),
                "node_modules".to_string(),
            ],
        }
    }
}

/// Symbol search
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FindConfig {
    /// Cap on returned matches; the true count is still reported
    pub max_results: usize,
}

impl Default for FindConfig {
    fn default() -> Self {
        Self { max_results: 100 }
    }
}

/// Heuristics behind analysis suggestions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Functions with more lines than this are flagged as long
    pub long_function_lines: usize,
    /// Functions with more parameters than this are flagged
    pub max_parameters: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            long_function_lines: 15,
            max_parameters: 5,
        }
    }
}

/// Backup storage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct BackupConfig {
    /// Backup root; defaults to `<tmp>/refactor-broker-backups`
    pub backup_dir: Option<PathBuf>,
}

impl BackupConfig {
    pub fn resolved_dir(&self) -> PathBuf {
        self.backup_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("refactor-broker-backups"))
    }
}

impl BrokerConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let step = self.health.recovery_step;
        if !(step > 0.0 && step <= 1.0) {
            return Err(RefactoringError::InvalidConfiguration(format!(
                "health.recovery_step must be in (0, 1], got {}",
                step
            )));
        }

        if self.find.max_results == 0 {
            return Err(RefactoringError::InvalidConfiguration(
                "find.max_results must be at least 1".to_string(),
            ));
        }

        if self.analysis.long_function_lines == 0 || self.analysis.max_parameters == 0 {
            return Err(RefactoringError::InvalidConfiguration(
                "analysis thresholds must be at least 1".to_string(),
            ));
        }

        if self.default_language == Language::Unknown {
            return Err(RefactoringError::InvalidConfiguration(
                "default_language cannot be unknown".to_string(),
            ));
        }

        Ok(())
    }
}
