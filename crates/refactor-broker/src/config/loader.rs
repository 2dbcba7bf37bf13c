//! Configuration loader for the broker

use std::path::Path;

use tracing::debug;

use crate::{
    config::types::BrokerConfig,
    error::{RefactoringError, Result},
};

/// Loads broker configuration from files
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a YAML file
    pub fn load_from_yaml(path: &Path) -> Result<BrokerConfig> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RefactoringError::ConfigError(format!("Failed to read config file: {}", e))
        })?;

        serde_yaml::from_str(&content)
            .map_err(|e| RefactoringError::ConfigError(format!("Failed to parse YAML: {}", e)))
    }

    /// Load configuration from a JSON file
    pub fn load_from_json(path: &Path) -> Result<BrokerConfig> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RefactoringError::ConfigError(format!("Failed to read config file: {}", e))
        })?;

        serde_json::from_str(&content)
            .map_err(|e| RefactoringError::ConfigError(format!("Failed to parse JSON: {}", e)))
    }

    /// Load configuration from a file (auto-detect format) and validate it
    pub fn load(path: &Path) -> Result<BrokerConfig> {
        let config = match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => Self::load_from_yaml(path)?,
            Some("json") => Self::load_from_json(path)?,
            _ => {
                return Err(RefactoringError::ConfigError(
                    "Unsupported configuration file format".to_string(),
                ))
            }
        };

        Self::validate(&config)?;
        debug!(path = %path.display(), "Loaded broker configuration");
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(config: &BrokerConfig) -> Result<()> {
        config.validate()
    }
}
