//! Model configuration loading and validation.
//!
//! Resolution order (highest to lowest priority):
//! 1. Explicit `--config` path
//! 2. `CTW_CONFIG` environment variable
//! 3. `$XDG_CONFIG_HOME/ctw/config.json`
//! 4. Built-in defaults
//!
//! Command-line flags override individual fields after resolution.

use crate::factored::FactoredModel;
use crate::select::{MissingContext, SelectionOptions};
use ctw_math::Estimator;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable naming a config file.
pub const CONFIG_ENV: &str = "CTW_CONFIG";

const CONFIG_DIR_NAME: &str = "ctw";
const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("Invalid JSON in config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("I/O error reading {path}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid model configuration: {0}")]
    Invalid(String),
}

impl From<ConfigError> for ctw_common::Error {
    fn from(err: ConfigError) -> Self {
        ctw_common::Error::Config(err.to_string())
    }
}

/// How to build a model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModelConfig {
    pub estimator: Estimator,
    /// Context depth limit; unbounded when unset.
    pub max_depth: Option<usize>,
    /// Number of factors (bit offsets per step); 1 is a plain tree.
    pub factors: usize,
    /// Furthest offset context selection may use (negative).
    pub min_var_index: Option<isize>,
    /// Deepest level of selected variables, counted from 0.
    pub selection_depth: Option<usize>,
    pub missing_context: MissingContext,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            estimator: Estimator::Kt,
            max_depth: None,
            factors: 1,
            min_var_index: None,
            selection_depth: None,
            missing_context: MissingContext::BothBranches,
        }
    }
}

impl ModelConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.factors == 0 {
            return Err(ConfigError::Invalid(
                "factors must be at least 1".to_string(),
            ));
        }
        if let Some(index) = self.min_var_index {
            if index >= 0 {
                return Err(ConfigError::Invalid(format!(
                    "min_var_index must be negative, got {index}"
                )));
            }
        }
        Ok(())
    }

    /// Reads and validates a config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::IoError {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: ModelConfig =
            serde_json::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.to_path_buf(),
                source: e,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Plain-suffix model with `factors` trees.
    pub fn build(&self) -> ctw_common::Result<FactoredModel> {
        self.validate()?;
        FactoredModel::with_max_depth(self.estimator, self.max_depth, self.factors)
    }

    pub fn selection_options(&self) -> SelectionOptions {
        SelectionOptions {
            min_relative_index: self.min_var_index,
            max_depth: self.selection_depth,
            missing_context: self.missing_context,
        }
    }
}

/// Configuration resolution options.
#[derive(Debug, Default)]
pub struct ConfigOptions {
    /// Explicit config file (highest priority).
    pub config_path: Option<PathBuf>,
}

/// Resolved configuration with provenance.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub model: ModelConfig,
    /// File the configuration came from (None if using defaults).
    pub path: Option<PathBuf>,
}

/// Load configuration with the standard resolution order.
pub fn load_config(options: &ConfigOptions) -> Result<ResolvedConfig, ConfigError> {
    // 1. Explicit option
    if let Some(path) = &options.config_path {
        return load_from(path.clone());
    }

    // 2. Environment variable
    if let Some(path) = std::env::var_os(CONFIG_ENV) {
        return load_from(PathBuf::from(path));
    }

    // 3. XDG config home
    if let Some(path) = default_config_path() {
        if path.exists() {
            return load_from(path);
        }
    }

    // 4. Defaults
    Ok(ResolvedConfig {
        model: ModelConfig::default(),
        path: None,
    })
}

fn load_from(path: PathBuf) -> Result<ResolvedConfig, ConfigError> {
    let model = ModelConfig::from_file(&path)?;
    Ok(ResolvedConfig {
        model,
        path: Some(path),
    })
}

/// `$XDG_CONFIG_HOME/ctw/config.json`, falling back to the platform config dir.
pub fn default_config_path() -> Option<PathBuf> {
    std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(dirs::config_dir)
        .map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}
