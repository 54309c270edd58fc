//! ---
//! rfn_section: "01-core-functionality"
//! rfn_subsection: "module"
//! rfn_type: "source"
//! rfn_scope: "code"
//! rfn_description: "Shared primitives and utilities for the function runtime."
//! rfn_version: "v0.0.0-prealpha"
//! rfn_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::logging::LogFormat;

fn default_log_format() -> LogFormat {
    LogFormat::StructuredJson
}

fn default_metrics_enabled() -> bool {
    true
}

/// Runtime configuration for a deployed function.
///
/// Every section is optional; a function deployed without any file runs on
/// the defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Metadata describing where a [`RuntimeConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedRuntimeConfig {
    pub config: RuntimeConfig,
    /// `None` when no file was found and defaults apply.
    pub source: Option<PathBuf>,
}

impl RuntimeConfig {
    pub const ENV_CONFIG_PATH: &str = "R_FN_CONFIG";

    /// Load configuration from disk, respecting the `R_FN_CONFIG` override.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        Ok(Self::load_with_source(candidates)?.config)
    }

    /// Load configuration together with the effective source path.
    ///
    /// An explicit `R_FN_CONFIG` path must exist. Missing candidates are
    /// skipped and the defaults apply when none of them exist.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedRuntimeConfig> {
        let env_override = std::env::var(Self::ENV_CONFIG_PATH).ok();
        Self::resolve(env_override.as_deref(), candidates)
    }

    fn resolve<P: AsRef<Path>>(
        env_override: Option<&str>,
        candidates: &[P],
    ) -> Result<LoadedRuntimeConfig> {
        if let Some(env_path) = env_override {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(&path)?;
                return Ok(LoadedRuntimeConfig {
                    config,
                    source: Some(path),
                });
            }
        }

        for candidate in candidates {
            let path = candidate.as_ref();
            if path.exists() {
                let config = Self::from_path(path)?;
                return Ok(LoadedRuntimeConfig {
                    config,
                    source: Some(path.to_path_buf()),
                });
            }
        }

        debug!("no configuration file found; using defaults");
        Ok(LoadedRuntimeConfig {
            config: RuntimeConfig::default(),
            source: None,
        })
    }

    fn from_path(path: &Path) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        contents
            .parse()
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }
}

impl std::str::FromStr for RuntimeConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        toml::from_str(content).with_context(|| "failed to parse configuration")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoggingConfig {
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    /// Directory for the rolling daily log file. Stdout only when unset.
    #[serde(default)]
    pub directory: Option<PathBuf>,
    #[serde(default)]
    pub file_prefix: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: default_log_format(),
            directory: None,
            file_prefix: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DispatchConfig {
    #[serde(default)]
    pub bind_failure: BindFailurePolicy,
}

/// What happens to a message whose payload does not fit the declared schema.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum BindFailurePolicy {
    /// Route the message to the failure list with the bind error.
    #[default]
    Reject,
    /// Log the bind error and hand the handler a default record. Fields that
    /// did decode before the error are discarded, not carried over.
    Lenient,
}

impl std::str::FromStr for BindFailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "reject" => Ok(BindFailurePolicy::Reject),
            "lenient" => Ok(BindFailurePolicy::Lenient),
            other => Err(format!("unknown bind failure policy: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
        }
    }
}
