//! Workflow config parsing, validation, and file loading.
//!
//! Converts YAML or TOML documents into a validated `WorkflowConfig`. Mode
//! and stage names are read as plain strings first so that a bad value
//! surfaces as `InvalidModeConfig` / `UnknownStage` rather than a generic
//! deserialization error.

use std::path::Path;

use penstock_types::error::WorkflowError;
use penstock_types::stage::{StageConfig, StageParams};
use penstock_types::workflow::{WorkflowConfig, WorkflowMode, WorkflowOptions};
use serde::Deserialize;
use thiserror::Error;

use crate::workflow::resolve::{resolve_stages, validate_options};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors that can occur while loading a workflow config.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// YAML/TOML parse failure.
    #[error("parse error: {0}")]
    Parse(String),

    /// Parsed, but not a usable config.
    #[error(transparent)]
    Invalid(#[from] WorkflowError),

    #[error("unsupported config format: {0}")]
    UnsupportedFormat(String),

    /// Filesystem I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ConfigError> for WorkflowError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Invalid(inner) => inner,
            other => WorkflowError::Config(other.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Raw surface
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawWorkflowConfig {
    mode: String,
    #[serde(default)]
    stages: Vec<RawStageConfig>,
    #[serde(default)]
    options: WorkflowOptions,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawStageConfig {
    name: String,
    #[serde(default = "default_enabled")]
    enabled: bool,
    #[serde(default)]
    parameters: StageParams,
}

fn default_enabled() -> bool {
    true
}

impl RawWorkflowConfig {
    fn into_config(self) -> Result<WorkflowConfig, ConfigError> {
        let mode: WorkflowMode = self.mode.parse()?;
        let stages = self
            .stages
            .into_iter()
            .map(|raw| -> Result<StageConfig, WorkflowError> {
                Ok(StageConfig {
                    name: raw.name.parse()?,
                    enabled: raw.enabled,
                    parameters: raw.parameters,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let config = WorkflowConfig {
            mode,
            stages,
            options: self.options,
        };
        validate_workflow_config(&config)?;
        Ok(config)
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parse a YAML string into a validated `WorkflowConfig`.
pub fn parse_workflow_config_yaml(yaml: &str) -> Result<WorkflowConfig, ConfigError> {
    let raw: RawWorkflowConfig =
        serde_yaml_ng::from_str(yaml).map_err(|e| ConfigError::Parse(e.to_string()))?;
    raw.into_config()
}

/// Parse a TOML string into a validated `WorkflowConfig`.
///
/// TOML has no null, so the stage timer cannot be disabled from TOML;
/// omitting `timeoutMs` keeps the default.
pub fn parse_workflow_config_toml(toml_str: &str) -> Result<WorkflowConfig, ConfigError> {
    let raw: RawWorkflowConfig =
        toml::from_str(toml_str).map_err(|e| ConfigError::Parse(e.to_string()))?;
    raw.into_config()
}

/// Serialize a `WorkflowConfig` to a YAML string.
pub fn serialize_workflow_config_yaml(config: &WorkflowConfig) -> Result<String, ConfigError> {
    serde_yaml_ng::to_string(config).map_err(|e| ConfigError::Parse(e.to_string()))
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate a config the same way the engine will before running it.
///
/// Checks:
/// - `timeoutMs` is not zero
/// - a custom stage list names each stage at most once
pub fn validate_workflow_config(config: &WorkflowConfig) -> Result<(), WorkflowError> {
    validate_options(&config.options)?;
    resolve_stages(config)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Filesystem operations
// ---------------------------------------------------------------------------

/// Load a workflow config file, picking the format from its extension
/// (`.yaml`, `.yml` or `.toml`).
pub fn load_workflow_config(path: &Path) -> Result<WorkflowConfig, ConfigError> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();

    match extension.as_str() {
        "yaml" | "yml" => {
            let content = std::fs::read_to_string(path)?;
            parse_workflow_config_yaml(&content)
        }
        "toml" => {
            let content = std::fs::read_to_string(path)?;
            parse_workflow_config_toml(&content)
        }
        _ => Err(ConfigError::UnsupportedFormat(path.display().to_string())),
    }
}

/// Save a workflow config as YAML.
///
/// Creates parent directories if they don't exist.
pub fn save_workflow_config(path: &Path, config: &WorkflowConfig) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let yaml = serialize_workflow_config_yaml(config)?;
    std::fs::write(path, yaml)?;
    Ok(())
}
