//! Stage identifiers and per-stage configuration.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::WorkflowError;

/// Free-form parameters handed to a stage alongside its input document.
pub type StageParams = HashMap<String, Value>;

/// The four well-known pipeline stages, in pipeline order.
///
/// `Ord` follows pipeline position, so sorting a set of kinds yields the
/// order the predefined modes run them in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Collector,
    Scholar,
    Creator,
    Adapter,
}

impl StageKind {
    /// Every stage in pipeline order.
    pub const ALL: [StageKind; 4] = [
        StageKind::Collector,
        StageKind::Scholar,
        StageKind::Creator,
        StageKind::Adapter,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StageKind::Collector => "collector",
            StageKind::Scholar => "scholar",
            StageKind::Creator => "creator",
            StageKind::Adapter => "adapter",
        }
    }

    /// Progress reported when this stage starts.
    ///
    /// Reflects pipeline position only, not an elapsed-time estimate.
    pub fn progress_weight(&self) -> u8 {
        match self {
            StageKind::Collector => 25,
            StageKind::Scholar => 50,
            StageKind::Creator => 75,
            StageKind::Adapter => 90,
        }
    }

    /// Name of the checkpoint taken after this stage completes.
    pub fn checkpoint_name(&self) -> String {
        format!("after_{}", self.as_str())
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StageKind {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "collector" => Ok(StageKind::Collector),
            "scholar" => Ok(StageKind::Scholar),
            "creator" => Ok(StageKind::Creator),
            "adapter" => Ok(StageKind::Adapter),
            other => Err(WorkflowError::UnknownStage(other.to_string())),
        }
    }
}

/// One entry of a workflow's stage list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageConfig {
    pub name: StageKind,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub parameters: StageParams,
}

fn default_enabled() -> bool {
    true
}

impl StageConfig {
    /// An enabled stage with no parameters.
    pub fn new(name: StageKind) -> Self {
        Self {
            name,
            enabled: true,
            parameters: StageParams::new(),
        }
    }

    /// Builder-style parameter insertion.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// Builder-style toggle.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_weights_increase_in_pipeline_order() {
        let weights: Vec<u8> = StageKind::ALL.iter().map(|s| s.progress_weight()).collect();
        assert_eq!(weights, vec![25, 50, 75, 90]);
    }

    #[test]
    fn test_ord_matches_pipeline_order() {
        let mut kinds = vec![StageKind::Adapter, StageKind::Collector, StageKind::Creator];
        kinds.sort();
        assert_eq!(
            kinds,
            vec![StageKind::Collector, StageKind::Creator, StageKind::Adapter]
        );
    }

    #[test]
    fn test_from_str_roundtrip_and_unknown() {
        for kind in StageKind::ALL {
            assert_eq!(kind.as_str().parse::<StageKind>().unwrap(), kind);
        }
        let err = "publisher".parse::<StageKind>().unwrap_err();
        assert_eq!(err, WorkflowError::UnknownStage("publisher".to_string()));
    }

    #[test]
    fn test_checkpoint_name() {
        assert_eq!(StageKind::Scholar.checkpoint_name(), "after_scholar");
    }

    #[test]
    fn test_stage_config_defaults() {
        let cfg: StageConfig = serde_json::from_str(r#"{"name":"creator"}"#).unwrap();
        assert_eq!(cfg.name, StageKind::Creator);
        assert!(cfg.enabled);
        assert!(cfg.parameters.is_empty());
    }

    #[test]
    fn test_stage_config_builder() {
        let cfg = StageConfig::new(StageKind::Collector)
            .with_param("maxSources", 4)
            .enabled(false);
        assert!(!cfg.enabled);
        assert_eq!(cfg.parameters["maxSources"], 4);
    }
}
