//! Stage list resolution.
//!
//! `quick` and `standard` map to fixed four-stage lists with mode-specific
//! parameters; `custom` uses the caller's list as given.

use std::collections::HashSet;

use penstock_types::error::WorkflowError;
use penstock_types::stage::{StageConfig, StageKind};
use penstock_types::workflow::{WorkflowConfig, WorkflowMode, WorkflowOptions};
use serde_json::json;

/// Predefined stage list for `mode`, or `None` for `custom`.
pub fn predefined_stages(mode: WorkflowMode) -> Option<Vec<StageConfig>> {
    let stages = match mode {
        WorkflowMode::Quick => vec![
            StageConfig::new(StageKind::Collector)
                .with_param("maxSources", 3)
                .with_param("depth", "shallow"),
            StageConfig::new(StageKind::Scholar)
                .with_param("analysisDepth", "basic")
                .with_param("maxInsights", 3),
            StageConfig::new(StageKind::Creator)
                .with_param("targetLength", 600)
                .with_param("tone", "concise"),
            StageConfig::new(StageKind::Adapter).with_param("platforms", json!(["twitter"])),
        ],
        WorkflowMode::Standard => vec![
            StageConfig::new(StageKind::Collector)
                .with_param("maxSources", 5)
                .with_param("depth", "standard"),
            StageConfig::new(StageKind::Scholar)
                .with_param("analysisDepth", "deep")
                .with_param("maxInsights", 7),
            StageConfig::new(StageKind::Creator)
                .with_param("targetLength", 1500)
                .with_param("tone", "editorial"),
            StageConfig::new(StageKind::Adapter).with_param(
                "platforms",
                json!(["twitter", "linkedin", "newsletter"]),
            ),
        ],
        WorkflowMode::Custom => return None,
    };
    Some(stages)
}

/// Resolve the ordered stage list a run will walk.
///
/// Disabled stages are kept in the list; the engine skips them. A custom
/// list naming the same stage twice is rejected.
pub fn resolve_stages(config: &WorkflowConfig) -> Result<Vec<StageConfig>, WorkflowError> {
    if let Some(stages) = predefined_stages(config.mode) {
        if !config.stages.is_empty() {
            tracing::debug!(
                mode = config.mode.as_str(),
                ignored = config.stages.len(),
                "ignoring caller stages for predefined mode"
            );
        }
        return Ok(stages);
    }

    let mut seen = HashSet::new();
    for stage in &config.stages {
        if !seen.insert(stage.name) {
            return Err(WorkflowError::InvalidModeConfig(format!(
                "stage '{}' appears more than once in custom stage list",
                stage.name
            )));
        }
    }
    Ok(config.stages.clone())
}

/// Reject options the engine cannot honour.
pub fn validate_options(options: &WorkflowOptions) -> Result<(), WorkflowError> {
    if options.timeout_ms == Some(0) {
        return Err(WorkflowError::Config(
            "timeoutMs must be greater than zero (omit it to disable the timer)".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(stages: &[StageConfig]) -> Vec<StageKind> {
        stages.iter().map(|s| s.name).collect()
    }

    #[test]
    fn test_quick_mode_table() {
        let stages = resolve_stages(&WorkflowConfig::quick()).unwrap();
        assert_eq!(kinds(&stages), StageKind::ALL.to_vec());
        assert!(stages.iter().all(|s| s.enabled));
        assert_eq!(stages[0].parameters["maxSources"], 3);
        assert_eq!(stages[0].parameters["depth"], "shallow");
        assert_eq!(stages[2].parameters["tone"], "concise");
        assert_eq!(stages[3].parameters["platforms"], json!(["twitter"]));
    }

    #[test]
    fn test_standard_mode_table() {
        let stages = resolve_stages(&WorkflowConfig::standard()).unwrap();
        assert_eq!(kinds(&stages), StageKind::ALL.to_vec());
        assert_eq!(stages[1].parameters["analysisDepth"], "deep");
        assert_eq!(stages[1].parameters["maxInsights"], 7);
        assert_eq!(stages[2].parameters["targetLength"], 1500);
        assert_eq!(
            stages[3].parameters["platforms"],
            json!(["twitter", "linkedin", "newsletter"])
        );
    }

    #[test]
    fn test_predefined_mode_ignores_caller_stages() {
        let mut config = WorkflowConfig::quick();
        config.stages = vec![StageConfig::new(StageKind::Adapter)];
        let stages = resolve_stages(&config).unwrap();
        assert_eq!(stages.len(), 4);
    }

    #[test]
    fn test_custom_mode_is_verbatim() {
        let config = WorkflowConfig::custom(vec![
            StageConfig::new(StageKind::Scholar).with_param("k", "v"),
            StageConfig::new(StageKind::Collector).enabled(false),
        ]);
        let stages = resolve_stages(&config).unwrap();
        assert_eq!(kinds(&stages), vec![StageKind::Scholar, StageKind::Collector]);
        assert!(!stages[1].enabled);
        assert_eq!(stages[0].parameters["k"], "v");
    }

    #[test]
    fn test_custom_empty_list_is_valid() {
        let stages = resolve_stages(&WorkflowConfig::custom(vec![])).unwrap();
        assert!(stages.is_empty());
    }

    #[test]
    fn test_custom_duplicate_rejected() {
        let config = WorkflowConfig::custom(vec![
            StageConfig::new(StageKind::Creator),
            StageConfig::new(StageKind::Creator).enabled(false),
        ]);
        let err = resolve_stages(&config).unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidModeConfig(msg) if msg.contains("creator")));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let options = WorkflowOptions {
            timeout_ms: Some(0),
            ..Default::default()
        };
        assert!(matches!(
            validate_options(&options),
            Err(WorkflowError::Config(_))
        ));

        let options = WorkflowOptions {
            timeout_ms: None,
            ..Default::default()
        };
        assert!(validate_options(&options).is_ok());
    }
}
