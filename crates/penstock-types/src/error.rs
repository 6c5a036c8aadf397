use thiserror::Error;
use uuid::Uuid;

use crate::stage::StageKind;
use crate::workflow::WorkflowStatus;

/// Errors surfaced by a workflow run.
///
/// `Clone` so the error can travel inside a `WorkflowResult` and be rendered
/// into lifecycle events without giving up ownership.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WorkflowError {
    /// A stage's future resolved to an error.
    #[error("stage '{stage}' failed: {message}")]
    StageExecution { stage: StageKind, message: String },

    /// A stage did not settle within `options.timeout_ms`.
    #[error("stage '{stage}' timed out after {timeout_ms}ms")]
    StageTimeout { stage: StageKind, timeout_ms: u64 },

    /// The recovery manager had nothing to offer for a failed stage.
    #[error("recovery exhausted for stage '{stage}': {source}")]
    RecoveryExhausted {
        stage: StageKind,
        #[source]
        source: Box<WorkflowError>,
    },

    /// Stage name is not one of the known stages, or has no implementation.
    #[error("unknown stage: '{0}'")]
    UnknownStage(String),

    /// Mode outside `quick|standard|custom`, or an unusable stage list.
    #[error("invalid mode config: {0}")]
    InvalidModeConfig(String),

    /// A control call was made from a status that does not allow it.
    #[error("invalid transition from '{from}' to '{to}'")]
    InvalidTransition {
        from: WorkflowStatus,
        to: WorkflowStatus,
    },

    /// No active run with this id.
    #[error("workflow run not found: {0}")]
    RunNotFound(Uuid),

    /// The run was cancelled before it could finish.
    #[error("workflow cancelled")]
    Cancelled,

    /// Config parse or validation failure.
    #[error("config error: {0}")]
    Config(String),
}

impl WorkflowError {
    /// The stage this error is attributed to, if any.
    pub fn stage(&self) -> Option<StageKind> {
        match self {
            WorkflowError::StageExecution { stage, .. }
            | WorkflowError::StageTimeout { stage, .. }
            | WorkflowError::RecoveryExhausted { stage, .. } => Some(*stage),
            WorkflowError::UnknownStage(_)
            | WorkflowError::InvalidModeConfig(_)
            | WorkflowError::InvalidTransition { .. }
            | WorkflowError::RunNotFound(_)
            | WorkflowError::Cancelled
            | WorkflowError::Config(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_execution_display() {
        let err = WorkflowError::StageExecution {
            stage: StageKind::Creator,
            message: "model overloaded".to_string(),
        };
        assert_eq!(err.to_string(), "stage 'creator' failed: model overloaded");
    }

    #[test]
    fn test_recovery_exhausted_surfaces_original_error() {
        let original = WorkflowError::StageExecution {
            stage: StageKind::Creator,
            message: "boom".to_string(),
        };
        let err = WorkflowError::RecoveryExhausted {
            stage: StageKind::Creator,
            source: Box::new(original.clone()),
        };
        assert!(err.to_string().contains("boom"));
        assert!(err.to_string().contains("creator"));

        let source = std::error::Error::source(&err).map(|s| s.to_string());
        assert_eq!(source, Some(original.to_string()));
    }

    #[test]
    fn test_invalid_transition_display() {
        let err = WorkflowError::InvalidTransition {
            from: WorkflowStatus::Completed,
            to: WorkflowStatus::Paused,
        };
        assert_eq!(
            err.to_string(),
            "invalid transition from 'completed' to 'paused'"
        );
    }

    #[test]
    fn test_stage_attribution() {
        let err = WorkflowError::StageTimeout {
            stage: StageKind::Scholar,
            timeout_ms: 10,
        };
        assert_eq!(err.stage(), Some(StageKind::Scholar));
        assert_eq!(WorkflowError::Cancelled.stage(), None);
    }
}
