//! Event types for the Penstock workflow event bus.
//!
//! `WorkflowEvent` is the unified event broadcast during a run. Every event
//! carries the run id, a timestamp, its kind-specific payload, and a snapshot
//! of the run state at the moment it was emitted. All types are Clone + Send
//! + Sync for use with tokio broadcast channels.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::document::Document;
use crate::stage::StageKind;
use crate::workflow::{WorkflowMode, WorkflowState};

/// A lifecycle event emitted by the workflow engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowEvent {
    pub run_id: Uuid,
    pub emitted_at: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: WorkflowEventKind,
    /// Run state at emission time.
    pub snapshot: WorkflowState,
}

impl WorkflowEvent {
    /// Build an event for `snapshot`'s run.
    pub fn new(kind: WorkflowEventKind, snapshot: WorkflowState) -> Self {
        Self {
            run_id: snapshot.id,
            emitted_at: Utc::now(),
            kind,
            snapshot,
        }
    }

    /// Wire name of the event (e.g. `"agent:start"`).
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    /// The stage this event concerns, if any.
    pub fn stage(&self) -> Option<StageKind> {
        self.kind.stage()
    }
}

/// Event payloads, tagged by their wire name.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WorkflowEventKind {
    /// A run has started and its stage list is resolved.
    #[serde(rename = "workflow:start")]
    WorkflowStarted {
        mode: WorkflowMode,
        stages: Vec<StageKind>,
    },

    /// A stage is about to be invoked.
    #[serde(rename = "agent:start")]
    AgentStarted { stage: StageKind, progress: u8 },

    /// A stage resolved successfully.
    #[serde(rename = "agent:complete")]
    AgentCompleted {
        stage: StageKind,
        duration_ms: u64,
        output: Document,
    },

    /// A stage failed or timed out.
    #[serde(rename = "agent:error")]
    AgentFailed { stage: StageKind, error: String },

    /// A stage's output fell below its quality gate. Never fatal.
    #[serde(rename = "quality:warning")]
    QualityWarning {
        stage: StageKind,
        reason: String,
        output: Document,
    },

    /// A checkpoint was written after a stage.
    #[serde(rename = "checkpoint:saved")]
    CheckpointSaved { stage: StageKind, name: String },

    /// Recovery is being attempted for a failed stage.
    #[serde(rename = "recovery:attempt")]
    RecoveryAttempted { stage: StageKind },

    /// Recovery produced a substitute document.
    #[serde(rename = "recovery:success")]
    RecoverySucceeded { stage: StageKind, output: Document },

    /// Recovery had nothing to offer; the run will fail.
    #[serde(rename = "recovery:failed")]
    RecoveryFailed { stage: StageKind, error: String },

    /// The run completed successfully.
    #[serde(rename = "workflow:complete")]
    WorkflowCompleted { duration_ms: u64 },

    /// The run failed.
    #[serde(rename = "workflow:error")]
    WorkflowFailed { error: String },

    #[serde(rename = "workflow:paused")]
    WorkflowPaused,

    #[serde(rename = "workflow:resumed")]
    WorkflowResumed,

    #[serde(rename = "workflow:cancelled")]
    WorkflowCancelled,
}

impl WorkflowEventKind {
    pub fn name(&self) -> &'static str {
        match self {
            WorkflowEventKind::WorkflowStarted { .. } => "workflow:start",
            WorkflowEventKind::AgentStarted { .. } => "agent:start",
            WorkflowEventKind::AgentCompleted { .. } => "agent:complete",
            WorkflowEventKind::AgentFailed { .. } => "agent:error",
            WorkflowEventKind::QualityWarning { .. } => "quality:warning",
            WorkflowEventKind::CheckpointSaved { .. } => "checkpoint:saved",
            WorkflowEventKind::RecoveryAttempted { .. } => "recovery:attempt",
            WorkflowEventKind::RecoverySucceeded { .. } => "recovery:success",
            WorkflowEventKind::RecoveryFailed { .. } => "recovery:failed",
            WorkflowEventKind::WorkflowCompleted { .. } => "workflow:complete",
            WorkflowEventKind::WorkflowFailed { .. } => "workflow:error",
            WorkflowEventKind::WorkflowPaused => "workflow:paused",
            WorkflowEventKind::WorkflowResumed => "workflow:resumed",
            WorkflowEventKind::WorkflowCancelled => "workflow:cancelled",
        }
    }

    /// Returns the stage from variants that carry one, or None for
    /// run-scoped events.
    pub fn stage(&self) -> Option<StageKind> {
        match self {
            WorkflowEventKind::AgentStarted { stage, .. }
            | WorkflowEventKind::AgentCompleted { stage, .. }
            | WorkflowEventKind::AgentFailed { stage, .. }
            | WorkflowEventKind::QualityWarning { stage, .. }
            | WorkflowEventKind::CheckpointSaved { stage, .. }
            | WorkflowEventKind::RecoveryAttempted { stage }
            | WorkflowEventKind::RecoverySucceeded { stage, .. }
            | WorkflowEventKind::RecoveryFailed { stage, .. } => Some(*stage),

            WorkflowEventKind::WorkflowStarted { .. }
            | WorkflowEventKind::WorkflowCompleted { .. }
            | WorkflowEventKind::WorkflowFailed { .. }
            | WorkflowEventKind::WorkflowPaused
            | WorkflowEventKind::WorkflowResumed
            | WorkflowEventKind::WorkflowCancelled => None,
        }
    }
}
