//! Workflow configuration, run state, and run results.
//!
//! `WorkflowConfig` is the external config surface (camelCase keys, matching
//! the YAML/TOML files operators write). `WorkflowState` is the per-run state
//! owned by the engine; every `execute()` call starts from a fresh one.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::document::Document;
use crate::error::WorkflowError;
use crate::metrics::WorkflowMetrics;
use crate::stage::{StageConfig, StageKind};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// How the stage list of a run is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowMode {
    /// Predefined four-stage list with light parameters.
    Quick,
    /// Predefined four-stage list with thorough parameters.
    Standard,
    /// Caller-supplied stage list, used verbatim.
    Custom,
}

impl WorkflowMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowMode::Quick => "quick",
            WorkflowMode::Standard => "standard",
            WorkflowMode::Custom => "custom",
        }
    }
}

impl fmt::Display for WorkflowMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkflowMode {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "quick" => Ok(WorkflowMode::Quick),
            "standard" => Ok(WorkflowMode::Standard),
            "custom" => Ok(WorkflowMode::Custom),
            other => Err(WorkflowError::InvalidModeConfig(format!(
                "unknown mode '{other}' (expected quick, standard or custom)"
            ))),
        }
    }
}

/// Run-wide options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowOptions {
    /// Snapshot state into the checkpoint store after each successful stage.
    #[serde(default = "default_true")]
    pub save_checkpoints: bool,
    /// Reserved. Accepted and carried, never consumed: stages always run
    /// one at a time.
    #[serde(default)]
    pub parallel: bool,
    /// Per-stage timeout in milliseconds. `None` disables the timer.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: Option<u64>,
    /// Evaluate the soft quality gate after each successful stage.
    #[serde(default = "default_true")]
    pub quality_gates_enabled: bool,
}

/// Default per-stage timeout (5 minutes).
pub const DEFAULT_STAGE_TIMEOUT_MS: u64 = 300_000;

fn default_true() -> bool {
    true
}

fn default_timeout_ms() -> Option<u64> {
    Some(DEFAULT_STAGE_TIMEOUT_MS)
}

impl Default for WorkflowOptions {
    fn default() -> Self {
        Self {
            save_checkpoints: true,
            parallel: false,
            timeout_ms: default_timeout_ms(),
            quality_gates_enabled: true,
        }
    }
}

impl WorkflowOptions {
    /// The per-stage timeout as a `Duration`.
    pub fn stage_timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

/// Top-level configuration for a single `execute()` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowConfig {
    pub mode: WorkflowMode,
    /// Only consulted in `custom` mode.
    #[serde(default)]
    pub stages: Vec<StageConfig>,
    #[serde(default)]
    pub options: WorkflowOptions,
}

impl WorkflowConfig {
    pub fn quick() -> Self {
        Self {
            mode: WorkflowMode::Quick,
            stages: Vec::new(),
            options: WorkflowOptions::default(),
        }
    }

    pub fn standard() -> Self {
        Self {
            mode: WorkflowMode::Standard,
            stages: Vec::new(),
            options: WorkflowOptions::default(),
        }
    }

    pub fn custom(stages: Vec<StageConfig>) -> Self {
        Self {
            mode: WorkflowMode::Custom,
            stages,
            options: WorkflowOptions::default(),
        }
    }

    /// Builder-style options override.
    pub fn with_options(mut self, options: WorkflowOptions) -> Self {
        self.options = options;
        self
    }
}

// ---------------------------------------------------------------------------
// Status state machine
// ---------------------------------------------------------------------------

/// Run status.
///
/// `idle -> running -> {paused <-> running} -> {completed | failed}`.
/// `completed` and `failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Idle,
    Running,
    Paused,
    Completed,
    Failed,
}

impl WorkflowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStatus::Idle => "idle",
            WorkflowStatus::Running => "running",
            WorkflowStatus::Paused => "paused",
            WorkflowStatus::Completed => "completed",
            WorkflowStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowStatus::Completed | WorkflowStatus::Failed)
    }

    /// Whether `self -> next` is an edge of the state machine.
    pub fn can_transition_to(&self, next: WorkflowStatus) -> bool {
        use WorkflowStatus::*;
        matches!(
            (self, next),
            (Idle, Running)
                | (Idle, Failed)
                | (Running, Paused)
                | (Running, Completed)
                | (Running, Failed)
                | (Paused, Running)
                | (Paused, Failed)
        )
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Run state
// ---------------------------------------------------------------------------

/// A stage failure recorded on the run state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageFailure {
    pub stage: StageKind,
    pub message: String,
    /// Whether recovery substituted a document for this failure.
    pub recovered: bool,
    pub timestamp: DateTime<Utc>,
}

/// The state of one workflow run.
///
/// All fields are owned data, so `clone()` is a full structural copy. That
/// is what the checkpoint store relies on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    pub id: Uuid,
    pub status: WorkflowStatus,
    pub mode: WorkflowMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_stage: Option<StageKind>,
    /// 0..=100, non-decreasing within a run.
    pub progress: u8,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub documents: HashMap<StageKind, Document>,
    /// Stages whose document was written, in the order they were written.
    #[serde(default)]
    pub completed_stages: Vec<StageKind>,
    #[serde(default)]
    pub errors: Vec<StageFailure>,
    #[serde(default)]
    pub metrics: WorkflowMetrics,
}

impl WorkflowState {
    /// A state that has not started yet.
    pub fn idle(mode: WorkflowMode) -> Self {
        Self {
            id: Uuid::now_v7(),
            status: WorkflowStatus::Idle,
            mode,
            current_stage: None,
            progress: 0,
            start_time: Utc::now(),
            end_time: None,
            documents: HashMap::new(),
            completed_stages: Vec::new(),
            errors: Vec::new(),
            metrics: WorkflowMetrics::default(),
        }
    }

    /// A fresh running state for a new run.
    pub fn start(id: Uuid, mode: WorkflowMode) -> Self {
        Self {
            id,
            status: WorkflowStatus::Running,
            start_time: Utc::now(),
            ..Self::idle(mode)
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Move to `next`, rejecting edges the state machine does not have.
    ///
    /// Entering a terminal status stamps `end_time`.
    pub fn transition(&mut self, next: WorkflowStatus) -> Result<(), WorkflowError> {
        if !self.status.can_transition_to(next) {
            return Err(WorkflowError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        if next.is_terminal() {
            self.end_time = Some(Utc::now());
        }
        Ok(())
    }

    /// Raise progress to `value`, never lowering it.
    pub fn advance_progress(&mut self, value: u8) {
        self.progress = self.progress.max(value.min(100));
    }

    /// Store a stage's document. A second write for the same stage replaces
    /// the document without duplicating the stage in `completed_stages`.
    pub fn record_document(&mut self, stage: StageKind, document: Document) {
        if self.documents.insert(stage, document).is_none() {
            self.completed_stages.push(stage);
        }
    }

    /// The most recent stage that produced a document.
    pub fn last_completed_stage(&self) -> Option<StageKind> {
        self.completed_stages.last().copied()
    }

    /// The document of the most recent completed stage.
    pub fn last_document(&self) -> Option<&Document> {
        self.last_completed_stage()
            .and_then(|stage| self.documents.get(&stage))
    }
}

// ---------------------------------------------------------------------------
// Result
// ---------------------------------------------------------------------------

/// Outcome of a call to `execute()`. Always produced, never an `Err`.
#[derive(Debug, Clone)]
pub struct WorkflowResult {
    pub success: bool,
    /// Final state, including partial documents on failure.
    pub state: WorkflowState,
    /// Document of the last stage that ran, on success.
    pub final_output: Option<Document>,
    pub error: Option<WorkflowError>,
}

impl WorkflowResult {
    pub fn completed(state: WorkflowState) -> Self {
        let final_output = state.last_document().cloned();
        Self {
            success: true,
            state,
            final_output,
            error: None,
        }
    }

    pub fn failed(state: WorkflowState, error: WorkflowError) -> Self {
        Self {
            success: false,
            state,
            final_output: None,
            error: Some(error),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
