//! Workflow engine: sequential stage execution with soft gates, recovery and
//! checkpointing.
//!
//! # Execution flow
//!
//! 1. Move the run's handle to `running` and resolve the stage list.
//! 2. Fail fast if an enabled stage has no registered implementation.
//! 3. For each enabled stage: hold while paused, bump progress, call the
//!    stage under its timeout, then record output, evaluate the gate and
//!    checkpoint, or offer the failure to the recovery manager.
//! 4. On success mark the run `completed` with progress 100.
//!
//! `execute` never returns an error. Every failure path resolves to a
//! `WorkflowResult` with `success == false` and the partial state.

use std::ops::ControlFlow;
use std::time::{Duration, Instant};

use chrono::Utc;
use dashmap::DashMap;
use penstock_types::document::Document;
use penstock_types::error::WorkflowError;
use penstock_types::event::{WorkflowEvent, WorkflowEventKind};
use penstock_types::metrics::WorkflowMetrics;
use penstock_types::stage::{StageConfig, StageKind, StageParams};
use penstock_types::workflow::{
    StageFailure, WorkflowConfig, WorkflowOptions, WorkflowResult, WorkflowState, WorkflowStatus,
};
use tokio::sync::broadcast;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::event::EventBus;
use crate::stage::StageRegistry;

use super::checkpoint::CheckpointStore;
use super::gate::QualityGateEvaluator;
use super::handle::RunHandle;
use super::metrics::{MetricsAggregator, duration_ms};
use super::recovery::RecoveryManager;
use super::resolve::{resolve_stages, validate_options};

// ---------------------------------------------------------------------------
// WorkflowEngine
// ---------------------------------------------------------------------------

/// Runs content pipelines over a fixed set of registered stages.
///
/// The engine itself holds no per-run state: each run lives in its own
/// [`RunHandle`], so concurrent `execute` calls never share state.
pub struct WorkflowEngine {
    registry: StageRegistry,
    recovery: RecoveryManager,
    checkpoints: CheckpointStore,
    event_bus: EventBus,
    /// Handles of runs currently inside `execute_with`, keyed by run id.
    runs: DashMap<Uuid, RunHandle>,
}

impl WorkflowEngine {
    /// Create an engine with default recovery, a fresh checkpoint store and
    /// its own event bus.
    pub fn new(registry: StageRegistry) -> Self {
        Self {
            registry,
            recovery: RecoveryManager::new(),
            checkpoints: CheckpointStore::new(),
            event_bus: EventBus::default(),
            runs: DashMap::new(),
        }
    }

    pub fn with_recovery(mut self, recovery: RecoveryManager) -> Self {
        self.recovery = recovery;
        self
    }

    /// Share an existing checkpoint store.
    pub fn with_checkpoint_store(mut self, checkpoints: CheckpointStore) -> Self {
        self.checkpoints = checkpoints;
        self
    }

    /// Publish onto an existing event bus.
    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = event_bus;
        self
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Subscribe to lifecycle events of every run on this engine.
    pub fn subscribe(&self) -> broadcast::Receiver<WorkflowEvent> {
        self.event_bus.subscribe()
    }

    pub fn checkpoints(&self) -> &CheckpointStore {
        &self.checkpoints
    }

    /// A fresh copy of the state saved under `name` (e.g. `after_scholar`).
    pub fn load_checkpoint(&self, name: &str) -> Option<WorkflowState> {
        self.checkpoints.load(name)
    }

    // -----------------------------------------------------------------------
    // Run control
    // -----------------------------------------------------------------------

    /// Create an idle run handle to pass to [`execute_with`](Self::execute_with).
    ///
    /// The engine tracks the handle by id only while it executes; before
    /// that, control it through the handle itself.
    pub fn new_run(&self) -> RunHandle {
        RunHandle::new(self.event_bus.clone())
    }

    /// Handle of an executing run.
    pub fn run(&self, run_id: Uuid) -> Option<RunHandle> {
        self.runs.get(&run_id).map(|entry| entry.value().clone())
    }

    /// Ids of runs currently executing.
    pub fn active_runs(&self) -> Vec<Uuid> {
        self.runs.iter().map(|entry| *entry.key()).collect()
    }

    pub fn pause(&self, run_id: Uuid) -> Result<(), WorkflowError> {
        self.require_run(run_id)?.pause()
    }

    pub fn resume(&self, run_id: Uuid) -> Result<(), WorkflowError> {
        self.require_run(run_id)?.resume()
    }

    pub fn cancel(&self, run_id: Uuid) -> Result<(), WorkflowError> {
        self.require_run(run_id)?.cancel()
    }

    pub fn get_state(&self, run_id: Uuid) -> Option<WorkflowState> {
        self.run(run_id).map(|handle| handle.state())
    }

    pub fn get_metrics(&self, run_id: Uuid) -> Option<WorkflowMetrics> {
        self.run(run_id).map(|handle| handle.metrics())
    }

    fn require_run(&self, run_id: Uuid) -> Result<RunHandle, WorkflowError> {
        self.run(run_id).ok_or(WorkflowError::RunNotFound(run_id))
    }

    // -----------------------------------------------------------------------
    // Execution
    // -----------------------------------------------------------------------

    /// Run `input` through the pipeline described by `config`.
    pub async fn execute(&self, input: &str, config: &WorkflowConfig) -> WorkflowResult {
        let handle = self.new_run();
        self.execute_with(&handle, input, config).await
    }

    /// Like [`execute`](Self::execute), on a handle from [`new_run`](Self::new_run).
    pub async fn execute_with(
        &self,
        handle: &RunHandle,
        input: &str,
        config: &WorkflowConfig,
    ) -> WorkflowResult {
        let run_id = handle.id();
        self.runs.insert(run_id, handle.clone());
        let result = self.run_pipeline(handle, input, config).await;
        self.runs.remove(&run_id);
        result
    }

    async fn run_pipeline(
        &self,
        handle: &RunHandle,
        input: &str,
        config: &WorkflowConfig,
    ) -> WorkflowResult {
        let state = match handle.begin(config.mode) {
            Ok(state) => state,
            Err(err) => {
                warn!(run_id = %handle.id(), error = %err, "workflow could not start");
                return WorkflowResult::failed(handle.state(), err);
            }
        };
        let run_id = state.id;

        let stages = match self.plan(config) {
            Ok(stages) => stages,
            Err(err) => return self.fail_run(handle, err),
        };

        let enabled: Vec<StageKind> = stages.iter().filter(|s| s.enabled).map(|s| s.name).collect();
        info!(
            run_id = %run_id,
            mode = config.mode.as_str(),
            stages = ?enabled,
            "workflow started"
        );
        self.emit(
            WorkflowEventKind::WorkflowStarted {
                mode: config.mode,
                stages: enabled,
            },
            state,
        );

        let timeout = config.options.stage_timeout();
        let run_input = Document::input(input);
        let mut current = run_input.clone();

        for stage in &stages {
            let kind = stage.name;
            if !stage.enabled {
                debug!(run_id = %run_id, stage = kind.as_str(), "stage disabled, skipping");
                continue;
            }

            handle.wait_while_paused().await;
            let Some(snapshot) = handle.apply(|s| {
                s.current_stage = Some(kind);
                s.advance_progress(kind.progress_weight());
            }) else {
                return self.cancelled(handle);
            };
            debug!(
                run_id = %run_id,
                stage = kind.as_str(),
                progress = snapshot.progress,
                "stage starting"
            );
            // `current` is the run input until some stage has produced output.
            let has_output = !snapshot.completed_stages.is_empty();
            self.emit(
                WorkflowEventKind::AgentStarted {
                    stage: kind,
                    progress: snapshot.progress,
                },
                snapshot,
            );

            let started = Instant::now();
            let outcome = self
                .invoke(run_id, kind, &current, &stage.parameters, timeout)
                .await;
            let elapsed = started.elapsed();

            if handle.is_cancelled() {
                debug!(
                    run_id = %run_id,
                    stage = kind.as_str(),
                    "run cancelled while stage was in flight, discarding result"
                );
                return self.cancelled(handle);
            }

            let next = match outcome {
                Ok(output) => self.complete_stage(handle, kind, output, elapsed, &config.options),
                Err(err) => {
                    let last_good = has_output.then_some(&current);
                    self.recover_stage(
                        handle,
                        kind,
                        err,
                        last_good,
                        &run_input,
                        elapsed,
                        &config.options,
                    )
                }
            };
            current = match next {
                ControlFlow::Continue(document) => document,
                ControlFlow::Break(result) => return result,
            };
        }

        self.finish_run(handle).await
    }

    /// Resolve the stage list and check every enabled stage can run.
    fn plan(&self, config: &WorkflowConfig) -> Result<Vec<StageConfig>, WorkflowError> {
        validate_options(&config.options)?;
        if config.options.parallel {
            debug!("parallel option is reserved; stages run sequentially");
        }

        let stages = resolve_stages(config)?;
        if let Some(missing) = stages
            .iter()
            .filter(|s| s.enabled)
            .find(|s| !self.registry.contains(s.name))
        {
            return Err(WorkflowError::UnknownStage(missing.name.to_string()));
        }
        Ok(stages)
    }

    /// Call one stage under its timeout, inside a tracing span.
    async fn invoke(
        &self,
        run_id: Uuid,
        kind: StageKind,
        input: &Document,
        params: &StageParams,
        timeout: Option<Duration>,
    ) -> Result<Document, WorkflowError> {
        let stage = self
            .registry
            .get(kind)
            .ok_or_else(|| WorkflowError::UnknownStage(kind.to_string()))?;

        let span = info_span!(
            "penstock.stage",
            run_id = %run_id,
            stage = kind.as_str(),
            implementation = stage.type_name(),
        );
        let call = stage.process(input, params).instrument(span);

        let result = match timeout {
            Some(limit) => tokio::time::timeout(limit, call).await.map_err(|_| {
                WorkflowError::StageTimeout {
                    stage: kind,
                    timeout_ms: duration_ms(limit),
                }
            })?,
            None => call.await,
        };

        result.map_err(|err| WorkflowError::StageExecution {
            stage: kind,
            message: err.to_string(),
        })
    }

    /// Record a successful stage output, then gate and checkpoint it.
    fn complete_stage(
        &self,
        handle: &RunHandle,
        kind: StageKind,
        output: Document,
        elapsed: Duration,
        options: &WorkflowOptions,
    ) -> ControlFlow<WorkflowResult, Document> {
        let Some(snapshot) = handle.apply(|s| {
            MetricsAggregator::record_duration(&mut s.metrics, kind, elapsed);
            MetricsAggregator::record_output(&mut s.metrics, kind, &output);
            s.record_document(kind, output.clone());
        }) else {
            return ControlFlow::Break(self.cancelled(handle));
        };

        let elapsed_ms = duration_ms(elapsed);
        debug!(
            run_id = %snapshot.id,
            stage = kind.as_str(),
            duration_ms = elapsed_ms,
            "stage completed"
        );
        self.emit(
            WorkflowEventKind::AgentCompleted {
                stage: kind,
                duration_ms: elapsed_ms,
                output: output.clone(),
            },
            snapshot.clone(),
        );

        self.check_gate(kind, &output, &snapshot, options);

        if options.save_checkpoints {
            let name = kind.checkpoint_name();
            self.checkpoints.save(name.clone(), &snapshot);
            self.emit(
                WorkflowEventKind::CheckpointSaved { stage: kind, name },
                snapshot,
            );
        }

        ControlFlow::Continue(output)
    }

    /// Emit `quality:warning` when `output` fails its stage's gate.
    fn check_gate(
        &self,
        kind: StageKind,
        output: &Document,
        snapshot: &WorkflowState,
        options: &WorkflowOptions,
    ) {
        if !options.quality_gates_enabled {
            return;
        }
        let gate = QualityGateEvaluator::evaluate(kind, output);
        if gate.passed {
            return;
        }
        let reason = gate.reason.unwrap_or_default();
        warn!(
            run_id = %snapshot.id,
            stage = kind.as_str(),
            reason = %reason,
            "quality gate failed"
        );
        self.emit(
            WorkflowEventKind::QualityWarning {
                stage: kind,
                reason,
                output: output.clone(),
            },
            snapshot.clone(),
        );
    }

    /// Record a stage failure and offer it to the recovery manager.
    ///
    /// A recovered document goes through the same scoring and gate as a
    /// stage output, but is never checkpointed.
    #[allow(clippy::too_many_arguments)]
    fn recover_stage(
        &self,
        handle: &RunHandle,
        kind: StageKind,
        err: WorkflowError,
        last_good: Option<&Document>,
        run_input: &Document,
        elapsed: Duration,
        options: &WorkflowOptions,
    ) -> ControlFlow<WorkflowResult, Document> {
        let message = err.to_string();
        let Some(snapshot) = handle.apply(|s| {
            MetricsAggregator::record_duration(&mut s.metrics, kind, elapsed);
            MetricsAggregator::record_failure(&mut s.metrics);
            s.errors.push(StageFailure {
                stage: kind,
                message: message.clone(),
                recovered: false,
                timestamp: Utc::now(),
            });
        }) else {
            return ControlFlow::Break(self.cancelled(handle));
        };

        warn!(
            run_id = %snapshot.id,
            stage = kind.as_str(),
            error = %message,
            "stage failed, attempting recovery"
        );
        self.emit(
            WorkflowEventKind::AgentFailed {
                stage: kind,
                error: message.clone(),
            },
            snapshot.clone(),
        );
        self.emit(WorkflowEventKind::RecoveryAttempted { stage: kind }, snapshot);

        let Some(recovered) = self.recovery.attempt_recovery(kind, last_good, run_input) else {
            self.emit(
                WorkflowEventKind::RecoveryFailed {
                    stage: kind,
                    error: message,
                },
                handle.state(),
            );
            return ControlFlow::Break(self.fail_run(
                handle,
                WorkflowError::RecoveryExhausted {
                    stage: kind,
                    source: Box::new(err),
                },
            ));
        };

        let Some(snapshot) = handle.apply(|s| {
            if let Some(failure) = s.errors.last_mut() {
                failure.recovered = true;
            }
            MetricsAggregator::record_score(&mut s.metrics, kind, &recovered);
            s.record_document(kind, recovered.clone());
        }) else {
            return ControlFlow::Break(self.cancelled(handle));
        };
        self.emit(
            WorkflowEventKind::RecoverySucceeded {
                stage: kind,
                output: recovered.clone(),
            },
            snapshot.clone(),
        );
        self.check_gate(kind, &recovered, &snapshot, options);

        ControlFlow::Continue(recovered)
    }

    /// Mark the run completed once it is not paused.
    async fn finish_run(&self, handle: &RunHandle) -> WorkflowResult {
        let state = loop {
            handle.wait_while_paused().await;

            let mut paused = false;
            let finished = handle.apply(|s| {
                if s.status == WorkflowStatus::Paused {
                    paused = true;
                    return;
                }
                if let Err(err) = s.transition(WorkflowStatus::Completed) {
                    warn!(run_id = %s.id, error = %err, "unexpected status at completion");
                    return;
                }
                s.progress = 100;
                if let Some(end) = s.end_time {
                    MetricsAggregator::finish(&mut s.metrics, s.start_time, end);
                }
            });

            match finished {
                _ if paused => continue,
                Some(state) => break state,
                None => return self.cancelled(handle),
            }
        };

        let duration_ms = state.metrics.total_duration_ms.unwrap_or_default();
        info!(
            run_id = %state.id,
            duration_ms,
            documents = state.documents.len(),
            errors = state.errors.len(),
            "workflow completed"
        );
        self.emit(
            WorkflowEventKind::WorkflowCompleted { duration_ms },
            state.clone(),
        );
        WorkflowResult::completed(state)
    }

    /// Fail the run with `err` and emit `workflow:error`.
    fn fail_run(&self, handle: &RunHandle, err: WorkflowError) -> WorkflowResult {
        let Some(state) = handle.apply(|s| {
            if let Err(transition) = s.transition(WorkflowStatus::Failed) {
                warn!(run_id = %s.id, error = %transition, "unexpected status at failure");
            }
        }) else {
            return self.cancelled(handle);
        };

        warn!(run_id = %state.id, error = %err, "workflow failed");
        self.emit(
            WorkflowEventKind::WorkflowFailed {
                error: err.to_string(),
            },
            state.clone(),
        );
        WorkflowResult::failed(state, err)
    }

    /// Result for a run that was cancelled through its handle.
    fn cancelled(&self, handle: &RunHandle) -> WorkflowResult {
        let state = handle.state();
        info!(
            run_id = %state.id,
            documents = state.documents.len(),
            "workflow stopped after cancellation"
        );
        WorkflowResult::failed(state, WorkflowError::Cancelled)
    }

    fn emit(&self, kind: WorkflowEventKind, snapshot: WorkflowState) {
        self.event_bus.publish(WorkflowEvent::new(kind, snapshot));
    }
}
