//! Per-run control handle.
//!
//! A `RunHandle` owns one run's `WorkflowState` inside a `watch` channel and
//! a cancellation token. The engine mutates the state through it while the
//! run executes; callers use the same handle (or a clone) to pause, resume,
//! cancel and poll. Once the state is terminal, further engine mutations are
//! refused, which is what keeps a late stage result out of a cancelled run.

use std::sync::Arc;

use penstock_types::error::WorkflowError;
use penstock_types::event::{WorkflowEvent, WorkflowEventKind};
use penstock_types::metrics::WorkflowMetrics;
use penstock_types::workflow::{WorkflowMode, WorkflowState, WorkflowStatus};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::event::EventBus;

/// Control and observation handle for one workflow run.
///
/// Cheap to clone; clones share the same run.
#[derive(Debug, Clone)]
pub struct RunHandle {
    state: Arc<watch::Sender<WorkflowState>>,
    cancel: CancellationToken,
    events: EventBus,
}

impl RunHandle {
    pub(crate) fn new(events: EventBus) -> Self {
        let (state, _) = watch::channel(WorkflowState::idle(WorkflowMode::Custom));
        Self {
            state: Arc::new(state),
            cancel: CancellationToken::new(),
            events,
        }
    }

    pub fn id(&self) -> Uuid {
        self.state.borrow().id
    }

    pub fn status(&self) -> WorkflowStatus {
        self.state.borrow().status
    }

    /// Snapshot of the run state.
    pub fn state(&self) -> WorkflowState {
        self.state.borrow().clone()
    }

    /// Snapshot of the run metrics.
    pub fn metrics(&self) -> WorkflowMetrics {
        self.state.borrow().metrics.clone()
    }

    /// Watch the run state as it changes.
    pub fn watch(&self) -> watch::Receiver<WorkflowState> {
        self.state.subscribe()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    // -----------------------------------------------------------------------
    // Control
    // -----------------------------------------------------------------------

    /// Ask the run to pause at the next stage boundary.
    ///
    /// An in-flight stage call is not interrupted.
    pub fn pause(&self) -> Result<(), WorkflowError> {
        let snapshot = self.control(&[WorkflowStatus::Running], WorkflowStatus::Paused)?;
        tracing::info!(run_id = %snapshot.id, "workflow paused");
        self.events
            .publish(WorkflowEvent::new(WorkflowEventKind::WorkflowPaused, snapshot));
        Ok(())
    }

    pub fn resume(&self) -> Result<(), WorkflowError> {
        let snapshot = self.control(&[WorkflowStatus::Paused], WorkflowStatus::Running)?;
        tracing::info!(run_id = %snapshot.id, "workflow resumed");
        self.events
            .publish(WorkflowEvent::new(WorkflowEventKind::WorkflowResumed, snapshot));
        Ok(())
    }

    /// Fail the run immediately.
    ///
    /// The in-flight stage call, if any, keeps running but its result is
    /// discarded when it settles.
    pub fn cancel(&self) -> Result<(), WorkflowError> {
        let snapshot = self.control(
            &[
                WorkflowStatus::Idle,
                WorkflowStatus::Running,
                WorkflowStatus::Paused,
            ],
            WorkflowStatus::Failed,
        )?;
        self.cancel.cancel();
        tracing::info!(run_id = %snapshot.id, "workflow cancelled");
        self.events
            .publish(WorkflowEvent::new(WorkflowEventKind::WorkflowCancelled, snapshot));
        Ok(())
    }

    /// Apply a caller-requested transition, legal only from `allowed`.
    fn control(
        &self,
        allowed: &[WorkflowStatus],
        next: WorkflowStatus,
    ) -> Result<WorkflowState, WorkflowError> {
        let mut outcome = None;
        self.state.send_if_modified(|state| {
            let result = if allowed.contains(&state.status) {
                state.transition(next)
            } else {
                Err(WorkflowError::InvalidTransition {
                    from: state.status,
                    to: next,
                })
            };
            match result {
                Ok(()) => {
                    outcome = Some(Ok(state.clone()));
                    true
                }
                Err(err) => {
                    outcome = Some(Err(err));
                    false
                }
            }
        });
        outcome.unwrap_or_else(|| {
            Err(WorkflowError::InvalidTransition {
                from: self.status(),
                to: next,
            })
        })
    }

    // -----------------------------------------------------------------------
    // Engine side
    // -----------------------------------------------------------------------

    /// Move an idle handle into a fresh running state for `mode`.
    pub(crate) fn begin(&self, mode: WorkflowMode) -> Result<WorkflowState, WorkflowError> {
        if self.is_cancelled() {
            return Err(WorkflowError::Cancelled);
        }
        let mut outcome = None;
        self.state.send_if_modified(|state| {
            if state.status != WorkflowStatus::Idle {
                outcome = Some(Err(WorkflowError::InvalidTransition {
                    from: state.status,
                    to: WorkflowStatus::Running,
                }));
                return false;
            }
            *state = WorkflowState::start(state.id, mode);
            outcome = Some(Ok(state.clone()));
            true
        });
        outcome.unwrap_or(Err(WorkflowError::Cancelled))
    }

    /// Apply `f` to the live state unless it is already terminal.
    ///
    /// Returns the state after the change, or `None` if it was refused.
    pub(crate) fn apply<F>(&self, f: F) -> Option<WorkflowState>
    where
        F: FnOnce(&mut WorkflowState),
    {
        let mut snapshot = None;
        self.state.send_if_modified(|state| {
            if state.is_terminal() {
                return false;
            }
            f(state);
            snapshot = Some(state.clone());
            true
        });
        snapshot
    }

    /// Wait while the run is paused. Returns at once otherwise.
    pub(crate) async fn wait_while_paused(&self) {
        let mut rx = self.state.subscribe();
        if rx.borrow().status != WorkflowStatus::Paused {
            return;
        }
        tracing::debug!(run_id = %self.id(), "holding at stage boundary while paused");
        let _ = rx
            .wait_for(|state| state.status != WorkflowStatus::Paused)
            .await;
    }
}
