//! Workflow orchestration: stage resolution, quality gates, recovery,
//! checkpoints, metrics, run control and the engine that ties them together.

pub mod checkpoint;
pub mod engine;
pub mod gate;
pub mod handle;
pub mod metrics;
pub mod recovery;
pub mod resolve;

pub use checkpoint::{Checkpoint, CheckpointStore};
pub use engine::WorkflowEngine;
pub use gate::{GateOutcome, QualityGateEvaluator};
pub use handle::RunHandle;
pub use metrics::MetricsAggregator;
pub use recovery::{RecoveryManager, RecoveryStrategy};
pub use resolve::{resolve_stages, validate_options};
