//! Shared domain types for Penstock.
//!
//! This crate contains the domain types used by the pipeline engine:
//! Document, StageKind, WorkflowConfig, WorkflowState, WorkflowMetrics,
//! WorkflowEvent, and the WorkflowError taxonomy.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod document;
pub mod error;
pub mod event;
pub mod metrics;
pub mod stage;
pub mod workflow;

pub use document::Document;
pub use error::WorkflowError;
pub use event::{WorkflowEvent, WorkflowEventKind};
pub use metrics::WorkflowMetrics;
pub use stage::{StageConfig, StageKind, StageParams};
pub use workflow::{
    StageFailure, WorkflowConfig, WorkflowMode, WorkflowOptions, WorkflowResult, WorkflowState,
    WorkflowStatus,
};
