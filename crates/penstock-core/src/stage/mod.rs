//! Stage contract and registry.
//!
//! Stage implementations (LLM-backed or otherwise) live outside this crate.
//! The engine only sees them through [`BoxStage`], looked up by
//! [`StageKind`](penstock_types::stage::StageKind) in a [`StageRegistry`].

pub mod box_stage;
pub mod provider;
pub mod registry;

pub use box_stage::BoxStage;
pub use provider::{FnStage, Stage, StageError};
pub use registry::StageRegistry;
