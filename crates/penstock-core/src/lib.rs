//! Workflow engine for Penstock content pipelines.
//!
//! A run pushes a single `Document` through an ordered list of stages
//! (`collector -> scholar -> creator -> adapter`), evaluating soft quality
//! gates, taking checkpoints and offering failures to a recovery manager on
//! every stage boundary. Stage implementations are plugged in through the
//! [`stage::Stage`] trait; this crate never talks to an LLM or a network
//! itself.

pub mod config;
pub mod event;
pub mod stage;
pub mod workflow;
