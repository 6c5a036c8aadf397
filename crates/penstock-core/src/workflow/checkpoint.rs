//! In-memory checkpoint store for workflow run state.
//!
//! A checkpoint is an owned structural copy of `WorkflowState` taken after a
//! stage completes, named `after_<stage>`. Later changes to the live state
//! never reach a saved checkpoint, and every load hands out a fresh copy.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use penstock_types::stage::StageKind;
use penstock_types::workflow::WorkflowState;

// ---------------------------------------------------------------------------
// Checkpoint
// ---------------------------------------------------------------------------

/// A saved snapshot and when it was taken.
#[derive(Debug, Clone, PartialEq)]
pub struct Checkpoint {
    pub name: String,
    pub saved_at: DateTime<Utc>,
    pub state: WorkflowState,
}

// ---------------------------------------------------------------------------
// CheckpointStore
// ---------------------------------------------------------------------------

/// Name-keyed checkpoint store.
///
/// Cloning shares the underlying map, so an engine and its callers see the
/// same checkpoints. Saving under an existing name replaces it.
#[derive(Debug, Clone, Default)]
pub struct CheckpointStore {
    entries: Arc<DashMap<String, Checkpoint>>,
}

impl CheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Save a copy of `state` under `name`.
    pub fn save(&self, name: impl Into<String>, state: &WorkflowState) {
        let name = name.into();
        tracing::debug!(
            run_id = %state.id,
            checkpoint = %name,
            documents = state.documents.len(),
            "checkpoint saved"
        );
        self.entries.insert(
            name.clone(),
            Checkpoint {
                name,
                saved_at: Utc::now(),
                state: state.clone(),
            },
        );
    }

    /// A fresh copy of the state saved under `name`.
    pub fn load(&self, name: &str) -> Option<WorkflowState> {
        self.entries.get(name).map(|entry| entry.state.clone())
    }

    /// The full checkpoint record saved under `name`.
    pub fn get(&self, name: &str) -> Option<Checkpoint> {
        self.entries.get(name).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Saved checkpoint names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Remove a checkpoint. Returns whether it existed.
    pub fn remove(&self, name: &str) -> bool {
        self.entries.remove(name).is_some()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The checkpoint of the furthest stage in `order` that has one.
    pub fn latest_in(&self, order: &[StageKind]) -> Option<Checkpoint> {
        order
            .iter()
            .rev()
            .find_map(|stage| self.get(&stage.checkpoint_name()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use penstock_types::document::Document;
    use penstock_types::workflow::WorkflowMode;
    use uuid::Uuid;

    fn state_with(stage: StageKind, content: &str) -> WorkflowState {
        let mut state = WorkflowState::start(Uuid::now_v7(), WorkflowMode::Quick);
        state.record_document(stage, Document::new(stage.as_str(), stage.as_str(), content));
        state
    }

    #[test]
    fn test_save_and_load() {
        let store = CheckpointStore::new();
        let state = state_with(StageKind::Collector, "sources");
        store.save("after_collector", &state);

        assert!(store.contains("after_collector"));
        assert_eq!(store.load("after_collector"), Some(state));
        assert_eq!(store.load("after_scholar"), None);
    }

    #[test]
    fn test_checkpoint_is_independent_of_live_state() {
        let store = CheckpointStore::new();
        let mut live = state_with(StageKind::Scholar, "v1");
        store.save("after_scholar", &live);

        live.documents
            .get_mut(&StageKind::Scholar)
            .unwrap()
            .content = "v2".to_string();
        live.progress = 90;

        let saved = store.load("after_scholar").unwrap();
        assert_eq!(saved.documents[&StageKind::Scholar].content, "v1");
        assert_eq!(saved.progress, 0);
    }

    #[test]
    fn test_loads_are_fresh_copies() {
        let store = CheckpointStore::new();
        store.save("after_creator", &state_with(StageKind::Creator, "draft"));

        let mut first = store.load("after_creator").unwrap();
        first.documents.clear();

        let second = store.load("after_creator").unwrap();
        assert_eq!(second.documents.len(), 1);
    }

    #[test]
    fn test_save_overwrites_same_name() {
        let store = CheckpointStore::new();
        store.save("after_adapter", &state_with(StageKind::Adapter, "old"));
        store.save("after_adapter", &state_with(StageKind::Adapter, "new"));

        assert_eq!(store.len(), 1);
        let saved = store.get("after_adapter").unwrap();
        assert_eq!(saved.name, "after_adapter");
        assert_eq!(saved.state.documents[&StageKind::Adapter].content, "new");
    }

    #[test]
    fn test_names_remove_clear() {
        let store = CheckpointStore::new();
        store.save("after_scholar", &state_with(StageKind::Scholar, "s"));
        store.save("after_collector", &state_with(StageKind::Collector, "c"));

        assert_eq!(store.names(), vec!["after_collector", "after_scholar"]);
        assert!(store.remove("after_scholar"));
        assert!(!store.remove("after_scholar"));
        assert_eq!(store.len(), 1);

        store.clear();
        assert!(store.is_empty());
    }

    #[test]
    fn test_latest_in_prefers_furthest_stage() {
        let store = CheckpointStore::new();
        assert!(store.latest_in(&StageKind::ALL).is_none());

        store.save("after_collector", &state_with(StageKind::Collector, "c"));
        store.save("after_creator", &state_with(StageKind::Creator, "cr"));

        let latest = store.latest_in(&StageKind::ALL).unwrap();
        assert_eq!(latest.name, "after_creator");

        let latest = store
            .latest_in(&[StageKind::Collector, StageKind::Scholar])
            .unwrap();
        assert_eq!(latest.name, "after_collector");
    }

    #[test]
    fn test_clones_share_entries() {
        let store = CheckpointStore::new();
        let other = store.clone();
        other.save("after_collector", &state_with(StageKind::Collector, "c"));
        assert!(store.contains("after_collector"));
    }
}
