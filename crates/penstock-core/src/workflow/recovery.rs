//! Per-stage recovery for failed stage calls.
//!
//! Recovery is a single synchronous attempt: no retry, no backoff. It either
//! hands the engine a substitute document to continue with, or nothing, in
//! which case the run fails with the original error.

use std::collections::HashMap;

use penstock_types::document::{Document, keys};
use penstock_types::stage::StageKind;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// RecoveryStrategy
// ---------------------------------------------------------------------------

/// What to do when a stage fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryStrategy {
    /// Synthesize a degraded document from the last good output.
    Placeholder,
    /// Hand the last good output to the next stage unchanged.
    PassThrough,
    /// Give up; the run fails.
    Abort,
}

impl RecoveryStrategy {
    /// Built-in strategy for each stage.
    pub fn default_for(stage: StageKind) -> Self {
        match stage {
            StageKind::Collector => RecoveryStrategy::Placeholder,
            StageKind::Scholar | StageKind::Creator | StageKind::Adapter => {
                RecoveryStrategy::PassThrough
            }
        }
    }
}

// ---------------------------------------------------------------------------
// RecoveryManager
// ---------------------------------------------------------------------------

/// Resolves and applies the recovery strategy for a failed stage.
#[derive(Debug, Clone, Default)]
pub struct RecoveryManager {
    overrides: HashMap<StageKind, RecoveryStrategy>,
}

impl RecoveryManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the strategy used for `stage`.
    pub fn with_strategy(mut self, stage: StageKind, strategy: RecoveryStrategy) -> Self {
        self.overrides.insert(stage, strategy);
        self
    }

    pub fn strategy_for(&self, stage: StageKind) -> RecoveryStrategy {
        self.overrides
            .get(&stage)
            .copied()
            .unwrap_or_else(|| RecoveryStrategy::default_for(stage))
    }

    /// Try to produce a substitute for `stage`'s output.
    ///
    /// `last_good` is the most recent stage output of the run, `None` while
    /// no stage has produced one. `run_input` is the wrapped run input.
    pub fn attempt_recovery(
        &self,
        stage: StageKind,
        last_good: Option<&Document>,
        run_input: &Document,
    ) -> Option<Document> {
        let strategy = self.strategy_for(stage);
        let recovered = match strategy {
            RecoveryStrategy::Placeholder => {
                Some(placeholder(stage, last_good.unwrap_or(run_input)))
            }
            RecoveryStrategy::PassThrough => last_good.cloned(),
            RecoveryStrategy::Abort => None,
        };

        match &recovered {
            Some(doc) => tracing::warn!(
                stage = stage.as_str(),
                ?strategy,
                document_id = %doc.id,
                "stage recovered"
            ),
            None => tracing::warn!(stage = stage.as_str(), ?strategy, "recovery exhausted"),
        }
        recovered
    }
}

/// Minimal degraded document standing in for `stage`'s output, carrying
/// `source`'s content.
fn placeholder(stage: StageKind, source: &Document) -> Document {
    let doc = Document::new(
        format!("{}-placeholder-{}", stage.as_str(), Uuid::now_v7()),
        stage.as_str(),
        source.content.clone(),
    )
    .with_metadata(keys::DEGRADED, true)
    .with_metadata(keys::RECOVERED_FROM, stage.as_str());

    match stage {
        StageKind::Collector => doc
            .with_metadata(keys::TOTAL_SCORE, 0)
            .with_metadata(keys::KEY_INSIGHT_COUNT, 0),
        _ => doc,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_strategies() {
        let manager = RecoveryManager::new();
        assert_eq!(
            manager.strategy_for(StageKind::Collector),
            RecoveryStrategy::Placeholder
        );
        for stage in [StageKind::Scholar, StageKind::Creator, StageKind::Adapter] {
            assert_eq!(manager.strategy_for(stage), RecoveryStrategy::PassThrough);
        }
    }

    fn run_input() -> Document {
        Document::input("rust async runtimes")
    }

    #[test]
    fn test_collector_placeholder_carries_input() {
        let doc = RecoveryManager::new()
            .attempt_recovery(StageKind::Collector, None, &run_input())
            .unwrap();

        assert_eq!(doc.doc_type, "collector");
        assert_eq!(doc.content, "rust async runtimes");
        assert!(doc.is_degraded());
        assert_eq!(doc.metadata[keys::RECOVERED_FROM], "collector");
        assert!(doc.id.starts_with("collector-placeholder-"));
    }

    #[test]
    fn test_pass_through_returns_last_good_unchanged() {
        let last = Document::new("s1", "scholar", "analysis").with_metadata(keys::CONFIDENCE, 0.9);
        let doc = RecoveryManager::new()
            .attempt_recovery(StageKind::Creator, Some(&last), &run_input())
            .unwrap();
        assert_eq!(doc, last);
    }

    #[test]
    fn test_pass_through_without_last_good_is_exhausted() {
        assert!(
            RecoveryManager::new()
                .attempt_recovery(StageKind::Scholar, None, &run_input())
                .is_none()
        );
    }

    #[test]
    fn test_abort_override() {
        let manager = RecoveryManager::new().with_strategy(StageKind::Creator, RecoveryStrategy::Abort);
        let last = Document::new("s1", "scholar", "analysis");
        assert!(
            manager
                .attempt_recovery(StageKind::Creator, Some(&last), &run_input())
                .is_none()
        );
        assert!(
            manager
                .attempt_recovery(StageKind::Adapter, Some(&last), &run_input())
                .is_some()
        );
    }

    #[test]
    fn test_placeholder_override_on_later_stage() {
        let manager =
            RecoveryManager::new().with_strategy(StageKind::Adapter, RecoveryStrategy::Placeholder);
        let last = Document::new("cr", "creator", "draft");
        let doc = manager
            .attempt_recovery(StageKind::Adapter, Some(&last), &run_input())
            .unwrap();
        assert_eq!(doc.metadata[keys::RECOVERED_FROM], "adapter");
        assert_eq!(doc.content, "draft");
        assert!(!doc.metadata.contains_key(keys::TOTAL_SCORE));
    }

    #[test]
    fn test_placeholder_falls_back_to_run_input() {
        let manager =
            RecoveryManager::new().with_strategy(StageKind::Scholar, RecoveryStrategy::Placeholder);
        let doc = manager
            .attempt_recovery(StageKind::Scholar, None, &run_input())
            .unwrap();
        assert_eq!(doc.content, "rust async runtimes");
        assert!(doc.is_degraded());
    }
}
