//! Stage registry for runtime stage lookup.

use std::collections::BTreeMap;

use penstock_types::stage::StageKind;

use super::box_stage::BoxStage;
use super::provider::Stage;

/// Registry of stage implementations, indexed by kind.
///
/// The engine refuses to start a run whose enabled stages are not all
/// registered here.
#[derive(Debug, Default)]
pub struct StageRegistry {
    stages: BTreeMap<StageKind, BoxStage>,
}

impl StageRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an implementation for `kind`.
    ///
    /// If one is already registered, it is replaced.
    pub fn register<T: Stage + 'static>(&mut self, kind: StageKind, stage: T) {
        self.register_boxed(kind, BoxStage::new(stage));
    }

    pub fn register_boxed(&mut self, kind: StageKind, stage: BoxStage) {
        self.stages.insert(kind, stage);
    }

    /// Builder-style [`register`](Self::register).
    pub fn with<T: Stage + 'static>(mut self, kind: StageKind, stage: T) -> Self {
        self.register(kind, stage);
        self
    }

    pub fn get(&self, kind: StageKind) -> Option<&BoxStage> {
        self.stages.get(&kind)
    }

    pub fn contains(&self, kind: StageKind) -> bool {
        self.stages.contains_key(&kind)
    }

    /// Registered kinds in pipeline order.
    pub fn kinds(&self) -> Vec<StageKind> {
        self.stages.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::{FnStage, StageError};
    use penstock_types::document::Document;
    use penstock_types::stage::StageParams;

    fn constant(content: &'static str) -> FnStage<
        impl Fn(Document, StageParams) -> std::future::Ready<Result<Document, StageError>>
            + Send
            + Sync,
    > {
        FnStage::new(move |_input: Document, _params: StageParams| {
            std::future::ready(Ok(Document::new(content, content, content)))
        })
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = StageRegistry::new()
            .with(StageKind::Adapter, constant("a"))
            .with(StageKind::Collector, constant("c"));

        assert!(registry.contains(StageKind::Collector));
        assert!(!registry.contains(StageKind::Scholar));
        assert!(registry.get(StageKind::Scholar).is_none());
        assert_eq!(
            registry.kinds(),
            vec![StageKind::Collector, StageKind::Adapter]
        );
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn test_register_replaces_existing() {
        let mut registry = StageRegistry::new();
        registry.register(StageKind::Creator, constant("first"));
        registry.register(StageKind::Creator, constant("second"));
        assert_eq!(registry.len(), 1);

        let out = registry
            .get(StageKind::Creator)
            .unwrap()
            .process(&Document::input("x"), &StageParams::new())
            .await
            .unwrap();
        assert_eq!(out.content, "second");
    }
}
