//! BoxStage -- object-safe dynamic dispatch wrapper for Stage.
//!
//! 1. Define an object-safe `StageDyn` trait with boxed futures
//! 2. Blanket-impl `StageDyn` for all `T: Stage`
//! 3. `BoxStage` wraps `Box<dyn StageDyn>` and delegates

use std::future::Future;
use std::pin::Pin;

use penstock_types::document::Document;
use penstock_types::stage::StageParams;

use super::provider::{Stage, StageError};

/// Object-safe version of [`Stage`] with a boxed future.
pub trait StageDyn: Send + Sync {
    fn process_boxed<'a>(
        &'a self,
        input: &'a Document,
        params: &'a StageParams,
    ) -> Pin<Box<dyn Future<Output = Result<Document, StageError>> + Send + 'a>>;
}

impl<T: Stage> StageDyn for T {
    fn process_boxed<'a>(
        &'a self,
        input: &'a Document,
        params: &'a StageParams,
    ) -> Pin<Box<dyn Future<Output = Result<Document, StageError>> + Send + 'a>> {
        Box::pin(self.process(input, params))
    }
}

/// Type-erased stage, as stored in the [`StageRegistry`](super::StageRegistry).
///
/// Since `Stage` uses RPITIT it cannot be used as a trait object directly.
pub struct BoxStage {
    inner: Box<dyn StageDyn>,
    type_name: &'static str,
}

impl BoxStage {
    /// Wrap a concrete `Stage` in a type-erased box.
    pub fn new<T: Stage + 'static>(stage: T) -> Self {
        Self {
            inner: Box::new(stage),
            type_name: std::any::type_name::<T>(),
        }
    }

    /// Rust type name of the wrapped implementation, for logs.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub async fn process(
        &self,
        input: &Document,
        params: &StageParams,
    ) -> Result<Document, StageError> {
        self.inner.process_boxed(input, params).await
    }
}

impl std::fmt::Debug for BoxStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxStage")
            .field("type_name", &self.type_name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Upper;

    impl Stage for Upper {
        async fn process(
            &self,
            input: &Document,
            _params: &StageParams,
        ) -> Result<Document, StageError> {
            Ok(Document::new("u", "upper", input.content.to_uppercase()))
        }
    }

    #[tokio::test]
    async fn test_box_stage_delegates() {
        let boxed = BoxStage::new(Upper);
        let out = boxed
            .process(&Document::input("quiet"), &StageParams::new())
            .await
            .unwrap();
        assert_eq!(out.content, "QUIET");
        assert!(boxed.type_name().ends_with("Upper"));
    }

    #[test]
    fn test_box_stage_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<BoxStage>();
    }
}
