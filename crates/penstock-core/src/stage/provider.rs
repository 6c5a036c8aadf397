//! Stage trait definition.
//!
//! This is the core abstraction every pipeline step implements. Uses RPITIT
//! for `process`; [`BoxStage`](super::BoxStage) provides the object-safe
//! wrapper the registry stores.

use std::future::Future;

use penstock_types::document::Document;
use penstock_types::stage::StageParams;

/// Errors a stage implementation can return.
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error("{0}")]
    ExecutionFailed(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("upstream service error: {0}")]
    Upstream(String),
}

/// One step of the content pipeline.
///
/// Receives the previous stage's output (or the run input for the first
/// stage) and the stage's resolved parameters, and produces a new document.
pub trait Stage: Send + Sync {
    fn process(
        &self,
        input: &Document,
        params: &StageParams,
    ) -> impl Future<Output = Result<Document, StageError>> + Send;
}

/// Adapts an async closure into a [`Stage`].
///
/// The closure receives owned copies of the input and parameters so the
/// returned future does not borrow from the engine.
pub struct FnStage<F> {
    func: F,
}

impl<F> FnStage<F> {
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F, Fut> Stage for FnStage<F>
where
    F: Fn(Document, StageParams) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Document, StageError>> + Send,
{
    fn process(
        &self,
        input: &Document,
        params: &StageParams,
    ) -> impl Future<Output = Result<Document, StageError>> + Send {
        (self.func)(input.clone(), params.clone())
    }
}
