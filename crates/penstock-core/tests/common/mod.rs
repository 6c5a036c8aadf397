//! Stub stages shared by the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use penstock_core::stage::{Stage, StageError, StageRegistry};
use penstock_types::document::Document;
use penstock_types::event::WorkflowEvent;
use penstock_types::stage::{StageKind, StageParams};
use tokio::sync::{Notify, broadcast};

/// Returns `{id: kind, type: kind, content: "ok"}` plus fixed metadata.
#[derive(Clone)]
pub struct StubStage {
    kind: StageKind,
    metadata: Vec<(&'static str, serde_json::Value)>,
}

impl StubStage {
    pub fn new(kind: StageKind) -> Self {
        Self {
            kind,
            metadata: Vec::new(),
        }
    }

    pub fn with_metadata(mut self, key: &'static str, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.push((key, value.into()));
        self
    }
}

impl Stage for StubStage {
    async fn process(
        &self,
        _input: &Document,
        _params: &StageParams,
    ) -> Result<Document, StageError> {
        let doc = Document::new(self.kind.as_str(), self.kind.as_str(), "ok");
        Ok(self
            .metadata
            .iter()
            .fold(doc, |doc, (key, value)| doc.with_metadata(*key, value.clone())))
    }
}

/// Stub stage that also records every input it receives.
#[derive(Clone)]
pub struct RecordingStage {
    inner: StubStage,
    pub seen: Arc<Mutex<Vec<Document>>>,
}

impl RecordingStage {
    pub fn new(kind: StageKind) -> Self {
        Self {
            inner: StubStage::new(kind),
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn inputs(&self) -> Vec<Document> {
        self.seen.lock().unwrap().clone()
    }
}

impl Stage for RecordingStage {
    async fn process(
        &self,
        input: &Document,
        params: &StageParams,
    ) -> Result<Document, StageError> {
        self.seen.lock().unwrap().push(input.clone());
        self.inner.process(input, params).await
    }
}

/// Fails its first `failures` calls, then behaves like a `StubStage`.
pub struct FlakyStage {
    inner: StubStage,
    remaining: AtomicUsize,
}

impl FlakyStage {
    pub fn new(kind: StageKind, failures: usize) -> Self {
        Self {
            inner: StubStage::new(kind),
            remaining: AtomicUsize::new(failures),
        }
    }

    pub fn always(kind: StageKind) -> Self {
        Self::new(kind, usize::MAX)
    }
}

impl Stage for FlakyStage {
    async fn process(
        &self,
        input: &Document,
        params: &StageParams,
    ) -> Result<Document, StageError> {
        let failing = self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(StageError::ExecutionFailed(format!(
                "{} unavailable",
                self.inner.kind
            )));
        }
        self.inner.process(input, params).await
    }
}

/// Sleeps before answering.
pub struct SlowStage {
    inner: StubStage,
    delay: Duration,
}

impl SlowStage {
    pub fn new(kind: StageKind, delay: Duration) -> Self {
        Self {
            inner: StubStage::new(kind),
            delay,
        }
    }
}

impl Stage for SlowStage {
    async fn process(
        &self,
        input: &Document,
        params: &StageParams,
    ) -> Result<Document, StageError> {
        tokio::time::sleep(self.delay).await;
        self.inner.process(input, params).await
    }
}

/// Signals `started` when called, then holds until `release` is notified.
#[derive(Clone)]
pub struct GatedStage {
    inner: StubStage,
    pub started: Arc<Notify>,
    pub release: Arc<Notify>,
}

impl GatedStage {
    pub fn new(kind: StageKind) -> Self {
        Self {
            inner: StubStage::new(kind),
            started: Arc::new(Notify::new()),
            release: Arc::new(Notify::new()),
        }
    }
}

impl Stage for GatedStage {
    async fn process(
        &self,
        input: &Document,
        params: &StageParams,
    ) -> Result<Document, StageError> {
        self.started.notify_one();
        self.release.notified().await;
        self.inner.process(input, params).await
    }
}

/// Registry with a `StubStage` for every kind.
pub fn stub_registry() -> StageRegistry {
    StageKind::ALL
        .into_iter()
        .fold(StageRegistry::new(), |registry, kind| {
            registry.with(kind, StubStage::new(kind))
        })
}

/// Everything already published on `rx`.
pub fn drain(rx: &mut broadcast::Receiver<WorkflowEvent>) -> Vec<WorkflowEvent> {
    std::iter::from_fn(|| rx.try_recv().ok()).collect()
}

pub fn names(events: &[WorkflowEvent]) -> Vec<&'static str> {
    events.iter().map(|e| e.name()).collect()
}
