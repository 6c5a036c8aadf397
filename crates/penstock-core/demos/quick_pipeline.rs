//! Runs a four-stage pipeline over canned stages and logs every lifecycle
//! event.
//!
//! ```text
//! cargo run -p penstock-core --example quick_pipeline -- "rust async runtimes"
//! PENSTOCK_JSON=1 cargo run -p penstock-core --example quick_pipeline
//! ```

use anyhow::Context;
use futures_util::StreamExt;
use penstock_core::config::parse_workflow_config_yaml;
use penstock_core::stage::{Stage, StageError, StageRegistry};
use penstock_core::workflow::WorkflowEngine;
use penstock_observe::tracing_setup::{TracingOptions, init_tracing, shutdown_tracing};
use penstock_types::document::{Document, keys};
use penstock_types::stage::{StageKind, StageParams};
use serde_json::json;

const PIPELINE: &str = r#"
mode: custom
stages:
  - name: collector
    parameters: { maxSources: 4, depth: standard }
  - name: scholar
    parameters: { analysisDepth: deep }
  - name: creator
    parameters: { targetLength: 800, tone: editorial }
  - name: adapter
    parameters: { platforms: [twitter, linkedin] }
options:
  timeoutMs: 2000
"#;

struct Collector;

impl Stage for Collector {
    async fn process(
        &self,
        input: &Document,
        params: &StageParams,
    ) -> Result<Document, StageError> {
        let sources = params.get("maxSources").and_then(|v| v.as_u64()).unwrap_or(3);
        Ok(Document::new(
            "collector-1",
            "collector",
            format!("{sources} sources on '{}'", input.content),
        )
        .with_metadata(keys::TOTAL_SCORE, 64)
        .with_metadata(keys::KEY_INSIGHT_COUNT, 4)
        .with_metadata(keys::TOKEN_USAGE, 850))
    }
}

struct Scholar;

impl Stage for Scholar {
    async fn process(
        &self,
        input: &Document,
        _params: &StageParams,
    ) -> Result<Document, StageError> {
        Ok(
            Document::new("scholar-1", "scholar", format!("analysis of {}", input.content))
                .with_metadata(keys::CONFIDENCE, 0.45)
                .with_metadata(keys::DEPTH_LEVEL, 2)
                .with_metadata(keys::TOKEN_USAGE, 1400),
        )
    }
}

/// Fails on purpose so the run shows recovery passing the analysis through.
struct Creator;

impl Stage for Creator {
    async fn process(
        &self,
        _input: &Document,
        _params: &StageParams,
    ) -> Result<Document, StageError> {
        Err(StageError::Upstream("model overloaded".to_string()))
    }
}

struct Adapter;

impl Stage for Adapter {
    async fn process(
        &self,
        input: &Document,
        params: &StageParams,
    ) -> Result<Document, StageError> {
        let platforms: Vec<serde_json::Value> = params
            .get("platforms")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .map(|p| json!({ "platform": p, "platformFitScore": 78 }))
            .collect();
        Ok(Document::new("adapter-1", "adapter", input.content.clone())
            .with_metadata(keys::PLATFORMS, platforms))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let options = TracingOptions {
        json: std::env::var_os("PENSTOCK_JSON").is_some(),
        ..Default::default()
    };
    init_tracing(&options).map_err(|e| anyhow::anyhow!("{e}"))?;

    let topic = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "rust async runtimes".to_string());
    let config = parse_workflow_config_yaml(PIPELINE).context("parsing demo pipeline")?;

    let registry = StageRegistry::new()
        .with(StageKind::Collector, Collector)
        .with(StageKind::Scholar, Scholar)
        .with(StageKind::Creator, Creator)
        .with(StageKind::Adapter, Adapter);
    let engine = WorkflowEngine::new(registry);
    let handle = engine.new_run();

    let mut events = Box::pin(engine.event_bus().stream_run(handle.id()));
    let printer = tokio::spawn(async move {
        while let Some(event) = events.next().await {
            tracing::info!(
                event = event.name(),
                stage = event.stage().map(|s| s.as_str()),
                progress = event.snapshot.progress,
                "event"
            );
            if event.name() == "workflow:complete" || event.name() == "workflow:error" {
                break;
            }
        }
    });

    let result = engine.execute_with(&handle, &topic, &config).await;
    printer.await.context("event printer panicked")?;

    tracing::info!(
        success = result.success,
        status = %result.state.status,
        errors = result.state.errors.len(),
        tokens = result.state.metrics.token_usage,
        total_ms = ?result.state.metrics.total_duration_ms,
        "run finished"
    );
    if let Some(output) = &result.final_output {
        println!("{}", serde_json::to_string_pretty(output)?);
    }
    if let Some(checkpoint) = engine.checkpoints().latest_in(&StageKind::ALL) {
        tracing::info!(checkpoint = %checkpoint.name, saved_at = %checkpoint.saved_at, "latest checkpoint");
    }

    shutdown_tracing();
    Ok(())
}
