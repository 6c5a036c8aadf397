//! The content artifact exchanged between pipeline stages.
//!
//! The engine treats a `Document` as opaque except for a handful of metadata
//! keys read by the quality gates and the metrics aggregator (see [`keys`]).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Metadata keys the engine reads from stage output.
pub mod keys {
    /// Collector: aggregate source quality score (0..100).
    pub const TOTAL_SCORE: &str = "totalScore";
    /// Collector: number of key insights extracted.
    pub const KEY_INSIGHT_COUNT: &str = "keyInsightCount";
    /// Scholar: analysis confidence (0..1).
    pub const CONFIDENCE: &str = "confidence";
    /// Scholar: depth of analysis (1 = surface).
    pub const DEPTH_LEVEL: &str = "depthLevel";
    /// Creator: predicted engagement score (0..100).
    pub const ENGAGEMENT_SCORE: &str = "engagementScore";
    /// Adapter: fit score for a platform rendition (0..100).
    pub const PLATFORM_FIT_SCORE: &str = "platformFitScore";
    /// Adapter: per-platform output items, each an object.
    pub const PLATFORMS: &str = "platforms";
    /// Optional token counter a stage may report.
    pub const TOKEN_USAGE: &str = "tokenUsage";
    /// Set on documents synthesized by recovery.
    pub const DEGRADED: &str = "degraded";
    /// Stage a degraded document stands in for.
    pub const RECOVERED_FROM: &str = "recoveredFrom";
}

/// Document type given to the run input before the first stage.
pub const INPUT_DOCUMENT_TYPE: &str = "input";

/// A generic content artifact passed between stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    /// Producer-defined type tag (usually the stage name).
    #[serde(rename = "type")]
    pub doc_type: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, Value>,
}

impl Document {
    /// Create a document stamped with the current time and no metadata.
    pub fn new(
        id: impl Into<String>,
        doc_type: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            doc_type: doc_type.into(),
            content: content.into(),
            timestamp: Utc::now(),
            metadata: HashMap::new(),
        }
    }

    /// Wrap raw run input into the document handed to the first stage.
    pub fn input(content: impl Into<String>) -> Self {
        Self::new(
            format!("input-{}", Uuid::now_v7()),
            INPUT_DOCUMENT_TYPE,
            content,
        )
    }

    /// Builder-style metadata insertion.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Read a numeric metadata field as `f64`.
    ///
    /// Numbers encoded as strings are not coerced.
    pub fn metadata_f64(&self, key: &str) -> Option<f64> {
        self.metadata.get(key).and_then(Value::as_f64)
    }

    /// Read a non-negative integer metadata field.
    pub fn metadata_u64(&self, key: &str) -> Option<u64> {
        self.metadata.get(key).and_then(Value::as_u64)
    }

    /// Whether this document was synthesized by recovery.
    pub fn is_degraded(&self) -> bool {
        self.metadata
            .get(keys::DEGRADED)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}
