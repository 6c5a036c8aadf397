use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::stage::StageKind;

/// Per-run execution metrics.
///
/// `total_duration_ms` is the wall-clock span of the whole run. It is usually
/// a little larger than the sum of `stage_durations_ms` because inter-stage
/// bookkeeping (gates, checkpoints, event fan-out) is not attributed to any
/// stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowMetrics {
    /// Wall-clock milliseconds spent awaiting each stage.
    #[serde(default)]
    pub stage_durations_ms: HashMap<StageKind, u64>,
    /// Numeric quality score per stage, only where the output carries one.
    #[serde(default)]
    pub quality_scores: HashMap<StageKind, f64>,
    /// Sum of the token counts stages chose to report.
    #[serde(default)]
    pub token_usage: u64,
    /// Stage failures, recovered or not.
    #[serde(default)]
    pub error_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_duration_ms: Option<u64>,
}

impl WorkflowMetrics {
    /// Sum of all recorded stage durations.
    pub fn stage_time_ms(&self) -> u64 {
        self.stage_durations_ms.values().sum()
    }
}
