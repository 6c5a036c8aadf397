//! Stateless metrics bookkeeping on `WorkflowMetrics`.

use std::time::Duration;

use chrono::{DateTime, Utc};
use penstock_types::document::{Document, keys};
use penstock_types::metrics::WorkflowMetrics;
use penstock_types::stage::StageKind;

use super::gate::QualityGateEvaluator;

/// Records per-stage measurements into a run's metrics.
///
/// No internal state; all functions take the metrics to update.
pub struct MetricsAggregator;

impl MetricsAggregator {
    /// Wall-clock time spent awaiting `stage`.
    pub fn record_duration(metrics: &mut WorkflowMetrics, stage: StageKind, elapsed: Duration) {
        metrics
            .stage_durations_ms
            .insert(stage, duration_ms(elapsed));
    }

    /// Quality score and token usage carried by a stage's output.
    pub fn record_output(metrics: &mut WorkflowMetrics, stage: StageKind, output: &Document) {
        Self::record_score(metrics, stage, output);
        if let Some(tokens) = output.metadata_u64(keys::TOKEN_USAGE) {
            metrics.token_usage = metrics.token_usage.saturating_add(tokens);
        }
    }

    /// Quality score only. Used for recovered documents, whose token usage
    /// was already counted for the stage that produced them.
    pub fn record_score(metrics: &mut WorkflowMetrics, stage: StageKind, output: &Document) {
        if let Some(score) = QualityGateEvaluator::score(stage, output) {
            metrics.quality_scores.insert(stage, score);
        }
    }

    pub fn record_failure(metrics: &mut WorkflowMetrics) {
        metrics.error_count = metrics.error_count.saturating_add(1);
    }

    /// Stamp the run's total wall-clock duration.
    pub fn finish(metrics: &mut WorkflowMetrics, start: DateTime<Utc>, end: DateTime<Utc>) {
        let ms = (end - start).num_milliseconds().max(0);
        metrics.total_duration_ms = Some(u64::try_from(ms).unwrap_or(0));
    }
}

/// Whole milliseconds in `duration`, saturating.
pub(crate) fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
