//! Soft quality gates over stage output.
//!
//! Gates never fail a run. A failing gate only makes the engine emit a
//! `quality:warning` event carrying the reason.

use penstock_types::document::{Document, keys};
use penstock_types::stage::StageKind;
use serde_json::Value;

// ---------------------------------------------------------------------------
// Thresholds
// ---------------------------------------------------------------------------

pub const COLLECTOR_MIN_TOTAL_SCORE: f64 = 40.0;
pub const COLLECTOR_MIN_KEY_INSIGHTS: f64 = 3.0;
pub const SCHOLAR_MIN_CONFIDENCE: f64 = 0.6;
pub const SCHOLAR_MIN_DEPTH_LEVEL: f64 = 2.0;
pub const CREATOR_MIN_ENGAGEMENT: f64 = 60.0;
pub const ADAPTER_MIN_PLATFORM_FIT: f64 = 70.0;

// ---------------------------------------------------------------------------
// GateOutcome
// ---------------------------------------------------------------------------

/// Result of evaluating a stage's gate.
#[derive(Debug, Clone, PartialEq)]
pub struct GateOutcome {
    pub passed: bool,
    /// The stage's headline score, when the output carries one.
    pub score: Option<f64>,
    /// Why the gate failed. `None` when it passed.
    pub reason: Option<String>,
}

impl GateOutcome {
    fn from_failures(score: Option<f64>, failures: Vec<String>) -> Self {
        if failures.is_empty() {
            Self {
                passed: true,
                score,
                reason: None,
            }
        } else {
            Self {
                passed: false,
                score,
                reason: Some(failures.join("; ")),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// QualityGateEvaluator
// ---------------------------------------------------------------------------

/// Stateless evaluator. One predicate per stage kind.
pub struct QualityGateEvaluator;

impl QualityGateEvaluator {
    /// Evaluate the gate for `stage` against its output.
    ///
    /// Missing or non-numeric fields count as failing.
    pub fn evaluate(stage: StageKind, output: &Document) -> GateOutcome {
        match stage {
            StageKind::Collector => {
                let mut failures = Vec::new();
                check_min(
                    output,
                    keys::TOTAL_SCORE,
                    COLLECTOR_MIN_TOTAL_SCORE,
                    &mut failures,
                );
                check_min(
                    output,
                    keys::KEY_INSIGHT_COUNT,
                    COLLECTOR_MIN_KEY_INSIGHTS,
                    &mut failures,
                );
                GateOutcome::from_failures(Self::score(stage, output), failures)
            }
            StageKind::Scholar => {
                let mut failures = Vec::new();
                check_min(
                    output,
                    keys::CONFIDENCE,
                    SCHOLAR_MIN_CONFIDENCE,
                    &mut failures,
                );
                check_min(
                    output,
                    keys::DEPTH_LEVEL,
                    SCHOLAR_MIN_DEPTH_LEVEL,
                    &mut failures,
                );
                GateOutcome::from_failures(Self::score(stage, output), failures)
            }
            StageKind::Creator => {
                let mut failures = Vec::new();
                check_min(
                    output,
                    keys::ENGAGEMENT_SCORE,
                    CREATOR_MIN_ENGAGEMENT,
                    &mut failures,
                );
                GateOutcome::from_failures(Self::score(stage, output), failures)
            }
            StageKind::Adapter => evaluate_adapter(output),
        }
    }

    /// The stage's headline quality score, if the output carries one.
    ///
    /// For the adapter this is the lowest per-platform fit score, falling
    /// back to the document-level score when there are no platform items.
    pub fn score(stage: StageKind, output: &Document) -> Option<f64> {
        match stage {
            StageKind::Collector => output.metadata_f64(keys::TOTAL_SCORE),
            StageKind::Scholar => output.metadata_f64(keys::CONFIDENCE),
            StageKind::Creator => output.metadata_f64(keys::ENGAGEMENT_SCORE),
            StageKind::Adapter => match platform_items(output) {
                Some(items) => items
                    .iter()
                    .filter_map(item_fit_score)
                    .reduce(f64::min),
                None => output.metadata_f64(keys::PLATFORM_FIT_SCORE),
            },
        }
    }
}

fn check_min(output: &Document, key: &str, min: f64, failures: &mut Vec<String>) {
    match output.metadata_f64(key) {
        Some(value) if value >= min => {}
        Some(value) => failures.push(format!("{key} {value} < {min}")),
        None => failures.push(format!("{key} missing")),
    }
}

/// Non-empty `platforms` array, if present.
fn platform_items(output: &Document) -> Option<&Vec<Value>> {
    output
        .metadata
        .get(keys::PLATFORMS)
        .and_then(Value::as_array)
        .filter(|items| !items.is_empty())
}

fn item_fit_score(item: &Value) -> Option<f64> {
    item.get(keys::PLATFORM_FIT_SCORE).and_then(Value::as_f64)
}

/// Every platform item must clear the threshold.
fn evaluate_adapter(output: &Document) -> GateOutcome {
    let score = QualityGateEvaluator::score(StageKind::Adapter, output);

    let Some(items) = platform_items(output) else {
        let mut failures = Vec::new();
        check_min(
            output,
            keys::PLATFORM_FIT_SCORE,
            ADAPTER_MIN_PLATFORM_FIT,
            &mut failures,
        );
        return GateOutcome::from_failures(score, failures);
    };

    let failures = items
        .iter()
        .enumerate()
        .filter_map(|(index, item)| {
            let label = item
                .get("platform")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| format!("platforms[{index}]"));
            match item_fit_score(item) {
                Some(fit) if fit >= ADAPTER_MIN_PLATFORM_FIT => None,
                Some(fit) => Some(format!(
                    "{label}: {} {fit} < {ADAPTER_MIN_PLATFORM_FIT}",
                    keys::PLATFORM_FIT_SCORE
                )),
                None => Some(format!("{label}: {} missing", keys::PLATFORM_FIT_SCORE)),
            }
        })
        .collect();

    GateOutcome::from_failures(score, failures)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(stage: StageKind) -> Document {
        Document::new(stage.as_str(), stage.as_str(), "content")
    }

    #[test]
    fn test_collector_gate() {
        let good = doc(StageKind::Collector)
            .with_metadata(keys::TOTAL_SCORE, 40)
            .with_metadata(keys::KEY_INSIGHT_COUNT, 3);
        let outcome = QualityGateEvaluator::evaluate(StageKind::Collector, &good);
        assert!(outcome.passed);
        assert_eq!(outcome.score, Some(40.0));
        assert!(outcome.reason.is_none());

        let thin = doc(StageKind::Collector)
            .with_metadata(keys::TOTAL_SCORE, 80)
            .with_metadata(keys::KEY_INSIGHT_COUNT, 2);
        let outcome = QualityGateEvaluator::evaluate(StageKind::Collector, &thin);
        assert!(!outcome.passed);
        assert!(outcome.reason.unwrap().contains("keyInsightCount"));
    }

    #[test]
    fn test_scholar_gate_low_confidence() {
        let output = doc(StageKind::Scholar)
            .with_metadata(keys::CONFIDENCE, 0.3)
            .with_metadata(keys::DEPTH_LEVEL, 3);
        let outcome = QualityGateEvaluator::evaluate(StageKind::Scholar, &output);
        assert!(!outcome.passed);
        assert_eq!(outcome.score, Some(0.3));
        let reason = outcome.reason.unwrap();
        assert!(reason.contains("confidence"));
        assert!(!reason.contains("depthLevel"));
    }

    #[test]
    fn test_missing_fields_fail() {
        let outcome = QualityGateEvaluator::evaluate(StageKind::Creator, &doc(StageKind::Creator));
        assert!(!outcome.passed);
        assert_eq!(outcome.score, None);
        assert_eq!(outcome.reason.as_deref(), Some("engagementScore missing"));
    }

    #[test]
    fn test_string_numbers_are_not_coerced() {
        let output = doc(StageKind::Creator).with_metadata(keys::ENGAGEMENT_SCORE, "90");
        assert!(!QualityGateEvaluator::evaluate(StageKind::Creator, &output).passed);
    }

    #[test]
    fn test_adapter_every_item_must_pass() {
        let output = doc(StageKind::Adapter).with_metadata(
            keys::PLATFORMS,
            json!([
                { "platform": "twitter", "platformFitScore": 92 },
                { "platform": "linkedin", "platformFitScore": 64 },
            ]),
        );
        let outcome = QualityGateEvaluator::evaluate(StageKind::Adapter, &output);
        assert!(!outcome.passed);
        assert_eq!(outcome.score, Some(64.0));
        let reason = outcome.reason.unwrap();
        assert!(reason.starts_with("linkedin:"));
        assert!(!reason.contains("twitter"));
    }

    #[test]
    fn test_adapter_items_all_passing() {
        let output = doc(StageKind::Adapter).with_metadata(
            keys::PLATFORMS,
            json!([{ "platformFitScore": 71 }, { "platformFitScore": 88 }]),
        );
        let outcome = QualityGateEvaluator::evaluate(StageKind::Adapter, &output);
        assert!(outcome.passed);
        assert_eq!(outcome.score, Some(71.0));
    }

    #[test]
    fn test_adapter_item_without_score_fails() {
        let output = doc(StageKind::Adapter)
            .with_metadata(keys::PLATFORMS, json!([{ "platformFitScore": 95 }, {}]));
        let outcome = QualityGateEvaluator::evaluate(StageKind::Adapter, &output);
        assert!(!outcome.passed);
        assert!(outcome.reason.unwrap().contains("platforms[1]"));
    }

    #[test]
    fn test_adapter_empty_items_fall_back_to_document_score() {
        let output = doc(StageKind::Adapter)
            .with_metadata(keys::PLATFORMS, json!([]))
            .with_metadata(keys::PLATFORM_FIT_SCORE, 75);
        let outcome = QualityGateEvaluator::evaluate(StageKind::Adapter, &output);
        assert!(outcome.passed);
        assert_eq!(outcome.score, Some(75.0));

        let bare = doc(StageKind::Adapter);
        assert!(!QualityGateEvaluator::evaluate(StageKind::Adapter, &bare).passed);
    }
}
