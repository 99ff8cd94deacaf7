//! # Moderation service
//! The single entry point for the comment-creation path: raw text in,
//! accept/block out.
//!
//! `evaluate` surfaces integrity errors; `gate` turns them into an
//! [`GateOutcome::Escalate`], which counts as blocked.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error};

use crate::artifact::ArtifactMetrics;
use crate::cache::ModelCache;
use crate::classifier::Classifier;
use crate::decision::ModerationDecision;
use crate::error::ModerationError;
use crate::metrics;
use crate::normalize::normalize;
use crate::telemetry::anon_hash;
use crate::vectorize::Vectorizer;

/// What the caller should do with a comment.
#[derive(Debug, Clone, PartialEq)]
pub enum GateOutcome {
    Accept(ModerationDecision),
    Block(ModerationDecision),
    /// The model could not produce a decision. Treated as blocked.
    Escalate { reason: String },
}

impl GateOutcome {
    pub fn is_blocked(&self) -> bool {
        !matches!(self, GateOutcome::Accept(_))
    }
}

/// Metadata about the model currently served.
#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub format_version: u32,
    pub normalizer_version: String,
    pub trained_at: DateTime<Utc>,
    pub vocabulary_size: usize,
    pub decision_threshold: f64,
    pub metrics: ArtifactMetrics,
}

pub struct ModerationService {
    cache: Arc<ModelCache>,
}

impl ModerationService {
    pub fn new(cache: Arc<ModelCache>) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &Arc<ModelCache> {
        &self.cache
    }

    /// Score `text` against the cached model.
    pub fn evaluate(&self, text: &str) -> Result<ModerationDecision, ModerationError> {
        let started = Instant::now();
        let artifact = self.cache.get()?;

        // the vectorizer normalizes again; both passes must agree with training
        let cleaned = normalize(text);
        let x = artifact.vectorizer.transform_one(&cleaned);
        let expected = artifact.classifier.n_features();
        if x.len() != expected {
            return Err(ModerationError::VectorizationMismatch {
                vector_dim: x.len(),
                expected,
            });
        }

        let score = artifact
            .classifier
            .predict_proba(std::slice::from_ref(&x))
            .first()
            .copied()
            .unwrap_or(0.0);
        let decision = ModerationDecision::new(score, artifact.decision_threshold);

        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        metrics::record_decision(decision.verdict, elapsed_ms);
        debug!(
            target: "moderation",
            id = %anon_hash(text),
            score = decision.score,
            threshold = decision.threshold_used,
            verdict = %decision.verdict,
            nnz = x.nnz(),
            elapsed_ms,
            "comment evaluated"
        );
        Ok(decision)
    }

    /// Fail-closed wrapper for callers that must not publish on error.
    pub fn gate(&self, text: &str) -> GateOutcome {
        match self.evaluate(text) {
            Ok(d) if d.is_blocked() => GateOutcome::Block(d),
            Ok(d) => GateOutcome::Accept(d),
            Err(e) => {
                metrics::record_failure();
                error!(target: "moderation", id = %anon_hash(text), error = %e, "moderation failed; escalating");
                GateOutcome::Escalate {
                    reason: e.to_string(),
                }
            }
        }
    }

    pub fn model_info(&self) -> Result<ModelInfo, ModerationError> {
        let a = self.cache.get()?;
        Ok(ModelInfo {
            format_version: a.format_version,
            normalizer_version: a.normalizer_version.clone(),
            trained_at: a.trained_at,
            vocabulary_size: a.vectorizer.vocabulary_size(),
            decision_threshold: a.decision_threshold,
            metrics: a.metrics.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::TrainedModelArtifact;
    use crate::classifier::LogisticRegression;
    use crate::config::ModerationConfig;
    use crate::dataset::ClassCounts;
    use crate::decision::Verdict;
    use crate::evaluate::ConfusionMatrix;
    use crate::vectorize::TfidfParams;

    fn service_with(weights_for: impl Fn(&str) -> f64, intercept: f64, threshold: f64) -> ModerationService {
        let corpus: Vec<String> = [
            "you are a stupid idiot",
            "what a loser",
            "have a great day",
            "lovely weather with friends",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        let vectorizer = TfidfParams::default().fit(&corpus).unwrap();
        let weights = vectorizer.terms().iter().map(|t| weights_for(t.as_str())).collect();
        let artifact = TrainedModelArtifact::new(
            vectorizer,
            LogisticRegression { weights, intercept },
            threshold,
            ArtifactMetrics {
                accuracy: 1.0,
                roc_auc: None,
                confusion: ConfusionMatrix::default(),
                train_rows: 4,
                test_rows: 0,
                class_counts_before: ClassCounts::default(),
                class_counts_after: ClassCounts::default(),
                iterations: 0,
                convergence_warning: None,
            },
        );
        ModerationService::new(Arc::new(ModelCache::with_artifact(artifact)))
    }

    fn insults(term: &str) -> f64 {
        match term {
            "stupid" | "idiot" | "loser" => 4.0,
            "great" | "friend" => -4.0,
            _ => 0.0,
        }
    }

    #[test]
    fn accepts_friendly_and_blocks_insults() {
        let svc = service_with(insults, 0.0, 0.65);
        let friendly = svc.evaluate("Have a great day, friends!").unwrap();
        assert_eq!(friendly.verdict, Verdict::Accept);
        let rude = svc.evaluate("You stupid idiot").unwrap();
        assert_eq!(rude.verdict, Verdict::Block);
        assert!(rude.score > 0.65);
        assert_eq!(rude.threshold_used, 0.65);
    }

    #[test]
    fn empty_text_scores_the_intercept() {
        let svc = service_with(insults, -0.3, 0.65);
        let a = svc.evaluate("").unwrap();
        let b = svc.evaluate("   ").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.score, crate::classifier::sigmoid(-0.3));
        assert_eq!(a.verdict, Verdict::Accept);
    }

    #[test]
    fn gate_maps_verdicts() {
        let svc = service_with(insults, 0.0, 0.65);
        assert!(matches!(svc.gate("great day"), GateOutcome::Accept(_)));
        let blocked = svc.gate("loser");
        assert!(matches!(blocked, GateOutcome::Block(_)));
        assert!(blocked.is_blocked());
    }

    #[test]
    fn inconsistent_artifact_is_a_mismatch() {
        let svc = service_with(insults, 0.0, 0.65);
        let mut artifact = (*svc.cache().get().unwrap()).clone();
        artifact.classifier.weights.push(0.0);
        let broken = ModerationService::new(Arc::new(ModelCache::with_artifact(artifact)));
        assert!(matches!(
            broken.evaluate("hello"),
            Err(ModerationError::VectorizationMismatch { .. })
        ));
        let outcome = broken.gate("hello");
        assert!(matches!(outcome, GateOutcome::Escalate { .. }));
        assert!(outcome.is_blocked());
    }

    #[test]
    fn double_normalization_is_stable_on_probes() {
        let svc = service_with(insults, 0.0, 0.65);
        let artifact = svc.cache().get().unwrap();
        for probe in ModerationConfig::default().probe_texts {
            let once = normalize(&probe);
            assert_eq!(normalize(&once), once, "probe {probe:?} not stable");
            assert_eq!(
                artifact.vectorizer.transform_one(&once),
                artifact.vectorizer.transform_one(&probe)
            );
        }
    }

    #[test]
    fn model_info_reports_artifact() {
        let svc = service_with(insults, 0.0, 0.7);
        let info = svc.model_info().unwrap();
        assert_eq!(info.decision_threshold, 0.7);
        assert!(info.vocabulary_size > 0);
        assert_eq!(info.normalizer_version, crate::normalize::NORMALIZER_VERSION);
    }
}
