//! # Training pipeline
//! Offline job: CSV → split → TF-IDF → resample → logistic regression →
//! held-out evaluation → reports → artifact.
//!
//! Nothing is persisted until every earlier stage succeeded; the artifact is
//! the last write. Cancellation is checked between stages and inside the
//! optimizer loop.

use rayon::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use crate::artifact::{ArtifactMetrics, ArtifactStore, TrainedModelArtifact};
use crate::classifier::{Classifier, ConvergenceWarning, LogisticParams};
use crate::config::ModerationConfig;
use crate::dataset::{self, ClassCounts, EvaluationSet, Label, TrainingSet};
use crate::decision::Verdict;
use crate::error::TrainingFailed;
use crate::evaluate::Evaluation;
use crate::normalize::normalize;
use crate::report::{ReportFiles, ReportWriter};
use crate::resample::Resampler;
use crate::vectorize::{TfidfParams, Vectorizer};

/// Shared abort flag for a running job.
#[derive(Debug, Clone, Default)]
pub struct Cancellation(Arc<AtomicBool>);

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn check(&self, stage: &'static str) -> Result<(), TrainingFailed> {
        if self.is_cancelled() {
            Err(TrainingFailed::Cancelled { stage })
        } else {
            Ok(())
        }
    }
}

/// One held-out row with its prediction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredExample {
    pub row: usize,
    /// Normalized text, as seen by the model.
    pub text: String,
    pub true_label: Label,
    pub pred_label: Label,
    /// Probability of [`Label::Offensive`].
    pub probability: f64,
}

impl ScoredExample {
    pub fn is_error(&self) -> bool {
        self.true_label != self.pred_label
    }
}

/// A configured sentence scored by the freshly trained model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeResult {
    pub text: String,
    /// Label at 0.5.
    pub label: Label,
    /// Probability of `label`.
    pub confidence: f64,
    pub score: f64,
    /// Verdict at the configured decision threshold.
    pub verdict: Verdict,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrainingReport {
    pub dataset_rows: usize,
    pub dropped_rows: usize,
    pub class_counts: ClassCounts,
    pub train_counts_before: ClassCounts,
    pub train_counts_after: ClassCounts,
    pub test_counts: ClassCounts,
    pub vocabulary_size: usize,
    pub iterations: usize,
    pub convergence_warning: Option<ConvergenceWarning>,
    pub evaluation: Evaluation,
    pub decision_threshold: f64,
    pub scored_test: Vec<ScoredExample>,
    pub probes: Vec<ProbeResult>,
    pub report_files: Option<ReportFiles>,
    pub artifact_path: Option<PathBuf>,
}

impl TrainingReport {
    /// Normal text predicted offensive.
    pub fn false_positives(&self) -> usize {
        self.evaluation.confusion.false_positives()
    }

    /// Offensive text predicted normal.
    pub fn false_negatives(&self) -> usize {
        self.evaluation.confusion.false_negatives()
    }

    pub fn misclassified(&self) -> impl Iterator<Item = &ScoredExample> {
        self.scored_test.iter().filter(|s| s.is_error())
    }
}

pub struct TrainingPipeline {
    tfidf: TfidfParams,
    logistic: LogisticParams,
    test_ratio: f64,
    seed: u64,
    decision_threshold: f64,
    probe_texts: Vec<String>,
    reports: ReportWriter,
    store: Arc<dyn ArtifactStore>,
    resampler: Box<dyn Resampler>,
    cancel: Cancellation,
}

impl TrainingPipeline {
    pub fn new(config: &ModerationConfig, store: Arc<dyn ArtifactStore>) -> Self {
        Self {
            tfidf: config.tfidf_params(),
            logistic: config.logistic_params(),
            test_ratio: config.test_ratio,
            seed: config.seed,
            decision_threshold: config.decision_threshold,
            probe_texts: config.probe_texts.clone(),
            reports: ReportWriter::new(&config.report_dir),
            store,
            resampler: Box::new(config.smote()),
            cancel: Cancellation::new(),
        }
    }

    pub fn with_resampler(mut self, resampler: Box<dyn Resampler>) -> Self {
        self.resampler = resampler;
        self
    }

    pub fn with_cancellation(mut self, cancel: Cancellation) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation(&self) -> Cancellation {
        self.cancel.clone()
    }

    pub fn run(&self, dataset_path: &Path) -> Result<TrainingReport, TrainingFailed> {
        let started = Instant::now();
        let cancel = &self.cancel;

        cancel.check("load")?;
        let ds = dataset::load_csv(dataset_path)?;
        let class_counts = ds.class_counts();
        info!(
            target: "training",
            path = %dataset_path.display(),
            rows = ds.examples.len(),
            dropped = ds.dropped,
            normal = class_counts.normal,
            offensive = class_counts.offensive,
            "dataset loaded"
        );

        cancel.check("split")?;
        let split = dataset::stratified_split(&ds.examples, self.test_ratio, self.seed)?;
        let train_labels: Vec<Label> = split.train.iter().map(|e| e.label).collect();
        let train_counts_before = ClassCounts::of(&train_labels);
        let test_counts = ClassCounts::of(split.test.iter().map(|e| &e.label));
        info!(
            target: "training",
            train = %train_counts_before,
            test = %test_counts,
            "class distribution before balancing"
        );

        cancel.check("normalize")?;
        let train_text: Vec<String> = split.train.par_iter().map(|e| normalize(&e.text)).collect();
        let test_text: Vec<String> = split.test.par_iter().map(|e| normalize(&e.text)).collect();

        cancel.check("vectorize")?;
        let (vectorizer, train_x) = self.tfidf.fit_transform(&train_text)?;
        let test_x = vectorizer.par_transform(&test_text);
        info!(target: "training", vocabulary = vectorizer.vocabulary_size(), "vectorizer fitted");

        let train_rows = split.train.len();
        let test_rows = split.test.len();
        let training = TrainingSet::new(train_x, train_labels)?;
        let held_out = EvaluationSet::new(test_x, split.test);

        cancel.check("resample")?;
        let training = self.resampler.resample(training)?;
        let train_counts_after = training.class_counts();
        info!(target: "training", train = %train_counts_after, "class distribution after balancing");

        cancel.check("fit")?;
        let fit = self.logistic.fit(&training, cancel)?;
        drop(training);
        let model = fit.model;

        cancel.check("evaluate")?;
        let truth = held_out.labels();
        let scores = model.predict_proba(held_out.features());
        let predicted = model.predict(held_out.features());
        let evaluation = Evaluation::compute(&truth, &predicted, &scores);
        info!(
            target: "training",
            accuracy = evaluation.accuracy,
            roc_auc = ?evaluation.roc_auc,
            false_positives = evaluation.confusion.false_positives(),
            false_negatives = evaluation.confusion.false_negatives(),
            "held-out evaluation"
        );

        let scored_test = held_out
            .examples()
            .iter()
            .zip(test_text)
            .zip(predicted.iter().zip(&scores))
            .map(|((e, text), (pred, p))| ScoredExample {
                row: e.row,
                text,
                true_label: e.label,
                pred_label: *pred,
                probability: *p,
            })
            .collect();

        let probe_x = vectorizer.transform(&self.probe_texts);
        let probes = self
            .probe_texts
            .iter()
            .zip(model.predict_proba(&probe_x))
            .map(|(text, score)| {
                let label = if score > 0.5 { Label::Offensive } else { Label::Normal };
                ProbeResult {
                    text: text.clone(),
                    label,
                    confidence: if label == Label::Offensive { score } else { 1.0 - score },
                    score,
                    verdict: Verdict::for_score(score, self.decision_threshold),
                }
            })
            .collect();

        let mut report = TrainingReport {
            dataset_rows: ds.examples.len(),
            dropped_rows: ds.dropped,
            class_counts,
            train_counts_before,
            train_counts_after,
            test_counts,
            vocabulary_size: vectorizer.vocabulary_size(),
            iterations: fit.iterations,
            convergence_warning: fit.warning,
            evaluation,
            decision_threshold: self.decision_threshold,
            scored_test,
            probes,
            report_files: None,
            artifact_path: None,
        };

        cancel.check("report")?;
        report.report_files = Some(self.reports.write(&report)?);

        cancel.check("persist")?;
        let artifact = TrainedModelArtifact::new(
            vectorizer,
            model,
            self.decision_threshold,
            ArtifactMetrics {
                accuracy: report.evaluation.accuracy,
                roc_auc: report.evaluation.roc_auc,
                confusion: report.evaluation.confusion,
                train_rows,
                test_rows,
                class_counts_before: train_counts_before,
                class_counts_after: train_counts_after,
                iterations: report.iterations,
                convergence_warning: report.convergence_warning,
            },
        );
        report.artifact_path = Some(self.store.save(&artifact)?);

        if let Some(w) = &report.convergence_warning {
            warn!(target: "training", %w, "model saved despite convergence warning");
        }
        info!(
            target: "training",
            elapsed_ms = started.elapsed().as_millis() as u64,
            "training run complete"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_is_shared_between_clones() {
        let a = Cancellation::new();
        let b = a.clone();
        assert!(a.check("x").is_ok());
        b.cancel();
        assert!(a.is_cancelled());
        assert!(matches!(a.check("fit"), Err(TrainingFailed::Cancelled { stage: "fit" })));
    }
}
