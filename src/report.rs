//! Human-readable training report and its companion CSV files.
//!
//! `error_analysis.csv` lists every scored test row; `misclassified.csv` is
//! the subset the model got wrong.

use serde::Serialize;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::artifact::write_atomic;
use crate::error::TrainingFailed;
use crate::pipeline::{ScoredExample, TrainingReport};

pub const SUMMARY_FILE: &str = "training_report.txt";
pub const ERROR_ANALYSIS_FILE: &str = "error_analysis.csv";
pub const MISCLASSIFIED_FILE: &str = "misclassified.csv";
pub const ROC_CURVE_FILE: &str = "roc_curve.csv";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportFiles {
    pub summary: PathBuf,
    pub error_analysis: PathBuf,
    pub misclassified: PathBuf,
    pub roc_curve: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ReportWriter {
    dir: PathBuf,
}

impl ReportWriter {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn write(&self, report: &TrainingReport) -> Result<ReportFiles, TrainingFailed> {
        let files = ReportFiles {
            summary: self.dir.join(SUMMARY_FILE),
            error_analysis: self.dir.join(ERROR_ANALYSIS_FILE),
            misclassified: self.dir.join(MISCLASSIFIED_FILE),
            roc_curve: self.dir.join(ROC_CURVE_FILE),
        };

        put(&files.summary, render_summary(report).as_bytes())?;
        put(
            &files.error_analysis,
            &scored_csv(&report.scored_test, &files.error_analysis)?,
        )?;
        put(
            &files.misclassified,
            &scored_csv(report.misclassified(), &files.misclassified)?,
        )?;
        put(&files.roc_curve, &roc_curve_csv(report, &files.roc_curve)?)?;

        info!(target: "training", dir = %self.dir.display(), "reports written");
        Ok(files)
    }
}

fn put(path: &Path, bytes: &[u8]) -> Result<(), TrainingFailed> {
    write_atomic(path, bytes).map_err(|source| TrainingFailed::ReportWrite {
        path: path.to_path_buf(),
        source,
    })
}

fn csv_error(path: &Path, e: csv::Error) -> TrainingFailed {
    TrainingFailed::ReportWrite {
        path: path.to_path_buf(),
        source: e.into(),
    }
}

/// Plain-text summary: metrics, classification report, confusion matrix,
/// error counts and probe predictions.
pub fn render_summary(report: &TrainingReport) -> String {
    let ev = &report.evaluation;
    let mut out = String::new();
    let _ = writeln!(out, "Model Evaluation Report");
    let _ = writeln!(out, "{}", "=".repeat(30));
    let _ = writeln!(out, "Accuracy: {:.4}", ev.accuracy);
    match ev.roc_auc {
        Some(auc) => {
            let _ = writeln!(out, "ROC-AUC: {auc:.4}");
        }
        None => {
            let _ = writeln!(out, "ROC-AUC: n/a (single class in test split)");
        }
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "Classification Report:");
    let _ = write!(out, "{}", ev.report);
    let _ = writeln!(out);
    let _ = writeln!(out, "Confusion Matrix:");
    let _ = writeln!(out, "{}", ev.confusion);
    let _ = writeln!(out);

    let _ = writeln!(out, "Error Analysis");
    let _ = writeln!(out, "{}", "=".repeat(30));
    let _ = writeln!(
        out,
        "False Positives (Normal classified as Hate): {}",
        report.false_positives()
    );
    let _ = writeln!(
        out,
        "False Negatives (Hate classified as Normal): {}",
        report.false_negatives()
    );
    let _ = writeln!(out);

    let _ = writeln!(out, "Training");
    let _ = writeln!(out, "{}", "=".repeat(30));
    let _ = writeln!(
        out,
        "Rows: {} kept, {} dropped; class counts {}",
        report.dataset_rows, report.dropped_rows, report.class_counts
    );
    let _ = writeln!(out, "Train before balancing: {}", report.train_counts_before);
    let _ = writeln!(out, "Train after balancing:  {}", report.train_counts_after);
    let _ = writeln!(out, "Test: {}", report.test_counts);
    let _ = writeln!(out, "Vocabulary size: {}", report.vocabulary_size);
    match &report.convergence_warning {
        Some(w) => {
            let _ = writeln!(out, "Optimizer: {w}");
        }
        None => {
            let _ = writeln!(out, "Optimizer: converged in {} iterations", report.iterations);
        }
    }

    if !report.probes.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Probes (decision threshold {:.2})", report.decision_threshold);
        let _ = writeln!(out, "{}", "=".repeat(30));
        for p in &report.probes {
            let _ = writeln!(
                out,
                "Text: {:?} -> Prediction: {} (Confidence: {:.2}), score {:.4}, verdict {}",
                p.text, p.label, p.confidence, p.score, p.verdict
            );
        }
    }
    out
}

fn scored_csv<'a>(
    rows: impl IntoIterator<Item = &'a ScoredExample>,
    path: &Path,
) -> Result<Vec<u8>, TrainingFailed> {
    let mut w = csv::Writer::from_writer(Vec::new());
    w.write_record(["text", "true_label", "pred_label", "probability"])
        .map_err(|e| csv_error(path, e))?;
    for s in rows {
        w.write_record([
            s.text.clone(),
            s.true_label.as_u8().to_string(),
            s.pred_label.as_u8().to_string(),
            s.probability.to_string(),
        ])
        .map_err(|e| csv_error(path, e))?;
    }
    w.into_inner().map_err(|e| TrainingFailed::ReportWrite {
        path: path.to_path_buf(),
        source: e.into_error(),
    })
}

fn roc_curve_csv(report: &TrainingReport, path: &Path) -> Result<Vec<u8>, TrainingFailed> {
    let mut w = csv::Writer::from_writer(Vec::new());
    w.write_record(["fpr", "tpr", "threshold"])
        .map_err(|e| csv_error(path, e))?;
    for p in &report.evaluation.roc_curve {
        w.write_record([p.fpr.to_string(), p.tpr.to_string(), p.threshold.to_string()])
            .map_err(|e| csv_error(path, e))?;
    }
    w.into_inner().map_err(|e| TrainingFailed::ReportWrite {
        path: path.to_path_buf(),
        source: e.into_error(),
    })
}
