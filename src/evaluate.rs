//! # Evaluation
//! Held-out metrics: accuracy, ROC-AUC, ROC curve, confusion matrix and a
//! per-class precision / recall / F1 report. All functions take labels and
//! scores as parallel slices; ordering is preserved.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::dataset::Label;

pub fn accuracy(truth: &[Label], predicted: &[Label]) -> f64 {
    if truth.is_empty() {
        return 0.0;
    }
    let hits = truth.iter().zip(predicted).filter(|(t, p)| t == p).count();
    hits as f64 / truth.len() as f64
}

/// Area under the ROC curve via the rank statistic (average ranks on ties).
/// `None` when only one class is present.
pub fn roc_auc(truth: &[Label], scores: &[f64]) -> Option<f64> {
    let n_pos = truth.iter().filter(|l| **l == Label::Offensive).count();
    let n_neg = truth.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut ranks = vec![0.0; scores.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        // 1-based ranks i+1..=j+1 share their mean
        let avg = (i + j) as f64 / 2.0 + 1.0;
        for &k in &order[i..=j] {
            ranks[k] = avg;
        }
        i = j + 1;
    }

    let pos_rank_sum: f64 = truth
        .iter()
        .zip(&ranks)
        .filter(|(l, _)| **l == Label::Offensive)
        .map(|(_, r)| r)
        .sum();
    let (p, n) = (n_pos as f64, n_neg as f64);
    Some((pos_rank_sum - p * (p + 1.0) / 2.0) / (p * n))
}

/// One point of the ROC curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RocPoint {
    pub fpr: f64,
    pub tpr: f64,
    /// Scores `>= threshold` are called positive. The first point uses +inf.
    pub threshold: f64,
}

/// ROC curve at every distinct score, highest threshold first.
pub fn roc_curve(truth: &[Label], scores: &[f64]) -> Vec<RocPoint> {
    let n_pos = truth.iter().filter(|l| **l == Label::Offensive).count() as f64;
    let n_neg = truth.len() as f64 - n_pos;
    let rate = |k: f64, n: f64| if n > 0.0 { k / n } else { 0.0 };

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    let mut points = vec![RocPoint {
        fpr: 0.0,
        tpr: 0.0,
        threshold: f64::INFINITY,
    }];
    let (mut tp, mut fp) = (0.0, 0.0);
    for (pos, &i) in order.iter().enumerate() {
        match truth[i] {
            Label::Offensive => tp += 1.0,
            Label::Normal => fp += 1.0,
        }
        let last_of_group = order
            .get(pos + 1)
            .map_or(true, |&next| scores[next] != scores[i]);
        if last_of_group {
            points.push(RocPoint {
                fpr: rate(fp, n_neg),
                tpr: rate(tp, n_pos),
                threshold: scores[i],
            });
        }
    }
    points
}

/// Binary confusion matrix, positive class = [`Label::Offensive`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub tn: usize,
    pub fp: usize,
    #[serde(rename = "fn")]
    pub fn_: usize,
    pub tp: usize,
}

impl ConfusionMatrix {
    pub fn from_labels(truth: &[Label], predicted: &[Label]) -> Self {
        let mut m = Self::default();
        for (t, p) in truth.iter().zip(predicted) {
            match (t, p) {
                (Label::Normal, Label::Normal) => m.tn += 1,
                (Label::Normal, Label::Offensive) => m.fp += 1,
                (Label::Offensive, Label::Normal) => m.fn_ += 1,
                (Label::Offensive, Label::Offensive) => m.tp += 1,
            }
        }
        m
    }

    pub fn total(&self) -> usize {
        self.tn + self.fp + self.fn_ + self.tp
    }

    /// False positives: normal text predicted offensive.
    pub fn false_positives(&self) -> usize {
        self.fp
    }

    /// False negatives: offensive text predicted normal.
    pub fn false_negatives(&self) -> usize {
        self.fn_
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let w = [self.tn, self.fp, self.fn_, self.tp]
            .iter()
            .map(|v| v.to_string().len())
            .max()
            .unwrap_or(1);
        writeln!(f, "[[{:>w$} {:>w$}]", self.tn, self.fp)?;
        write!(f, " [{:>w$} {:>w$}]]", self.fn_, self.tp)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassScores {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Per-class report plus macro and support-weighted averages.
/// Undefined ratios (zero denominators) are reported as 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    pub normal: ClassScores,
    pub offensive: ClassScores,
    pub accuracy: f64,
    pub macro_avg: ClassScores,
    pub weighted_avg: ClassScores,
}

impl ClassificationReport {
    pub fn from_labels(truth: &[Label], predicted: &[Label]) -> Self {
        let cm = ConfusionMatrix::from_labels(truth, predicted);
        let ratio = |a: usize, b: usize| if b == 0 { 0.0 } else { a as f64 / b as f64 };
        let scores = |tp: usize, fp: usize, fn_: usize| {
            let precision = ratio(tp, tp + fp);
            let recall = ratio(tp, tp + fn_);
            let f1 = if precision + recall == 0.0 {
                0.0
            } else {
                2.0 * precision * recall / (precision + recall)
            };
            ClassScores {
                precision,
                recall,
                f1,
                support: tp + fn_,
            }
        };
        // Normal as the positive class swaps the roles
        let normal = scores(cm.tn, cm.fn_, cm.fp);
        let offensive = scores(cm.tp, cm.fp, cm.fn_);

        let total = (normal.support + offensive.support) as f64;
        let avg = |f: fn(&ClassScores) -> f64, weighted: bool| {
            if weighted {
                if total == 0.0 {
                    0.0
                } else {
                    (f(&normal) * normal.support as f64 + f(&offensive) * offensive.support as f64)
                        / total
                }
            } else {
                (f(&normal) + f(&offensive)) / 2.0
            }
        };
        let averaged = |weighted| ClassScores {
            precision: avg(|s| s.precision, weighted),
            recall: avg(|s| s.recall, weighted),
            f1: avg(|s| s.f1, weighted),
            support: normal.support + offensive.support,
        };

        Self {
            normal,
            offensive,
            accuracy: accuracy(truth, predicted),
            macro_avg: averaged(false),
            weighted_avg: averaged(true),
        }
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let row = |f: &mut fmt::Formatter<'_>, name: &str, s: &ClassScores| {
            writeln!(
                f,
                "{name:>12} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                s.precision, s.recall, s.f1, s.support
            )
        };
        writeln!(f, "{:>12} {:>9} {:>9} {:>9} {:>9}", "", "precision", "recall", "f1-score", "support")?;
        writeln!(f)?;
        row(f, Label::Normal.name(), &self.normal)?;
        row(f, Label::Offensive.name(), &self.offensive)?;
        writeln!(f)?;
        writeln!(
            f,
            "{:>12} {:>9} {:>9} {:>9.2} {:>9}",
            "accuracy", "", "", self.accuracy, self.macro_avg.support
        )?;
        row(f, "macro avg", &self.macro_avg)?;
        row(f, "weighted avg", &self.weighted_avg)
    }
}

/// Everything computed on the held-out split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub accuracy: f64,
    pub roc_auc: Option<f64>,
    pub confusion: ConfusionMatrix,
    pub report: ClassificationReport,
    pub roc_curve: Vec<RocPoint>,
}

impl Evaluation {
    pub fn compute(truth: &[Label], predicted: &[Label], scores: &[f64]) -> Self {
        Self {
            accuracy: accuracy(truth, predicted),
            roc_auc: roc_auc(truth, scores),
            confusion: ConfusionMatrix::from_labels(truth, predicted),
            report: ClassificationReport::from_labels(truth, predicted),
            roc_curve: roc_curve(truth, scores),
        }
    }
}
