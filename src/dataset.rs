//! # Dataset
//! CSV loading, cleaning and the stratified train/test split.
//!
//! Source columns `tweet` / `class` are read as `text` / `label`; any other
//! column is ignored. Rows with an empty text or label are dropped. Label
//! values `0` and `1` collapse to [`Label::Offensive`], every other value to
//! [`Label::Normal`] (the source dataset uses 0 = hate speech,
//! 1 = offensive, 2 = neither).

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::error::TrainingFailed;
use crate::vectorize::FeatureVector;

/// Binary class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Label {
    Normal = 0,
    Offensive = 1,
}

impl Label {
    pub const ALL: [Label; 2] = [Label::Normal, Label::Offensive];

    /// Collapse a raw source class value.
    pub fn from_source(raw: &str) -> Self {
        match raw.trim().parse::<f64>() {
            Ok(v) if v == 0.0 || v == 1.0 => Label::Offensive,
            _ => Label::Normal,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn target(self) -> f64 {
        f64::from(self.as_u8())
    }

    /// Display name used in reports.
    pub fn name(self) -> &'static str {
        match self {
            Label::Normal => "Normal",
            Label::Offensive => "Hate Speech",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One cleaned dataset row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabeledExample {
    /// 0-based data row in the source file (header excluded).
    pub row: usize,
    pub text: String,
    pub label: Label,
}

/// Per-class counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassCounts {
    pub normal: usize,
    pub offensive: usize,
}

impl ClassCounts {
    pub fn of<'a>(labels: impl IntoIterator<Item = &'a Label>) -> Self {
        let mut c = Self::default();
        for l in labels {
            match l {
                Label::Normal => c.normal += 1,
                Label::Offensive => c.offensive += 1,
            }
        }
        c
    }

    pub fn get(&self, label: Label) -> usize {
        match label {
            Label::Normal => self.normal,
            Label::Offensive => self.offensive,
        }
    }

    pub fn total(&self) -> usize {
        self.normal + self.offensive
    }

    pub fn is_balanced(&self) -> bool {
        self.normal == self.offensive
    }
}

impl fmt::Display for ClassCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{normal: {}, offensive: {}}}", self.normal, self.offensive)
    }
}

/// Cleaned dataset.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub examples: Vec<LabeledExample>,
    /// Rows dropped for a missing text or label.
    pub dropped: usize,
}

impl Dataset {
    pub fn class_counts(&self) -> ClassCounts {
        ClassCounts::of(self.examples.iter().map(|e| &e.label))
    }
}

const TEXT_COLUMNS: &[&str] = &["text", "tweet"];
const LABEL_COLUMNS: &[&str] = &["label", "class"];

/// Load and clean a labeled CSV file.
pub fn load_csv(path: &Path) -> Result<Dataset, TrainingFailed> {
    if !path.is_file() {
        return Err(TrainingFailed::dataset(format!(
            "dataset file not found: {}",
            path.display()
        )));
    }
    let reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|e| TrainingFailed::dataset(format!("cannot open {}: {e}", path.display())))?;
    parse_reader(reader)
}

/// Same as [`load_csv`] for in-memory CSV content.
pub fn parse_csv_str(content: &str) -> Result<Dataset, TrainingFailed> {
    let reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(content.as_bytes());
    parse_reader(reader)
}

fn parse_reader<R: std::io::Read>(mut reader: csv::Reader<R>) -> Result<Dataset, TrainingFailed> {
    let headers = reader
        .headers()
        .map_err(|e| TrainingFailed::dataset(format!("unreadable header: {e}")))?
        .clone();

    let find = |names: &[&str]| {
        names
            .iter()
            .find_map(|n| headers.iter().position(|h| h.trim() == *n))
    };
    let (text_idx, label_idx) = match (find(TEXT_COLUMNS), find(LABEL_COLUMNS)) {
        (Some(t), Some(l)) => (t, l),
        _ => {
            return Err(TrainingFailed::dataset(format!(
                "required columns text/tweet and label/class not found (have: {})",
                headers.iter().collect::<Vec<_>>().join(", ")
            )))
        }
    };

    let mut examples = Vec::new();
    let mut dropped = 0usize;
    for (row, record) in reader.records().enumerate() {
        let record =
            record.map_err(|e| TrainingFailed::dataset(format!("unreadable row {row}: {e}")))?;
        let text = record.get(text_idx).unwrap_or_default();
        let label = record.get(label_idx).unwrap_or_default();
        if text.trim().is_empty() || label.trim().is_empty() {
            dropped += 1;
            continue;
        }
        examples.push(LabeledExample {
            row,
            text: text.to_string(),
            label: Label::from_source(label),
        });
    }

    if examples.is_empty() {
        return Err(TrainingFailed::dataset("no usable rows after cleaning"));
    }
    Ok(Dataset { examples, dropped })
}

/// Train/test partition of the cleaned examples, each sorted by source row.
#[derive(Debug, Clone)]
pub struct Split {
    pub train: Vec<LabeledExample>,
    pub test: Vec<LabeledExample>,
}

/// Stratified split: each class contributes `round(n_c * test_ratio)`
/// examples to the test side (at least one, and at least one left for
/// training). Same input and seed give the same partition.
pub fn stratified_split(
    examples: &[LabeledExample],
    test_ratio: f64,
    seed: u64,
) -> Result<Split, TrainingFailed> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::new();
    let mut test = Vec::new();

    for label in Label::ALL {
        let mut members: Vec<&LabeledExample> =
            examples.iter().filter(|e| e.label == label).collect();
        if members.len() < 2 {
            return Err(TrainingFailed::dataset(format!(
                "class {label} has {} example(s); need at least 2 to stratify",
                members.len()
            )));
        }
        members.shuffle(&mut rng);
        let n_test = ((members.len() as f64 * test_ratio).round() as usize).clamp(1, members.len() - 1);
        test.extend(members[..n_test].iter().map(|e| (*e).clone()));
        train.extend(members[n_test..].iter().map(|e| (*e).clone()));
    }

    train.sort_by_key(|e| e.row);
    test.sort_by_key(|e| e.row);
    Ok(Split { train, test })
}

/// Vectorized training split. The only input a resampler accepts.
#[derive(Debug, Clone)]
pub struct TrainingSet {
    features: Vec<FeatureVector>,
    labels: Vec<Label>,
}

impl TrainingSet {
    pub fn new(features: Vec<FeatureVector>, labels: Vec<Label>) -> Result<Self, TrainingFailed> {
        if features.len() != labels.len() {
            return Err(TrainingFailed::dataset(format!(
                "{} feature rows for {} labels",
                features.len(),
                labels.len()
            )));
        }
        Ok(Self { features, labels })
    }

    pub fn features(&self) -> &[FeatureVector] {
        &self.features
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn class_counts(&self) -> ClassCounts {
        ClassCounts::of(&self.labels)
    }

    pub fn into_parts(self) -> (Vec<FeatureVector>, Vec<Label>) {
        (self.features, self.labels)
    }
}

/// Vectorized held-out split. Deliberately has no conversion into a
/// [`TrainingSet`], so it can never reach a resampler.
#[derive(Debug, Clone)]
pub struct EvaluationSet {
    features: Vec<FeatureVector>,
    examples: Vec<LabeledExample>,
}

impl EvaluationSet {
    pub fn new(features: Vec<FeatureVector>, examples: Vec<LabeledExample>) -> Self {
        debug_assert_eq!(features.len(), examples.len());
        Self { features, examples }
    }

    pub fn features(&self) -> &[FeatureVector] {
        &self.features
    }

    pub fn examples(&self) -> &[LabeledExample] {
        &self.examples
    }

    pub fn labels(&self) -> Vec<Label> {
        self.examples.iter().map(|e| e.label).collect()
    }

    pub fn class_counts(&self) -> ClassCounts {
        ClassCounts::of(self.examples.iter().map(|e| &e.label))
    }
}
