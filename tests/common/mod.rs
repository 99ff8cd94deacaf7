// tests/common/mod.rs
//
// Shared fixtures: a deterministic, imbalanced labeled dataset in the
// source CSV layout, a config rooted in a temp dir, and a hand-weighted
// artifact for tests that do not need a real training run.
#![allow(dead_code)]

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use hate_speech_moderator::artifact::ArtifactMetrics;
use hate_speech_moderator::classifier::LogisticRegression;
use hate_speech_moderator::dataset::ClassCounts;
use hate_speech_moderator::evaluate::ConfusionMatrix;
use hate_speech_moderator::vectorize::{TfidfParams, Vectorizer};
use hate_speech_moderator::{
    FileArtifactStore, ModerationConfig, TrainedModelArtifact, TrainingPipeline, TrainingReport,
};

pub const FRIENDLY: &str = "Have a great day, my friends!";
pub const ABUSIVE: &str = "you are a stupid idiot";

const INSULT_ADJ: &[&str] = &["stupid", "dumb", "worthless", "pathetic", "ugly"];
const INSULT_NOUN: &[&str] = &["idiot", "loser", "bitch", "trash", "moron"];
const INSULT_TEMPLATES: &[&str] = &[
    "you are a {a} {n}",
    "shut up you {a} {n}",
    "what a {a} {n} you are",
    "nobody likes you, {a} {n}",
    "go away {a} {n}!!",
    "such a {a} {n}",
    "you {a} {n}, get lost",
    "listen here you {a} {n}",
];

const GOOD: &[&str] = &["great", "lovely", "wonderful", "nice"];
const PEOPLE: &[&str] = &["friends", "family", "team"];
const THINGS: &[&str] = &["game", "weather", "coffee", "movie", "concert"];

/// `(text, source class)` rows: 200 offensive (class 0/1), 92 normal (class 2).
pub fn dataset_rows() -> Vec<(String, u8)> {
    let mut rows = Vec::new();
    let mut k = 0u8;
    for t in INSULT_TEMPLATES {
        for a in INSULT_ADJ {
            for n in INSULT_NOUN {
                rows.push((t.replace("{a}", a).replace("{n}", n), k % 2));
                k = k.wrapping_add(1);
            }
        }
    }
    for g in GOOD {
        for p in PEOPLE {
            rows.push((format!("have a {g} day with my {p}"), 2));
        }
        for t in THINGS {
            rows.push((format!("the {t} was {g} today"), 2));
            for p in PEOPLE {
                rows.push((format!("thanks {p}, what a {g} {t}"), 2));
            }
        }
    }
    rows
}

/// Write the generated dataset in the labeled_data.csv column layout, plus two
/// rows that cleaning must drop.
pub fn write_dataset(dir: &Path) -> PathBuf {
    let mut csv = String::from(",count,hate_speech,offensive_language,neither,class,tweet\n");
    let rows = dataset_rows();
    for (i, (text, class)) in rows.iter().enumerate() {
        let _ = writeln!(csv, "{i},3,0,0,3,{class},\"{text}\"");
    }
    let n = rows.len();
    let _ = writeln!(csv, "{n},3,0,0,3,,row without a label");
    let _ = writeln!(csv, "{},3,0,0,3,2,", n + 1);
    let path = dir.join("labeled_data.csv");
    fs::write(&path, csv).expect("write dataset");
    path
}

pub fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

/// Defaults with every output path inside `dir`.
pub fn config_in(dir: &Path) -> ModerationConfig {
    ModerationConfig {
        dataset_path: dir.join("labeled_data.csv"),
        artifact_path: dir.join("models/model.artifact"),
        report_dir: dir.join("reports"),
        ..ModerationConfig::default()
    }
}

pub fn pipeline_for(cfg: &ModerationConfig) -> TrainingPipeline {
    let store = Arc::new(FileArtifactStore::new(&cfg.artifact_path));
    TrainingPipeline::new(cfg, store)
}

/// Generate the dataset in `dir` and run the full pipeline on it.
pub fn train_in(dir: &Path) -> (ModerationConfig, TrainingReport) {
    let cfg = config_in(dir);
    let dataset = write_dataset(dir);
    let report = pipeline_for(&cfg).run(&dataset).expect("training run");
    (cfg, report)
}

/// Artifact with hand-set weights: insult terms push towards block,
/// friendly terms towards accept.
pub fn keyword_artifact(threshold: f64, intercept: f64) -> TrainedModelArtifact {
    let corpus: Vec<String> = dataset_rows().into_iter().map(|(t, _)| t).collect();
    let vectorizer = TfidfParams::default().fit(&corpus).expect("fit vectorizer");
    let weights = vectorizer
        .terms()
        .iter()
        .map(|t| {
            let words: Vec<&str> = t.split(' ').collect();
            if words.iter().any(|w| INSULT_ADJ.contains(w) || INSULT_NOUN.contains(w)) {
                5.0
            } else if words.iter().any(|w| GOOD.contains(w) || *w == "friend") {
                -5.0
            } else {
                0.0
            }
        })
        .collect();
    let width = vectorizer.vocabulary_size();
    let artifact = TrainedModelArtifact::new(
        vectorizer,
        LogisticRegression { weights, intercept },
        threshold,
        ArtifactMetrics {
            accuracy: 1.0,
            roc_auc: Some(1.0),
            confusion: ConfusionMatrix::default(),
            train_rows: corpus.len(),
            test_rows: 0,
            class_counts_before: ClassCounts::default(),
            class_counts_after: ClassCounts::default(),
            iterations: 0,
            convergence_warning: None,
        },
    );
    assert_eq!(artifact.classifier.weights.len(), width);
    artifact
}
