// tests/training_e2e.rs
//
// Full training runs on the generated dataset, then moderation with the
// artifact they produce.
//
// Covered:
// - scenario A: friendly text is accepted
// - scenario B: abusive text from the training distribution is blocked
// - scenario C: empty text scores exactly sigmoid(intercept), across runs
// - resampling balances the training split only
// - same dataset + seed => same split, metrics and model
// - report files

mod common;

use std::fs;
use std::sync::Arc;

use hate_speech_moderator::classifier::sigmoid;
use hate_speech_moderator::dataset::{self, Label};
use hate_speech_moderator::normalize::{is_stopword, normalize};
use hate_speech_moderator::vectorize::Vectorizer;
use hate_speech_moderator::{
    ArtifactStore, FileArtifactStore, ModelCache, ModerationService, Verdict,
};

fn service_for(cfg: &hate_speech_moderator::ModerationConfig) -> ModerationService {
    let store = Arc::new(FileArtifactStore::new(&cfg.artifact_path));
    ModerationService::new(Arc::new(ModelCache::new(store)))
}

#[test]
fn trained_model_accepts_friendly_and_blocks_abuse() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (cfg, report) = common::train_in(dir.path());
    assert!(report.evaluation.accuracy > 0.9, "accuracy {}", report.evaluation.accuracy);

    let svc = service_for(&cfg);

    let a = svc.evaluate(common::FRIENDLY).expect("scenario A");
    assert_eq!(a.verdict, Verdict::Accept, "friendly scored {}", a.score);
    assert!(a.score <= 0.65);
    assert_eq!(a.threshold_used, 0.65);

    let b = svc.evaluate(common::ABUSIVE).expect("scenario B");
    assert_eq!(b.verdict, Verdict::Block, "abusive scored {}", b.score);
    assert!(b.score > 0.65);

    let short = svc.evaluate("Have a great day!").expect("scenario A, short form");
    assert_eq!(short.verdict, Verdict::Accept, "short friendly scored {}", short.score);
}

#[test]
fn empty_text_scores_the_trained_intercept() {
    let d1 = tempfile::tempdir().expect("tempdir");
    let d2 = tempfile::tempdir().expect("tempdir");
    let (cfg1, _) = common::train_in(d1.path());
    let (cfg2, _) = common::train_in(d2.path());

    let artifact = FileArtifactStore::new(&cfg1.artifact_path).load().expect("load");
    assert!(artifact.vectorizer.transform_one("").is_zero());

    let svc1 = service_for(&cfg1);
    let c1 = svc1.evaluate("").expect("scenario C");
    let c2 = svc1.evaluate("").expect("scenario C again");
    assert_eq!(c1, c2);
    assert_eq!(
        c1.score.to_bits(),
        sigmoid(artifact.classifier.intercept).to_bits(),
        "empty text must score sigmoid(intercept)"
    );
    assert_eq!(c1.verdict, Verdict::for_score(c1.score, 0.65));

    let other = service_for(&cfg2).evaluate("").expect("scenario C, second run");
    assert_eq!(other.score.to_bits(), c1.score.to_bits());
}

#[test]
fn resampling_touches_training_split_only() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (_, report) = common::train_in(dir.path());

    assert_eq!(report.class_counts.offensive, 200);
    assert_eq!(report.class_counts.normal, 92);
    assert_eq!(report.dropped_rows, 2);

    // stratified 80/20 per class
    assert_eq!(report.test_counts.offensive, 40);
    assert_eq!(report.test_counts.normal, 18);
    assert_eq!(report.train_counts_before.offensive, 160);
    assert_eq!(report.train_counts_before.normal, 74);

    // balanced after SMOTE
    assert_eq!(report.train_counts_after.offensive, 160);
    assert_eq!(report.train_counts_after.normal, 160);

    // evaluation saw exactly the untouched held-out rows
    assert_eq!(report.scored_test.len(), 58);
    assert_eq!(report.evaluation.confusion.total(), 58);
    let held_out_normal = report
        .scored_test
        .iter()
        .filter(|s| s.true_label == Label::Normal)
        .count();
    assert_eq!(held_out_normal, 18);
}

#[test]
fn same_dataset_and_seed_give_same_results() {
    let d1 = tempfile::tempdir().expect("tempdir");
    let d2 = tempfile::tempdir().expect("tempdir");
    let (c1, r1) = common::train_in(d1.path());
    let (c2, r2) = common::train_in(d2.path());

    let rows = |r: &hate_speech_moderator::TrainingReport| {
        r.scored_test.iter().map(|s| s.row).collect::<Vec<_>>()
    };
    assert_eq!(rows(&r1), rows(&r2));
    assert_eq!(r1.evaluation, r2.evaluation);
    assert_eq!(r1.scored_test, r2.scored_test);

    let a1 = FileArtifactStore::new(&c1.artifact_path).load().expect("load 1");
    let a2 = FileArtifactStore::new(&c2.artifact_path).load().expect("load 2");
    assert_eq!(a1.vectorizer, a2.vectorizer);
    assert_eq!(a1.classifier, a2.classifier);
}

#[test]
fn reports_are_written_next_to_each_other() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (cfg, report) = common::train_in(dir.path());
    let files = report.report_files.as_ref().expect("report files");
    assert!(files.summary.starts_with(&cfg.report_dir));

    let summary = fs::read_to_string(&files.summary).expect("summary");
    assert!(summary.contains("Accuracy: "));
    assert!(summary.contains("ROC-AUC: "));
    assert!(summary.contains("Hate Speech"));
    assert!(summary.contains("Confusion Matrix:"));
    assert!(summary.contains("False Positives (Normal classified as Hate): "));
    assert!(summary.contains("You're such a loser."));

    let errors = fs::read_to_string(&files.error_analysis).expect("error analysis");
    let mut lines = errors.lines();
    assert_eq!(lines.next(), Some("text,true_label,pred_label,probability"));
    assert_eq!(lines.count(), report.scored_test.len());

    let wrong = fs::read_to_string(&files.misclassified).expect("misclassified");
    let mut lines = wrong.lines();
    assert_eq!(lines.next(), Some("text,true_label,pred_label,probability"));
    assert_eq!(lines.count(), report.misclassified().count());

    let roc = fs::read_to_string(&files.roc_curve).expect("roc curve");
    assert!(roc.starts_with("fpr,tpr,threshold\n0,0,inf\n"));

    assert_eq!(report.artifact_path.as_deref(), Some(cfg.artifact_path.as_path()));
    assert!(cfg.artifact_path.is_file());
    assert_eq!(report.probes.len(), cfg.probe_texts.len());
}

#[test]
fn training_corpus_normalizes_cleanly() {
    let ds = dataset::load_csv(&common::write_dataset(
        tempfile::tempdir().expect("tempdir").path(),
    ))
    .expect("load");
    for e in &ds.examples {
        let out = normalize(&e.text);
        assert!(out.chars().all(|c| c.is_ascii_lowercase() || c == ' '), "{out:?}");
        assert!(out.split_whitespace().all(|t| !is_stopword(t)), "{out:?}");
    }
}

#[test]
fn static_fixture_trains_end_to_end() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cfg = common::config_in(dir.path());
    let report = common::pipeline_for(&cfg)
        .run(&common::fixture("labeled_data.csv"))
        .expect("training on static fixture");
    assert_eq!(report.dataset_rows, 22);
    assert_eq!(report.dropped_rows, 2);
    assert!(report.train_counts_after.is_balanced());
    assert!(cfg.artifact_path.is_file());
}
