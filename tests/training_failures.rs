// tests/training_failures.rs
//
// Recoverable failures abort the run and leave no artifact behind.

mod common;

use std::sync::Arc;

use hate_speech_moderator::dataset::TrainingSet;
use hate_speech_moderator::resample::Resampler;
use hate_speech_moderator::{ArtifactStore, Cancellation, FileArtifactStore, TrainingFailed};

#[test]
fn missing_dataset_writes_nothing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cfg = common::config_in(dir.path());
    let err = common::pipeline_for(&cfg)
        .run(&dir.path().join("absent.csv"))
        .expect_err("must fail");
    assert!(matches!(err, TrainingFailed::DatasetInvalid(_)), "{err}");
    assert!(!cfg.artifact_path.exists());
    assert!(!cfg.report_dir.exists());
}

#[test]
fn single_class_dataset_is_invalid() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cfg = common::config_in(dir.path());
    let err = common::pipeline_for(&cfg)
        .run(&common::fixture("single_class.csv"))
        .expect_err("must fail");
    assert!(matches!(err, TrainingFailed::DatasetInvalid(_)), "{err}");
    assert!(!cfg.artifact_path.exists());
}

#[test]
fn missing_columns_are_invalid() {
    let dir = tempfile::tempdir().expect("tempdir");
    let csv = dir.path().join("bad.csv");
    std::fs::write(&csv, "id,comment\n1,hello\n2,world\n").expect("write");
    let cfg = common::config_in(dir.path());
    let err = common::pipeline_for(&cfg).run(&csv).expect_err("must fail");
    assert!(err.to_string().contains("required columns"), "{err}");
}

#[test]
fn cancelled_run_writes_nothing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cfg = common::config_in(dir.path());
    let dataset = common::write_dataset(dir.path());
    let cancel = Cancellation::new();
    cancel.cancel();
    let err = common::pipeline_for(&cfg)
        .with_cancellation(cancel)
        .run(&dataset)
        .expect_err("must be cancelled");
    assert!(matches!(err, TrainingFailed::Cancelled { .. }), "{err}");
    assert!(!cfg.artifact_path.exists());
}

/// Cancels the job from inside the resampling stage.
struct CancelDuringResample(Cancellation);

impl Resampler for CancelDuringResample {
    fn resample(&self, set: TrainingSet) -> Result<TrainingSet, TrainingFailed> {
        self.0.cancel();
        Ok(set)
    }
}

#[test]
fn cancellation_mid_run_stops_before_persisting() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cfg = common::config_in(dir.path());
    let dataset = common::write_dataset(dir.path());
    let cancel = Cancellation::new();
    let err = common::pipeline_for(&cfg)
        .with_cancellation(cancel.clone())
        .with_resampler(Box::new(CancelDuringResample(cancel)))
        .run(&dataset)
        .expect_err("must be cancelled");
    assert!(matches!(err, TrainingFailed::Cancelled { stage: "fit" }), "{err}");
    assert!(!cfg.artifact_path.exists());
}

#[test]
fn failed_retrain_keeps_previous_artifact() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (cfg, _) = common::train_in(dir.path());
    let before = FileArtifactStore::new(&cfg.artifact_path)
        .load()
        .expect("first artifact");

    let err = common::pipeline_for(&cfg)
        .run(&common::fixture("single_class.csv"))
        .expect_err("must fail");
    assert!(matches!(err, TrainingFailed::DatasetInvalid(_)));

    let store: Arc<dyn ArtifactStore> = Arc::new(FileArtifactStore::new(&cfg.artifact_path));
    let after = store.load().expect("artifact still readable");
    assert_eq!(before, after);
}
