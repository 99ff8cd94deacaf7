//! Offline training job: builds the hate-speech classifier artifact and the
//! training reports from a labeled CSV.
//!
//! The run executes on a blocking thread. Ctrl-C or `--timeout-secs` set the
//! shared cancellation flag; the pipeline stops at its next check and writes
//! no artifact.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use hate_speech_moderator::{
    telemetry, Cancellation, FileArtifactStore, ModerationConfig, TrainingFailed, TrainingPipeline,
};

#[derive(Parser)]
#[command(name = "train", about = "Train the hate-speech moderation model")]
struct Cli {
    /// Labeled CSV (`tweet`/`class` or `text`/`label` columns).
    #[arg(long, env = "MODERATION_DATASET_PATH")]
    dataset: Option<PathBuf>,

    /// Where to write the model artifact.
    #[arg(long, env = "MODERATION_ARTIFACT_PATH")]
    artifact: Option<PathBuf>,

    /// Directory for training_report.txt and the error analysis and ROC CSV files.
    #[arg(long)]
    report_dir: Option<PathBuf>,

    /// TOML config file (defaults to $MODERATION_CONFIG_PATH or config/moderation.toml).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Abort the run after this many seconds.
    #[arg(long)]
    timeout_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    telemetry::init_tracing();
    let cli = Cli::parse();

    let mut cfg = match &cli.config {
        Some(path) => {
            let mut c = ModerationConfig::load_from_file(path)?;
            c.apply_env_overrides();
            c
        }
        None => ModerationConfig::load().context("loading moderation config")?,
    };
    if let Some(p) = cli.dataset {
        cfg.dataset_path = p;
    }
    if let Some(p) = cli.artifact {
        cfg.artifact_path = p;
    }
    if let Some(p) = cli.report_dir {
        cfg.report_dir = p;
    }
    cfg.validate()?;

    let cancel = Cancellation::new();
    let store = Arc::new(FileArtifactStore::new(&cfg.artifact_path));
    let pipeline = TrainingPipeline::new(&cfg, store).with_cancellation(cancel.clone());
    let dataset = cfg.dataset_path.clone();

    info!(target: "training", dataset = %dataset.display(), "training started");
    let mut job = tokio::task::spawn_blocking(move || pipeline.run(&dataset));

    let timeout = async {
        match cli.timeout_secs {
            Some(s) => tokio::time::sleep(Duration::from_secs(s)).await,
            None => std::future::pending().await,
        }
    };

    let result = tokio::select! {
        r = &mut job => r,
        _ = tokio::signal::ctrl_c() => {
            warn!(target: "training", "interrupt received; cancelling");
            cancel.cancel();
            job.await
        }
        _ = timeout => {
            warn!(target: "training", "timeout reached; cancelling");
            cancel.cancel();
            job.await
        }
    }
    .context("training task panicked")?;

    match result {
        Ok(report) => {
            println!("Accuracy: {:.4}", report.evaluation.accuracy);
            match report.evaluation.roc_auc {
                Some(auc) => println!("ROC-AUC: {auc:.4}"),
                None => println!("ROC-AUC: n/a"),
            }
            println!("\nClassification Report:\n{}", report.evaluation.report);
            println!("Confusion Matrix:\n{}", report.evaluation.confusion);
            println!(
                "\nFalse Positives: {}  False Negatives: {}",
                report.false_positives(),
                report.false_negatives()
            );
            for p in &report.probes {
                println!(
                    "Text: {:?} -> Prediction: {} (Confidence: {:.2})",
                    p.text, p.label, p.confidence
                );
            }
            if let Some(w) = &report.convergence_warning {
                println!("\nwarning: {w}");
            }
            if let Some(path) = &report.artifact_path {
                println!("\nartifact: {}", path.display());
            }
            Ok(())
        }
        Err(e @ TrainingFailed::DatasetInvalid(_)) | Err(e @ TrainingFailed::Cancelled { .. }) => {
            // expected outcomes: report and exit non-zero without a backtrace
            error!(target: "training", error = %e, "training aborted; no artifact written");
            eprintln!("training aborted: {e}");
            std::process::exit(2);
        }
        Err(e) => Err(e).context("training failed"),
    }
}
