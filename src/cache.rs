//! Process-wide holder of the loaded model artifact.
//!
//! The first successful `get()` loads from the store; every later call gets
//! the same `Arc`. Concurrent first callers block on one in-flight load.
//! Failed loads are not remembered: the next call tries again.

use once_cell::sync::OnceCell;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::artifact::{ArtifactStore, TrainedModelArtifact};
use crate::error::ArtifactError;
use crate::metrics;

pub struct ModelCache {
    store: Option<Arc<dyn ArtifactStore>>,
    cell: OnceCell<Arc<TrainedModelArtifact>>,
    load_attempts: u32,
    backoff: Duration,
}

impl ModelCache {
    pub fn new(store: Arc<dyn ArtifactStore>) -> Self {
        Self {
            store: Some(store),
            cell: OnceCell::new(),
            load_attempts: 1,
            backoff: Duration::ZERO,
        }
    }

    /// Cache that is already populated and has no backing store.
    pub fn with_artifact(artifact: TrainedModelArtifact) -> Self {
        Self {
            store: None,
            cell: OnceCell::with_value(Arc::new(artifact)),
            load_attempts: 1,
            backoff: Duration::ZERO,
        }
    }

    /// Attempts per `get()` for transient failures (missing file, I/O),
    /// sleeping `backoff * attempt` between them.
    pub fn with_retry(mut self, load_attempts: u32, backoff: Duration) -> Self {
        self.load_attempts = load_attempts.max(1);
        self.backoff = backoff;
        self
    }

    pub fn is_loaded(&self) -> bool {
        self.cell.get().is_some()
    }

    pub fn get(&self) -> Result<Arc<TrainedModelArtifact>, ArtifactError> {
        self.cell.get_or_try_init(|| self.load()).cloned()
    }

    fn load(&self) -> Result<Arc<TrainedModelArtifact>, ArtifactError> {
        let Some(store) = &self.store else {
            return Err(ArtifactError::Missing {
                path: "<no store>".into(),
            });
        };

        let mut attempt = 1;
        loop {
            match store.load() {
                Ok(artifact) => {
                    metrics::record_model_load(true);
                    info!(
                        target: "moderation",
                        path = %store.location().display(),
                        trained_at = %artifact.trained_at,
                        vocabulary = artifact.classifier.weights.len(),
                        threshold = artifact.decision_threshold,
                        "model artifact loaded"
                    );
                    return Ok(Arc::new(artifact));
                }
                Err(e) if is_transient(&e) && attempt < self.load_attempts => {
                    warn!(target: "moderation", attempt, error = %e, "artifact load failed; retrying");
                    std::thread::sleep(self.backoff * attempt);
                    attempt += 1;
                }
                Err(e) => {
                    metrics::record_model_load(false);
                    warn!(target: "moderation", attempt, error = %e, "artifact load failed");
                    return Err(e);
                }
            }
        }
    }
}

fn is_transient(e: &ArtifactError) -> bool {
    matches!(e, ArtifactError::Missing { .. } | ArtifactError::Io { .. })
}
