//! # Model artifact
//! The immutable bundle produced by one training run and its durable store.
//!
//! File layout: a single header line, then the JSON payload.
//!
//! ```text
//! hsm-artifact/1 sha256=<64 hex chars>\n
//! {"format_version":1,"normalizer_version":"...","vectorizer":{...},...}
//! ```
//!
//! Writes go to a temp file in the target directory which is fsynced and
//! renamed into place, so readers see either the previous file or the new
//! one, never a partial write.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::classifier::{Classifier, ConvergenceWarning, LogisticRegression};
use crate::dataset::ClassCounts;
use crate::error::ArtifactError;
use crate::evaluate::ConfusionMatrix;
use crate::normalize::NORMALIZER_VERSION;
use crate::telemetry::sha256_hex;
use crate::vectorize::{TfidfVectorizer, Vectorizer};

pub const FORMAT_VERSION: u32 = 1;
const MAGIC: &str = "hsm-artifact";

/// Metrics recorded at training time and shipped with the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMetrics {
    pub accuracy: f64,
    pub roc_auc: Option<f64>,
    pub confusion: ConfusionMatrix,
    pub train_rows: usize,
    pub test_rows: usize,
    pub class_counts_before: ClassCounts,
    pub class_counts_after: ClassCounts,
    pub iterations: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub convergence_warning: Option<ConvergenceWarning>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModelArtifact {
    pub format_version: u32,
    pub normalizer_version: String,
    pub vectorizer: TfidfVectorizer,
    pub classifier: LogisticRegression,
    pub decision_threshold: f64,
    pub trained_at: DateTime<Utc>,
    pub metrics: ArtifactMetrics,
}

impl TrainedModelArtifact {
    pub fn new(
        vectorizer: TfidfVectorizer,
        classifier: LogisticRegression,
        decision_threshold: f64,
        metrics: ArtifactMetrics,
    ) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            normalizer_version: NORMALIZER_VERSION.to_string(),
            vectorizer,
            classifier,
            decision_threshold,
            trained_at: Utc::now(),
            metrics,
        }
    }

    /// Encode to the on-disk representation.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        let payload = serde_json::to_vec(self)?;
        let mut out = format!("{MAGIC}/{FORMAT_VERSION} sha256={}\n", sha256_hex(&payload)).into_bytes();
        out.extend_from_slice(&payload);
        Ok(out)
    }

    /// Decode and validate. `path` is only used in error messages.
    pub fn from_bytes(bytes: &[u8], path: &Path) -> Result<Self, ArtifactError> {
        let corrupt = |reason: String| ArtifactError::Corrupt {
            path: path.to_path_buf(),
            reason,
        };

        let newline = bytes
            .iter()
            .position(|b| *b == b'\n')
            .ok_or_else(|| corrupt("missing header line".into()))?;
        let header = std::str::from_utf8(&bytes[..newline])
            .map_err(|_| corrupt("header is not utf-8".into()))?;
        let payload = &bytes[newline + 1..];

        let (tag, digest) = header
            .split_once(" sha256=")
            .ok_or_else(|| corrupt(format!("malformed header {header:?}")))?;
        let version = tag
            .strip_prefix(MAGIC)
            .and_then(|rest| rest.strip_prefix('/'))
            .and_then(|v| v.parse::<u32>().ok())
            .ok_or_else(|| corrupt(format!("unknown format tag {tag:?}")))?;
        if version != FORMAT_VERSION {
            return Err(corrupt(format!(
                "unsupported format version {version} (expected {FORMAT_VERSION})"
            )));
        }
        if sha256_hex(payload) != digest {
            return Err(corrupt("payload digest mismatch".into()));
        }

        let artifact: Self = serde_json::from_slice(payload)
            .map_err(|e| corrupt(format!("payload does not parse: {e}")))?;
        artifact.validate(path)?;
        Ok(artifact)
    }

    fn validate(&self, path: &Path) -> Result<(), ArtifactError> {
        let corrupt = |reason: String| ArtifactError::Corrupt {
            path: path.to_path_buf(),
            reason,
        };
        if self.format_version != FORMAT_VERSION {
            return Err(corrupt(format!(
                "payload format version {} does not match header",
                self.format_version
            )));
        }
        if self.normalizer_version != NORMALIZER_VERSION {
            return Err(ArtifactError::NormalizerDrift {
                path: path.to_path_buf(),
                found: self.normalizer_version.clone(),
                expected: NORMALIZER_VERSION.to_string(),
            });
        }
        if !self.vectorizer.is_consistent() {
            return Err(corrupt("vectorizer state is inconsistent".into()));
        }
        if self.vectorizer.vocabulary_size() != self.classifier.n_features() {
            return Err(corrupt(format!(
                "vocabulary size {} does not match classifier width {}",
                self.vectorizer.vocabulary_size(),
                self.classifier.n_features()
            )));
        }
        if !(0.0..=1.0).contains(&self.decision_threshold) {
            return Err(corrupt(format!(
                "decision threshold {} outside [0, 1]",
                self.decision_threshold
            )));
        }
        Ok(())
    }
}

/// Durable read/write of artifacts.
pub trait ArtifactStore: Send + Sync {
    fn location(&self) -> &Path;

    /// Persist atomically; returns where it was written.
    fn save(&self, artifact: &TrainedModelArtifact) -> Result<PathBuf, ArtifactError>;

    fn load(&self) -> Result<TrainedModelArtifact, ArtifactError>;
}

/// Single-file store on the local filesystem.
#[derive(Debug, Clone)]
pub struct FileArtifactStore {
    path: PathBuf,
}

impl FileArtifactStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ArtifactStore for FileArtifactStore {
    fn location(&self) -> &Path {
        &self.path
    }

    fn save(&self, artifact: &TrainedModelArtifact) -> Result<PathBuf, ArtifactError> {
        let bytes = artifact.to_bytes().map_err(|e| ArtifactError::Write {
            path: self.path.clone(),
            source: io::Error::new(io::ErrorKind::InvalidData, e),
        })?;
        write_atomic(&self.path, &bytes).map_err(|source| ArtifactError::Write {
            path: self.path.clone(),
            source,
        })?;
        info!(
            target: "training",
            path = %self.path.display(),
            bytes = bytes.len(),
            vocabulary = artifact.vectorizer.vocabulary_size(),
            "artifact saved"
        );
        Ok(self.path.clone())
    }

    fn load(&self) -> Result<TrainedModelArtifact, ArtifactError> {
        let bytes = fs::read(&self.path).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                ArtifactError::Missing {
                    path: self.path.clone(),
                }
            } else {
                ArtifactError::Io {
                    path: self.path.clone(),
                    source,
                }
            }
        })?;
        TrainedModelArtifact::from_bytes(&bytes, &self.path)
    }
}

/// Write `bytes` to `path` via temp file + fsync + rename in the same
/// directory. Creates the parent directory if needed.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent)?;
    let mut tmp = tempfile::NamedTempFile::new_in(&parent)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
