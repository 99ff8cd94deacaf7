//! Error taxonomy for the moderation core.
//!
//! Two families, handled by different callers:
//! - [`TrainingFailed`]: expected, recoverable outcomes of an offline run
//!   (bad dataset, cancellation, I/O while persisting). The run aborts and no
//!   artifact is written.
//! - [`ModerationError`]: integrity failures on the online path. These are
//!   fatal for the request and the caller must fail closed.
//!
//! [`ArtifactError`] is shared by the store and both families.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Why an artifact could not be read back.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("artifact not found at {path}")]
    Missing { path: PathBuf },

    #[error("artifact at {path} is unreadable: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("artifact at {path} is corrupt: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("artifact at {path} was built with normalizer {found}, this build uses {expected}; retrain")]
    NormalizerDrift {
        path: PathBuf,
        found: String,
        expected: String,
    },

    #[error("failed to write artifact to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Recoverable failure of a training run.
#[derive(Debug, Error)]
pub enum TrainingFailed {
    /// Missing file, missing columns, empty after cleaning, single class.
    #[error("dataset invalid: {0}")]
    DatasetInvalid(String),

    #[error("training cancelled during {stage}")]
    Cancelled { stage: &'static str },

    #[error("failed to write report {path}: {source}")]
    ReportWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Artifact(#[from] ArtifactError),
}

impl TrainingFailed {
    pub fn dataset(msg: impl Into<String>) -> Self {
        Self::DatasetInvalid(msg.into())
    }
}

/// Fatal failure on the moderation hot path.
#[derive(Debug, Error)]
pub enum ModerationError {
    #[error("model artifact unavailable: {0}")]
    ArtifactUnavailable(#[from] ArtifactError),

    /// The vector produced for the input does not fit the loaded classifier.
    #[error("vectorization mismatch: vector has {vector_dim} dims, classifier expects {expected}")]
    VectorizationMismatch { vector_dim: usize, expected: usize },
}

/// Invalid configuration values.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config value `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}
