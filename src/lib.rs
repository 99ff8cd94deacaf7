// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod api;
pub mod config;
pub mod decision;
pub mod error;
pub mod metrics;
pub mod telemetry;

// Offline training
pub mod classifier;
pub mod dataset;
pub mod evaluate;
pub mod normalize;
pub mod pipeline;
pub mod report;
pub mod resample;
pub mod vectorize;

// Artifact + online moderation
pub mod artifact;
pub mod cache;
pub mod moderation;

// ---- Re-exports for stable public API ----
pub use crate::api::{create_router, AppState};
pub use crate::artifact::{ArtifactStore, FileArtifactStore, TrainedModelArtifact};
pub use crate::cache::ModelCache;
pub use crate::config::ModerationConfig;
pub use crate::decision::{ModerationDecision, Verdict};
pub use crate::error::{ArtifactError, ConfigError, ModerationError, TrainingFailed};
pub use crate::moderation::{GateOutcome, ModerationService};
pub use crate::pipeline::{Cancellation, TrainingPipeline, TrainingReport};
