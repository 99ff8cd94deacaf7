// src/config/moderation.rs
//! Training and moderation settings.
//!
//! Resolution order:
//! 1. `$MODERATION_CONFIG_PATH` (must exist), else `config/moderation.toml`
//!    if present, else built-in defaults. Missing keys take their default.
//! 2. Env overrides: `MODERATION_THRESHOLD` (clamped to <0.0, 1.0>),
//!    `MODERATION_ARTIFACT_PATH`, `MODERATION_DATASET_PATH`.
//! 3. [`ModerationConfig::validate`].

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::classifier::LogisticParams;
use crate::error::ConfigError;
use crate::resample::Smote;
use crate::vectorize::TfidfParams;

pub const DEFAULT_MODERATION_CONFIG_PATH: &str = "config/moderation.toml";
pub const DEFAULT_DECISION_THRESHOLD: f64 = 0.65;

pub const ENV_MODERATION_CONFIG_PATH: &str = "MODERATION_CONFIG_PATH";
pub const ENV_MODERATION_THRESHOLD: &str = "MODERATION_THRESHOLD";
pub const ENV_MODERATION_ARTIFACT_PATH: &str = "MODERATION_ARTIFACT_PATH";
pub const ENV_MODERATION_DATASET_PATH: &str = "MODERATION_DATASET_PATH";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModerationConfig {
    pub dataset_path: PathBuf,
    pub artifact_path: PathBuf,
    pub report_dir: PathBuf,

    /// Vocabulary cap.
    pub max_features: usize,
    /// Inclusive n-gram range, e.g. `[1, 2]`.
    pub ngram_range: (usize, usize),
    pub test_ratio: f64,
    pub seed: u64,

    /// Block iff score > threshold.
    pub decision_threshold: f64,
    pub max_iter: usize,
    pub regularization_c: f64,
    pub smote_k: usize,

    pub load_attempts: u32,
    pub load_backoff_ms: u64,

    /// Sentences scored after training and written to the report.
    pub probe_texts: Vec<String>,
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            dataset_path: PathBuf::from("data/labeled_data.csv"),
            artifact_path: PathBuf::from("models/model.artifact"),
            report_dir: PathBuf::from("reports"),
            max_features: 5000,
            ngram_range: (1, 2),
            test_ratio: 0.2,
            seed: 42,
            decision_threshold: DEFAULT_DECISION_THRESHOLD,
            max_iter: 1000,
            regularization_c: 1.0,
            smote_k: 5,
            load_attempts: 3,
            load_backoff_ms: 200,
            probe_texts: [
                "I hate you!",
                "Have a great day!",
                "You're such a loser.",
                "fuck you",
                "you are retarded",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

impl ModerationConfig {
    /// Resolve file + env overrides and validate.
    pub fn load() -> Result<Self, ConfigError> {
        let mut cfg = match std::env::var(ENV_MODERATION_CONFIG_PATH) {
            Ok(p) => Self::load_from_file(p)?,
            Err(_) => {
                let default = Path::new(DEFAULT_MODERATION_CONFIG_PATH);
                if default.exists() {
                    Self::load_from_file(default)?
                } else {
                    Self::default()
                }
            }
        };
        cfg.apply_env_overrides();
        cfg.validate()?;
        Ok(cfg)
    }

    /// Parse a TOML file. No env overrides, no validation.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn apply_env_overrides(&mut self) {
        if let Some(t) = parse_threshold_env(std::env::var(ENV_MODERATION_THRESHOLD).ok()) {
            self.decision_threshold = t;
        }
        if let Some(p) = non_empty_env(ENV_MODERATION_ARTIFACT_PATH) {
            self.artifact_path = PathBuf::from(p);
        }
        if let Some(p) = non_empty_env(ENV_MODERATION_DATASET_PATH) {
            self.dataset_path = PathBuf::from(p);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field, reason: String| Err(ConfigError::Invalid { field, reason });

        if !(0.0..=1.0).contains(&self.decision_threshold) {
            return invalid(
                "decision_threshold",
                format!("{} is outside [0, 1]", self.decision_threshold),
            );
        }
        if !(self.test_ratio > 0.0 && self.test_ratio < 1.0) {
            return invalid("test_ratio", format!("{} is outside (0, 1)", self.test_ratio));
        }
        let (lo, hi) = self.ngram_range;
        if lo == 0 || lo > hi {
            return invalid("ngram_range", format!("[{lo}, {hi}] is not a valid range"));
        }
        if self.max_features == 0 {
            return invalid("max_features", "must be at least 1".into());
        }
        if self.max_iter == 0 {
            return invalid("max_iter", "must be at least 1".into());
        }
        if !(self.regularization_c.is_finite() && self.regularization_c > 0.0) {
            return invalid(
                "regularization_c",
                format!("{} must be a positive number", self.regularization_c),
            );
        }
        Ok(())
    }

    pub fn tfidf_params(&self) -> TfidfParams {
        TfidfParams {
            max_features: self.max_features,
            ngram_min: self.ngram_range.0,
            ngram_max: self.ngram_range.1,
        }
    }

    pub fn logistic_params(&self) -> LogisticParams {
        LogisticParams {
            c: self.regularization_c,
            max_iter: self.max_iter,
            ..LogisticParams::default()
        }
    }

    pub fn smote(&self) -> Smote {
        Smote {
            k_neighbors: self.smote_k,
            seed: self.seed,
        }
    }

    pub fn load_backoff(&self) -> Duration {
        Duration::from_millis(self.load_backoff_ms)
    }
}

// parse optional float env and clamp to <0.0..=1.0>
fn parse_threshold_env(raw: Option<String>) -> Option<f64> {
    raw.and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .map(|v| v.clamp(0.0, 1.0))
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = ModerationConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.decision_threshold, 0.65);
        assert_eq!(cfg.tfidf_params(), TfidfParams::default());
        assert_eq!(cfg.logistic_params(), LogisticParams::default());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg: ModerationConfig = toml::from_str(
            r#"
            decision_threshold = 0.8
            ngram_range = [1, 3]
            "#,
        )
        .unwrap();
        assert_eq!(cfg.decision_threshold, 0.8);
        assert_eq!(cfg.ngram_range, (1, 3));
        assert_eq!(cfg.max_features, 5000);
        assert_eq!(cfg.seed, 42);
    }

    #[test]
    fn threshold_env_parsing() {
        assert_eq!(parse_threshold_env(Some(" 0.7 ".into())), Some(0.7));
        assert_eq!(parse_threshold_env(Some("1.5".into())), Some(1.0));
        assert_eq!(parse_threshold_env(Some("-2".into())), Some(0.0));
        assert_eq!(parse_threshold_env(Some("NaN".into())), None);
        assert_eq!(parse_threshold_env(Some("high".into())), None);
        assert_eq!(parse_threshold_env(None), None);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let cases: [(fn(&mut ModerationConfig), &str); 5] = [
            (|c| c.decision_threshold = 1.2, "decision_threshold"),
            (|c| c.test_ratio = 1.0, "test_ratio"),
            (|c| c.ngram_range = (2, 1), "ngram_range"),
            (|c| c.max_features = 0, "max_features"),
            (|c| c.regularization_c = 0.0, "regularization_c"),
        ];
        for (mutate, expected) in cases {
            let mut cfg = ModerationConfig::default();
            mutate(&mut cfg);
            match cfg.validate() {
                Err(ConfigError::Invalid { field, .. }) => assert_eq!(field, expected),
                other => panic!("expected Invalid({expected}), got {other:?}"),
            }
        }
    }
}
