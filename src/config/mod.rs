// src/config/mod.rs
//! Runtime configuration.

pub mod moderation;

pub use moderation::{
    ModerationConfig, DEFAULT_MODERATION_CONFIG_PATH, ENV_MODERATION_ARTIFACT_PATH,
    ENV_MODERATION_CONFIG_PATH, ENV_MODERATION_DATASET_PATH, ENV_MODERATION_THRESHOLD,
};
