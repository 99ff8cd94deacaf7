//! Moderation gate binary entrypoint.
//! Loads the config and hands the wired router to shuttle.
//!
//! Train a model first with `cargo run --bin train`.

use anyhow::Context;
use shuttle_axum::ShuttleAxum;

use hate_speech_moderator::{api, telemetry, ModerationConfig};

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    telemetry::init_tracing();

    let cfg = ModerationConfig::load().context("loading moderation config")?;
    // Fail at startup rather than on the first comment.
    let router = api::build_app(&cfg).await?;

    Ok(router.into())
}
