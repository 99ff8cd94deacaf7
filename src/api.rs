use std::sync::Arc;

use anyhow::Context;
use shuttle_axum::axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::artifact::FileArtifactStore;
use crate::cache::ModelCache;
use crate::config::ModerationConfig;
use crate::decision::ModerationDecision;
use crate::metrics::Metrics;
use crate::moderation::{GateOutcome, ModerationService};

#[derive(Clone)]
pub struct AppState {
    pub moderation: Arc<ModerationService>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/moderate", post(moderate))
        .route("/model", get(model))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// Server wiring: installs the Prometheus recorder, then warms the model
/// cache so the startup load is counted and a missing artifact fails fast.
pub async fn build_app(cfg: &ModerationConfig) -> anyhow::Result<Router> {
    let metrics = Metrics::init()?;

    let store = Arc::new(FileArtifactStore::new(&cfg.artifact_path));
    let cache = Arc::new(ModelCache::new(store).with_retry(cfg.load_attempts, cfg.load_backoff()));

    let warm = cache.clone();
    let artifact = tokio::task::spawn_blocking(move || warm.get())
        .await
        .context("artifact warm-up task")?
        .with_context(|| format!("loading model artifact {}", cfg.artifact_path.display()))?;
    info!(
        target: "moderation",
        trained_at = %artifact.trained_at,
        threshold = artifact.decision_threshold,
        "moderation gate ready"
    );

    let state = AppState {
        moderation: Arc::new(ModerationService::new(cache)),
    };
    Ok(create_router(state).merge(metrics.router()))
}

#[derive(serde::Deserialize)]
struct ModerateReq {
    text: String,
}

#[derive(serde::Serialize)]
struct BlockedResp {
    detail: &'static str,
    #[serde(flatten)]
    decision: ModerationDecision,
}

#[derive(serde::Serialize)]
struct EscalateResp {
    error: String,
    verdict: &'static str,
    escalate: bool,
}

async fn moderate(State(state): State<AppState>, Json(body): Json<ModerateReq>) -> Response {
    let svc = state.moderation.clone();
    let outcome = match tokio::task::spawn_blocking(move || svc.gate(&body.text)).await {
        Ok(o) => o,
        Err(e) => GateOutcome::Escalate {
            reason: format!("moderation task failed: {e}"),
        },
    };

    match outcome {
        GateOutcome::Accept(d) => (StatusCode::OK, Json(d)).into_response(),
        GateOutcome::Block(d) => (
            StatusCode::FORBIDDEN,
            Json(BlockedResp {
                detail: "Comment contains inappropriate content",
                decision: d,
            }),
        )
            .into_response(),
        GateOutcome::Escalate { reason } => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(EscalateResp {
                error: reason,
                verdict: "block",
                escalate: true,
            }),
        )
            .into_response(),
    }
}

async fn model(State(state): State<AppState>) -> Response {
    // a cold cache may sleep between load retries
    let svc = state.moderation.clone();
    let info = match tokio::task::spawn_blocking(move || svc.model_info()).await {
        Ok(r) => r.map_err(|e| e.to_string()),
        Err(e) => Err(format!("model info task failed: {e}")),
    };
    match info {
        Ok(info) => Json(info).into_response(),
        Err(error) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "error": error })),
        )
            .into_response(),
    }
}
