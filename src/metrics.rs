//! Prometheus metrics for the moderation gate.
//!
//! Recording helpers are plain `metrics` macro calls and are no-ops until a
//! recorder is installed, so library code and tests can call them freely.

use axum::{routing::get, Router};
use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::decision::Verdict;

pub const DECISIONS_TOTAL: &str = "moderation_decisions_total";
pub const FAILURES_TOTAL: &str = "moderation_failures_total";
pub const EVAL_MS: &str = "moderation_eval_ms";
pub const MODEL_LOAD_TOTAL: &str = "model_load_total";

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global Prometheus recorder. Call once per process.
    pub fn init() -> anyhow::Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .map_err(|e| anyhow::anyhow!("prometheus: install recorder: {e}"))?;

        describe_counter!(DECISIONS_TOTAL, "Moderation decisions by verdict");
        describe_counter!(FAILURES_TOTAL, "Moderation calls that failed and were escalated");
        describe_histogram!(EVAL_MS, Unit::Milliseconds, "Time spent in ModerationService::evaluate");
        describe_counter!(MODEL_LOAD_TOTAL, "Model artifact load attempts by outcome");

        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}

pub fn record_decision(verdict: Verdict, elapsed_ms: f64) {
    counter!(DECISIONS_TOTAL, "verdict" => verdict.as_str()).increment(1);
    histogram!(EVAL_MS).record(elapsed_ms);
}

pub fn record_failure() {
    counter!(FAILURES_TOTAL).increment(1);
}

pub fn record_model_load(ok: bool) {
    let outcome = if ok { "ok" } else { "error" };
    counter!(MODEL_LOAD_TOTAL, "outcome" => outcome).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn helpers_reach_the_prometheus_recorder() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        metrics::with_local_recorder(&recorder, || {
            record_decision(Verdict::Block, 3.5);
            record_decision(Verdict::Accept, 1.0);
            record_decision(Verdict::Accept, 2.0);
            record_failure();
            record_model_load(true);
        });

        let text = handle.render();
        assert!(text.contains("moderation_decisions_total{verdict=\"accept\"} 2"), "{text}");
        assert!(text.contains("moderation_decisions_total{verdict=\"block\"} 1"), "{text}");
        assert!(text.contains("moderation_failures_total 1"), "{text}");
        assert!(text.contains("model_load_total{outcome=\"ok\"} 1"), "{text}");
        assert!(text.contains("moderation_eval_ms"), "{text}");
    }
}
