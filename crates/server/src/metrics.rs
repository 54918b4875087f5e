//! Prometheus metrics
//!
//! The recorder is installed once at startup; handlers record through the
//! `metrics` facade and `/metrics` renders the exporter's snapshot.

use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::state::AppState;

/// Install the global Prometheus recorder.
///
/// Returns `None` if a recorder is already installed (the metrics facade
/// allows only one per process).
pub fn init_metrics() -> Option<PrometheusHandle> {
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::warn!(error = %e, "Prometheus recorder not installed");
            None
        }
    }
}

/// One processed student turn, labelled by the agent that answered
pub fn record_request(agent: &str, elapsed: Duration) {
    metrics::counter!("tutor_requests_total", "agent" => agent.to_string()).increment(1);
    metrics::histogram!("tutor_request_duration_seconds").record(elapsed.as_secs_f64());
}

pub fn record_opening(conversation_type: &str, elapsed: Duration) {
    metrics::counter!("tutor_openings_total", "type" => conversation_type.to_string()).increment(1);
    metrics::histogram!("tutor_opening_duration_seconds").record(elapsed.as_secs_f64());
}

pub fn record_conversation_ended() {
    metrics::counter!("tutor_conversations_completed_total").increment(1);
}

pub fn record_error(kind: &'static str) {
    metrics::counter!("tutor_errors_total", "kind" => kind).increment(1);
}

pub fn record_cache_size(entries: usize) {
    metrics::gauge!("tutor_phrase_cache_entries").set(entries as f64);
}

/// `GET /metrics`
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    match &state.metrics {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            "metrics disabled\n".to_string(),
        ),
    }
}
