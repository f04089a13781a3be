//! Prometheus metrics exposition.

use crate::state::AppState;
use axum::{extract::State, routing::get, Router};

pub fn router() -> Router<AppState> {
    Router::new().route("/metrics", get(metrics))
}

/// Renders whatever this process's global metrics recorder has
/// accumulated: queue depths, job counters, processing duration histogram,
/// worker registrations, rate-limit rejections, and circuit breaker state,
/// all pushed by the scheduler/reaper/worker pool running in this process.
async fn metrics(State(state): State<AppState>) -> String {
    state.metrics_handle.render()
}
