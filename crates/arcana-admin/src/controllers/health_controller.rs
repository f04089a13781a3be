//! Liveness and readiness endpoints.

use crate::state::AppState;
use arcana_jobs::Store;
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Trivial liveness check: the process is up and answering HTTP requests.
async fn healthz() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Debug, Serialize)]
struct ReadinessResponse {
    ready: bool,
    store_reachable: bool,
    scheduler_lease_resolvable: bool,
    active_workers: u64,
}

/// Readiness: the store answers, the scheduler lease resolves to someone,
/// and at least one worker is registered. Any failing check returns 503 so
/// the instance is pulled from a load balancer's rotation.
async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let store_reachable = state.runtime.store.health_check().await.is_ok();
    let scheduler_lease_resolvable = state.runtime.status.scheduler_lease_resolvable().await.unwrap_or(false);
    let active_workers = state.runtime.registry.active_count().await.unwrap_or(0) as u64;

    let ready = store_reachable && scheduler_lease_resolvable && active_workers > 0;
    let body = ReadinessResponse {
        ready,
        store_reachable,
        scheduler_lease_resolvable,
        active_workers,
    };

    let status = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status, Json(body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_response_reports_crate_version() {
        let response = HealthResponse {
            status: "healthy",
            version: env!("CARGO_PKG_VERSION"),
        };
        assert_eq!(response.status, "healthy");
    }
}
