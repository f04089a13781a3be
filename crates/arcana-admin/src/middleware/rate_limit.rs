//! Per-actor rate limiting for destructive admin writes.
//!
//! Applied only to the `/dlq/purge`, `/dlq/requeue`, and `/purge-all` routes;
//! read endpoints are not budgeted.

use crate::error::AdminError;
use crate::middleware::AuthContext;
use crate::state::AppState;
use arcana_core::ArcanaError;
use arcana_jobs::LimiterMetrics;
use arcana_resilience::RateDecision;
use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};

pub async fn rate_limit_middleware(State(state): State<AppState>, request: Request<Body>, next: Next) -> Response {
    let request_id = request
        .extensions()
        .get::<tower_http::request_id::RequestId>()
        .and_then(|id| id.header_value().to_str().ok())
        .map(ToString::to_string)
        .unwrap_or_else(|| "unknown".to_string());

    let actor = request
        .extensions()
        .get::<AuthContext>()
        .map(|ctx| ctx.actor.clone())
        .unwrap_or_else(|| "unknown".to_string());

    let decision = match state.check_rate_limit(&actor).await {
        Ok(decision) => decision,
        Err(e) => return AdminError::new(e.into(), request_id).into_response(),
    };

    match decision {
        RateDecision::Allow => next.run(request).await,
        RateDecision::Deny { retry_after_ms } => {
            LimiterMetrics::rate_limit_exceeded("admin", &actor);
            AdminError::new(ArcanaError::RateLimited { retry_after_ms }, request_id).into_response()
        }
    }
}
