//! Main application router.

use crate::{
    controllers::{health_controller, jobs_controller, metrics_controller},
    middleware::{auth_middleware, logging_middleware, rate_limit_middleware},
    state::AppState,
};
use axum::{http::HeaderValue, middleware, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::info;

const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Clone, Default)]
struct MakeAdminRequestId;

impl MakeRequestId for MakeAdminRequestId {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = ulid::Ulid::new().to_string();
        HeaderValue::from_str(&id).ok().map(RequestId::new)
    }
}

/// Builds the admin HTTP surface: every route requires a valid bearer
/// token, destructive writes additionally go through per-actor rate
/// limiting.
pub fn create_router(state: AppState) -> Router {
    let cors = create_cors_layer(&state.config);
    let header_name = axum::http::HeaderName::from_static(REQUEST_ID_HEADER);

    let reads = jobs_controller::read_router().merge(health_controller::router()).merge(metrics_controller::router());

    let writes = jobs_controller::write_router().layer(middleware::from_fn_with_state(state.clone(), rate_limit_middleware));

    let api = reads
        .merge(writes)
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state);

    info!("admin router assembled");

    Router::new()
        .merge(api)
        .layer(middleware::from_fn(logging_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(PropagateRequestIdLayer::new(header_name.clone()))
        .layer(SetRequestIdLayer::new(header_name, MakeAdminRequestId))
}

fn create_cors_layer(config: &arcana_jobs::AdminConfig) -> CorsLayer {
    if config.cors_allow_origins.is_empty() {
        CorsLayer::new()
    } else if config.cors_allow_origins.iter().any(|o| o == "*") {
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = config
            .cors_allow_origins
            .iter()
            .filter_map(|o| HeaderValue::from_str(o).ok())
            .collect();
        CorsLayer::new().allow_origin(origins).allow_methods(Any).allow_headers(Any)
    }
}
