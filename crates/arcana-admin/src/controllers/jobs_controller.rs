//! Job-queue admin operations: stats, queue/DLQ inspection, worker listing,
//! and the confirmation-gated destructive writes (requeue, purge).

use crate::error::{request_id_string, AdminError, AdminResult};
use crate::extractors::{PaginationQuery, ValidatedJson};
use crate::middleware::{AuthContext, Scope};
use crate::state::{AppState, CachedResponse};
use arcana_core::validation::rules::valid_audit_reason;
use arcana_core::{ArcanaError, CursorPage, CursorRequest, JobId};
use arcana_jobs::{JobInfo, Store, WorkerHealth};
use axum::extract::{Extension, Path, Query, State};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::request_id::RequestId;
use tracing::info;
use validator::Validate;

/// Read-only inspection endpoints: no per-actor rate limiting applied.
pub fn read_router() -> Router<AppState> {
    Router::new()
        .route("/stats", get(stats))
        .route("/queues/{queue}", get(list_queue))
        .route("/queues/{queue}/{id}", get(peek_job))
        .route("/workers", get(workers))
}

/// Destructive write endpoints: mounted behind the rate-limiting layer in
/// the main router.
pub fn write_router() -> Router<AppState> {
    Router::new()
        .route("/dlq/requeue", post(requeue_dead_letter))
        .route("/dlq/purge", post(purge_dead_letter))
        .route("/purge-all", post(purge_all))
}

fn rid(id: &Extension<RequestId>) -> String {
    request_id_string(&id.0)
}

fn validation_err(message: impl Into<String>, request_id: String) -> AdminError {
    AdminError::new(ArcanaError::validation(message), request_id)
}

async fn stats(State(state): State<AppState>, id: Extension<RequestId>) -> AdminResult<Json<arcana_jobs::DashboardStats>> {
    let dashboard = state
        .runtime
        .status
        .dashboard_stats(&state.queues())
        .await
        .map_err(|e| AdminError::new(e.into(), rid(&id)))?;
    Ok(Json(dashboard))
}

async fn list_queue(
    State(state): State<AppState>,
    Path(queue): Path<String>,
    Query(pagination): Query<PaginationQuery>,
    id: Extension<RequestId>,
) -> AdminResult<Json<CursorPage<JobInfo>>> {
    arcana_core::validation::rules::valid_queue_name(&queue).map_err(|_| validation_err("invalid queue name", rid(&id)))?;

    let page: CursorRequest = pagination.into();
    let items = state
        .runtime
        .status
        .list_ready(&queue, page)
        .await
        .map_err(|e| AdminError::new(e.into(), rid(&id)))?;
    Ok(Json(items))
}

async fn peek_job(
    State(state): State<AppState>,
    Path((queue, job_id)): Path<(String, String)>,
    id: Extension<RequestId>,
) -> AdminResult<Json<JobInfo>> {
    let request_id = rid(&id);
    let job_id = JobId::parse(&job_id).map_err(|_| validation_err("invalid job id", request_id.clone()))?;

    let job = state
        .runtime
        .status
        .peek(&queue, &job_id)
        .await
        .map_err(|e| AdminError::new(e.into(), request_id.clone()))?;

    job.map(Json).ok_or_else(|| AdminError::new(ArcanaError::not_found("job", job_id.to_string()), request_id))
}

async fn workers(State(state): State<AppState>, id: Extension<RequestId>) -> AdminResult<Json<Vec<WorkerHealth>>> {
    let workers = state
        .runtime
        .status
        .worker_health()
        .await
        .map_err(|e| AdminError::new(e.into(), rid(&id)))?;
    Ok(Json(workers))
}

#[derive(Debug, Deserialize, Validate)]
struct RequeueRequest {
    job_id: String,
    #[serde(default)]
    target_queue: Option<String>,
}

#[derive(Debug, Serialize)]
struct RequeueResponse {
    requeued: bool,
}

async fn requeue_dead_letter(
    State(state): State<AppState>,
    auth: Extension<AuthContext>,
    id: Extension<RequestId>,
    ValidatedJson(body): ValidatedJson<RequeueRequest>,
) -> AdminResult<Json<RequeueResponse>> {
    let request_id = rid(&id);
    auth.require(Scope::Purge).map_err(|e| AdminError::new(e, request_id.clone()))?;

    let job_id = JobId::parse(&body.job_id).map_err(|_| validation_err("invalid job id", request_id.clone()))?;

    let requeued = state
        .runtime
        .store
        .requeue_from_dead_letter(&job_id, body.target_queue.as_deref())
        .await
        .map_err(|e| AdminError::new(e.into(), request_id.clone()))?;

    info!(target: "audit", actor = %auth.actor, job_id = %job_id, target_queue = ?body.target_queue, "requeued dead-lettered job");

    Ok(Json(RequeueResponse { requeued }))
}

#[derive(Debug, Deserialize, Validate)]
struct PurgeDeadLetterRequest {
    confirm: String,
    #[validate(custom(function = "valid_audit_reason"))]
    reason: String,
}

#[derive(Debug, Deserialize, Validate)]
struct PurgeAllRequest {
    confirm: String,
    #[validate(custom(function = "valid_audit_reason"))]
    reason: String,
    #[serde(default)]
    queues: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PurgeResponse {
    purged: u64,
}

/// Runs a destructive purge behind confirmation-phrase matching and
/// `Idempotency-Key` single-flight caching: a retried request with the same
/// key returns the first call's result instead of purging twice.
async fn with_idempotency(
    state: &AppState,
    headers: &HeaderMap,
    request_id: &str,
    op: impl std::future::Future<Output = Result<PurgeResponse, AdminError>>,
) -> AdminResult<Json<PurgeResponse>> {
    let Some(key) = headers.get("idempotency-key").and_then(|h| h.to_str().ok()) else {
        return op.await.map(Json);
    };

    if let Some(cached) = state
        .idempotency_lookup(key)
        .await
        .map_err(|e| AdminError::new(e.into(), request_id.to_string()))?
    {
        let response: PurgeResponse =
            serde_json::from_value(cached.body).map_err(|e| AdminError::new(ArcanaError::internal(e.to_string()), request_id.to_string()))?;
        return Ok(Json(response));
    }

    let result = op.await?;

    let cached = CachedResponse {
        status: 200,
        body: serde_json::to_value(&result).map_err(|e| AdminError::new(ArcanaError::internal(e.to_string()), request_id.to_string()))?,
    };
    state
        .idempotency_store(key, &cached)
        .await
        .map_err(|e| AdminError::new(e.into(), request_id.to_string()))?;

    Ok(Json(result))
}

async fn purge_dead_letter(
    State(state): State<AppState>,
    auth: Extension<AuthContext>,
    id: Extension<RequestId>,
    headers: HeaderMap,
    ValidatedJson(body): ValidatedJson<PurgeDeadLetterRequest>,
) -> AdminResult<Json<PurgeResponse>> {
    let request_id = rid(&id);
    auth.require(Scope::Purge).map_err(|e| AdminError::new(e, request_id.clone()))?;

    if body.confirm != state.config.confirmation_phrase_dlq {
        return Err(AdminError::new(ArcanaError::conflict("confirmation_mismatch"), request_id));
    }

    let state_ref = &state;
    let request_id_for_op = request_id.clone();
    let actor = auth.actor.clone();
    let reason = body.reason.clone();
    with_idempotency(&state, &headers, &request_id, async move {
        let purged = state_ref
            .runtime
            .store
            .purge_dead_letter()
            .await
            .map_err(|e| AdminError::new(e.into(), request_id_for_op.clone()))?;
        info!(target: "audit", actor = %actor, reason = %reason, purged, "purged dead letter queue");
        Ok(PurgeResponse { purged })
    })
    .await
}

async fn purge_all(
    State(state): State<AppState>,
    auth: Extension<AuthContext>,
    id: Extension<RequestId>,
    headers: HeaderMap,
    ValidatedJson(body): ValidatedJson<PurgeAllRequest>,
) -> AdminResult<Json<PurgeResponse>> {
    let request_id = rid(&id);
    auth.require(Scope::Purge).map_err(|e| AdminError::new(e, request_id.clone()))?;

    if body.confirm != state.config.confirmation_phrase_purge_all {
        return Err(AdminError::new(ArcanaError::conflict("confirmation_mismatch"), request_id));
    }

    let queues = body.queues.clone().unwrap_or_else(|| state.queues());
    let state_ref = &state;
    let request_id_for_op = request_id.clone();
    let actor = auth.actor.clone();
    let reason = body.reason.clone();
    with_idempotency(&state, &headers, &request_id, async move {
        let purged = state_ref
            .runtime
            .store
            .purge_all(&queues)
            .await
            .map_err(|e| AdminError::new(e.into(), request_id_for_op.clone()))?;
        info!(target: "audit", actor = %actor, reason = %reason, queues = ?queues, purged, "purged all queues");
        Ok(PurgeResponse { purged })
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn purge_request_rejects_short_reason() {
        let req = PurgeDeadLetterRequest {
            confirm: "PURGE DEAD LETTER QUEUE".into(),
            reason: "too short".into(),
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn purge_request_accepts_detailed_reason() {
        let req = PurgeDeadLetterRequest {
            confirm: "PURGE DEAD LETTER QUEUE".into(),
            reason: "operator cleanup after incident #42".into(),
        };
        assert!(req.validate().is_ok());
    }
}
