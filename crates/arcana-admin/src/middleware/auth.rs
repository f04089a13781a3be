//! Bearer-token authentication and scope enforcement for the admin surface.
//!
//! The admin surface is configured with a single operator bearer token
//! (`AdminConfig::auth_token`) rather than per-user accounts; a request
//! presenting it is granted every scope. `AuthContext` is still shaped around
//! a scope set so a real per-token RBAC store could be substituted later
//! without touching handler call sites.

use crate::state::AppState;
use arcana_core::ArcanaError;
use axum::{
    body::Body,
    extract::State,
    http::{header::AUTHORIZATION, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::collections::HashSet;

/// A capability an authenticated caller may exercise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Read-only inspection: `/stats`, `/queues/*`, `/workers`, `/healthz`.
    Read,
    /// Destructive operations: `/dlq/purge`, `/dlq/requeue`, `/purge-all`.
    Purge,
}

/// The authenticated caller, inserted into request extensions by
/// `auth_middleware` and extracted by handlers that need to know who
/// performed an operation (for audit logging) or check a scope.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub actor: String,
    scopes: HashSet<Scope>,
}

impl AuthContext {
    #[must_use]
    pub fn has(&self, scope: Scope) -> bool {
        self.scopes.contains(&scope)
    }

    pub fn require(&self, scope: Scope) -> Result<(), ArcanaError> {
        if self.has(scope) {
            Ok(())
        } else {
            Err(ArcanaError::forbidden(format!("missing {scope:?} scope")))
        }
    }
}

/// Validates the `Authorization: Bearer <token>` header against the
/// configured admin token. Fails closed: a deployment with no token
/// configured accepts nothing.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let presented = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "));

    let configured = state.config.auth_token.as_deref();

    match (configured, presented) {
        (Some(configured), Some(presented)) if constant_time_eq(configured, presented) => {
            request.extensions_mut().insert(AuthContext {
                actor: "admin".to_string(),
                scopes: [Scope::Read, Scope::Purge].into_iter().collect(),
            });
            next.run(request).await
        }
        (Some(_), Some(_)) => crate::error::AdminError::new(
            ArcanaError::unauthorized("invalid bearer token"),
            request_id(&request),
        )
        .into_response(),
        _ => crate::error::AdminError::new(
            ArcanaError::unauthorized("missing bearer token"),
            request_id(&request),
        )
        .into_response(),
    }
}

fn request_id(request: &Request<Body>) -> String {
    request
        .extensions()
        .get::<tower_http::request_id::RequestId>()
        .and_then(|id| id.header_value().to_str().ok())
        .map(ToString::to_string)
        .unwrap_or_else(|| "unknown".to_string())
}

/// Compares two strings in constant time to avoid leaking the token length
/// or contents through timing.
fn constant_time_eq(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_time_eq_matches_equal_strings() {
        assert!(constant_time_eq("secret-token", "secret-token"));
    }

    #[test]
    fn constant_time_eq_rejects_mismatches() {
        assert!(!constant_time_eq("secret-token", "wrong-token"));
        assert!(!constant_time_eq("short", "longer-value"));
    }

    #[test]
    fn purge_scope_required_for_destructive_ops() {
        let ctx = AuthContext {
            actor: "admin".into(),
            scopes: [Scope::Read].into_iter().collect(),
        };
        assert!(ctx.require(Scope::Read).is_ok());
        assert!(ctx.require(Scope::Purge).is_err());
    }
}
