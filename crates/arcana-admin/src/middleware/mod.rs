//! Axum middleware layers for the admin HTTP surface.

mod auth;
mod logging;
mod rate_limit;

pub use auth::{auth_middleware, AuthContext, Scope};
pub use logging::logging_middleware;
pub use rate_limit::rate_limit_middleware;
