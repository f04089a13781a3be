//! Validated JSON extractor for automatic request validation.
//!
//! Deserializes JSON and validates it with the `validator` crate; rejections
//! are rendered through the same `{code, message, request_id}` envelope as
//! every other admin error.

use arcana_core::{validation::validation_errors_to_arcana_error, ErrorResponse};
use axum::{
    extract::{rejection::JsonRejection, FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::de::DeserializeOwned;
use validator::Validate;

/// JSON extractor that validates the deserialized value before handing it
/// to the handler.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidatedJson<T>(pub T);

impl<T> std::ops::Deref for ValidatedJson<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

pub enum ValidatedJsonRejection {
    Json(JsonRejection),
    Validation(validator::ValidationErrors),
}

impl IntoResponse for ValidatedJsonRejection {
    fn into_response(self) -> Response {
        match self {
            Self::Json(rejection) => {
                let body = ErrorResponse {
                    code: "validation_error".to_string(),
                    message: format!("invalid JSON: {rejection}"),
                    request_id: "unknown".to_string(),
                };
                (StatusCode::BAD_REQUEST, Json(body)).into_response()
            }
            Self::Validation(errors) => {
                let error = validation_errors_to_arcana_error(errors);
                let body = ErrorResponse::from_error(&error, "unknown");
                (StatusCode::BAD_REQUEST, Json(body)).into_response()
            }
        }
    }
}

#[async_trait::async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ValidatedJsonRejection;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await.map_err(ValidatedJsonRejection::Json)?;
        value.validate().map_err(ValidatedJsonRejection::Validation)?;
        Ok(ValidatedJson(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use validator::Validate;

    #[derive(Debug, Deserialize, Validate)]
    struct PurgeRequest {
        #[validate(length(min = 10, message = "reason must be at least 10 characters"))]
        reason: String,
    }

    #[test]
    fn rejects_a_reason_below_the_minimum_length() {
        let req = PurgeRequest { reason: "too short".into() };
        assert!(req.validate().is_err());
    }

    #[test]
    fn accepts_a_sufficiently_detailed_reason() {
        let req = PurgeRequest {
            reason: "operator cleanup after incident #42".into(),
        };
        assert!(req.validate().is_ok());
    }
}
