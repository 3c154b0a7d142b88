use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, warn};

/// API Error types
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Authentication credentials were not provided or are invalid")]
    Unauthorized,

    /// The detail stays in the logs
    #[error("You do not have permission to perform this action")]
    Forbidden,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    InternalError(String),
}

/// Error response body
#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ApiErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl ApiError {
    /// Convert error to HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::ValidationError(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get error code for the error type
    pub fn error_code(&self) -> &str {
        match self {
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::DatabaseError(_) => "DATABASE_ERROR",
            ApiError::ValidationError(_) => "VALIDATION_ERROR",
            ApiError::Unauthorized => "UNAUTHORIZED",
            ApiError::Forbidden => "FORBIDDEN",
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::InternalError(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_response = ApiErrorResponse {
            error: ErrorDetail {
                code: self.error_code().to_string(),
                message: self.to_string(),
            },
        };

        (status, Json(error_response)).into_response()
    }
}

/// Both a deny and a checker/target mismatch refuse the request
impl From<authz::AuthzError> for ApiError {
    fn from(err: authz::AuthzError) -> Self {
        match &err {
            authz::AuthzError::UnrecognizedTarget { .. } => {
                warn!("Authorization rejected a malformed check: {}", err)
            }
            authz::AuthzError::Denied(_) => debug!("Request refused: {}", err),
        }
        ApiError::Forbidden
    }
}

impl From<database::DatabaseError> for ApiError {
    fn from(err: database::DatabaseError) -> Self {
        match err {
            database::DatabaseError::EntityNotFound(what) => ApiError::NotFound(what),
            database::DatabaseError::Validation(msg) => ApiError::ValidationError(msg),
            other => {
                error!("Storage failure: {}", other);
                ApiError::DatabaseError(other.to_string())
            }
        }
    }
}

impl From<user::UserError> for ApiError {
    fn from(err: user::UserError) -> Self {
        match err {
            user::UserError::Database(db) => db.into(),
            e if e.is_authentication_failure() => ApiError::Unauthorized,
            e => ApiError::InternalError(e.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

/// Result type for API operations
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use authz::{AuthzError, EntityKind, Target, ZoneId};

    #[test]
    fn test_authz_errors_are_forbidden() {
        let denied: ApiError = AuthzError::Denied(Target::Zone(ZoneId(1))).into();
        assert_eq!(denied.status_code(), StatusCode::FORBIDDEN);

        let unrecognized: ApiError = AuthzError::UnrecognizedTarget {
            checker: EntityKind::Node,
            target: Target::Zone(ZoneId(1)),
        }
        .into();
        assert_eq!(unrecognized.status_code(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_forbidden_body_hides_target() {
        let response = ApiError::from(AuthzError::UnrecognizedTarget {
            checker: EntityKind::Node,
            target: Target::Sensor(authz::SensorId(3)),
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: ApiErrorResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body.error.code, "FORBIDDEN");
        assert!(!body.error.message.contains("sensor"));
        assert!(!body.error.message.contains('3'));
    }

    #[test]
    fn test_database_errors_map_to_status() {
        let missing: ApiError = database::DatabaseError::EntityNotFound("zone#9".into()).into();
        assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);

        let invalid: ApiError = database::DatabaseError::Validation("too big".into()).into();
        assert_eq!(invalid.status_code(), StatusCode::BAD_REQUEST);

        let other: ApiError = database::DatabaseError::Other("boom".into()).into();
        assert_eq!(other.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_user_errors_map_to_status() {
        let invalid: ApiError = user::UserError::InvalidCredentials.into();
        assert_eq!(invalid.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(invalid.error_code(), "UNAUTHORIZED");
    }
}
