// HTTP API Error Types
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

use crate::database::RouterError;

/// HTTP API error with appropriate status codes and client-friendly messages
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest(String),

    // 404 Not Found
    NotFound(String),

    // 500 Internal Server Error
    InternalServerError(String),

    // 503 Service Unavailable
    ServiceUnavailable(String),
}

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) => 400,
            ApiError::NotFound(_) => 404,
            ApiError::InternalServerError(_) => 500,
            ApiError::ServiceUnavailable(_) => 503,
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg) => msg,
            ApiError::NotFound(msg) => msg,
            ApiError::InternalServerError(msg) => msg,
            ApiError::ServiceUnavailable(msg) => msg,
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
        }
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        json!({
            "error": true,
            "message": self.message(),
            "code": self.error_code()
        })
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        ApiError::InternalServerError(message.into())
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        ApiError::ServiceUnavailable(message.into())
    }
}

impl From<RouterError> for ApiError {
    fn from(err: RouterError) -> Self {
        match err {
            RouterError::ConfigMissing(name) => {
                tracing::error!("Missing configuration: {}", name);
                ApiError::service_unavailable("Service is not configured")
            }
            RouterError::InvalidTenantId(id) => {
                ApiError::bad_request(format!("Invalid tenant id: {}", id))
            }
            RouterError::Provisioning { tenant_id, source } => {
                tracing::error!("Provisioning failed for tenant {}: {:#}", tenant_id, source);
                ApiError::service_unavailable("Tenant store temporarily unavailable")
            }
            RouterError::Timeout { scope } => {
                tracing::error!("Query deadline exceeded for {}", scope);
                ApiError::internal_server_error("Request processing timed out")
            }
            RouterError::Query { scope, source } => {
                // Don't expose internal SQL errors to clients
                tracing::error!("Query error for {}: {}", scope, source);
                ApiError::internal_server_error("An error occurred while processing your request")
            }
            RouterError::Sqlx(sqlx_err) => {
                tracing::error!("SQLx error: {}", sqlx_err);
                ApiError::internal_server_error("Database error occurred")
            }
        }
    }
}

// Standard error trait implementations
impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_json())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_router_errors_to_status_codes() {
        let bad: ApiError = RouterError::InvalidTenantId("x;".into()).into();
        assert_eq!(bad.status_code(), 400);

        let provisioning: ApiError = RouterError::Provisioning {
            tenant_id: "42".into(),
            source: anyhow::anyhow!("engine unavailable"),
        }
        .into();
        assert_eq!(provisioning.status_code(), 503);
        assert_eq!(provisioning.error_code(), "SERVICE_UNAVAILABLE");

        let timeout: ApiError = RouterError::Timeout { scope: "42".into() }.into();
        assert_eq!(timeout.status_code(), 500);
    }

    #[test]
    fn json_body_is_client_safe() {
        let err: ApiError = RouterError::Query {
            scope: "42".into(),
            source: sqlx::Error::RowNotFound,
        }
        .into();
        let body = err.to_json();
        assert_eq!(body["error"], true);
        // Internal SQL detail must not leak to clients
        assert!(!body["message"].as_str().unwrap().contains("RowNotFound"));
    }
}
