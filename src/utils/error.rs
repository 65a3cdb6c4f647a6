use crate::utils::trace::{self, TraceContext};
use actix_web::{
    error::JsonPayloadError,
    http::{header, StatusCode},
    HttpRequest, HttpResponse, ResponseError,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Single error detail
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ErrorDetail {
    pub field: Option<String>,
    pub message: String,
    pub code: Option<String>,
    #[schema(value_type = Object)]
    pub value: Option<serde_json::Value>,
}

impl ErrorDetail {
    pub fn field(field: impl Into<String>, message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            field: Some(field.into()),
            message: message.into(),
            code: Some(code.into()),
            value: None,
        }
    }
}

/// Standard error response body
#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    /// Error type name
    pub error: String,
    /// Human-readable error message
    pub message: String,
    /// Error code for programmatic handling
    pub code: String,
    pub details: Option<Vec<ErrorDetail>>,
    pub timestamp: String,
    pub path: Option<String>,
    pub trace_id: Option<String>,
}

/// Application error taxonomy. Each variant maps to one HTTP status.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{message}")]
    Validation {
        message: String,
        field: Option<String>,
        details: Vec<(String, String)>,
    },
    #[error("{message}")]
    NotFound {
        message: String,
        resource: Option<String>,
        details: Vec<(String, String)>,
    },
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{message}")]
    Conflict {
        message: String,
        resource: Option<String>,
        details: Vec<(String, String)>,
    },
    #[error("{0}")]
    Internal(String),
    /// Request body failed schema validation (422)
    #[error("Request validation failed")]
    RequestValidation(Vec<ErrorDetail>),
    #[error("Rate limit exceeded. Please try again later.")]
    RateLimited { retry_after: u64 },
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        AppError::Validation {
            message: message.into(),
            field: Some(field.into()),
            details: Vec::new(),
        }
    }

    pub fn not_found(message: impl Into<String>, resource: impl Into<String>) -> Self {
        AppError::NotFound {
            message: message.into(),
            resource: Some(resource.into()),
            details: Vec::new(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        AppError::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        AppError::Forbidden(message.into())
    }

    pub fn conflict(message: impl Into<String>, resource: impl Into<String>) -> Self {
        AppError::Conflict {
            message: message.into(),
            resource: Some(resource.into()),
            details: Vec::new(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        AppError::Internal(message.into())
    }

    /// Attaches a key/value detail. Ignored by variants that carry no detail map.
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        match &mut self {
            AppError::Validation { details, .. }
            | AppError::NotFound { details, .. }
            | AppError::Conflict { details, .. } => details.push((key.into(), value.into())),
            _ => {}
        }
        self
    }

    /// Error type name as reported in the `error` field.
    pub fn name(&self) -> &'static str {
        match self {
            AppError::Validation { .. } | AppError::RequestValidation(_) => "ValidationError",
            AppError::NotFound { .. } => "NotFoundError",
            AppError::Unauthorized(_) => "UnauthorizedError",
            AppError::Forbidden(_) => "ForbiddenError",
            AppError::Conflict { .. } => "ConflictError",
            AppError::Internal(_) => "InternalServerError",
            AppError::RateLimited { .. } => "RateLimitExceeded",
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation { .. } | AppError::RequestValidation(_) => "VALIDATION_ERROR",
            AppError::NotFound { .. } => "NOT_FOUND",
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::Conflict { .. } => "CONFLICT",
            AppError::Internal(_) => "INTERNAL_SERVER_ERROR",
            AppError::RateLimited { .. } => "RATE_LIMIT_EXCEEDED",
        }
    }

    fn details(&self) -> Option<Vec<ErrorDetail>> {
        let code = self.code();
        let details: Vec<ErrorDetail> = match self {
            AppError::Validation {
                message,
                field: Some(field),
                ..
            } => vec![ErrorDetail::field(field.clone(), message.clone(), code)],
            AppError::NotFound {
                message,
                resource: Some(resource),
                ..
            } => vec![ErrorDetail {
                field: None,
                message: message.clone(),
                code: Some(code.to_string()),
                value: Some(serde_json::Value::String(resource.clone())),
            }],
            AppError::Validation { details, .. }
            | AppError::NotFound { details, .. }
            | AppError::Conflict { details, .. } => details
                .iter()
                .map(|(key, value)| ErrorDetail::field(key.clone(), value.clone(), code))
                .collect(),
            AppError::RequestValidation(details) => details.clone(),
            _ => Vec::new(),
        };

        if details.is_empty() {
            None
        } else {
            Some(details)
        }
    }

    /// Builds the response body for this error under the given trace context.
    pub fn to_body(&self, ctx: Option<&TraceContext>) -> ErrorResponse {
        let expose = ctx.map(|c| c.expose_errors).unwrap_or(false);
        let message = match self {
            AppError::Internal(msg) if expose => msg.clone(),
            AppError::Internal(_) => "An unexpected error occurred".to_string(),
            other => other.to_string(),
        };

        ErrorResponse {
            error: self.name().to_string(),
            message,
            code: self.code().to_string(),
            details: self.details(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            path: ctx.and_then(|c| c.path.clone()),
            trace_id: ctx.map(|c| c.trace_id.clone()),
        }
    }

    fn log(&self, path: &str) {
        match self {
            AppError::Internal(msg) => log::error!("❌ Unexpected error on {}: {}", path, msg),
            AppError::RequestValidation(details) => log::warn!(
                "⚠️  Validation error on {}: {} field(s) failed",
                path,
                details.len()
            ),
            AppError::RateLimited { .. } => log::warn!("⚠️  Rate limit exceeded on {}", path),
            other => log::warn!(
                "⚠️  Domain exception on {}: {} - {} ({})",
                path,
                other.name(),
                other,
                other.code()
            ),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Conflict { .. } => StatusCode::CONFLICT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::RequestValidation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let ctx = trace::current();
        let body = self.to_body(ctx.as_ref());
        self.log(body.path.as_deref().unwrap_or("-"));

        let mut response = HttpResponse::build(self.status_code());
        if let Some(trace_id) = &body.trace_id {
            response.insert_header(("X-Trace-ID", trace_id.clone()));
            response.insert_header(("X-Request-ID", trace_id.clone()));
        }
        if let AppError::RateLimited { retry_after } = self {
            response.insert_header((header::RETRY_AFTER, retry_after.to_string()));
        }
        response.json(body)
    }
}

impl From<mongodb::error::Error> for AppError {
    fn from(e: mongodb::error::Error) -> Self {
        AppError::Internal(format!("Database error: {}", e))
    }
}

impl From<bcrypt::BcryptError> for AppError {
    fn from(e: bcrypt::BcryptError) -> Self {
        AppError::Internal(format!("Password hashing error: {}", e))
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        AppError::Internal(format!("Failed to generate token: {}", e))
    }
}

/// Turns JSON extractor failures into 422 responses with per-field details.
pub fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    let detail = match &err {
        JsonPayloadError::Deserialize(e) => deserialize_detail(e),
        JsonPayloadError::ContentType => ErrorDetail::field(
            "body",
            "Expected a JSON body (Content-Type: application/json)",
            "content_type",
        ),
        JsonPayloadError::Overflow { .. } | JsonPayloadError::OverflowKnownLength { .. } => {
            ErrorDetail::field("body", "Request body is too large", "payload_too_large")
        }
        other => ErrorDetail::field("body", other.to_string(), "json_invalid"),
    };
    AppError::RequestValidation(vec![detail]).into()
}

fn deserialize_detail(e: &serde_json::Error) -> ErrorDetail {
    use serde_json::error::Category;

    let message = e.to_string();
    match e.classify() {
        Category::Data => {
            if let Some(field) = missing_field_name(&message) {
                ErrorDetail::field(field, "Field required", "missing")
            } else {
                ErrorDetail::field("body", message, "type_error")
            }
        }
        _ => ErrorDetail::field("body", message, "json_invalid"),
    }
}

fn missing_field_name(message: &str) -> Option<String> {
    let rest = message.strip_prefix("missing field `")?;
    let end = rest.find('`')?;
    Some(rest[..end].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(AppError::validation("x", "f").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::not_found("x", "user").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::unauthorized("x").status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::forbidden("x").status_code(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::conflict("x", "user").status_code(), StatusCode::CONFLICT);
        assert_eq!(AppError::internal("x").status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            AppError::RequestValidation(vec![]).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            AppError::RateLimited { retry_after: 5 }.status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
    }

    #[test]
    fn test_validation_detail_uses_field() {
        let body = AppError::validation("Password must be at least 8 characters", "password")
            .to_body(None);
        assert_eq!(body.error, "ValidationError");
        assert_eq!(body.code, "VALIDATION_ERROR");
        let details = body.details.unwrap();
        assert_eq!(details.len(), 1);
        assert_eq!(details[0].field.as_deref(), Some("password"));
    }

    #[test]
    fn test_not_found_resource_wins_over_detail_map() {
        let body = AppError::not_found("User not found", "user")
            .with_detail("user_id", "42")
            .to_body(None);
        let details = body.details.unwrap();
        assert_eq!(details.len(), 1);
        assert_eq!(details[0].value, Some(serde_json::json!("user")));
    }

    #[test]
    fn test_conflict_detail_map_becomes_field_details() {
        let body = AppError::conflict("User with this email already exists", "user")
            .with_detail("email", "a@b.com")
            .to_body(None);
        let details = body.details.unwrap();
        assert_eq!(details[0].field.as_deref(), Some("email"));
        assert_eq!(details[0].message, "a@b.com");
        assert_eq!(details[0].code.as_deref(), Some("CONFLICT"));
    }

    #[test]
    fn test_plain_errors_have_no_details() {
        let body = AppError::unauthorized("Invalid credentials").to_body(None);
        assert!(body.details.is_none());
        assert_eq!(body.message, "Invalid credentials");
    }

    #[test]
    fn test_internal_message_hidden_unless_exposed() {
        let hidden = AppError::internal("Database error: boom").to_body(None);
        assert_eq!(hidden.message, "An unexpected error occurred");

        let ctx = TraceContext {
            trace_id: "t-1".into(),
            path: Some("/x".into()),
            expose_errors: true,
        };
        let shown = AppError::internal("Database error: boom").to_body(Some(&ctx));
        assert_eq!(shown.message, "Database error: boom");
        assert_eq!(shown.trace_id.as_deref(), Some("t-1"));
        assert_eq!(shown.path.as_deref(), Some("/x"));
    }

    #[test]
    fn test_missing_field_is_extracted() {
        assert_eq!(
            missing_field_name("missing field `password` at line 1 column 2"),
            Some("password".to_string())
        );
        assert_eq!(missing_field_name("invalid type: integer"), None);
    }
}
