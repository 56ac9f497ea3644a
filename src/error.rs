use actix_web::{HttpResponse, http::StatusCode};
use derive_more::Display;
use serde::Serialize;
use serde_json::json;

/// One field-level validation message, returned inside a 422 body.
#[derive(Debug, Clone, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Every business-rule rejection the managers can produce. Handlers return
/// these with `?`; the `ResponseError` impl turns them into the fixed
/// kind -> HTTP status mapping with a JSON body.
#[derive(Debug, Display)]
pub enum ApiError {
    #[display(fmt = "{}", _0)]
    Unauthenticated(String),
    #[display(fmt = "{}", _0)]
    Forbidden(String),
    #[display(fmt = "{}", _0)]
    NotFound(String),
    #[display(fmt = "Validation failed")]
    ValidationFailed(Vec<FieldError>),
    #[display(fmt = "{}", _0)]
    InvalidState(String),
    #[display(fmt = "{}", _0)]
    TimeWindowClosed(String),
    #[display(fmt = "You are outside the allowed office range ({} m away)", distance_meters)]
    OutOfRange { distance_meters: f64 },
    #[display(fmt = "{}", _0)]
    FileRejected(String),
    #[display(fmt = "{}", _0)]
    FileUnavailable(String),
    #[display(fmt = "{}", _0)]
    Conflict(String),
    #[display(fmt = "Internal server error")]
    Internal,
}

impl ApiError {
    /// Stable machine-checkable kind, independent of the human message.
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Unauthenticated(_) => "unauthenticated",
            ApiError::Forbidden(_) => "forbidden",
            ApiError::NotFound(_) => "not_found",
            ApiError::ValidationFailed(_) => "validation_failed",
            ApiError::InvalidState(_) => "invalid_state",
            ApiError::TimeWindowClosed(_) => "time_window_closed",
            ApiError::OutOfRange { .. } => "out_of_range",
            ApiError::FileRejected(_) => "file_rejected",
            ApiError::FileUnavailable(_) => "file_unavailable",
            ApiError::Conflict(_) => "conflict",
            ApiError::Internal => "internal",
        }
    }

    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        ApiError::ValidationFailed(vec![FieldError::new(field, message)])
    }
}

impl actix_web::ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::ValidationFailed(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let mut body = json!({
            "success": false,
            "error": self.kind(),
            "message": self.to_string(),
        });

        match self {
            ApiError::ValidationFailed(fields) => {
                body["fields"] = serde_json::to_value(fields).unwrap_or_default();
            }
            ApiError::OutOfRange { distance_meters } => {
                body["distance_meters"] = json!(distance_meters);
            }
            _ => {}
        }

        HttpResponse::build(self.status_code()).json(body)
    }
}

/// MySQL reports unique-constraint violations as SQLSTATE 23000.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        return db_err.code().as_deref() == Some("23000");
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_status_mapping_is_fixed() {
        assert_eq!(
            actix_web::ResponseError::status_code(&ApiError::Unauthenticated("x".into())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            actix_web::ResponseError::status_code(&ApiError::Forbidden("x".into())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            actix_web::ResponseError::status_code(&ApiError::NotFound("x".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            actix_web::ResponseError::status_code(&ApiError::validation("f", "m")),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            actix_web::ResponseError::status_code(&ApiError::Internal),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        // Everything else is a plain 400.
        for err in [
            ApiError::InvalidState("x".into()),
            ApiError::TimeWindowClosed("x".into()),
            ApiError::OutOfRange { distance_meters: 1.0 },
            ApiError::FileRejected("x".into()),
            ApiError::FileUnavailable("x".into()),
            ApiError::Conflict("x".into()),
        ] {
            assert_eq!(
                actix_web::ResponseError::status_code(&err),
                StatusCode::BAD_REQUEST
            );
        }
    }

    #[test]
    fn kinds_are_stable_identifiers() {
        assert_eq!(ApiError::Unauthenticated("x".into()).kind(), "unauthenticated");
        assert_eq!(ApiError::validation("f", "m").kind(), "validation_failed");
        assert_eq!(ApiError::Conflict("x".into()).kind(), "conflict");
        assert_eq!(ApiError::Internal.kind(), "internal");
    }

    #[test]
    fn out_of_range_message_carries_distance() {
        let err = ApiError::OutOfRange { distance_meters: 152.37 };
        assert!(err.to_string().contains("152.37"));
        assert_eq!(err.kind(), "out_of_range");
    }

    #[test]
    fn validation_detail_is_field_level() {
        let err = ApiError::validation("latitude", "latitude must be between -90 and 90");
        if let ApiError::ValidationFailed(fields) = &err {
            assert_eq!(fields.len(), 1);
            assert_eq!(fields[0].field, "latitude");
        } else {
            panic!("expected ValidationFailed");
        }
    }
}
