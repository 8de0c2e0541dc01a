//! HTTP mapping for [`Error`].
//!
//! Every error becomes `{ "code", "message", "field" }`. Infrastructure failures are
//! logged here and reach the client only as an opaque message.

use crate::errors::{Error, ErrorKind};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::error;

/// Body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Stable machine-readable code
    pub code: &'static str,
    /// Human-readable description
    pub message: String,
    /// Offending input field, for validation errors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

const fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::Rejected => StatusCode::CONFLICT,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Forbidden => StatusCode::FORBIDDEN,
        ErrorKind::Infrastructure => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let status = status_for(kind);

        let message = if kind == ErrorKind::Infrastructure {
            error!(error = %self, "Request failed");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };
        let field = match &self {
            Self::Validation { field, .. } => Some(field.clone()),
            _ => None,
        };

        let body = ErrorBody {
            code: self.code(),
            message,
            field,
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::DiscountRejection;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            Error::validation("date", "bad").into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            Error::SessionFull {
                available: 0,
                requested: 1
            }
            .into_response()
            .status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            Error::discount("X", DiscountRejection::WrongSchool)
                .into_response()
                .status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            Error::ClassNotFound { id: 1 }.into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            Error::Forbidden {
                message: "no".to_string()
            }
            .into_response()
            .status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            Error::from(sea_orm::DbErr::Custom("boom".to_string()))
                .into_response()
                .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
