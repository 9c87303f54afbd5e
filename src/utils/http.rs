//! HTTP error envelope shared by every route, adapted from the reference
//! backend's `ApiResponse<T>` wrapper to the `{error: {kind, message}}`
//! shape this API's dashboard contract commits to (§7: no exceptions
//! cross the process boundary).

use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Serialize)]
struct ErrorDetail {
    kind: String,
    message: String,
}

#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct HttpError {
    pub status: actix_web::http::StatusCode,
    pub kind: String,
    pub message: String,
}

impl HttpError {
    pub fn bad_request(kind: &str, message: impl Into<String>) -> Self {
        Self { status: actix_web::http::StatusCode::BAD_REQUEST, kind: kind.into(), message: message.into() }
    }

    pub fn not_found(kind: &str, message: impl Into<String>) -> Self {
        Self { status: actix_web::http::StatusCode::NOT_FOUND, kind: kind.into(), message: message.into() }
    }

    pub fn internal(kind: &str, message: impl Into<String>) -> Self {
        Self { status: actix_web::http::StatusCode::INTERNAL_SERVER_ERROR, kind: kind.into(), message: message.into() }
    }
}

impl ResponseError for HttpError {
    fn status_code(&self) -> actix_web::http::StatusCode {
        self.status
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status)
            .json(ErrorBody { error: ErrorDetail { kind: self.kind.clone(), message: self.message.clone() } })
    }
}
