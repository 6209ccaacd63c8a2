use axum::{
    extract::{
        multipart::MultipartRejection,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::error;

use crate::response::{ApiResponse, ErrorBody};
use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Internal(String),

    #[error("Something went wrong")]
    Unexpected(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Internal(_) | AppError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Duplicate(what) => AppError::Conflict(format!("{} already exists", what)),
            StoreError::ForeignKey(what) => AppError::Conflict(what),
            StoreError::Other(e) => AppError::Unexpected(e),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<MultipartRejection> for AppError {
    fn from(rejection: MultipartRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

/// Rewrites error responses produced outside the handlers (timeouts, unknown
/// methods, body limits) into the JSON envelope. JSON responses pass through.
pub async fn envelope_bare_errors(res: Response) -> Response {
    let status = res.status();
    if !(status.is_client_error() || status.is_server_error()) {
        return res;
    }
    let is_json = res
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"));
    if is_json {
        return res;
    }

    let message = status.canonical_reason().unwrap_or("Request failed");
    let mut enveloped = ApiResponse::<()>::new(status, None, message).into_response();
    for (name, value) in res.headers() {
        if name != header::CONTENT_TYPE && name != header::CONTENT_LENGTH {
            enveloped.headers_mut().append(name.clone(), value.clone());
        }
    }
    enveloped
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if let AppError::Unexpected(ref e) = self {
            error!(error = ?e, "unexpected error");
        }
        let body = ErrorBody {
            status: status.as_u16(),
            data: None,
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_is_404_not_402() {
        assert_eq!(AppError::NotFound("Recipe not found".into()).status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn unexpected_hides_details() {
        let err = AppError::from(anyhow::anyhow!("connection reset by peer"));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "Something went wrong");
    }

    async fn body_after_envelope(res: Response) -> serde_json::Value {
        let res = envelope_bare_errors(res).await;
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
    }

    fn plain(status: StatusCode) -> Response {
        (status, [(header::CONTENT_TYPE, "text/plain")], "raw").into_response()
    }

    #[tokio::test]
    async fn timeout_response_gets_the_envelope() {
        let body = body_after_envelope(plain(StatusCode::REQUEST_TIMEOUT)).await;
        assert_eq!(
            body,
            serde_json::json!({ "status": 408, "data": null, "message": "Request Timeout" })
        );
    }

    #[tokio::test]
    async fn json_and_success_responses_pass_through() {
        let body = body_after_envelope(plain(StatusCode::OK)).await;
        assert_eq!(body, serde_json::Value::Null);

        let body =
            body_after_envelope(AppError::NotFound("Recipe not found".into()).into_response()).await;
        assert_eq!(body["message"], "Recipe not found");
    }

    #[test]
    fn duplicate_store_error_maps_to_conflict() {
        let err = AppError::from(StoreError::Duplicate("email".into()));
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.to_string(), "email already exists");
    }
}
