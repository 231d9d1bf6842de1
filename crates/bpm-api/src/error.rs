//! HTTP error mapping.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use bpm_core::Error;

/// Error returned by every handler.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Error::ReferenceNotFound(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Error::ScopeMismatch(_) | Error::Forbidden(_) => StatusCode::FORBIDDEN,
            Error::DuplicateKey { .. } => StatusCode::CONFLICT,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Error::Database(_) | Error::Config(_) | Error::Serialization(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError(Error::InvalidInput(rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError(Error::InvalidInput(rejection.body_text()))
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError(Error::InvalidInput(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            tracing::error!(
                subsystem = "api",
                error_kind = self.0.kind(),
                error = %self.0,
                "Request failed"
            );
            "Internal server error".to_string()
        } else {
            self.0.to_string()
        };

        let body = Json(serde_json::json!({
            "error": message,
            "kind": self.0.kind(),
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (Error::InvalidInput("x".into()), StatusCode::BAD_REQUEST),
            (
                Error::ReferenceNotFound("node 7".into()),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (Error::ScopeMismatch("x".into()), StatusCode::FORBIDDEN),
            (Error::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (Error::duplicate("name", "'T1'"), StatusCode::CONFLICT),
            (Error::NotFound("x".into()), StatusCode::NOT_FOUND),
            (Error::Unauthorized("x".into()), StatusCode::UNAUTHORIZED),
            (
                Error::Serialization("x".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError(err).status(), expected);
        }
    }

    #[tokio::test]
    async fn test_body_carries_kind_and_hides_internal_detail() {
        use http_body_util::BodyExt;

        let response = ApiError(Error::Serialization("key must be a string".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["kind"], "serialization_error");
        assert_eq!(body["error"], "Internal server error");

        let response = ApiError(Error::duplicate("name", "'T1'")).into_response();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["kind"], "duplicate_key");
        assert_eq!(body["error"], "Duplicate name: 'T1' is already in use");
    }
}
