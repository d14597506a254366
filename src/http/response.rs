//! Error responses.
//!
//! Every failure leaves the service as `{"error": {"code", "message"}}` with a
//! status matching the code. Server-side details are logged, never returned.

use std::collections::BTreeMap;
use std::fmt::Display;

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    RateLimited,
    InvalidCredentials,
    InvalidAuthenticationToken,
    AuthenticationRequired,
    BadRequest(String),
    FailedValidation(BTreeMap<&'static str, String>),
    Server,
}

#[derive(Serialize)]
struct ErrorEnvelope<'a> {
    error: ErrorBody<'a>,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    code: &'static str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<&'a BTreeMap<&'static str, String>>,
}

impl ApiError {
    /// Single-field validation failure.
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        ApiError::FailedValidation(BTreeMap::from([(field, message.into())]))
    }

    /// Log `error` and hide it behind a generic 500.
    pub fn internal(error: impl Display) -> Self {
        tracing::error!(error = %error, "Request failed");
        ApiError::Server
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::InvalidCredentials
            | ApiError::InvalidAuthenticationToken
            | ApiError::AuthenticationRequired => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::FailedValidation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Server => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::RateLimited => "rate_limit_exceeded",
            ApiError::InvalidCredentials => "invalid_credentials",
            ApiError::InvalidAuthenticationToken => "invalid_authentication_token",
            ApiError::AuthenticationRequired => "authentication_required",
            ApiError::BadRequest(_) => "bad_request",
            ApiError::FailedValidation(_) => "failed_validation",
            ApiError::Server => "server_error",
        }
    }

    fn message(&self) -> &str {
        match self {
            ApiError::RateLimited => "rate limit exceeded",
            ApiError::InvalidCredentials => "invalid authentication credentials",
            ApiError::InvalidAuthenticationToken => "invalid or missing authentication token",
            ApiError::AuthenticationRequired => {
                "you must be authenticated to access this resource"
            }
            ApiError::BadRequest(message) => message,
            ApiError::FailedValidation(_) => "request failed validation",
            ApiError::Server => {
                "the server encountered a problem and could not process your request"
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let fields = match &self {
            ApiError::FailedValidation(fields) => Some(fields),
            _ => None,
        };
        let envelope = ErrorEnvelope {
            error: ErrorBody {
                code: self.code(),
                message: self.message(),
                fields,
            },
        };

        let mut response = (self.status(), Json(envelope)).into_response();
        if self == ApiError::InvalidAuthenticationToken {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn rate_limited_is_429_with_code() {
        let response = ApiError::RateLimited.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "rate_limit_exceeded");
        assert!(body["error"].get("fields").is_none());
    }

    #[tokio::test]
    async fn invalid_token_carries_challenge() {
        let response = ApiError::InvalidAuthenticationToken.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Bearer");
    }

    #[tokio::test]
    async fn bad_credentials_have_no_challenge() {
        let response = ApiError::InvalidCredentials.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().get(header::WWW_AUTHENTICATE).is_none());
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "invalid_credentials");
    }

    #[tokio::test]
    async fn validation_lists_fields() {
        let response = ApiError::validation("token", "must be provided").into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_json(response).await;
        assert_eq!(body["error"]["fields"]["token"], "must be provided");
    }

    #[tokio::test]
    async fn internal_hides_details() {
        let response = ApiError::internal("database password is hunter2").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert!(!body.to_string().contains("hunter2"));
    }
}
