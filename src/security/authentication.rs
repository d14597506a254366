//! Bearer-token authentication.
//!
//! # Responsibilities
//! - Resolve `Authorization: Bearer <token>` to a subject
//! - Mark requests without the header as anonymous
//! - Reject malformed or unknown tokens with 401
//!
//! # Design Decisions
//! - The middleware only identifies; handlers decide whether anonymous is
//!   acceptable through [`AuthenticatedSubject`]
//! - Responses vary on `Authorization` so caches never mix identities

use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{header, request::Parts, HeaderValue, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::credentials::{Scope, SubjectId, TokenError, TokenService};
use crate::http::response::ApiError;
use crate::observability::metrics;

/// Who is making the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Principal {
    Anonymous,
    Subject(SubjectId),
}

/// Extract the token from an `Authorization` header value.
///
/// Accepts exactly `Bearer <token>`; anything else is malformed.
pub fn bearer_token(value: &HeaderValue) -> Option<&str> {
    let value = value.to_str().ok()?;
    let mut parts = value.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) => Some(token),
        _ => None,
    }
}

pub async fn authenticate_middleware(
    State(tokens): State<TokenService>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let principal = match request.headers().get(header::AUTHORIZATION) {
        None => Principal::Anonymous,
        Some(value) => {
            let Some(token) = bearer_token(value) else {
                metrics::record_token_rejected("malformed_header");
                return with_vary(ApiError::InvalidAuthenticationToken.into_response());
            };

            match tokens.authenticate(Scope::Authentication, token).await {
                Ok(subject_id) => Principal::Subject(subject_id),
                Err(TokenError::Malformed(_)) | Err(TokenError::NotFound) => {
                    return with_vary(ApiError::InvalidAuthenticationToken.into_response());
                }
                Err(e) => return with_vary(ApiError::internal(e).into_response()),
            }
        }
    };

    request.extensions_mut().insert(principal);
    with_vary(next.run(request).await)
}

fn with_vary(mut response: Response) -> Response {
    response
        .headers_mut()
        .append(header::VARY, HeaderValue::from_static("Authorization"));
    response
}

/// Extractor for handlers that refuse anonymous callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedSubject(pub SubjectId);

impl<S> FromRequestParts<S> for AuthenticatedSubject
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<Principal>() {
            Some(Principal::Subject(subject_id)) => Ok(AuthenticatedSubject(*subject_id)),
            _ => Err(ApiError::AuthenticationRequired),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::{http::StatusCode, middleware, routing::get, Router};
    use tower::ServiceExt;

    use crate::config::TokenConfig;
    use crate::credentials::MemoryTokenStore;

    fn app(tokens: TokenService) -> Router {
        Router::new()
            .route(
                "/whoami",
                get(|AuthenticatedSubject(id): AuthenticatedSubject| async move { id.to_string() }),
            )
            .route("/open", get(|| async { "ok" }))
            .layer(middleware::from_fn_with_state(tokens, authenticate_middleware))
    }

    fn service() -> TokenService {
        TokenService::new(Arc::new(MemoryTokenStore::new()), TokenConfig::default())
    }

    async fn call(app: Router, path: &str, auth: Option<&str>) -> Response {
        let mut builder = Request::builder().uri(path);
        if let Some(auth) = auth {
            builder = builder.header(header::AUTHORIZATION, auth);
        }
        app.oneshot(builder.body(Body::empty()).unwrap()).await.unwrap()
    }

    #[test]
    fn bearer_parsing() {
        let ok = HeaderValue::from_static("Bearer abc");
        assert_eq!(bearer_token(&ok), Some("abc"));

        for bad in ["abc", "Basic abc", "Bearer a b", "bearer abc"] {
            assert_eq!(bearer_token(&HeaderValue::from_static(bad)), None, "{bad}");
        }
    }

    #[tokio::test]
    async fn anonymous_passes_open_routes() {
        let response = call(app(service()), "/open", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::VARY], "Authorization");
    }

    #[tokio::test]
    async fn anonymous_rejected_where_identity_required() {
        let response = call(app(service()), "/whoami", None).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().get(header::WWW_AUTHENTICATE).is_none());
    }

    #[tokio::test]
    async fn malformed_header_is_invalid_token() {
        let response = call(app(service()), "/open", Some("Token abc")).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Bearer");
    }

    #[tokio::test]
    async fn unknown_token_is_invalid() {
        let bogus = format!("Bearer {}", "B".repeat(26));
        let response = call(app(service()), "/open", Some(&bogus)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn issued_token_resolves_subject() {
        let tokens = service();
        let token = tokens.new_token_for(42, Scope::Authentication).await.unwrap();
        let auth = format!("Bearer {}", token.plaintext);

        let response = call(app(tokens), "/whoami", Some(&auth)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"42");
    }

    #[tokio::test]
    async fn activation_token_is_not_a_session() {
        let tokens = service();
        let token = tokens.new_token_for(7, Scope::Activation).await.unwrap();
        let auth = format!("Bearer {}", token.plaintext);

        let response = call(app(tokens), "/whoami", Some(&auth)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
