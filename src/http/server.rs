//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with all handlers
//! - Wire up middleware (tracing, request id, timeout, admission, auth)
//! - Serve on a bound listener until the drain signal fires
//!
//! # Middleware order (outermost first)
//! ```text
//! request id → trace → catch panic → timeout → rate limit → authenticate → handler
//! ```
//!
//! A panicking handler becomes a 500 with `Connection: close`; the request
//! id is recorded on the trace span so every log line of a request carries it.

use std::any::Any;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{header, HeaderValue, Request},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Router,
};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::accounts::AccountStore;
use crate::credentials::TokenService;
use crate::http::handlers;
use crate::http::request::{MakeRequestUuidV4, X_REQUEST_ID};
use crate::http::response::ApiError;
use crate::lifecycle::tasks::panic_message;
use crate::lifecycle::BackgroundTasks;
use crate::notification::Notifier;
use crate::security::authentication::authenticate_middleware;
use crate::security::rate_limit::{rate_limit_middleware, RateLimiter};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub environment: String,
    pub limiter: Arc<RateLimiter>,
    pub tokens: TokenService,
    pub accounts: Arc<dyn AccountStore>,
    pub tasks: BackgroundTasks,
    pub notifier: Arc<dyn Notifier>,
}

pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(state: AppState, request_timeout: Duration) -> Self {
        Self {
            router: build_router(state, request_timeout),
        }
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve until `drain` resolves, then stop accepting and finish in-flight
    /// requests.
    pub async fn serve<F>(self, listener: TcpListener, drain: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(drain)
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Build the Axum router with all middleware layers.
pub fn build_router(state: AppState, request_timeout: Duration) -> Router {
    let routes = Router::new()
        .route("/v1/healthcheck", get(handlers::healthcheck))
        .route("/v1/users", post(handlers::register_user))
        .route("/v1/users/activated", put(handlers::activate_user))
        .route(
            "/v1/tokens/authentication",
            post(handlers::create_authentication_token)
                .delete(handlers::revoke_authentication_tokens),
        )
        .layer(middleware::from_fn_with_state(
            state.tokens.clone(),
            authenticate_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            state.limiter.clone(),
            rate_limit_middleware,
        ))
        .with_state(state);

    with_service_layers(routes, request_timeout)
}

/// Wrap `router` in the per-request service layers: request id, tracing,
/// panic recovery and the request deadline.
#[allow(deprecated)]
pub fn with_service_layers(router: Router, request_timeout: Duration) -> Router {
    router.layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV4))
            .layer(TraceLayer::new_for_http().make_span_with(request_span))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(CatchPanicLayer::custom(panic_response))
            .layer(TimeoutLayer::new(request_timeout)),
    )
}

fn request_span(request: &Request<Body>) -> tracing::Span {
    let request_id = request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http.request",
        method = %request.method(),
        uri = %request.uri(),
        request_id = %request_id
    )
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    tracing::error!(panic = %panic_message(&*panic), "Handler panicked");

    let mut response = ApiError::Server.into_response();
    response
        .headers_mut()
        .insert(header::CONNECTION, HeaderValue::from_static("close"));
    response
}
