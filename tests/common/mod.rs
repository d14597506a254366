//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{header, Method, Request},
    response::Response,
    Router,
};

use greenlight::accounts::{Account, MemoryAccountStore};
use greenlight::config::ServiceConfig;
use greenlight::credentials::{MemoryTokenStore, SubjectId, Token};
use greenlight::http::{build_router, AppState};
use greenlight::lifecycle::Service;
use greenlight::notification::{AccountEvent, Notifier, NotifyError};

/// Defaults with an ephemeral port and a limiter that never refills mid-test.
pub fn test_config() -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.limiter.requests_per_second = 0.001;
    config.limiter.burst = 4;
    config
}

pub fn app_state(config: ServiceConfig, notifier: Arc<dyn Notifier>) -> AppState {
    Service::with_parts(
        config,
        Arc::new(MemoryTokenStore::new()),
        Arc::new(MemoryAccountStore::new()),
        notifier,
    )
    .state()
    .clone()
}

pub fn router(state: AppState) -> Router {
    build_router(state, Duration::from_secs(30))
}

/// Build a request as if it arrived from `peer`.
pub fn request(
    method: Method,
    uri: &str,
    peer: SocketAddr,
    bearer: Option<&str>,
    json: Option<serde_json::Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let body = match json {
        Some(value) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };

    let mut request = builder.body(body).unwrap();
    request.extensions_mut().insert(ConnectInfo(peer));
    request
}

pub fn peer(last_octet: u8) -> SocketAddr {
    SocketAddr::from(([10, 0, 0, last_octet], 40000))
}

pub async fn read_json(response: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}

/// Notifier that records events and activation tokens, optionally taking
/// `delay` per delivery.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    delay: Duration,
    events: Mutex<Vec<(SubjectId, AccountEvent)>>,
    activations: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn events(&self) -> Vec<(SubjectId, AccountEvent)> {
        self.events.lock().expect("events mutex poisoned").clone()
    }

    /// Latest activation token delivered to `email`.
    pub fn activation_token(&self, email: &str) -> Option<String> {
        self.activations
            .lock()
            .expect("activations mutex poisoned")
            .iter()
            .rev()
            .find(|(to, _)| to == email)
            .map(|(_, token)| token.clone())
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, subject_id: SubjectId, event: AccountEvent) -> Result<(), NotifyError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.events
            .lock()
            .expect("events mutex poisoned")
            .push((subject_id, event));
        Ok(())
    }

    async fn send_activation(&self, account: &Account, token: &Token) -> Result<(), NotifyError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.activations
            .lock()
            .expect("activations mutex poisoned")
            .push((account.email.clone(), token.plaintext.clone()));
        Ok(())
    }
}
