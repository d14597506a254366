//! Greenlight service core.
//!
//! Per-client admission control, opaque bearer credentials, a background task
//! registry and a signal-driven graceful shutdown, mounted on an Axum server.

pub mod accounts;
pub mod config;
pub mod credentials;
pub mod http;
pub mod lifecycle;
pub mod notification;
pub mod observability;
pub mod security;

pub use config::schema::ServiceConfig;
pub use http::HttpServer;
pub use lifecycle::{LifecycleState, Service, Shutdown};
