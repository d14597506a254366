//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the service.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Deployment environment (development, staging, production).
    pub environment: String,

    /// Per-client rate limiting.
    pub limiter: LimiterConfig,

    /// Shutdown behaviour.
    pub lifecycle: LifecycleConfig,

    /// Credential lifetimes and store timeouts.
    pub tokens: TokenConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listener: ListenerConfig::default(),
            environment: "development".to_string(),
            limiter: LimiterConfig::default(),
            lifecycle: LifecycleConfig::default(),
            tokens: TokenConfig::default(),
            timeouts: TimeoutConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:4000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:4000".to_string(),
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LimiterConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Tokens added to each client bucket per second.
    pub requests_per_second: f64,

    /// Burst capacity of each client bucket.
    pub burst: u32,

    /// Interval between idle-client sweeps in seconds.
    /// Clients unseen for three intervals are evicted.
    pub sweep_interval_secs: u64,

    /// Derive the client key from `X-Forwarded-For` / `X-Real-IP`.
    /// Only enable behind a proxy that overwrites these headers.
    pub trust_proxy_headers: bool,
}

impl LimiterConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_second: 2.0,
            burst: 4,
            sweep_interval_secs: 60,
            trust_proxy_headers: false,
        }
    }
}

/// Command-line limiter settings. They win over the file at startup and on
/// every reload.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LimiterOverrides {
    pub requests_per_second: Option<f64>,
    pub burst: Option<u32>,
    pub enabled: Option<bool>,
}

impl LimiterOverrides {
    pub fn apply(&self, limiter: &mut LimiterConfig) {
        if let Some(rps) = self.requests_per_second {
            limiter.requests_per_second = rps;
        }
        if let Some(burst) = self.burst {
            limiter.burst = burst;
        }
        if let Some(enabled) = self.enabled {
            limiter.enabled = enabled;
        }
    }
}

/// Shutdown configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Deadline for in-flight requests once draining starts, in seconds.
    pub shutdown_timeout_secs: u64,

    /// Optional deadline for background tasks after the listener stopped.
    /// Unset means wait for every task, however long it takes.
    pub task_drain_timeout_secs: Option<u64>,
}

impl LifecycleConfig {
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    pub fn task_drain_timeout(&self) -> Option<Duration> {
        self.task_drain_timeout_secs.map(Duration::from_secs)
    }
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            shutdown_timeout_secs: 20,
            task_drain_timeout_secs: None,
        }
    }
}

/// Credential configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TokenConfig {
    /// Lifetime of activation tokens in seconds.
    pub activation_ttl_secs: u64,

    /// Lifetime of authentication tokens in seconds.
    pub authentication_ttl_secs: u64,

    /// Upper bound for a single token store operation in seconds.
    pub store_timeout_secs: u64,
}

impl TokenConfig {
    pub fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.store_timeout_secs)
    }
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            activation_ttl_secs: 3 * 24 * 60 * 60,
            authentication_ttl_secs: 24 * 60 * 60,
            store_timeout_secs: 3,
        }
    }
}

/// Timeout configuration for request handling.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl TimeoutConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_secs)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format ("json" or "pretty").
    pub log_format: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
