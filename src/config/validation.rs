//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (rates > 0, timeouts > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServiceConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::ServiceConfig;

const ENVIRONMENTS: [&str; 3] = ["development", "staging", "production"];
const LOG_FORMATS: [&str; 2] = ["json", "pretty"];
/// Longest accepted bucket sweep interval (one day).
pub const MAX_SWEEP_INTERVAL_SECS: u64 = 86_400;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Check every semantic rule and collect all violations.
pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    if !ENVIRONMENTS.contains(&config.environment.as_str()) {
        errors.push(ValidationError::new(
            "environment",
            format!("must be one of {}", ENVIRONMENTS.join(", ")),
        ));
    }

    let limiter = &config.limiter;
    if limiter.enabled {
        if !limiter.requests_per_second.is_finite() || limiter.requests_per_second <= 0.0 {
            errors.push(ValidationError::new(
                "limiter.requests_per_second",
                "must be a positive number",
            ));
        }
        if limiter.burst == 0 {
            errors.push(ValidationError::new("limiter.burst", "must be at least 1"));
        }
    }
    if limiter.sweep_interval_secs == 0 {
        errors.push(ValidationError::new(
            "limiter.sweep_interval_secs",
            "must be greater than zero",
        ));
    } else if limiter.sweep_interval_secs > MAX_SWEEP_INTERVAL_SECS {
        errors.push(ValidationError::new(
            "limiter.sweep_interval_secs",
            format!("must be at most {MAX_SWEEP_INTERVAL_SECS}"),
        ));
    }

    if config.lifecycle.shutdown_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "lifecycle.shutdown_timeout_secs",
            "must be greater than zero",
        ));
    }
    if config.lifecycle.task_drain_timeout_secs == Some(0) {
        errors.push(ValidationError::new(
            "lifecycle.task_drain_timeout_secs",
            "must be greater than zero when set",
        ));
    }

    let tokens = &config.tokens;
    if tokens.activation_ttl_secs == 0 {
        errors.push(ValidationError::new(
            "tokens.activation_ttl_secs",
            "must be greater than zero",
        ));
    }
    if tokens.authentication_ttl_secs == 0 {
        errors.push(ValidationError::new(
            "tokens.authentication_ttl_secs",
            "must be greater than zero",
        ));
    }
    if tokens.store_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "tokens.store_timeout_secs",
            "must be greater than zero",
        ));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new(
            "timeouts.request_secs",
            "must be greater than zero",
        ));
    }

    let observability = &config.observability;
    if !LOG_FORMATS.contains(&observability.log_format.as_str()) {
        errors.push(ValidationError::new(
            "observability.log_format",
            format!("must be one of {}", LOG_FORMATS.join(", ")),
        ));
    }
    if observability.metrics_enabled
        && observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
