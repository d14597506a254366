//! Per-client rate limiting (admission control).
//!
//! Every client key owns one token bucket. Buckets are created full on first
//! sight, refilled continuously at the configured rate up to `burst`, and
//! evicted by a periodic sweep once idle for three sweep intervals.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tokio::sync::broadcast;
use tokio::time::{self, Instant};

use crate::config::validation::MAX_SWEEP_INTERVAL_SECS;
use crate::config::LimiterConfig;
use crate::http::response::ApiError;
use crate::observability::metrics;

/// Idle buckets are evicted after this many sweep intervals.
const EVICTION_INTERVALS: u32 = 3;

/// Rate and burst shared by every bucket.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LimiterSettings {
    pub requests_per_second: f64,
    pub burst: u32,
    pub enabled: bool,
}

/// Token bucket state for a single client.
#[derive(Debug)]
struct ClientBucket {
    tokens: f64,
    last_refill_at: Instant,
    last_seen_at: Instant,
}

impl ClientBucket {
    fn full(burst: f64, now: Instant) -> Self {
        Self {
            tokens: burst,
            last_refill_at: now,
            last_seen_at: now,
        }
    }

    fn try_acquire(&mut self, now: Instant, refill_rate: f64, capacity: f64) -> bool {
        let elapsed = now.saturating_duration_since(self.last_refill_at).as_secs_f64();

        // Refill tokens
        self.tokens = (self.tokens + elapsed * refill_rate).min(capacity);
        self.last_refill_at = now;
        self.last_seen_at = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Admission controller keyed by client.
///
/// All bucket reads and writes, including the sweep, go through one mutex.
/// Settings sit behind an `ArcSwap` so the disabled path never locks.
pub struct RateLimiter {
    settings: ArcSwap<LimiterSettings>,
    buckets: Mutex<HashMap<String, ClientBucket>>,
    sweep_interval: Duration,
    trust_proxy_headers: bool,
}

impl RateLimiter {
    pub fn new(config: &LimiterConfig) -> Self {
        let limiter = Self {
            settings: ArcSwap::from_pointee(LimiterSettings {
                requests_per_second: config.requests_per_second,
                burst: config.burst,
                enabled: config.enabled,
            }),
            buckets: Mutex::new(HashMap::new()),
            sweep_interval: config
                .sweep_interval()
                .min(Duration::from_secs(MAX_SWEEP_INTERVAL_SECS)),
            trust_proxy_headers: config.trust_proxy_headers,
        };
        tracing::debug!(
            requests_per_second = config.requests_per_second,
            burst = config.burst,
            enabled = config.enabled,
            "Rate limiter configured"
        );
        limiter
    }

    /// Replace the shared rate, burst and enabled flag.
    ///
    /// Existing buckets adopt the new values on their next refill.
    pub fn configure(&self, requests_per_second: f64, burst: u32, enabled: bool) {
        let next = LimiterSettings {
            requests_per_second,
            burst,
            enabled,
        };
        let previous = self.settings.swap(Arc::new(next));
        if *previous != next {
            tracing::info!(
                requests_per_second,
                burst,
                enabled,
                "Rate limiter reconfigured"
            );
        }
    }

    pub fn settings(&self) -> LimiterSettings {
        **self.settings.load()
    }

    /// Decide whether `client_key` may proceed, consuming one token if so.
    pub fn admit(&self, client_key: &str) -> bool {
        let settings = self.settings.load();
        if !settings.enabled {
            return true;
        }

        let burst = f64::from(settings.burst);
        let now = Instant::now();

        let mut buckets = self.buckets.lock().expect("rate limiter mutex poisoned");
        let allowed = match buckets.get_mut(client_key) {
            Some(bucket) => bucket.try_acquire(now, settings.requests_per_second, burst),
            None => {
                let bucket = buckets
                    .entry(client_key.to_owned())
                    .or_insert_with(|| ClientBucket::full(burst, now));
                bucket.try_acquire(now, settings.requests_per_second, burst)
            }
        };
        drop(buckets);

        metrics::record_admission(allowed);
        allowed
    }

    /// Idle time after which a bucket is evicted.
    pub fn eviction_threshold(&self) -> Duration {
        self.sweep_interval
            .checked_mul(EVICTION_INTERVALS)
            .unwrap_or(Duration::MAX)
    }

    /// Remove buckets idle for longer than the eviction threshold.
    /// Returns the number of evicted clients.
    pub fn evict_idle(&self) -> usize {
        let threshold = self.eviction_threshold();
        let now = Instant::now();

        let mut buckets = self.buckets.lock().expect("rate limiter mutex poisoned");
        let before = buckets.len();
        buckets.retain(|_, bucket| now.saturating_duration_since(bucket.last_seen_at) <= threshold);
        let remaining = buckets.len();
        drop(buckets);

        metrics::record_tracked_clients(remaining);
        before - remaining
    }

    /// Number of tracked clients.
    pub fn len(&self) -> usize {
        self.buckets.lock().expect("rate limiter mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sweep idle clients every interval until shutdown.
    pub async fn run_sweeper(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            interval_secs = self.sweep_interval.as_secs(),
            eviction_secs = self.eviction_threshold().as_secs(),
            "Rate limiter sweeper starting"
        );

        let now = Instant::now();
        let first_sweep = now.checked_add(self.sweep_interval).unwrap_or(now);
        let mut ticker = time::interval_at(first_sweep, self.sweep_interval);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let evicted = self.evict_idle();
                    if evicted > 0 {
                        tracing::debug!(evicted, "Evicted idle rate limit clients");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Rate limiter sweeper received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Resolve the key used to bucket a request.
    pub fn client_key(&self, headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
        if self.trust_proxy_headers {
            if let Some(ip) = forwarded_ip(headers) {
                return ip;
            }
        }
        peer.map(|addr| addr.ip().to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }
}

fn forwarded_ip(headers: &HeaderMap) -> Option<String> {
    let forwarded_for = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    let real_ip = || {
        headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    forwarded_for.or_else(real_ip).map(str::to_owned)
}

/// Middleware rejecting requests from clients over their allowance.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let key = limiter.client_key(request.headers(), peer);

    if limiter.admit(&key) {
        next.run(request).await
    } else {
        tracing::warn!(client = %key, "Rate limit exceeded");
        ApiError::RateLimited.into_response()
    }
}
