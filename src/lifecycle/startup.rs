//! Startup orchestration.
//!
//! # Responsibilities
//! - Build every component from a validated [`ServiceConfig`]
//! - Start the long-running loops (bucket sweeper, config reload)
//! - Serve on the bound listener and hand control to [`Lifecycle`]
//!
//! # Design Decisions
//! - Components are built in dependency order, not concurrently
//! - The listener is bound by the caller, so tests can pick port 0
//! - Every long-running loop subscribes to the shutdown broadcast

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::watch;

use crate::accounts::{AccountStore, MemoryAccountStore};
use crate::config::watcher::{ConfigWatcher, LimiterReload};
use crate::config::{LimiterOverrides, ServiceConfig};
use crate::credentials::{MemoryTokenStore, TokenService, TokenStore};
use crate::http::{AppState, HttpServer};
use crate::lifecycle::shutdown::{Lifecycle, LifecycleError, LifecycleState};
use crate::lifecycle::tasks::BackgroundTasks;
use crate::notification::{LogNotifier, Notifier};
use crate::security::rate_limit::RateLimiter;

/// A fully assembled service, ready to serve.
pub struct Service {
    config: ServiceConfig,
    state: AppState,
    lifecycle: Lifecycle,
    reload_from: Option<(PathBuf, LimiterOverrides)>,
}

impl Service {
    /// Assemble with the in-memory stores and the logging notifier.
    pub fn new(config: ServiceConfig) -> Self {
        Self::with_parts(
            config,
            Arc::new(MemoryTokenStore::new()),
            Arc::new(MemoryAccountStore::new()),
            Arc::new(LogNotifier),
        )
    }

    pub fn with_parts(
        config: ServiceConfig,
        store: Arc<dyn TokenStore>,
        accounts: Arc<dyn AccountStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let tasks = BackgroundTasks::new();
        let state = AppState {
            environment: config.environment.clone(),
            limiter: Arc::new(RateLimiter::new(&config.limiter)),
            tokens: TokenService::new(store, config.tokens.clone()),
            accounts,
            tasks: tasks.clone(),
            notifier,
        };
        let lifecycle = Lifecycle::new(config.lifecycle.clone(), tasks);

        Self {
            config,
            state,
            lifecycle,
            reload_from: None,
        }
    }

    /// Watch `path` and apply limiter changes while running. `overrides`
    /// are re-applied to every reloaded file.
    pub fn reload_from(mut self, path: impl Into<PathBuf>, overrides: LimiterOverrides) -> Self {
        self.reload_from = Some((path.into(), overrides));
        self
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn lifecycle_state(&self) -> watch::Receiver<LifecycleState> {
        self.lifecycle.state()
    }

    /// Serve on `listener` until `signal` resolves, then drain.
    pub async fn run<G>(self, listener: TcpListener, signal: G) -> Result<(), LifecycleError>
    where
        G: Future<Output = &'static str>,
    {
        let Service {
            config,
            state,
            lifecycle,
            reload_from,
        } = self;

        let shutdown = lifecycle.shutdown().clone();
        tokio::spawn(state.limiter.clone().run_sweeper(shutdown.subscribe()));

        // Held for the life of the server; dropping it stops the watch.
        let _watcher = reload_from.and_then(|(path, overrides)| {
            let (watcher, updates) = ConfigWatcher::new(&path);
            match watcher.run() {
                Ok(handle) => {
                    let reload =
                        LimiterReload::new(state.limiter.clone(), config.clone(), overrides);
                    tokio::spawn(reload.run(updates, shutdown.subscribe()));
                    Some(handle)
                }
                Err(e) => {
                    tracing::warn!(path = ?path, error = %e, "Config hot reload disabled");
                    None
                }
            }
        });

        tracing::info!(
            environment = %config.environment,
            rps = config.limiter.requests_per_second,
            burst = config.limiter.burst,
            limiter_enabled = config.limiter.enabled,
            "Starting server"
        );

        let server = HttpServer::new(state, config.timeouts.request_timeout());
        let serve = server.serve(listener, lifecycle.drain_signal());
        lifecycle.run(serve, signal).await
    }
}
