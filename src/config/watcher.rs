//! Configuration file watcher for hot reload.
//!
//! Only the limiter's rate, burst and switch are applied live, with the
//! command-line overrides re-applied on top. Changes to any other section
//! need a restart and are logged as ignored.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{broadcast, mpsc};

use crate::config::loader::load_config;
use crate::config::schema::{LimiterOverrides, ServiceConfig};
use crate::config::validation::validate_config;
use crate::security::rate_limit::RateLimiter;

/// A watcher that monitors the configuration file for changes.
pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<ServiceConfig>,
}

impl ConfigWatcher {
    /// Returns the watcher and a receiver for validated configuration updates.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<ServiceConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        (
            Self {
                path: path.to_path_buf(),
                update_tx,
            },
            update_rx,
        )
    }

    /// Start watching. Dropping the returned handle stops the watch.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.update_tx;
        let path = self.path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if event.kind.is_modify() || event.kind.is_create() => {
                    tracing::info!(path = ?path, "Config file change detected, reloading");
                    match load_config(&path) {
                        Ok(config) => {
                            let _ = tx.send(config);
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "Failed to reload config, keeping current settings");
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = ?e, "Watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Config watcher started");
        Ok(watcher)
    }
}

/// Sections of `next` that differ from `current` but only take effect on
/// restart.
pub fn restart_only_changes(current: &ServiceConfig, next: &ServiceConfig) -> Vec<&'static str> {
    let mut changed = Vec::new();
    if current.listener != next.listener {
        changed.push("listener");
    }
    if current.environment != next.environment {
        changed.push("environment");
    }
    if current.limiter.sweep_interval_secs != next.limiter.sweep_interval_secs {
        changed.push("limiter.sweep_interval_secs");
    }
    if current.limiter.trust_proxy_headers != next.limiter.trust_proxy_headers {
        changed.push("limiter.trust_proxy_headers");
    }
    if current.lifecycle != next.lifecycle {
        changed.push("lifecycle");
    }
    if current.tokens != next.tokens {
        changed.push("tokens");
    }
    if current.timeouts != next.timeouts {
        changed.push("timeouts");
    }
    if current.observability != next.observability {
        changed.push("observability");
    }
    changed
}

/// Applies reloaded configuration to a running limiter.
pub struct LimiterReload {
    limiter: Arc<RateLimiter>,
    running: ServiceConfig,
    overrides: LimiterOverrides,
}

impl LimiterReload {
    /// `running` is the configuration the service started with, overrides
    /// included.
    pub fn new(
        limiter: Arc<RateLimiter>,
        running: ServiceConfig,
        overrides: LimiterOverrides,
    ) -> Self {
        Self {
            limiter,
            running,
            overrides,
        }
    }

    /// Apply one reloaded file. Returns the restart-only sections that were
    /// ignored.
    pub fn apply(&mut self, mut next: ServiceConfig) -> Vec<&'static str> {
        self.overrides.apply(&mut next.limiter);
        if let Err(errors) = validate_config(&next) {
            for error in &errors {
                tracing::error!(
                    field = error.field,
                    error = %error.message,
                    "Reloaded config invalid with overrides, keeping current settings"
                );
            }
            return Vec::new();
        }

        let ignored = restart_only_changes(&self.running, &next);
        for section in &ignored {
            tracing::warn!(section, "Config change needs a restart, ignored");
        }

        let limits = &next.limiter;
        self.limiter
            .configure(limits.requests_per_second, limits.burst, limits.enabled);
        tracing::info!(
            rps = limits.requests_per_second,
            burst = limits.burst,
            enabled = limits.enabled,
            "Limiter settings reloaded"
        );

        self.running.limiter.requests_per_second = limits.requests_per_second;
        self.running.limiter.burst = limits.burst;
        self.running.limiter.enabled = limits.enabled;
        ignored
    }

    /// Apply updates until the channel closes or shutdown fires.
    pub async fn run(
        mut self,
        mut updates: mpsc::UnboundedReceiver<ServiceConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        loop {
            tokio::select! {
                update = updates.recv() => {
                    let Some(config) = update else { return };
                    self.apply(config);
                }
                _ = shutdown.recv() => {
                    tracing::debug!("Config reload loop stopping");
                    return;
                }
            }
        }
    }
}
