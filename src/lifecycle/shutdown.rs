//! Shutdown coordination for the service.
//!
//! ```text
//! Running ──signal──▶ Draining ──listener drained, tasks drained──▶ Stopped
//!                        │
//!                        └──stop error / deadline elapsed──▶ Failed
//! ```

use std::future::Future;
use std::io;
use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tokio::time;

use crate::config::LifecycleConfig;
use crate::lifecycle::tasks::BackgroundTasks;
use crate::observability::metrics;

/// Coordinator for graceful shutdown.
///
/// Provides a broadcast channel that all long-running tasks can subscribe to.
/// Subscribe before triggering; late subscribers miss the signal.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Trigger the shutdown signal. Repeated triggers are harmless.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Running,
    Draining,
    Stopped,
    Failed,
}

impl LifecycleState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, LifecycleState::Stopped | LifecycleState::Failed)
    }

    fn code(&self) -> u8 {
        match self {
            LifecycleState::Running => 0,
            LifecycleState::Draining => 1,
            LifecycleState::Stopped => 2,
            LifecycleState::Failed => 3,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("server exited before a termination signal: {0}")]
    Serve(#[source] io::Error),

    #[error("failed to stop accepting connections: {0}")]
    Stop(#[source] io::Error),

    #[error("in-flight requests did not finish within {0:?}")]
    ShutdownTimeout(Duration),

    #[error("background tasks did not finish within {0:?}")]
    TaskDrainTimeout(Duration),
}

/// Drives the process from serving to a terminal state.
pub struct Lifecycle {
    config: LifecycleConfig,
    tasks: BackgroundTasks,
    shutdown: Shutdown,
    state: watch::Sender<LifecycleState>,
}

impl Lifecycle {
    pub fn new(config: LifecycleConfig, tasks: BackgroundTasks) -> Self {
        let (state, _) = watch::channel(LifecycleState::Running);
        Self {
            config,
            tasks,
            shutdown: Shutdown::new(),
            state,
        }
    }

    /// Broadcast fired when draining starts. Long-running loops subscribe here.
    pub fn shutdown(&self) -> &Shutdown {
        &self.shutdown
    }

    /// Future resolving when draining starts; the server's graceful-shutdown trigger.
    pub fn drain_signal(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut rx = self.shutdown.subscribe();
        async move {
            let _ = rx.recv().await;
        }
    }

    pub fn state(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    /// Serve until `signal` resolves, then drain.
    ///
    /// Ordering: stop accepting and finish in-flight requests (bounded by the
    /// shutdown deadline), then wait for background tasks, then stop. The task
    /// wait is unbounded unless `task_drain_timeout_secs` is configured.
    pub async fn run<S, G>(self, serve: S, signal: G) -> Result<(), LifecycleError>
    where
        S: Future<Output = io::Result<()>>,
        G: Future<Output = &'static str>,
    {
        let Lifecycle {
            config,
            tasks,
            shutdown,
            state,
        } = self;

        set_state(&state, LifecycleState::Running);
        tokio::pin!(serve);

        let signal_name = tokio::select! {
            result = &mut serve => {
                let err = result.err().unwrap_or_else(|| {
                    io::Error::other("server stopped without being asked to")
                });
                return Err(fail(&state, LifecycleError::Serve(err)));
            }
            name = signal => name,
        };

        tracing::info!(signal = signal_name, "Caught signal");
        set_state(&state, LifecycleState::Draining);
        shutdown.trigger();

        let deadline = config.shutdown_timeout();
        match time::timeout(deadline, serve).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(fail(&state, LifecycleError::Stop(e))),
            Err(_) => return Err(fail(&state, LifecycleError::ShutdownTimeout(deadline))),
        }

        tracing::info!(pending = tasks.pending(), "Completing background tasks");
        match config.task_drain_timeout() {
            None => tasks.wait().await,
            Some(limit) => {
                if time::timeout(limit, tasks.wait()).await.is_err() {
                    return Err(fail(&state, LifecycleError::TaskDrainTimeout(limit)));
                }
            }
        }

        set_state(&state, LifecycleState::Stopped);
        tracing::info!("Stopped server");
        Ok(())
    }
}

fn set_state(state: &watch::Sender<LifecycleState>, next: LifecycleState) {
    state.send_replace(next);
    metrics::record_lifecycle_state(next.code());
    tracing::debug!(state = ?next, "Lifecycle transition");
}

fn fail(state: &watch::Sender<LifecycleState>, error: LifecycleError) -> LifecycleError {
    set_state(state, LifecycleState::Failed);
    tracing::error!(error = %error, "Shutdown failed");
    error
}
