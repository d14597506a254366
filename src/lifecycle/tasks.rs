//! Background task registry.
//!
//! Handlers hand fire-and-forget work (notifications, audit writes) to
//! [`BackgroundTasks::run`]. Shutdown calls [`BackgroundTasks::wait`] once the
//! listener has stopped, so no accepted work is cut off mid-flight.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures_util::FutureExt;
use tokio::sync::Notify;

use crate::observability::metrics;

#[derive(Debug, Default)]
struct Inner {
    pending: AtomicUsize,
    idle: Notify,
}

/// Counts in-flight background tasks and lets shutdown wait for them.
#[derive(Debug, Clone, Default)]
pub struct BackgroundTasks {
    inner: Arc<Inner>,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `task` on the runtime and count it until it finishes.
    ///
    /// A panic inside `task` is caught and logged; it never reaches the caller
    /// or the process.
    pub fn run<F>(&self, name: &'static str, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let guard = PendingGuard::enter(Arc::clone(&self.inner));

        tokio::spawn(async move {
            let _guard = guard;
            if let Err(panic) = AssertUnwindSafe(task).catch_unwind().await {
                metrics::record_background_panic(name);
                tracing::error!(
                    task = name,
                    panic = %panic_message(panic.as_ref()),
                    "Background task panicked"
                );
            }
        });
    }

    /// Number of tasks submitted and not yet finished.
    pub fn pending(&self) -> usize {
        self.inner.pending.load(Ordering::SeqCst)
    }

    /// Resolve once no tasks are pending. Not deadline-bounded.
    pub async fn wait(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            // Register before checking the count so a concurrent decrement
            // cannot slip between the check and the await.
            notified.as_mut().enable();

            if self.pending() == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Decrements the pending count exactly once, on drop.
struct PendingGuard {
    inner: Arc<Inner>,
}

impl PendingGuard {
    fn enter(inner: Arc<Inner>) -> Self {
        let pending = inner.pending.fetch_add(1, Ordering::SeqCst) + 1;
        metrics::record_background_pending(pending);
        Self { inner }
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        let previous = self.inner.pending.fetch_sub(1, Ordering::SeqCst);
        metrics::record_background_pending(previous - 1);
        if previous == 1 {
            self.inner.idle.notify_waiters();
        }
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}
