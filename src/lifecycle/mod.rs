//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Validated config → build components → start sweeper/reload → serve
//!
//! Shutdown (shutdown.rs):
//!     Signal received → stop accepting → finish in-flight requests
//!         → wait for background tasks (tasks.rs) → Stopped
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered shutdown: stop accept, drain requests, drain tasks
//! - Request drain has a deadline; task drain does not unless configured

pub mod shutdown;
pub mod signals;
pub mod startup;
pub mod tasks;

pub use shutdown::{Lifecycle, LifecycleError, LifecycleState, Shutdown};
pub use startup::Service;
pub use tasks::BackgroundTasks;
