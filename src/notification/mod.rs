//! Account notifications.
//!
//! Handlers never deliver notifications inline; they submit them to the
//! background task registry so the response is not held up by delivery.

pub mod notifier;

pub use notifier::{AccountEvent, LogNotifier, Notifier, NotifyError};
