//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML) + CLI overrides
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ServiceConfig (validated, immutable)
//!     → passed by value to each component at construction
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → CLI limiter overrides re-applied
//!     → RateLimiter::configure with the new limiter settings
//!     → restart-only sections that changed are logged as ignored
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; only limiter settings hot reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigError};
pub use schema::{
    LifecycleConfig, LimiterConfig, LimiterOverrides, ListenerConfig, ObservabilityConfig,
    ServiceConfig, TimeoutConfig, TokenConfig,
};
