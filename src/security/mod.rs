//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → rate_limit.rs (per-client token bucket, 429 when empty)
//!     → authentication.rs (bearer token → principal)
//!     → handler
//! ```
//!
//! # Design Decisions
//! - Admission runs before authentication so rejected clients cost no store lookup
//! - Fail closed: an unreadable credential is a 401, never anonymous

pub mod authentication;
pub mod rate_limit;

pub use authentication::{authenticate_middleware, AuthenticatedSubject, Principal};
pub use rate_limit::{rate_limit_middleware, LimiterSettings, RateLimiter};
