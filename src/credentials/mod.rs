//! Credential subsystem.
//!
//! # Data Flow
//! ```text
//! Issuance:
//!     issuer.rs (16 CSPRNG bytes → base-32 plaintext → SHA-256 hash)
//!     → service.rs (persist hash via store.rs, bounded by timeout)
//!     → plaintext returned to the caller once
//!
//! Presentation:
//!     plaintext → shape check → hash → store lookup by (scope, hash, now)
//! ```
//!
//! # Design Decisions
//! - Plaintexts are never stored or compared, only their digests
//! - Scope restricts which flow may consume a token
//! - Revocation deletes every token of a scope for a subject

pub mod error;
pub mod issuer;
pub mod service;
pub mod store;
pub mod types;

pub use error::{ShapeError, TokenError};
pub use issuer::{hash_for_lookup, validate_plaintext_shape, CredentialIssuer};
pub use service::TokenService;
pub use store::{MemoryTokenStore, StoreError, TokenStore};
pub use types::{Scope, StoredToken, SubjectId, Token, TokenHash};
