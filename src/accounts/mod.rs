//! User accounts.
//!
//! Registration creates an inactive account and an activation token; login
//! trades a matching email and password for an authentication token. The
//! credential subsystem never sees passwords.

pub mod store;
pub mod validation;

pub use store::{Account, AccountError, AccountStore, MemoryAccountStore};
