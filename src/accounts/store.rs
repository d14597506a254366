//! Account persistence collaborator.
//!
//! The token core only knows subject ids; this store maps them to accounts
//! and checks login credentials. `MemoryAccountStore` lives in process and is
//! lost on restart.

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::credentials::types::unix_now;
use crate::credentials::SubjectId;

/// A registered user. Never carries password material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Account {
    pub id: SubjectId,
    pub created_at: u64,
    pub name: String,
    pub email: String,
    pub activated: bool,
}

#[derive(Debug, Clone, Error)]
pub enum AccountError {
    #[error("a user with this email address already exists")]
    DuplicateEmail,
    #[error("account store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Create an inactive account. Emails are unique, case-insensitively.
    async fn register(&self, name: &str, email: &str, password: &str)
        -> Result<Account, AccountError>;

    /// The account whose email and password both match.
    async fn verify_credentials(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<Account>, AccountError>;

    /// Mark `id` activated. `None` when no such account exists.
    async fn activate(&self, id: SubjectId) -> Result<Option<Account>, AccountError>;
}

/// In-process only: passwords are kept as salted SHA-256 digests, not a
/// memory-hard hash.
struct AccountRecord {
    account: Account,
    salt: [u8; 16],
    password_digest: [u8; 32],
}

#[derive(Default)]
pub struct MemoryAccountStore {
    by_email: DashMap<String, AccountRecord>,
    email_by_id: DashMap<SubjectId, String>,
    next_id: AtomicI64,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_email.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_email.is_empty()
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn password_digest(salt: &[u8; 16], password: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    hasher.finalize().into()
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (left, right) in a.iter().zip(b.iter()) {
        diff |= left ^ right;
    }
    diff == 0
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<Account, AccountError> {
        let key = normalize_email(email);
        let mut salt = [0u8; 16];
        OsRng
            .try_fill_bytes(&mut salt)
            .map_err(|e| AccountError::Unavailable(e.to_string()))?;

        match self.by_email.entry(key.clone()) {
            Entry::Occupied(_) => Err(AccountError::DuplicateEmail),
            Entry::Vacant(slot) => {
                let account = Account {
                    id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
                    created_at: unix_now(),
                    name: name.to_owned(),
                    email: key.clone(),
                    activated: false,
                };
                slot.insert(AccountRecord {
                    account: account.clone(),
                    salt,
                    password_digest: password_digest(&salt, password),
                });
                self.email_by_id.insert(account.id, key);
                Ok(account)
            }
        }
    }

    async fn verify_credentials(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<Account>, AccountError> {
        Ok(self
            .by_email
            .get(&normalize_email(email))
            .filter(|record| {
                constant_time_eq(
                    &password_digest(&record.salt, password),
                    &record.password_digest,
                )
            })
            .map(|record| record.account.clone()))
    }

    async fn activate(&self, id: SubjectId) -> Result<Option<Account>, AccountError> {
        let Some(email) = self.email_by_id.get(&id).map(|entry| entry.value().clone()) else {
            return Ok(None);
        };
        Ok(self.by_email.get_mut(&email).map(|mut record| {
            record.account.activated = true;
            record.account.clone()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn register_assigns_ids_and_rejects_duplicates() {
        let store = MemoryAccountStore::new();
        let alice = store.register("Alice", "alice@example.com", "pa55word").await.unwrap();
        let bob = store.register("Bob", "bob@example.com", "pa55word").await.unwrap();
        assert_ne!(alice.id, bob.id);
        assert!(!alice.activated);

        let err = store
            .register("Alice Again", "ALICE@example.com", "different")
            .await
            .unwrap_err();
        assert!(matches!(err, AccountError::DuplicateEmail));
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn credentials_must_match() {
        let store = MemoryAccountStore::new();
        let alice = store.register("Alice", "alice@example.com", "pa55word").await.unwrap();

        let found = store.verify_credentials("Alice@Example.com", "pa55word").await.unwrap();
        assert_eq!(found.map(|a| a.id), Some(alice.id));
        assert!(store.verify_credentials("alice@example.com", "wrong-pass").await.unwrap().is_none());
        assert!(store.verify_credentials("nobody@example.com", "pa55word").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn activate_marks_account() {
        let store = MemoryAccountStore::new();
        let alice = store.register("Alice", "alice@example.com", "pa55word").await.unwrap();

        let activated = store.activate(alice.id).await.unwrap().unwrap();
        assert!(activated.activated);
        assert!(store.activate(9_999).await.unwrap().is_none());
    }

    #[test]
    fn equal_salts_and_passwords_share_a_digest() {
        let salt = [3u8; 16];
        assert!(constant_time_eq(
            &password_digest(&salt, "secret-pass"),
            &password_digest(&salt, "secret-pass")
        ));
        assert!(!constant_time_eq(
            &password_digest(&salt, "secret-pass"),
            &password_digest(&[4u8; 16], "secret-pass")
        ));
    }
}
