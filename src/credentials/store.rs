//! Token persistence collaborator.
//!
//! The service only ever hands the store hashes, never plaintexts.
//! `MemoryTokenStore` keeps everything in process and is lost on restart.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;

use crate::credentials::types::{Scope, StoredToken, SubjectId, TokenHash};

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("token store operation timed out after {0:?}")]
    Timeout(Duration),
    #[error("token store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn insert_token(&self, token: &StoredToken) -> StoreResult<()>;

    /// Delete every token of `scope` owned by `subject_id`. Returns how many went.
    async fn delete_tokens(&self, scope: Scope, subject_id: SubjectId) -> StoreResult<u64>;

    /// Owner of the live token with this hash and scope, if any.
    async fn find_subject(
        &self,
        scope: Scope,
        hash: &TokenHash,
        now: u64,
    ) -> StoreResult<Option<SubjectId>>;
}

#[derive(Debug, Clone, Default)]
pub struct MemoryTokenStore {
    inner: Arc<DashMap<TokenHash, StoredToken>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn insert_token(&self, token: &StoredToken) -> StoreResult<()> {
        self.inner.insert(token.hash, *token);
        Ok(())
    }

    async fn delete_tokens(&self, scope: Scope, subject_id: SubjectId) -> StoreResult<u64> {
        let mut deleted = 0;
        self.inner.retain(|_, token| {
            let matches = token.scope == scope && token.subject_id == subject_id;
            if matches {
                deleted += 1;
            }
            !matches
        });
        Ok(deleted)
    }

    async fn find_subject(
        &self,
        scope: Scope,
        hash: &TokenHash,
        now: u64,
    ) -> StoreResult<Option<SubjectId>> {
        Ok(self
            .inner
            .get(hash)
            .filter(|entry| entry.scope == scope && entry.is_live_at(now))
            .map(|entry| entry.subject_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored(byte: u8, subject_id: SubjectId, scope: Scope, expires_at: u64) -> StoredToken {
        StoredToken {
            hash: TokenHash::from_bytes([byte; 32]),
            subject_id,
            expires_at,
            scope,
        }
    }

    #[tokio::test]
    async fn find_respects_scope_and_expiry() {
        let store = MemoryTokenStore::new();
        let token = stored(1, 9, Scope::Authentication, 100);
        store.insert_token(&token).await.unwrap();

        assert_eq!(
            store.find_subject(Scope::Authentication, &token.hash, 50).await.unwrap(),
            Some(9)
        );
        assert_eq!(
            store.find_subject(Scope::Activation, &token.hash, 50).await.unwrap(),
            None
        );
        assert_eq!(
            store.find_subject(Scope::Authentication, &token.hash, 100).await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn delete_removes_only_matching_scope_and_subject() {
        let store = MemoryTokenStore::new();
        store.insert_token(&stored(1, 9, Scope::Activation, 100)).await.unwrap();
        store.insert_token(&stored(2, 9, Scope::Activation, 100)).await.unwrap();
        store.insert_token(&stored(3, 9, Scope::Authentication, 100)).await.unwrap();
        store.insert_token(&stored(4, 10, Scope::Activation, 100)).await.unwrap();

        let deleted = store.delete_tokens(Scope::Activation, 9).await.unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(store.len(), 2);
    }
}
