//! Issue, persist, authenticate and revoke tokens.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time;

use crate::config::TokenConfig;
use crate::credentials::error::TokenError;
use crate::credentials::issuer::{hash_for_lookup, validate_plaintext_shape, CredentialIssuer};
use crate::credentials::store::{StoreError, StoreResult, TokenStore};
use crate::credentials::types::{unix_now, Scope, SubjectId, Token};
use crate::observability::metrics;

/// Issuer plus store, with every store call bounded by the configured timeout.
#[derive(Clone)]
pub struct TokenService {
    issuer: Arc<CredentialIssuer>,
    store: Arc<dyn TokenStore>,
    config: TokenConfig,
}

impl TokenService {
    pub fn new(store: Arc<dyn TokenStore>, config: TokenConfig) -> Self {
        Self::with_issuer(CredentialIssuer::new(), store, config)
    }

    pub fn with_issuer(
        issuer: CredentialIssuer,
        store: Arc<dyn TokenStore>,
        config: TokenConfig,
    ) -> Self {
        Self {
            issuer: Arc::new(issuer),
            store,
            config,
        }
    }

    /// Configured lifetime for tokens of `scope`.
    pub fn ttl(&self, scope: Scope) -> Duration {
        let secs = match scope {
            Scope::Activation => self.config.activation_ttl_secs,
            Scope::Authentication => self.config.authentication_ttl_secs,
        };
        Duration::from_secs(secs)
    }

    /// Issue a token and persist its hash.
    pub async fn new_token(
        &self,
        subject_id: SubjectId,
        ttl: Duration,
        scope: Scope,
    ) -> Result<Token, TokenError> {
        let token = self.issuer.issue(subject_id, ttl, scope)?;
        self.bounded(self.store.insert_token(&token.to_stored()))
            .await?;

        metrics::record_token_issued(scope.as_str());
        tracing::debug!(subject_id, scope = %scope, expires_at = token.expires_at, "Token issued");
        Ok(token)
    }

    /// Issue a token with the configured lifetime for its scope.
    pub async fn new_token_for(
        &self,
        subject_id: SubjectId,
        scope: Scope,
    ) -> Result<Token, TokenError> {
        self.new_token(subject_id, self.ttl(scope), scope).await
    }

    /// Delete every token of `scope` belonging to `subject_id`.
    pub async fn revoke_all(&self, scope: Scope, subject_id: SubjectId) -> Result<u64, TokenError> {
        let deleted = self
            .bounded(self.store.delete_tokens(scope, subject_id))
            .await?;
        tracing::info!(subject_id, scope = %scope, deleted, "Tokens revoked");
        Ok(deleted)
    }

    /// Resolve a presented plaintext to the subject owning it.
    pub async fn authenticate(&self, scope: Scope, plaintext: &str) -> Result<SubjectId, TokenError> {
        if let Err(shape) = validate_plaintext_shape(plaintext) {
            metrics::record_token_rejected("malformed");
            return Err(shape.into());
        }

        let hash = hash_for_lookup(plaintext);
        match self
            .bounded(self.store.find_subject(scope, &hash, unix_now()))
            .await?
        {
            Some(subject_id) => Ok(subject_id),
            None => {
                metrics::record_token_rejected("not_found");
                Err(TokenError::NotFound)
            }
        }
    }

    async fn bounded<T>(&self, op: impl Future<Output = StoreResult<T>>) -> StoreResult<T> {
        let limit = self.config.store_timeout();
        match time::timeout(limit, op).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(timeout = ?limit, "Token store operation timed out");
                Err(StoreError::Timeout(limit))
            }
        }
    }
}
