use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::accounts::Account;
use crate::credentials::{SubjectId, Token};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountEvent {
    Registered,
    Activated,
    SessionsRevoked,
}

impl AccountEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Registered => "account.registered",
            Self::Activated => "account.activated",
            Self::SessionsRevoked => "account.sessions_revoked",
        }
    }
}

#[derive(Debug, Error)]
#[error("notification delivery failed: {0}")]
pub struct NotifyError(pub String);

/// Delivery channel for account notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, subject_id: SubjectId, event: AccountEvent) -> Result<(), NotifyError>;

    /// Deliver the activation token to a newly registered account.
    async fn send_activation(&self, account: &Account, token: &Token) -> Result<(), NotifyError>;
}

/// Records notifications in the log instead of delivering them.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, subject_id: SubjectId, event: AccountEvent) -> Result<(), NotifyError> {
        tracing::info!(subject_id, event = event.as_str(), "Account notification");
        Ok(())
    }

    /// Development stand-in for mail: the token lands in the log.
    async fn send_activation(&self, account: &Account, token: &Token) -> Result<(), NotifyError> {
        tracing::info!(
            subject_id = account.id,
            email = %account.email,
            activation_token = %token.plaintext,
            expiry = token.expires_at,
            "Activation token issued"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn log_notifier_always_succeeds() {
        let notifier = LogNotifier;
        assert!(notifier.notify(1, AccountEvent::Activated).await.is_ok());
        assert_eq!(AccountEvent::SessionsRevoked.as_str(), "account.sessions_revoked");
    }

    #[tokio::test]
    async fn log_notifier_delivers_activation() {
        use crate::credentials::{CredentialIssuer, Scope};
        use std::time::Duration;

        let account = Account {
            id: 5,
            created_at: 0,
            name: "Alice".into(),
            email: "alice@example.com".into(),
            activated: false,
        };
        let token = CredentialIssuer::new()
            .issue(account.id, Duration::from_secs(60), Scope::Activation)
            .unwrap();
        assert!(LogNotifier.send_activation(&account, &token).await.is_ok());
    }
}
