//! Credential types.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Identifier of the principal a token belongs to.
pub type SubjectId = i64;

/// Length of an encoded token plaintext.
pub const PLAINTEXT_LEN: usize = 26;

/// Random bytes drawn per token.
pub const ENTROPY_BYTES: usize = 16;

/// The flow a token may be consumed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Activation,
    Authentication,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Activation => "activation",
            Scope::Authentication => "authentication",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// SHA-256 digest of a token plaintext. The only form ever stored or compared.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TokenHash([u8; 32]);

impl TokenHash {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for TokenHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TokenHash(")?;
        for byte in &self.0[..4] {
            write!(f, "{byte:02x}")?;
        }
        f.write_str("..)")
    }
}

/// A freshly issued token.
///
/// Serializes to `{"token": .., "expiry": ..}`; the plaintext leaves the
/// process exactly once, in the response that delivers it.
#[derive(Clone, Serialize)]
pub struct Token {
    #[serde(rename = "token")]
    pub plaintext: String,
    #[serde(skip)]
    pub hash: TokenHash,
    #[serde(skip)]
    pub subject_id: SubjectId,
    /// Unix seconds.
    #[serde(rename = "expiry")]
    pub expires_at: u64,
    #[serde(skip)]
    pub scope: Scope,
}

impl Token {
    /// The persisted form, without the plaintext.
    pub fn to_stored(&self) -> StoredToken {
        StoredToken {
            hash: self.hash,
            subject_id: self.subject_id,
            expires_at: self.expires_at,
            scope: self.scope,
        }
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("plaintext", &"<redacted>")
            .field("hash", &self.hash)
            .field("subject_id", &self.subject_id)
            .field("expires_at", &self.expires_at)
            .field("scope", &self.scope)
            .finish()
    }
}

/// What the token store keeps for each token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoredToken {
    pub hash: TokenHash,
    pub subject_id: SubjectId,
    pub expires_at: u64,
    pub scope: Scope,
}

impl StoredToken {
    pub fn is_live_at(&self, now: u64) -> bool {
        self.expires_at > now
    }
}

/// Current wall-clock time in unix seconds.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
