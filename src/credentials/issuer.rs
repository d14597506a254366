//! Token generation and hashing.
//!
//! A token is 16 bytes from a CSPRNG, base-32 encoded without padding
//! (26 characters). Only its SHA-256 digest is ever persisted or compared.

use std::sync::Mutex;
use std::time::Duration;

use data_encoding::BASE32_NOPAD;
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use sha2::{Digest, Sha256};

use crate::credentials::error::{ShapeError, TokenError};
use crate::credentials::types::{
    unix_now, Scope, SubjectId, Token, TokenHash, ENTROPY_BYTES, PLAINTEXT_LEN,
};

/// Issues opaque bearer tokens. Holds no token state.
pub struct CredentialIssuer {
    rng: Mutex<Box<dyn RngCore + Send>>,
}

impl CredentialIssuer {
    /// Issuer backed by the operating system CSPRNG.
    pub fn new() -> Self {
        Self::with_rng(OsRng)
    }

    pub fn with_rng<R>(rng: R) -> Self
    where
        R: RngCore + CryptoRng + Send + 'static,
    {
        Self {
            rng: Mutex::new(Box::new(rng)),
        }
    }

    /// Generate a token for `subject_id` valid for `ttl`. Does not persist it.
    pub fn issue(
        &self,
        subject_id: SubjectId,
        ttl: Duration,
        scope: Scope,
    ) -> Result<Token, TokenError> {
        let mut entropy = [0u8; ENTROPY_BYTES];
        self.rng
            .lock()
            .expect("credential rng mutex poisoned")
            .try_fill_bytes(&mut entropy)
            .map_err(TokenError::RandomSource)?;

        let plaintext = BASE32_NOPAD.encode(&entropy);
        let hash = hash_for_lookup(&plaintext);

        Ok(Token {
            plaintext,
            hash,
            subject_id,
            expires_at: unix_now().saturating_add(ttl.as_secs()),
            scope,
        })
    }
}

impl Default for CredentialIssuer {
    fn default() -> Self {
        Self::new()
    }
}

/// Cheap pre-check on a presented plaintext before any lookup.
pub fn validate_plaintext_shape(candidate: &str) -> Result<(), ShapeError> {
    if candidate.is_empty() {
        return Err(ShapeError::Missing);
    }
    if candidate.chars().count() != PLAINTEXT_LEN {
        return Err(ShapeError::WrongLength);
    }
    Ok(())
}

/// Digest used both at issuance and whenever a token is presented.
pub fn hash_for_lookup(plaintext: &str) -> TokenHash {
    TokenHash::from_bytes(Sha256::digest(plaintext.as_bytes()).into())
}
