//! Password hashing and verification (bcrypt).

use async_trait::async_trait;
use rand::RngCore;
use rand::rngs::OsRng;

use crate::config::MAX_PASSWORD_BYTES;
use crate::error::{AuthError, AuthResult};

/// One-way salted password hashing.
///
/// `verify` never fails: a malformed hash, a panicking worker, or any other
/// internal problem is reported as a mismatch.
#[async_trait]
pub trait PasswordHasher: Send + Sync {
    async fn hash(&self, plain: &str) -> AuthResult<String>;

    async fn verify(&self, plain: &str, hash: &str) -> bool;

    /// A valid hash of an unguessable password, verified against on lookup
    /// misses so every authentication attempt costs one verification.
    fn dummy_hash(&self) -> &str;
}

/// bcrypt-backed hasher. Hashing runs on the blocking thread pool.
#[derive(Debug, Clone)]
pub struct BcryptPasswordHasher {
    cost: u32,
    dummy_hash: String,
}

impl BcryptPasswordHasher {
    pub fn new(cost: u32) -> AuthResult<Self> {
        let mut seed = [0u8; 32];
        OsRng.fill_bytes(&mut seed);
        let dummy_hash = bcrypt::hash(hex::encode(seed), cost)
            .map_err(|e| AuthError::Crypto(format!("bcrypt: {e}")))?;
        Ok(Self { cost, dummy_hash })
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }
}

#[async_trait]
impl PasswordHasher for BcryptPasswordHasher {
    async fn hash(&self, plain: &str) -> AuthResult<String> {
        let plain = plain.to_owned();
        let cost = self.cost;

        tokio::task::spawn_blocking(move || bcrypt::hash(plain, cost))
            .await
            .map_err(|e| AuthError::Crypto(format!("hashing task failed: {e}")))?
            .map_err(|e| AuthError::Crypto(format!("bcrypt: {e}")))
    }

    async fn verify(&self, plain: &str, hash: &str) -> bool {
        let plain = plain.to_owned();
        let hash = hash.to_owned();

        match tokio::task::spawn_blocking(move || bcrypt::verify(plain, &hash)).await {
            Ok(Ok(matches)) => matches,
            Ok(Err(e)) => {
                tracing::debug!(error = %e, "password hash could not be verified");
                false
            }
            Err(e) => {
                tracing::warn!(error = %e, "password verification task failed");
                false
            }
        }
    }

    fn dummy_hash(&self) -> &str {
        &self.dummy_hash
    }
}

/// Enforce the password policy: minimum length and the bcrypt input limit.
pub fn validate_password_policy(password: &str, min_length: usize) -> AuthResult<()> {
    if password.chars().count() < min_length {
        return Err(AuthError::WeakPassword(format!(
            "must be at least {min_length} characters"
        )));
    }
    if password.len() > MAX_PASSWORD_BYTES {
        return Err(AuthError::WeakPassword(format!(
            "must be at most {MAX_PASSWORD_BYTES} bytes"
        )));
    }
    if password.trim().is_empty() {
        return Err(AuthError::WeakPassword("must not be blank".into()));
    }
    Ok(())
}
