//! Time-based one-time passwords (RFC 6238: SHA-1, 6 digits, 30 s step).

use chrono::{DateTime, Utc};
use rand::RngCore;
use rand::rngs::OsRng;
use totp_rs::{Algorithm, Secret, TOTP};

use crate::error::{AuthError, AuthResult};

const DIGITS: usize = 6;
const STEP_SECS: u64 = 30;
const SECRET_BYTES: usize = 20;

/// Generates TOTP secrets, provisioning URIs, and checks codes.
///
/// A code is accepted for the current step and one step either side.
#[derive(Debug, Clone, Copy)]
pub struct TotpProvider {
    skew: u8,
}

impl Default for TotpProvider {
    fn default() -> Self {
        Self { skew: 1 }
    }
}

impl TotpProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh base32 secret (160 bits of entropy).
    pub fn generate_secret(&self) -> String {
        let mut bytes = vec![0u8; SECRET_BYTES];
        OsRng.fill_bytes(&mut bytes);
        Secret::Raw(bytes).to_encoded().to_string()
    }

    /// `otpauth://totp/...` URI for enrolling `secret` in an authenticator app.
    pub fn provisioning_uri(&self, secret: &str, label: &str, issuer: &str) -> AuthResult<String> {
        let totp = self
            .build(secret, Some(issuer.to_owned()), label.to_owned())
            .map_err(AuthError::Crypto)?;
        Ok(totp.get_url())
    }

    /// Whether `code` is valid for `secret` at `at`.
    ///
    /// Malformed secrets and codes are a plain `false`.
    pub fn verify(&self, secret: &str, code: &str, at: DateTime<Utc>) -> bool {
        if code.len() != DIGITS || !code.bytes().all(|b| b.is_ascii_digit()) {
            return false;
        }
        let Ok(time) = u64::try_from(at.timestamp()) else {
            return false;
        };
        // The skewed lookback would start before the epoch.
        if time < STEP_SECS {
            return false;
        }
        match self.build(secret, None, String::new()) {
            Ok(totp) => totp.check(code, time),
            Err(reason) => {
                tracing::debug!(%reason, "stored TOTP secret is unusable");
                false
            }
        }
    }

    /// Current code for `secret`. Used by enrollment tooling and tests.
    pub fn generate_code(&self, secret: &str, at: DateTime<Utc>) -> AuthResult<String> {
        let time = u64::try_from(at.timestamp())
            .map_err(|_| AuthError::Crypto("time before unix epoch".into()))?;
        let totp = self
            .build(secret, None, String::new())
            .map_err(AuthError::Crypto)?;
        Ok(totp.generate(time))
    }

    fn build(&self, secret: &str, issuer: Option<String>, label: String) -> Result<TOTP, String> {
        let bytes = Secret::Encoded(secret.trim().to_uppercase())
            .to_bytes()
            .map_err(|e| format!("invalid TOTP secret: {e:?}"))?;
        TOTP::new(Algorithm::SHA1, DIGITS, self.skew, STEP_SECS, bytes, issuer, label)
            .map_err(|e| format!("invalid TOTP parameters: {e}"))
    }
}
