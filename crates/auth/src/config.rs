//! Authentication configuration.

use chrono::Duration;

use crate::error::AuthError;

/// Configuration for the authentication service.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// HMAC secret for access tokens.
    pub access_token_secret: String,
    /// HMAC secret for refresh tokens. Must differ from the access secret.
    pub refresh_token_secret: String,
    /// Access token lifetime in seconds (default: 1800 = 30 minutes).
    pub access_token_lifetime_secs: u64,
    /// Refresh token lifetime in seconds (default: 604_800 = 7 days).
    pub refresh_token_lifetime_secs: u64,
    /// bcrypt cost factor (default: 12).
    pub bcrypt_cost: u32,
    /// Issuer name shown in authenticator apps.
    pub totp_issuer: String,
    /// Lifetime of the pre-auth ticket handed out with `Requires2FA`.
    pub two_factor_challenge_lifetime_secs: u64,
    /// Minimum password length for policy enforcement.
    pub min_password_length: usize,
    /// Login attempts allowed per identifier per minute.
    pub login_attempts_per_minute: u32,
    /// Failed 2FA attempts allowed per user within `two_factor_window_secs`.
    pub two_factor_max_attempts: u32,
    pub two_factor_window_secs: u64,
}

/// bcrypt only looks at the first 72 bytes of its input.
pub const MAX_PASSWORD_BYTES: usize = 72;

/// Upper bound for every `*_secs` setting (ten years).
pub const MAX_LIFETIME_SECS: u64 = 10 * 365 * 86_400;

fn bounded_seconds(secs: u64) -> Duration {
    Duration::seconds(secs.min(MAX_LIFETIME_SECS) as i64)
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            access_token_secret: String::new(),
            refresh_token_secret: String::new(),
            access_token_lifetime_secs: 1800,
            refresh_token_lifetime_secs: 604_800,
            bcrypt_cost: bcrypt::DEFAULT_COST,
            totp_issuer: "tenantguard".into(),
            two_factor_challenge_lifetime_secs: 300,
            min_password_length: 8,
            login_attempts_per_minute: 60,
            two_factor_max_attempts: 5,
            two_factor_window_secs: 300,
        }
    }
}

impl AuthConfig {
    /// Check the invariants the rest of the crate relies on.
    pub fn validate(&self) -> Result<(), AuthError> {
        if self.access_token_secret.is_empty() || self.refresh_token_secret.is_empty() {
            return Err(AuthError::Config("token secrets must not be empty".into()));
        }
        if self.access_token_secret == self.refresh_token_secret {
            return Err(AuthError::Config(
                "access and refresh token secrets must differ".into(),
            ));
        }
        if self.access_token_lifetime_secs == 0 || self.refresh_token_lifetime_secs == 0 {
            return Err(AuthError::Config("token lifetimes must be positive".into()));
        }
        for (name, secs) in [
            ("access token lifetime", self.access_token_lifetime_secs),
            ("refresh token lifetime", self.refresh_token_lifetime_secs),
            ("2FA challenge lifetime", self.two_factor_challenge_lifetime_secs),
            ("2FA rate limit window", self.two_factor_window_secs),
        ] {
            if secs > MAX_LIFETIME_SECS {
                return Err(AuthError::Config(format!(
                    "{name} of {secs}s exceeds {MAX_LIFETIME_SECS}s"
                )));
            }
        }
        if !(4..=31).contains(&self.bcrypt_cost) {
            return Err(AuthError::Config(format!(
                "bcrypt cost {} out of range 4..=31",
                self.bcrypt_cost
            )));
        }
        if self.two_factor_challenge_lifetime_secs == 0 {
            return Err(AuthError::Config("2FA challenge lifetime must be positive".into()));
        }
        if self.login_attempts_per_minute == 0
            || self.two_factor_max_attempts == 0
            || self.two_factor_window_secs == 0
        {
            return Err(AuthError::Config("rate limit budgets must be positive".into()));
        }
        if self.min_password_length > MAX_PASSWORD_BYTES {
            return Err(AuthError::Config(format!(
                "minimum password length cannot exceed {MAX_PASSWORD_BYTES}"
            )));
        }
        Ok(())
    }

    pub fn access_token_ttl(&self) -> Duration {
        bounded_seconds(self.access_token_lifetime_secs)
    }

    pub fn refresh_token_ttl(&self) -> Duration {
        bounded_seconds(self.refresh_token_lifetime_secs)
    }

    pub fn challenge_ttl(&self) -> Duration {
        bounded_seconds(self.two_factor_challenge_lifetime_secs)
    }

    pub fn two_factor_window(&self) -> Duration {
        bounded_seconds(self.two_factor_window_secs)
    }
}
