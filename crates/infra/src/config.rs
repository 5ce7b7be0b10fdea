//! Load [`AuthConfig`] from environment variables.
//!
//! | variable                           | default                 |
//! |------------------------------------|-------------------------|
//! | `JWT_SECRET`                       | insecure dev value      |
//! | `JWT_REFRESH_SECRET`               | insecure dev value      |
//! | `ACCESS_TOKEN_EXPIRE_MINUTES`      | 30                      |
//! | `REFRESH_TOKEN_EXPIRE_DAYS`        | 7                       |
//! | `BCRYPT_COST`                      | 12                      |
//! | `TOTP_ISSUER`                      | tenantguard             |
//! | `TWO_FACTOR_CHALLENGE_TTL_SECONDS` | 300                     |
//! | `LOGIN_ATTEMPTS_PER_MINUTE`        | 60                      |
//! | `TWO_FACTOR_MAX_ATTEMPTS`          | 5                       |
//! | `TWO_FACTOR_WINDOW_SECONDS`        | 300                     |
//! | `PASSWORD_MIN_LENGTH`              | 8                       |

use std::str::FromStr;

use anyhow::Context;
use thiserror::Error;

use tenantguard_auth::AuthConfig;

const DEV_ACCESS_SECRET: &str = "dev-access-secret";
const DEV_REFRESH_SECRET: &str = "dev-refresh-secret";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var}: cannot parse '{value}'")]
    Parse { var: &'static str, value: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

fn parse<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(var) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Parse { var, value }),
        None => Ok(default),
    }
}

fn secret(lookup: &impl Fn(&str) -> Option<String>, var: &'static str, dev_default: &str) -> String {
    match lookup(var).filter(|s| !s.is_empty()) {
        Some(secret) => secret,
        None => {
            tracing::warn!("{var} not set; using insecure dev default");
            dev_default.to_string()
        }
    }
}

/// Build the configuration from an arbitrary variable source.
pub fn load_auth_config_from(lookup: impl Fn(&str) -> Option<String>) -> Result<AuthConfig, ConfigError> {
    let defaults = AuthConfig::default();

    let access_minutes: u64 = parse(&lookup, "ACCESS_TOKEN_EXPIRE_MINUTES", defaults.access_token_lifetime_secs / 60)?;
    let refresh_days: u64 = parse(&lookup, "REFRESH_TOKEN_EXPIRE_DAYS", defaults.refresh_token_lifetime_secs / 86_400)?;

    let config = AuthConfig {
        access_token_secret: secret(&lookup, "JWT_SECRET", DEV_ACCESS_SECRET),
        refresh_token_secret: secret(&lookup, "JWT_REFRESH_SECRET", DEV_REFRESH_SECRET),
        access_token_lifetime_secs: access_minutes.saturating_mul(60),
        refresh_token_lifetime_secs: refresh_days.saturating_mul(86_400),
        bcrypt_cost: parse(&lookup, "BCRYPT_COST", defaults.bcrypt_cost)?,
        totp_issuer: lookup("TOTP_ISSUER").unwrap_or(defaults.totp_issuer),
        two_factor_challenge_lifetime_secs: parse(
            &lookup,
            "TWO_FACTOR_CHALLENGE_TTL_SECONDS",
            defaults.two_factor_challenge_lifetime_secs,
        )?,
        min_password_length: parse(&lookup, "PASSWORD_MIN_LENGTH", defaults.min_password_length)?,
        login_attempts_per_minute: parse(&lookup, "LOGIN_ATTEMPTS_PER_MINUTE", defaults.login_attempts_per_minute)?,
        two_factor_max_attempts: parse(&lookup, "TWO_FACTOR_MAX_ATTEMPTS", defaults.two_factor_max_attempts)?,
        two_factor_window_secs: parse(&lookup, "TWO_FACTOR_WINDOW_SECONDS", defaults.two_factor_window_secs)?,
    };

    config
        .validate()
        .map_err(|e| ConfigError::Invalid(e.to_string()))?;
    Ok(config)
}

/// Build the configuration from the process environment.
pub fn load_auth_config() -> anyhow::Result<AuthConfig> {
    load_auth_config_from(|var| std::env::var(var).ok()).context("loading auth configuration from environment")
}
