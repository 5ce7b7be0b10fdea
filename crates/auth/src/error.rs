//! Authentication and authorization error taxonomy.

use thiserror::Error;

use tenantguard_core::DomainError;

use crate::repository::RepositoryError;

pub type AuthResult<T> = Result<T, AuthError>;

/// Every failure an auth operation can end with.
///
/// All variants are terminal for the calling request. None of the messages
/// carry sensitive detail; `InactiveAccount` exists for internal logging only
/// and is folded into `InvalidCredentials` by [`AuthError::public`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("account is inactive")]
    InactiveAccount,

    #[error("invalid authentication code")]
    InvalidCode,

    #[error("too many attempts")]
    TooManyAttempts,

    #[error("invalid token")]
    InvalidToken,

    #[error("invalid refresh token")]
    InvalidRefreshToken,

    #[error("tenant id is required")]
    MissingTenant,

    #[error("invalid tenant id")]
    InvalidTenant,

    #[error("not enough permissions")]
    Forbidden,

    #[error("identity already exists")]
    IdentityExists,

    #[error("identity not found")]
    IdentityNotFound,

    #[error("password does not meet policy: {0}")]
    WeakPassword(String),

    #[error("two-factor authentication is already enabled")]
    TwoFactorAlreadyEnabled,

    #[error("two-factor authentication has not been set up")]
    TwoFactorNotEnrolled,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("cryptography error: {0}")]
    Crypto(String),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl AuthError {
    /// Fold internal distinctions into the value that may leave the service.
    pub fn public(self) -> Self {
        match self {
            AuthError::InactiveAccount => AuthError::InvalidCredentials,
            other => other,
        }
    }

    /// Stable machine-readable code for the boundary layer.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials | AuthError::InactiveAccount => "invalid_credentials",
            AuthError::InvalidCode => "invalid_code",
            AuthError::TooManyAttempts => "too_many_attempts",
            AuthError::InvalidToken => "invalid_token",
            AuthError::InvalidRefreshToken => "invalid_refresh_token",
            AuthError::MissingTenant => "missing_tenant",
            AuthError::InvalidTenant => "invalid_tenant",
            AuthError::Forbidden => "forbidden",
            AuthError::IdentityExists => "identity_exists",
            AuthError::IdentityNotFound => "identity_not_found",
            AuthError::WeakPassword(_) => "weak_password",
            AuthError::TwoFactorAlreadyEnabled => "two_factor_already_enabled",
            AuthError::TwoFactorNotEnrolled => "two_factor_not_enrolled",
            AuthError::Domain(_) => "invalid_request",
            AuthError::Config(_) | AuthError::Crypto(_) | AuthError::Repository(_) => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inactive_account_is_folded_at_the_boundary() {
        assert_eq!(AuthError::InactiveAccount.public(), AuthError::InvalidCredentials);
        assert_eq!(AuthError::InvalidCode.public(), AuthError::InvalidCode);
    }

    #[test]
    fn credential_failures_share_one_message_and_code() {
        let a = AuthError::InvalidCredentials;
        let b = AuthError::InactiveAccount.public();
        assert_eq!(a.to_string(), b.to_string());
        assert_eq!(a.code(), AuthError::InactiveAccount.code());
    }

    #[test]
    fn internal_failures_hide_their_detail_in_the_code() {
        let err = AuthError::Repository(RepositoryError::Unavailable("db down".into()));
        assert_eq!(err.code(), "internal");
    }
}
