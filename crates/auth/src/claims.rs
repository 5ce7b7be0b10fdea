use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use tenantguard_core::{TenantId, UserId};

/// The two bearer token kinds. They are never interchangeable.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }
}

impl core::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who a token is minted for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSubject {
    pub user_id: UserId,
    pub tenant_id: TenantId,
    pub scopes: Vec<String>,
}

impl TokenSubject {
    pub fn new(user_id: UserId, tenant_id: TenantId) -> Self {
        Self {
            user_id,
            tenant_id,
            scopes: Vec::new(),
        }
    }
}

/// Claims carried by every token (wire format).
///
/// Timestamps are Unix seconds so the payload stays a standard JWT.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject / user identifier.
    pub sub: UserId,

    /// Tenant the token was issued in.
    pub tenant_id: TenantId,

    /// Issued-at timestamp.
    pub iat: i64,

    /// Expiration timestamp.
    pub exp: i64,

    /// Unique token id; keeps two tokens minted in the same second distinct.
    pub jti: Uuid,

    #[serde(rename = "type")]
    pub kind: TokenKind,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scopes: Vec<String>,
}

impl TokenClaims {
    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.iat, 0)
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClaimsError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (issued_at is in the future)")]
    NotYetValid,

    #[error("invalid token time window (expires_at <= issued_at)")]
    InvalidTimeWindow,

    #[error("unexpected token type: expected {expected}, got {actual}")]
    WrongKind { expected: TokenKind, actual: TokenKind },
}

/// Deterministically validate the time window of decoded claims.
///
/// There is no grace period: a token is expired at `now >= exp`.
pub fn validate_claims(claims: &TokenClaims, now: DateTime<Utc>) -> Result<(), ClaimsError> {
    let now = now.timestamp();
    if claims.exp <= claims.iat {
        return Err(ClaimsError::InvalidTimeWindow);
    }
    if now < claims.iat {
        return Err(ClaimsError::NotYetValid);
    }
    if now >= claims.exp {
        return Err(ClaimsError::Expired);
    }
    Ok(())
}

/// Check that decoded claims are of the kind the caller asked for.
pub fn ensure_kind(claims: &TokenClaims, expected: TokenKind) -> Result<(), ClaimsError> {
    if claims.kind != expected {
        return Err(ClaimsError::WrongKind {
            expected,
            actual: claims.kind,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(iat: i64, exp: i64) -> TokenClaims {
        TokenClaims {
            sub: UserId::new(),
            tenant_id: TenantId::new(),
            iat,
            exp,
            jti: Uuid::now_v7(),
            kind: TokenKind::Access,
            scopes: Vec::new(),
        }
    }

    fn at(ts: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(ts, 0).unwrap()
    }

    #[test]
    fn valid_inside_window() {
        assert!(validate_claims(&claims(100, 200), at(150)).is_ok());
        assert!(validate_claims(&claims(100, 200), at(100)).is_ok());
    }

    #[test]
    fn expired_exactly_at_exp() {
        assert_eq!(
            validate_claims(&claims(100, 200), at(200)),
            Err(ClaimsError::Expired)
        );
    }

    #[test]
    fn future_issue_is_rejected() {
        assert_eq!(
            validate_claims(&claims(100, 200), at(99)),
            Err(ClaimsError::NotYetValid)
        );
    }

    #[test]
    fn inverted_window_is_rejected() {
        assert_eq!(
            validate_claims(&claims(200, 200), at(200)),
            Err(ClaimsError::InvalidTimeWindow)
        );
    }

    #[test]
    fn kind_is_serialized_as_type_field() {
        let json = serde_json::to_value(claims(1, 2)).unwrap();
        assert_eq!(json["type"], "access");
        assert!(json.get("scopes").is_none());
    }

    #[test]
    fn kind_mismatch_is_reported() {
        let c = claims(1, 2);
        assert!(ensure_kind(&c, TokenKind::Access).is_ok());
        assert!(matches!(
            ensure_kind(&c, TokenKind::Refresh),
            Err(ClaimsError::WrongKind { .. })
        ));
    }
}
