//! Bearer token issuance and verification (HS256 JWS), plus opaque
//! credential helpers.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::claims::{TokenClaims, TokenKind, TokenSubject, ensure_kind, validate_claims};
use crate::config::AuthConfig;
use crate::error::{AuthError, AuthResult};

/// Whether `decode` enforces `exp`.
///
/// Skipping is reserved for flows that only need to *identify* a token, such
/// as revoking an already-expired refresh token on logout.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExpiryCheck {
    Enforce,
    Skip,
}

/// A freshly signed token together with the claims it carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub token: String,
    pub claims: TokenClaims,
}

/// Signs and verifies bearer tokens.
///
/// Every verification failure surfaces as the single opaque
/// [`AuthError::InvalidToken`]; callers cannot tell a bad signature from an
/// expired token or a token of the wrong kind.
pub trait TokenCodec: Send + Sync {
    fn issue(
        &self,
        kind: TokenKind,
        subject: &TokenSubject,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> AuthResult<IssuedToken>;

    fn decode_with(
        &self,
        token: &str,
        expected: TokenKind,
        expiry: ExpiryCheck,
        now: DateTime<Utc>,
    ) -> AuthResult<TokenClaims>;

    fn issue_access(
        &self,
        subject: &TokenSubject,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> AuthResult<IssuedToken> {
        self.issue(TokenKind::Access, subject, ttl, now)
    }

    fn issue_refresh(
        &self,
        subject: &TokenSubject,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> AuthResult<IssuedToken> {
        self.issue(TokenKind::Refresh, subject, ttl, now)
    }

    fn decode(&self, token: &str, expected: TokenKind, now: DateTime<Utc>) -> AuthResult<TokenClaims> {
        self.decode_with(token, expected, ExpiryCheck::Enforce, now)
    }
}

struct KeyPair {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl KeyPair {
    fn from_secret(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }
}

/// HMAC-SHA256 codec with one key per token kind.
pub struct Hs256TokenCodec {
    access: KeyPair,
    refresh: KeyPair,
}

impl core::fmt::Debug for Hs256TokenCodec {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Hs256TokenCodec").finish_non_exhaustive()
    }
}

impl Hs256TokenCodec {
    pub fn new(access_secret: &[u8], refresh_secret: &[u8]) -> AuthResult<Self> {
        if access_secret.is_empty() || refresh_secret.is_empty() {
            return Err(AuthError::Config("token secrets must not be empty".into()));
        }
        if access_secret == refresh_secret {
            return Err(AuthError::Config(
                "access and refresh token secrets must differ".into(),
            ));
        }
        Ok(Self {
            access: KeyPair::from_secret(access_secret),
            refresh: KeyPair::from_secret(refresh_secret),
        })
    }

    pub fn from_config(config: &AuthConfig) -> AuthResult<Self> {
        Self::new(
            config.access_token_secret.as_bytes(),
            config.refresh_token_secret.as_bytes(),
        )
    }

    fn keys(&self, kind: TokenKind) -> &KeyPair {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }
}

fn rejected(expected: TokenKind, reason: impl core::fmt::Display) -> AuthError {
    tracing::debug!(expected = %expected, %reason, "token rejected");
    AuthError::InvalidToken
}

impl TokenCodec for Hs256TokenCodec {
    fn issue(
        &self,
        kind: TokenKind,
        subject: &TokenSubject,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> AuthResult<IssuedToken> {
        if ttl <= Duration::zero() {
            return Err(AuthError::Config("token ttl must be positive".into()));
        }

        let iat = now.timestamp();
        let exp = iat
            .checked_add(ttl.num_seconds().max(1))
            .ok_or_else(|| AuthError::Config("token expiry out of range".into()))?;
        let claims = TokenClaims {
            sub: subject.user_id,
            tenant_id: subject.tenant_id,
            iat,
            exp,
            jti: Uuid::now_v7(),
            kind,
            scopes: subject.scopes.clone(),
        };

        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &self.keys(kind).encoding,
        )
        .map_err(|e| AuthError::Crypto(format!("JWT encode: {e}")))?;

        Ok(IssuedToken { token, claims })
    }

    fn decode_with(
        &self,
        token: &str,
        expected: TokenKind,
        expiry: ExpiryCheck,
        now: DateTime<Utc>,
    ) -> AuthResult<TokenClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked below against the caller's clock, with no leeway.
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "iat", "sub"]);

        let claims = jsonwebtoken::decode::<TokenClaims>(token, &self.keys(expected).decoding, &validation)
            .map_err(|e| rejected(expected, e))?
            .claims;

        ensure_kind(&claims, expected).map_err(|e| rejected(expected, e))?;

        match expiry {
            ExpiryCheck::Enforce => validate_claims(&claims, now).map_err(|e| rejected(expected, e))?,
            ExpiryCheck::Skip if claims.exp <= claims.iat => {
                return Err(rejected(expected, "inverted time window"));
            }
            ExpiryCheck::Skip => {}
        }

        Ok(claims)
    }
}

/// Generate a cryptographically random opaque credential
/// (32 bytes, base64url without padding).
pub fn generate_opaque_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// SHA-256 fingerprint of a raw credential, hex-encoded.
///
/// This is the only form in which refresh tokens and 2FA tickets are stored.
pub fn fingerprint(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tenantguard_core::{TenantId, UserId};

    fn codec() -> Hs256TokenCodec {
        Hs256TokenCodec::new(b"access-secret-for-tests", b"refresh-secret-for-tests").unwrap()
    }

    fn subject() -> TokenSubject {
        TokenSubject::new(UserId::new(), TenantId::new())
    }

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn access_roundtrip_preserves_claims() {
        let codec = codec();
        let mut subject = subject();
        subject.scopes = vec!["read_user".into()];

        let issued = codec.issue_access(&subject, Duration::minutes(30), t0()).unwrap();
        let claims = codec
            .decode(&issued.token, TokenKind::Access, t0() + Duration::minutes(29))
            .unwrap();

        assert_eq!(claims, issued.claims);
        assert_eq!(claims.sub, subject.user_id);
        assert_eq!(claims.tenant_id, subject.tenant_id);
        assert_eq!(claims.scopes, subject.scopes);
        assert_eq!(claims.exp - claims.iat, 30 * 60);
    }

    #[test]
    fn expired_once_ttl_elapses() {
        let codec = codec();
        let issued = codec.issue_access(&subject(), Duration::seconds(60), t0()).unwrap();

        assert!(codec.decode(&issued.token, TokenKind::Access, t0() + Duration::seconds(59)).is_ok());
        assert_eq!(
            codec.decode(&issued.token, TokenKind::Access, t0() + Duration::seconds(60)),
            Err(AuthError::InvalidToken)
        );
    }

    #[test]
    fn skip_expiry_still_verifies_signature_and_kind() {
        let codec = codec();
        let issued = codec.issue_refresh(&subject(), Duration::seconds(1), t0()).unwrap();
        let later = t0() + Duration::days(30);

        assert!(
            codec
                .decode_with(&issued.token, TokenKind::Refresh, ExpiryCheck::Skip, later)
                .is_ok()
        );
        assert!(
            codec
                .decode_with(&issued.token, TokenKind::Access, ExpiryCheck::Skip, later)
                .is_err()
        );
    }

    #[test]
    fn tampered_token_is_rejected() {
        let codec = codec();
        let issued = codec.issue_access(&subject(), Duration::minutes(5), t0()).unwrap();

        let mut parts: Vec<String> = issued.token.split('.').map(str::to_owned).collect();
        let forged = TokenClaims {
            tenant_id: TenantId::new(),
            ..issued.claims.clone()
        };
        parts[1] = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&forged).unwrap());
        let tampered = parts.join(".");

        assert_eq!(
            codec.decode(&tampered, TokenKind::Access, t0()),
            Err(AuthError::InvalidToken)
        );
    }

    #[test]
    fn token_from_another_key_is_rejected() {
        let ours = codec();
        let theirs = Hs256TokenCodec::new(b"someone-else-access", b"someone-else-refresh").unwrap();
        let issued = theirs.issue_access(&subject(), Duration::minutes(5), t0()).unwrap();

        assert_eq!(
            ours.decode(&issued.token, TokenKind::Access, t0()),
            Err(AuthError::InvalidToken)
        );
    }

    #[test]
    fn garbage_is_rejected_without_panicking() {
        let codec = codec();
        for junk in ["", "abc", "a.b.c", "....", "eyJhbGciOiJIUzI1NiJ9.e30."] {
            assert_eq!(
                codec.decode(junk, TokenKind::Access, t0()),
                Err(AuthError::InvalidToken)
            );
        }
    }

    #[test]
    fn tokens_minted_in_the_same_second_differ() {
        let codec = codec();
        let subject = subject();
        let a = codec.issue_refresh(&subject, Duration::days(7), t0()).unwrap();
        let b = codec.issue_refresh(&subject, Duration::days(7), t0()).unwrap();
        assert_ne!(a.token, b.token);
        assert_ne!(fingerprint(&a.token), fingerprint(&b.token));
    }

    #[test]
    fn shared_or_empty_secrets_are_refused() {
        assert!(Hs256TokenCodec::new(b"same", b"same").is_err());
        assert!(Hs256TokenCodec::new(b"", b"refresh").is_err());
    }

    #[test]
    fn non_positive_ttl_is_refused() {
        let codec = codec();
        assert!(codec.issue_access(&subject(), Duration::zero(), t0()).is_err());
    }

    #[test]
    fn opaque_tokens_are_url_safe() {
        let token = generate_opaque_token();
        assert!(
            token
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
        // 32 bytes -> 43 base64url chars.
        assert_eq!(token.len(), 43);
        assert_ne!(token, generate_opaque_token());
    }

    #[test]
    fn fingerprint_is_deterministic_hex() {
        let a = fingerprint("some-token");
        assert_eq!(a, fingerprint("some-token"));
        assert_eq!(a.len(), 64);
        assert_ne!(a, fingerprint("other-token"));
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 64,
            ..ProptestConfig::default()
        })]

        /// Property: access and refresh tokens are never accepted as each other.
        #[test]
        fn kinds_are_never_interchangeable(
            user in any::<u128>(),
            tenant in any::<u128>(),
            ttl_secs in 1i64..=86_400,
            elapsed in 0i64..86_400,
        ) {
            let codec = codec();
            let subject = TokenSubject::new(
                UserId::from_uuid(Uuid::from_u128(user)),
                TenantId::from_uuid(Uuid::from_u128(tenant)),
            );
            let ttl = Duration::seconds(ttl_secs);
            let now = t0() + Duration::seconds(elapsed.min(ttl_secs - 1));

            let access = codec.issue_access(&subject, ttl, t0()).unwrap();
            let refresh = codec.issue_refresh(&subject, ttl, t0()).unwrap();

            prop_assert!(codec.decode(&access.token, TokenKind::Access, now).is_ok());
            prop_assert!(codec.decode(&refresh.token, TokenKind::Refresh, now).is_ok());
            prop_assert_eq!(
                codec.decode(&access.token, TokenKind::Refresh, now),
                Err(AuthError::InvalidToken)
            );
            prop_assert_eq!(
                codec.decode(&refresh.token, TokenKind::Access, now),
                Err(AuthError::InvalidToken)
            );
        }

        /// Property: decode returns the issued claims while inside the ttl and
        /// rejects them from `iat + ttl` on.
        #[test]
        fn decode_respects_ttl(ttl_secs in 1i64..=604_800, offset in 0i64..1_209_600) {
            let codec = codec();
            let issued = codec
                .issue_access(&subject(), Duration::seconds(ttl_secs), t0())
                .unwrap();
            let result = codec.decode(&issued.token, TokenKind::Access, t0() + Duration::seconds(offset));

            if offset < ttl_secs {
                prop_assert_eq!(result, Ok(issued.claims));
            } else {
                prop_assert_eq!(result, Err(AuthError::InvalidToken));
            }
        }
    }
}
