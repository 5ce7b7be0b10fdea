//! Authentication flows: credential check, 2FA gate, token issuance and
//! refresh rotation, plus account self-service (registration, password
//! change, TOTP enrollment).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;

use tenantguard_core::{RecordId, TenantId, UserId};

use crate::audit::{AuditAction, AuditEvent, AuditSink};
use crate::claims::{TokenKind, TokenSubject};
use crate::clock::Clock;
use crate::config::AuthConfig;
use crate::error::{AuthError, AuthResult};
use crate::identity::Identity;
use crate::password::{BcryptPasswordHasher, PasswordHasher, validate_password_policy};
use crate::principal::Principal;
use crate::rate_limit::{RateLimitDecision, RateLimitKey, RateLimiter};
use crate::repository::{
    ChallengeRepository, IdentityRepository, RefreshTokenRecord, RefreshTokenRepository,
    RepositoryError, TwoFactorChallenge,
};
use crate::tenant::TenantContext;
use crate::token::{
    ExpiryCheck, Hs256TokenCodec, IssuedToken, TokenCodec, fingerprint, generate_opaque_token,
};
use crate::totp::TotpProvider;

// ─────────────────────────────────────────────────────────────────────────────
// Outcomes
// ─────────────────────────────────────────────────────────────────────────────

/// Access + refresh token pair. Never issued half.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// Access token lifetime in seconds.
    pub expires_in: u64,
}

impl TokenPair {
    fn bearer(access: IssuedToken, refresh: IssuedToken, expires_in: u64) -> Self {
        Self {
            access_token: access.token,
            refresh_token: refresh.token,
            token_type: "bearer".into(),
            expires_in,
        }
    }
}

/// Single-use continuation handed out when the password was right but a
/// second factor is still required.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TwoFactorTicket {
    pub ticket: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    Authenticated(TokenPair),
    TwoFactorRequired(TwoFactorTicket),
}

/// Input for self-registration.
#[derive(Debug, Clone)]
pub struct Registration {
    pub tenant_id: TenantId,
    pub username: String,
    pub email: String,
    pub password: String,
    pub is_superuser: bool,
}

/// Pending TOTP secret plus the URI an authenticator app can scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TotpEnrollment {
    pub secret: String,
    pub provisioning_uri: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Service
// ─────────────────────────────────────────────────────────────────────────────

/// Everything the service talks to.
#[derive(Clone)]
pub struct AuthCollaborators {
    pub identities: Arc<dyn IdentityRepository>,
    pub refresh_tokens: Arc<dyn RefreshTokenRepository>,
    pub challenges: Arc<dyn ChallengeRepository>,
    pub rate_limiter: Arc<dyn RateLimiter>,
    pub audit: Arc<dyn AuditSink>,
    pub clock: Arc<dyn Clock>,
}

/// The authentication state machine.
///
/// `UNAUTHENTICATED -> CREDENTIALS_VERIFIED -> (AWAITING_2FA) -> AUTHENTICATED`
///
/// Every error is terminal for the request; no flow ever hands out one token
/// without the other.
pub struct AuthenticationService {
    config: AuthConfig,
    hasher: Arc<dyn PasswordHasher>,
    tokens: Arc<dyn TokenCodec>,
    totp: TotpProvider,
    identities: Arc<dyn IdentityRepository>,
    refresh_tokens: Arc<dyn RefreshTokenRepository>,
    challenges: Arc<dyn ChallengeRepository>,
    rate_limiter: Arc<dyn RateLimiter>,
    audit: Arc<dyn AuditSink>,
    clock: Arc<dyn Clock>,
}

impl AuthenticationService {
    /// Build the service with the bcrypt hasher and HS256 codec.
    pub fn new(config: AuthConfig, collaborators: AuthCollaborators) -> AuthResult<Self> {
        config.validate()?;
        let hasher = Arc::new(BcryptPasswordHasher::new(config.bcrypt_cost)?);
        let tokens = Arc::new(Hs256TokenCodec::from_config(&config)?);
        Ok(Self::with_components(config, hasher, tokens, collaborators))
    }

    /// Build the service around an explicit hasher and codec.
    pub fn with_components(
        config: AuthConfig,
        hasher: Arc<dyn PasswordHasher>,
        tokens: Arc<dyn TokenCodec>,
        collaborators: AuthCollaborators,
    ) -> Self {
        let AuthCollaborators {
            identities,
            refresh_tokens,
            challenges,
            rate_limiter,
            audit,
            clock,
        } = collaborators;

        Self {
            config,
            hasher,
            tokens,
            totp: TotpProvider::new(),
            identities,
            refresh_tokens,
            challenges,
            rate_limiter,
            audit,
            clock,
        }
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub fn token_codec(&self) -> Arc<dyn TokenCodec> {
        Arc::clone(&self.tokens)
    }

    // ── credentials ─────────────────────────────────────────────────────────

    /// Check `identifier`/`password` in `tenant_id`.
    ///
    /// Unknown identifier, wrong tenant, wrong password, inactive or deleted
    /// account, and lookup failures all end in the same `InvalidCredentials`,
    /// and each path performs exactly one hash verification.
    pub async fn authenticate(&self, identifier: &str, password: &str, tenant_id: TenantId) -> AuthResult<Identity> {
        self.ensure_ambient_tenant(tenant_id)?;
        self.check_credentials(identifier, password, tenant_id)
            .await
            .map_err(AuthError::public)
    }

    async fn check_credentials(&self, identifier: &str, password: &str, tenant_id: TenantId) -> AuthResult<Identity> {
        let found = match self
            .identities
            .find_by_identifier_in_tenant(identifier, tenant_id)
            .await
        {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(tenant_id = %tenant_id, error = %e, "identity lookup failed");
                None
            }
        };

        let Some(identity) = found else {
            let _ = self.hasher.verify(password, self.hasher.dummy_hash()).await;
            tracing::debug!(tenant_id = %tenant_id, reason = "unknown identifier", "credentials rejected");
            return Err(AuthError::InvalidCredentials);
        };

        let password_ok = self.hasher.verify(password, &identity.password_hash).await;

        if identity.tenant_id != tenant_id {
            tracing::debug!(tenant_id = %tenant_id, reason = "tenant mismatch", "credentials rejected");
            return Err(AuthError::InvalidCredentials);
        }
        if !password_ok {
            tracing::debug!(tenant_id = %tenant_id, user_id = %identity.id, reason = "wrong password", "credentials rejected");
            return Err(AuthError::InvalidCredentials);
        }
        if !identity.can_authenticate() {
            tracing::debug!(tenant_id = %tenant_id, user_id = %identity.id, reason = "inactive", "credentials rejected");
            return Err(AuthError::InactiveAccount);
        }

        Ok(identity)
    }

    /// Password login. Returns tokens, or a 2FA ticket when TOTP is enabled.
    pub async fn login(&self, identifier: &str, password: &str, tenant_id: TenantId) -> AuthResult<LoginOutcome> {
        self.ensure_ambient_tenant(tenant_id)?;

        let key = RateLimitKey::login(tenant_id, identifier);
        if self.rate_limiter.check(&key).await == RateLimitDecision::Limited {
            tracing::info!(tenant_id = %tenant_id, "login rate limited");
            return Err(AuthError::TooManyAttempts);
        }

        let identity = self.authenticate(identifier, password, tenant_id).await?;
        self.rate_limiter.reset(&key).await;

        if identity.active_totp_secret().is_some() {
            let ticket = self.open_challenge(&identity).await?;
            self.record(AuditAction::TwoFactorRequired, &identity, serde_json::Value::Null)
                .await;
            tracing::info!(tenant_id = %tenant_id, user_id = %identity.id, "password accepted, awaiting second factor");
            return Ok(LoginOutcome::TwoFactorRequired(ticket));
        }

        let pair = self.issue_pair(&identity).await?;
        self.record(AuditAction::Login, &identity, json!({ "two_factor": false }))
            .await;
        tracing::info!(tenant_id = %tenant_id, user_id = %identity.id, "login succeeded");
        Ok(LoginOutcome::Authenticated(pair))
    }

    /// Complete a login that stopped at the 2FA step.
    ///
    /// The ticket is consumed only when the code is right, so a typo does not
    /// force the user back to the password step.
    pub async fn verify_two_factor(
        &self,
        ticket: &str,
        identifier: &str,
        tenant_id: TenantId,
        code: &str,
    ) -> AuthResult<TokenPair> {
        self.ensure_ambient_tenant(tenant_id)?;
        let now = self.clock.now();

        let challenge = self
            .challenges
            .find_valid(&fingerprint(ticket), now)
            .await?
            .filter(|c| c.tenant_id == tenant_id)
            .ok_or_else(|| {
                tracing::debug!(tenant_id = %tenant_id, reason = "unknown or expired ticket", "2FA rejected");
                AuthError::InvalidCode
            })?;

        let identity = self
            .identities
            .find_by_id(challenge.user_id)
            .await?
            .filter(|i| i.tenant_id == tenant_id && i.can_authenticate() && i.matches_identifier(identifier))
            .ok_or_else(|| {
                tracing::debug!(tenant_id = %tenant_id, reason = "ticket/identity mismatch", "2FA rejected");
                AuthError::InvalidCode
            })?;

        self.check_second_factor(&identity, code, now).await?;

        if !self.challenges.consume(challenge.id).await? {
            tracing::debug!(user_id = %identity.id, reason = "ticket already consumed", "2FA rejected");
            return Err(AuthError::InvalidCode);
        }

        let pair = self.issue_pair(&identity).await?;
        self.record(AuditAction::TwoFactorVerified, &identity, serde_json::Value::Null)
            .await;
        tracing::info!(tenant_id = %tenant_id, user_id = %identity.id, "login succeeded");
        Ok(pair)
    }

    // ── refresh tokens ──────────────────────────────────────────────────────

    /// Exchange a refresh token for a new pair. The presented token is revoked.
    ///
    /// Of any number of concurrent callers presenting the same token, exactly
    /// one succeeds.
    pub async fn refresh(&self, refresh_token: &str) -> AuthResult<TokenPair> {
        let now = self.clock.now();
        let claims = self
            .tokens
            .decode(refresh_token, TokenKind::Refresh, now)
            .map_err(|_| AuthError::InvalidRefreshToken)?;
        self.ensure_ambient_tenant(claims.tenant_id)?;

        let record = self
            .refresh_tokens
            .find_valid(&fingerprint(refresh_token), now)
            .await?
            .filter(|r| r.user_id == claims.sub && r.tenant_id == claims.tenant_id)
            .ok_or_else(|| {
                tracing::debug!(user_id = %claims.sub, reason = "no usable record", "refresh rejected");
                AuthError::InvalidRefreshToken
            })?;

        let identity = self
            .identities
            .find_by_id(claims.sub)
            .await?
            .filter(|i| i.tenant_id == claims.tenant_id && i.can_authenticate())
            .ok_or_else(|| {
                tracing::debug!(user_id = %claims.sub, reason = "identity unusable", "refresh rejected");
                AuthError::InvalidRefreshToken
            })?;

        let (pair, replacement) = self.mint_pair(&identity, now)?;
        if !self.refresh_tokens.rotate(record.id, replacement).await? {
            tracing::debug!(user_id = %identity.id, reason = "lost rotation race", "refresh rejected");
            return Err(AuthError::InvalidRefreshToken);
        }

        self.record(AuditAction::Refresh, &identity, serde_json::Value::Null)
            .await;
        tracing::info!(tenant_id = %identity.tenant_id, user_id = %identity.id, "refresh token rotated");
        Ok(pair)
    }

    /// Revoke every refresh token of `user_id`. Idempotent.
    ///
    /// Inside a tenant scope only that tenant's users can be signed out.
    pub async fn logout(&self, user_id: UserId) -> AuthResult<()> {
        let identity = self.identities.find_by_id(user_id).await?;
        if let Some(identity) = &identity {
            self.ensure_ambient_tenant(identity.tenant_id)?;
        }

        let revoked = self.refresh_tokens.revoke_all_for_user(user_id).await?;

        let tenant_id = identity
            .map(|i| i.tenant_id)
            .or_else(TenantContext::current);
        if let Some(tenant_id) = tenant_id {
            let event = AuditEvent::new(AuditAction::Logout, user_id, tenant_id, self.clock.now())
                .with_metadata(json!({ "revoked": revoked }));
            self.emit(event).await;
        }

        tracing::info!(user_id = %user_id, revoked, "logged out");
        Ok(())
    }

    /// Revoke the single refresh token presented (one-device logout).
    ///
    /// Expired tokens are accepted: only the signature and kind are checked.
    pub async fn revoke_refresh_token(&self, refresh_token: &str) -> AuthResult<()> {
        let now = self.clock.now();
        let claims = self
            .tokens
            .decode_with(refresh_token, TokenKind::Refresh, ExpiryCheck::Skip, now)
            .map_err(|_| AuthError::InvalidRefreshToken)?;
        self.ensure_ambient_tenant(claims.tenant_id)?;

        let revoked = self
            .refresh_tokens
            .revoke_by_fingerprint(&fingerprint(refresh_token))
            .await?;

        let event = AuditEvent::new(AuditAction::Logout, claims.sub, claims.tenant_id, now)
            .with_metadata(json!({ "scope": "single", "revoked": usize::from(revoked) }));
        self.emit(event).await;
        Ok(())
    }

    /// Resolve a bearer access token to the principal behind it.
    ///
    /// The token's tenant must match the ambient tenant, except for
    /// superusers, who may act in any tenant.
    pub async fn authenticate_access_token(&self, access_token: &str) -> AuthResult<Principal> {
        let now = self.clock.now();
        let claims = self.tokens.decode(access_token, TokenKind::Access, now)?;

        let identity = TenantContext::unrestricted(self.identities.find_by_id(claims.sub))
            .await?
            .filter(|i| i.tenant_id == claims.tenant_id && i.can_authenticate())
            .ok_or_else(|| {
                tracing::debug!(user_id = %claims.sub, reason = "identity unusable", "access token rejected");
                AuthError::InvalidToken
            })?;

        if identity.is_superuser {
            if let Some(ambient) = TenantContext::current().filter(|t| *t != claims.tenant_id) {
                tracing::info!(user_id = %identity.id, home = %claims.tenant_id, tenant = %ambient, "superuser acting outside home tenant");
            }
        } else {
            self.ensure_ambient_tenant(claims.tenant_id)?;
        }

        Ok(Principal::new(identity, claims))
    }

    // ── account self-service ────────────────────────────────────────────────

    pub async fn register(&self, registration: Registration) -> AuthResult<Identity> {
        let Registration {
            tenant_id,
            username,
            email,
            password,
            is_superuser,
        } = registration;
        self.ensure_ambient_tenant(tenant_id)?;
        validate_password_policy(&password, self.config.min_password_length)?;

        for identifier in [username.as_str(), email.as_str()] {
            if self
                .identities
                .find_by_identifier_in_tenant(identifier, tenant_id)
                .await?
                .is_some()
            {
                return Err(AuthError::IdentityExists);
            }
        }

        let hash = self.hasher.hash(&password).await?;
        let mut identity = Identity::new(tenant_id, username, email, hash, self.clock.now())?;
        identity.is_superuser = is_superuser;

        self.identities
            .save(&identity)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::IdentityExists,
                other => other.into(),
            })?;

        self.record(AuditAction::Register, &identity, json!({ "username": identity.username }))
            .await;
        tracing::info!(tenant_id = %tenant_id, user_id = %identity.id, "identity registered");
        Ok(identity)
    }

    /// Change the password and sign the user out everywhere.
    pub async fn change_password(&self, user_id: UserId, current: &str, new: &str) -> AuthResult<()> {
        let mut identity = self.load_identity(user_id).await?;

        if !self.hasher.verify(current, &identity.password_hash).await {
            tracing::debug!(user_id = %user_id, reason = "wrong current password", "password change rejected");
            return Err(AuthError::InvalidCredentials);
        }
        validate_password_policy(new, self.config.min_password_length)?;

        let hash = self.hasher.hash(new).await?;
        identity.set_password_hash(hash, self.clock.now());
        self.identities.save(&identity).await?;
        let revoked = self.refresh_tokens.revoke_all_for_user(user_id).await?;

        self.record(AuditAction::PasswordChanged, &identity, json!({ "revoked": revoked }))
            .await;
        Ok(())
    }

    /// Stage a fresh TOTP secret. It is not enforced until `enable_totp`.
    pub async fn begin_totp_enrollment(&self, user_id: UserId) -> AuthResult<TotpEnrollment> {
        let mut identity = self.load_identity(user_id).await?;
        if identity.totp_enabled {
            return Err(AuthError::TwoFactorAlreadyEnabled);
        }

        let secret = self.totp.generate_secret();
        let provisioning_uri =
            self.totp
                .provisioning_uri(&secret, identity.account_label(), &self.config.totp_issuer)?;

        identity.stage_totp_secret(secret.clone(), self.clock.now())?;
        self.identities.save(&identity).await?;

        Ok(TotpEnrollment {
            secret,
            provisioning_uri,
        })
    }

    /// Turn on 2FA after proving possession of the staged secret.
    pub async fn enable_totp(&self, user_id: UserId, code: &str) -> AuthResult<()> {
        let mut identity = self.load_identity(user_id).await?;
        if identity.totp_enabled {
            return Err(AuthError::TwoFactorAlreadyEnabled);
        }
        let secret = identity
            .totp_secret
            .clone()
            .ok_or(AuthError::TwoFactorNotEnrolled)?;

        let now = self.clock.now();
        self.check_code(&identity, &secret, code, now).await?;

        identity.enable_totp(now)?;
        self.identities.save(&identity).await?;
        self.record(AuditAction::TwoFactorEnabled, &identity, serde_json::Value::Null)
            .await;
        Ok(())
    }

    pub async fn disable_totp(&self, user_id: UserId, code: &str) -> AuthResult<()> {
        let mut identity = self.load_identity(user_id).await?;
        let now = self.clock.now();
        self.check_second_factor(&identity, code, now).await?;

        identity.disable_totp(now);
        self.identities.save(&identity).await?;
        self.record(AuditAction::TwoFactorDisabled, &identity, serde_json::Value::Null)
            .await;
        Ok(())
    }

    // ── internals ───────────────────────────────────────────────────────────

    /// A tenant named by the caller must agree with the ambient tenant.
    fn ensure_ambient_tenant(&self, tenant_id: TenantId) -> AuthResult<()> {
        match TenantContext::current() {
            Some(current) if current != tenant_id => {
                tracing::debug!(ambient = %current, requested = %tenant_id, "tenant mismatch");
                Err(AuthError::InvalidTenant)
            }
            _ => Ok(()),
        }
    }

    async fn load_identity(&self, user_id: UserId) -> AuthResult<Identity> {
        let identity = self
            .identities
            .find_by_id(user_id)
            .await?
            .filter(|i| !i.is_deleted)
            .ok_or(AuthError::IdentityNotFound)?;
        self.ensure_ambient_tenant(identity.tenant_id)?;
        Ok(identity)
    }

    async fn check_second_factor(&self, identity: &Identity, code: &str, now: DateTime<Utc>) -> AuthResult<()> {
        let secret = identity
            .active_totp_secret()
            .ok_or(AuthError::TwoFactorNotEnrolled)?;
        self.check_code(identity, secret, code, now).await
    }

    /// Rate-limited TOTP check. A success resets the attempt budget.
    async fn check_code(&self, identity: &Identity, secret: &str, code: &str, now: DateTime<Utc>) -> AuthResult<()> {
        let key = RateLimitKey::two_factor(identity.tenant_id, identity.id);
        if self.rate_limiter.check(&key).await == RateLimitDecision::Limited {
            tracing::info!(user_id = %identity.id, "2FA rate limited");
            return Err(AuthError::TooManyAttempts);
        }

        if !self.totp.verify(secret, code, now) {
            tracing::debug!(user_id = %identity.id, reason = "wrong code", "2FA rejected");
            self.record(AuditAction::TwoFactorFailed, identity, serde_json::Value::Null)
                .await;
            return Err(AuthError::InvalidCode);
        }

        self.rate_limiter.reset(&key).await;
        Ok(())
    }

    async fn open_challenge(&self, identity: &Identity) -> AuthResult<TwoFactorTicket> {
        let now = self.clock.now();
        let ticket = generate_opaque_token();
        let expires_at = now
            .checked_add_signed(self.config.challenge_ttl())
            .ok_or_else(|| AuthError::Config("challenge expiry out of range".into()))?;

        self.challenges
            .insert(TwoFactorChallenge {
                id: RecordId::new(),
                user_id: identity.id,
                tenant_id: identity.tenant_id,
                ticket_fingerprint: fingerprint(&ticket),
                expires_at,
                consumed: false,
            })
            .await?;

        Ok(TwoFactorTicket { ticket, expires_at })
    }

    /// Sign both tokens and build the refresh record. Nothing is persisted.
    fn mint_pair(&self, identity: &Identity, now: DateTime<Utc>) -> AuthResult<(TokenPair, RefreshTokenRecord)> {
        let subject = TokenSubject::new(identity.id, identity.tenant_id);
        let access = self
            .tokens
            .issue_access(&subject, self.config.access_token_ttl(), now)?;
        let refresh = self
            .tokens
            .issue_refresh(&subject, self.config.refresh_token_ttl(), now)?;

        let expires_at = refresh
            .claims
            .expires_at()
            .ok_or_else(|| AuthError::Crypto("refresh expiry out of range".into()))?;
        let record = RefreshTokenRecord {
            id: RecordId::new(),
            user_id: identity.id,
            tenant_id: identity.tenant_id,
            token_fingerprint: fingerprint(&refresh.token),
            expires_at,
            revoked: false,
            created_at: now,
        };

        let pair = TokenPair::bearer(access, refresh, self.config.access_token_lifetime_secs);
        Ok((pair, record))
    }

    /// Mint a pair and persist its refresh record as the final step.
    async fn issue_pair(&self, identity: &Identity) -> AuthResult<TokenPair> {
        let (pair, record) = self.mint_pair(identity, self.clock.now())?;
        self.refresh_tokens.insert(record).await?;
        Ok(pair)
    }

    async fn record(&self, action: AuditAction, identity: &Identity, metadata: serde_json::Value) {
        let event = AuditEvent::new(action, identity.id, identity.tenant_id, self.clock.now())
            .with_metadata(metadata);
        self.emit(event).await;
    }

    async fn emit(&self, event: AuditEvent) {
        let action = event.action;
        if let Err(e) = self.audit.record_event(event).await {
            tracing::warn!(?action, error = %e, "audit event dropped");
        }
    }
}
