//! `tenantguard-auth`: multi-tenant authentication and authorization.
//!
//! This crate is decoupled from HTTP and storage: persistence, rate limiting
//! and auditing are reached through the traits in [`repository`],
//! [`rate_limit`] and [`audit`].

pub mod audit;
pub mod authorize;
pub mod claims;
pub mod clock;
pub mod config;
pub mod error;
pub mod identity;
pub mod password;
pub mod permissions;
pub mod principal;
pub mod rate_limit;
pub mod repository;
pub mod roles;
pub mod service;
pub mod tenant;
pub mod token;
pub mod totp;

pub use audit::{AuditAction, AuditError, AuditEvent, AuditSink};
pub use authorize::PermissionResolver;
pub use claims::{ClaimsError, TokenClaims, TokenKind, TokenSubject, validate_claims};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::AuthConfig;
pub use error::{AuthError, AuthResult};
pub use identity::Identity;
pub use password::{BcryptPasswordHasher, PasswordHasher, validate_password_policy};
pub use permissions::{Permission, PermissionCatalog, PermissionCode};
pub use principal::Principal;
pub use rate_limit::{RateLimitDecision, RateLimitKey, RateLimiter};
pub use repository::{
    ChallengeRepository, IdentityRepository, RefreshTokenRecord, RefreshTokenRepository,
    RepositoryError, RepositoryResult, RoleRepository, TwoFactorChallenge,
};
pub use roles::Role;
pub use service::{
    AuthCollaborators, AuthenticationService, LoginOutcome, Registration, TokenPair,
    TotpEnrollment, TwoFactorTicket,
};
pub use tenant::{TenantContext, parse_tenant_id};
pub use token::{ExpiryCheck, Hs256TokenCodec, IssuedToken, TokenCodec, fingerprint, generate_opaque_token};
pub use totp::TotpProvider;
