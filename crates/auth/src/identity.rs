//! User identity record.

use chrono::{DateTime, Utc};
use serde::Serialize;

use tenantguard_core::{DomainError, DomainResult, TenantId, UserId};

/// A user account within one tenant.
///
/// # Invariants
/// - `tenant_id` never changes after creation.
/// - Username and email are unique within the tenant, compared case-insensitively
///   (enforced by the identity repository).
/// - A soft-deleted or inactive identity never authenticates.
/// - `totp_enabled` implies `totp_secret.is_some()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub id: UserId,
    pub tenant_id: TenantId,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_active: bool,
    pub is_superuser: bool,
    #[serde(skip_serializing)]
    pub totp_secret: Option<String>,
    pub totp_enabled: bool,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Identity {
    pub fn new(
        tenant_id: TenantId,
        username: impl Into<String>,
        email: impl Into<String>,
        password_hash: String,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let username = username.into().trim().to_owned();
        let email = email.into().trim().to_owned();

        if username.is_empty() {
            return Err(DomainError::validation("username cannot be empty"));
        }
        if username.contains('@') {
            return Err(DomainError::validation("username cannot contain '@'"));
        }
        if !is_plausible_email(&email) {
            return Err(DomainError::validation("email is not valid"));
        }

        Ok(Self {
            id: UserId::new(),
            tenant_id,
            username,
            email,
            password_hash,
            is_active: true,
            is_superuser: false,
            totp_secret: None,
            totp_enabled: false,
            is_deleted: false,
            created_at: now,
            updated_at: now,
        })
    }

    /// Whether `identifier` names this identity (username or email, case-insensitive).
    pub fn matches_identifier(&self, identifier: &str) -> bool {
        let identifier = identifier.trim();
        self.username.eq_ignore_ascii_case(identifier) || self.email.eq_ignore_ascii_case(identifier)
    }

    pub fn can_authenticate(&self) -> bool {
        self.is_active && !self.is_deleted
    }

    /// Label shown in authenticator apps.
    pub fn account_label(&self) -> &str {
        &self.email
    }

    pub fn set_password_hash(&mut self, hash: String, now: DateTime<Utc>) {
        self.password_hash = hash;
        self.updated_at = now;
    }

    pub fn deactivate(&mut self, now: DateTime<Utc>) {
        self.is_active = false;
        self.updated_at = now;
    }

    pub fn activate(&mut self, now: DateTime<Utc>) {
        self.is_active = true;
        self.updated_at = now;
    }

    /// Flag the identity as deleted. Rows are never physically removed.
    pub fn soft_delete(&mut self, now: DateTime<Utc>) {
        self.is_deleted = true;
        self.is_active = false;
        self.updated_at = now;
    }

    /// Store a secret that is not yet enforced at login.
    pub fn stage_totp_secret(&mut self, secret: String, now: DateTime<Utc>) -> DomainResult<()> {
        if self.totp_enabled {
            return Err(DomainError::invariant("two-factor authentication already enabled"));
        }
        self.totp_secret = Some(secret);
        self.updated_at = now;
        Ok(())
    }

    pub fn enable_totp(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        if self.totp_secret.is_none() {
            return Err(DomainError::invariant("no TOTP secret staged"));
        }
        self.totp_enabled = true;
        self.updated_at = now;
        Ok(())
    }

    pub fn disable_totp(&mut self, now: DateTime<Utc>) {
        self.totp_enabled = false;
        self.totp_secret = None;
        self.updated_at = now;
    }

    /// The secret to check codes against when 2FA is enforced.
    pub fn active_totp_secret(&self) -> Option<&str> {
        if self.totp_enabled {
            self.totp_secret.as_deref()
        } else {
            None
        }
    }
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> Identity {
        Identity::new(TenantId::new(), "Alice", "Alice@Example.com", "hash".into(), Utc::now()).unwrap()
    }

    #[test]
    fn identifiers_match_case_insensitively() {
        let alice = identity();
        assert!(alice.matches_identifier("alice"));
        assert!(alice.matches_identifier("ALICE@example.COM"));
        assert!(alice.matches_identifier("  alice  "));
        assert!(!alice.matches_identifier("bob"));
    }

    #[test]
    fn invalid_input_is_rejected() {
        let now = Utc::now();
        assert!(Identity::new(TenantId::new(), "", "a@b.io", "h".into(), now).is_err());
        assert!(Identity::new(TenantId::new(), "a@b", "a@b.io", "h".into(), now).is_err());
        assert!(Identity::new(TenantId::new(), "alice", "not-an-email", "h".into(), now).is_err());
        assert!(Identity::new(TenantId::new(), "alice", "a@localhost", "h".into(), now).is_err());
    }

    #[test]
    fn deleted_identity_cannot_authenticate() {
        let mut alice = identity();
        assert!(alice.can_authenticate());
        alice.soft_delete(Utc::now());
        assert!(!alice.can_authenticate());
    }

    #[test]
    fn totp_lifecycle() {
        let mut alice = identity();
        let now = Utc::now();

        assert!(alice.enable_totp(now).is_err());
        alice.stage_totp_secret("SECRET".into(), now).unwrap();
        assert_eq!(alice.active_totp_secret(), None);

        alice.enable_totp(now).unwrap();
        assert_eq!(alice.active_totp_secret(), Some("SECRET"));
        assert!(alice.stage_totp_secret("OTHER".into(), now).is_err());

        alice.disable_totp(now);
        assert!(!alice.totp_enabled);
        assert!(alice.totp_secret.is_none());
    }

    #[test]
    fn secrets_are_not_serialized() {
        let mut alice = identity();
        alice.totp_secret = Some("SECRET".into());
        let json = serde_json::to_value(&alice).unwrap();
        assert!(json.get("password_hash").is_none());
        assert!(json.get("totp_secret").is_none());
    }
}
