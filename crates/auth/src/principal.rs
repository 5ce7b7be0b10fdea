use tenantguard_core::{TenantId, UserId};

use crate::claims::TokenClaims;
use crate::identity::Identity;

/// An authenticated caller: the identity behind a verified access token.
///
/// Built only by `AuthenticationService::authenticate_access_token`, after the
/// token, the identity's status and the tenant binding have all been checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    identity: Identity,
    claims: TokenClaims,
}

impl Principal {
    pub(crate) fn new(identity: Identity, claims: TokenClaims) -> Self {
        Self { identity, claims }
    }

    pub fn user_id(&self) -> UserId {
        self.identity.id
    }

    /// Tenant the access token was issued in.
    pub fn tenant_id(&self) -> TenantId {
        self.claims.tenant_id
    }

    pub fn is_superuser(&self) -> bool {
        self.identity.is_superuser
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn claims(&self) -> &TokenClaims {
        &self.claims
    }
}
