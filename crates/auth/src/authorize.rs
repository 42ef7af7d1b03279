use std::collections::HashSet;

use thiserror::Error;

use stockplan_core::{ActorId, TenantId};

use crate::{Permission, TenantMembership};

/// A fully resolved principal for authorization decisions.
///
/// Construction of this object is intentionally decoupled from storage and
/// transport: callers derive memberships from claims and a policy source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub actor_id: ActorId,
    pub active_tenant_id: TenantId,
    pub membership: TenantMembership,
}

impl Principal {
    /// Convenience constructor for a principal holding the given permissions
    /// in a single tenant. Used heavily in tests and dev wiring.
    pub fn with_permissions(
        actor_id: ActorId,
        tenant_id: TenantId,
        permissions: Vec<Permission>,
    ) -> Self {
        Self {
            actor_id,
            active_tenant_id: tenant_id,
            membership: TenantMembership {
                tenant_id,
                roles: Vec::new(),
                permissions,
            },
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("tenant mismatch")]
    TenantMismatch,

    #[error("forbidden: missing permission '{0}'")]
    Forbidden(String),
}

/// Authorize a principal within its active tenant context.
///
/// - No IO
/// - No panics
/// - No business logic (pure policy check)
pub fn authorize(principal: &Principal, required: &Permission) -> Result<(), AuthzError> {
    if principal.active_tenant_id != principal.membership.tenant_id {
        return Err(AuthzError::TenantMismatch);
    }

    let perms: HashSet<&str> = principal
        .membership
        .permissions
        .iter()
        .map(|p| p.as_str())
        .collect();

    if perms.contains("*") || perms.contains(required.as_str()) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(required.as_str().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{JOBS_APPROVE, JOBS_WRITE};

    fn principal(perms: Vec<Permission>) -> Principal {
        Principal::with_permissions(ActorId::new(), TenantId::new(), perms)
    }

    #[test]
    fn grants_exact_permission() {
        let p = principal(vec![JOBS_WRITE]);
        assert!(authorize(&p, &JOBS_WRITE).is_ok());
    }

    #[test]
    fn wildcard_grants_everything() {
        let p = principal(vec![Permission::new("*")]);
        assert!(authorize(&p, &JOBS_APPROVE).is_ok());
    }

    #[test]
    fn missing_permission_is_forbidden() {
        let p = principal(vec![JOBS_WRITE]);
        assert!(matches!(
            authorize(&p, &JOBS_APPROVE),
            Err(AuthzError::Forbidden(_))
        ));
    }

    #[test]
    fn tenant_mismatch_is_rejected_before_permission_lookup() {
        let mut p = principal(vec![Permission::new("*")]);
        p.active_tenant_id = TenantId::new();
        assert_eq!(authorize(&p, &JOBS_WRITE), Err(AuthzError::TenantMismatch));
    }
}
