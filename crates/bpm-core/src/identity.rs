//! Caller identity and tenant scope.
//!
//! Every operation receives the caller's [`Identity`] explicitly. The
//! organization it carries decides the tenant scope: organization `0` is the
//! super-tenant and sees across organizations, any other value restricts the
//! caller to that organization.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Organization id that denotes an unrestricted (super-tenant) caller.
pub const GLOBAL_ORGANIZATION: i64 = 0;

/// A verified caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub username: String,
    pub user_id: i64,
    pub organization_id: i64,
}

impl Identity {
    pub fn new(username: impl Into<String>, user_id: i64, organization_id: i64) -> Self {
        Self {
            username: username.into(),
            user_id,
            organization_id,
        }
    }

    /// Whether this caller is the super-tenant.
    pub fn is_global(&self) -> bool {
        self.organization_id == GLOBAL_ORGANIZATION
    }

    pub fn scope(&self) -> OrgScope {
        if self.is_global() {
            OrgScope::Global
        } else {
            OrgScope::Tenant(self.organization_id)
        }
    }
}

/// Tenant scope a caller operates in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrgScope {
    Global,
    Tenant(i64),
}

impl OrgScope {
    /// Whether a record resolved to `organization_id` is visible in this scope.
    pub fn admits(&self, organization_id: i64) -> bool {
        match self {
            OrgScope::Global => true,
            OrgScope::Tenant(own) => *own == organization_id,
        }
    }

    /// Organization filter to apply to a read: a tenant always gets its own
    /// organization regardless of what was requested.
    pub fn restrict(&self, requested: Option<i64>) -> Option<i64> {
        match self {
            OrgScope::Global => requested,
            OrgScope::Tenant(own) => Some(*own),
        }
    }

    pub fn tenant(&self) -> Option<i64> {
        match self {
            OrgScope::Global => None,
            OrgScope::Tenant(own) => Some(*own),
        }
    }
}

/// Resolves a presented bearer credential to a verified identity.
///
/// Fails with [`crate::Error::Unauthorized`] when the credential is invalid.
pub trait IdentityResolver: Send + Sync {
    fn resolve(&self, credential: &str) -> Result<Identity>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_organization_is_global() {
        let admin = Identity::new("root", 1, 0);
        assert!(admin.is_global());
        assert_eq!(admin.scope(), OrgScope::Global);
    }

    #[test]
    fn test_tenant_scope_admits_only_own_organization() {
        let scope = Identity::new("alice", 10, 7).scope();
        assert!(scope.admits(7));
        assert!(!scope.admits(9));
        assert!(!scope.admits(GLOBAL_ORGANIZATION));
    }

    #[test]
    fn test_restrict_overrides_requested_organization_for_tenant() {
        assert_eq!(OrgScope::Tenant(7).restrict(Some(9)), Some(7));
        assert_eq!(OrgScope::Tenant(7).restrict(None), Some(7));
        assert_eq!(OrgScope::Global.restrict(Some(9)), Some(9));
        assert_eq!(OrgScope::Global.restrict(None), None);
    }
}
