//! Permission resolution
//!
//! Walks User -> UserRole -> Role -> RolePermission -> Permission -> Resource
//! inside one read transaction. LMDB read transactions are snapshots, so a
//! concurrent grant or revoke is either fully visible or not at all.
//!
//! Nothing is cached: every call re-reads the graph.

use heed::RoTxn;
use tracing::debug;

use crate::db::{Dbs, Store};
use crate::error::{err, RbacError, Result};
use crate::key::{PermissionKey, PermissionSet};
use crate::model::{Role, RoleId, UserId};

/// Everything the route guard needs about a user, read in one snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Grants {
    /// Names of the roles the user holds
    pub roles: Vec<String>,
    /// True if any held role is privileged
    pub privileged: bool,
    pub permissions: PermissionSet,
}

pub(crate) fn held_roles(d: &Dbs, tx: &RoTxn, user: UserId) -> Result<Vec<Role>> {
    let mut roles = Vec::new();
    for id in d.user_roles.list_fwd(tx, user.0)? {
        let role = d
            .roles
            .get(tx, &id)
            .map_err(err)?
            .ok_or_else(|| RbacError::Corrupt(format!("user {} linked to missing role {}", user, RoleId(id))))?;
        roles.push(role);
    }
    Ok(roles)
}

pub(crate) fn resolve(d: &Dbs, tx: &RoTxn, user: UserId) -> Result<Grants> {
    // Unknown users are indistinguishable from users without grants.
    if d.users.get(tx, &user.0).map_err(err)?.is_none() {
        return Ok(Grants::default());
    }
    let mut grants = Grants::default();
    for role in held_roles(d, tx, user)? {
        grants.privileged |= role.privileged;
        for pid in d.role_perms.list_fwd(tx, role.id.0)? {
            let perm = d.permissions.get(tx, &pid).map_err(err)?.ok_or_else(|| {
                RbacError::Corrupt(format!("role '{}' grants missing permission {}", role.name, pid))
            })?;
            let resource = d.resources.get(tx, &perm.resource_id.0).map_err(err)?.ok_or_else(|| {
                RbacError::Corrupt(format!("permission '{}' owned by missing resource {}", perm.name, perm.resource_id))
            })?;
            let key = PermissionKey::new(perm.action, resource.name)
                .map_err(|e| RbacError::Corrupt(format!("permission '{}': {}", perm.name, e)))?;
            grants.permissions.insert(key);
        }
        grants.roles.push(role.name);
    }
    Ok(grants)
}

impl Store {
    /// Effective permission set of `user`. Unknown users resolve to the empty set.
    pub fn resolve_permissions(&self, user: UserId) -> Result<PermissionSet> {
        let grants = self.resolve_grants(user)?;
        Ok(grants.permissions)
    }

    /// Roles, privilege and permissions of `user` from a single snapshot
    #[tracing::instrument(level = "debug", skip_all, fields(user = %user))]
    pub fn resolve_grants(&self, user: UserId) -> Result<Grants> {
        let grants = self.read(|d, tx| resolve(d, tx, user))?;
        debug!(user = %user, roles = grants.roles.len(), permissions = grants.permissions.len(), privileged = grants.privileged, "resolved grants");
        Ok(grants)
    }
}
