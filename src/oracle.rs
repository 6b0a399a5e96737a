//! Point queries and mutation primitives built on the resolver
//!
//! None of these produce HTTP semantics: they return booleans and sets, or
//! propagate store errors.

use std::collections::HashMap;

use tracing::debug;

use crate::constants::{ADMIN_ROLE, SUPER_ADMIN_ROLE};
use crate::db::Store;
use crate::error::Result;
use crate::model::{PermissionId, RoleId, UserId};
use crate::resolver::held_roles;

impl Store {
    /// True iff `action:resource` is in the user's effective permission set
    pub fn has_permission(&self, user: UserId, action: &str, resource: &str) -> Result<bool> {
        Ok(self.resolve_permissions(user)?.contains(action, resource))
    }

    /// True iff the user holds a role named `role`
    pub fn has_role(&self, user: UserId, role: &str) -> Result<bool> {
        self.read(|d, tx| Ok(held_roles(d, tx, user)?.iter().any(|r| r.name == role)))
    }

    /// Answer every `(action, resource)` pair against one resolution.
    ///
    /// Keys of the result are the wire form `"action:resource"`.
    pub fn check_multiple_permissions(
        &self,
        user: UserId,
        checks: &[(&str, &str)],
    ) -> Result<HashMap<String, bool>> {
        let perms = self.resolve_permissions(user)?;
        Ok(checks
            .iter()
            .map(|(action, resource)| (format!("{}:{}", action, resource), perms.contains(action, resource)))
            .collect())
    }

    /// Vacuously true for an empty list
    pub fn has_all_permissions(&self, user: UserId, checks: &[(&str, &str)]) -> Result<bool> {
        if checks.is_empty() {
            return Ok(true);
        }
        let perms = self.resolve_permissions(user)?;
        Ok(checks.iter().all(|(a, r)| perms.contains(a, r)))
    }

    /// Vacuously false for an empty list
    pub fn has_any_permission(&self, user: UserId, checks: &[(&str, &str)]) -> Result<bool> {
        if checks.is_empty() {
            return Ok(false);
        }
        let perms = self.resolve_permissions(user)?;
        Ok(checks.iter().any(|(a, r)| perms.contains(a, r)))
    }

    pub fn get_user_roles(&self, user: UserId) -> Result<Vec<String>> {
        self.read(|d, tx| Ok(held_roles(d, tx, user)?.into_iter().map(|r| r.name).collect()))
    }

    pub fn is_admin(&self, user: UserId) -> Result<bool> {
        self.has_role(user, ADMIN_ROLE)
    }

    pub fn is_super_admin(&self, user: UserId) -> Result<bool> {
        self.has_role(user, SUPER_ADMIN_ROLE)
    }

    /// True iff any role the user holds carries the privileged flag
    pub fn is_privileged(&self, user: UserId) -> Result<bool> {
        self.read(|d, tx| Ok(held_roles(d, tx, user)?.iter().any(|r| r.privileged)))
    }

    /// Fails with `Conflict` if the user already holds the role
    pub fn assign_role_to_user(&self, user: UserId, role: RoleId) -> Result<()> {
        self.transact(|tx| tx.assign_role(user, role))?;
        debug!(user = %user, role = %role, "role assigned");
        Ok(())
    }

    /// Removing a pair that does not exist is a no-op; returns whether a row was deleted
    pub fn remove_role_from_user(&self, user: UserId, role: RoleId) -> Result<bool> {
        let removed = self.transact(|tx| tx.remove_role(user, role))?;
        debug!(user = %user, role = %role, removed, "role removed");
        Ok(removed)
    }

    pub fn assign_permission_to_role(&self, role: RoleId, perm: PermissionId) -> Result<()> {
        self.transact(|tx| tx.assign_permission(role, perm))?;
        debug!(role = %role, permission = %perm, "permission assigned");
        Ok(())
    }

    pub fn remove_permission_from_role(&self, role: RoleId, perm: PermissionId) -> Result<bool> {
        let removed = self.transact(|tx| tx.remove_permission(role, perm))?;
        debug!(role = %role, permission = %perm, removed, "permission removed");
        Ok(removed)
    }
}
