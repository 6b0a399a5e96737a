//! Write transactions over the permission graph
//!
//! Every mutation runs inside one LMDB write transaction. Several mutations
//! can be grouped with [`Store::transact`]; they commit together or not at all.

use heed::RwTxn;
use tracing::debug;

use crate::config::{PolicySettings, ResourceDeletePolicy};
use crate::constants::NEXT_ID;
use crate::db::{epoch_millis, key, list_pfx, Dbs, Store};
use crate::error::{err, RbacError, Result};
use crate::key::{validate_action, validate_resource_name, PermissionKey};
use crate::model::{
    NewPermission, NewResource, NewRole, NewUser, Permission, PermissionId, Resource, ResourceId, Role,
    RoleId, User, UserId,
};

/// Transaction wrapper for graph writes
pub struct Tx<'e> {
    txn: RwTxn<'e>,
    dbs: &'e Dbs,
    policy: &'e PolicySettings,
}

impl Store {
    /// Run multiple operations in a single write transaction
    pub fn transact<T, F: FnOnce(&mut Tx<'_>) -> Result<T>>(&self, f: F) -> Result<T> {
        let mut tx = Tx {
            txn: self.env().write_txn().map_err(err)?,
            dbs: self.dbs(),
            policy: self.policy(),
        };
        let r = f(&mut tx)?;
        tx.txn.commit().map_err(err)?;
        Ok(r)
    }
}

fn require_name(kind: &str, name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(RbacError::Invalid(format!("{} name must not be empty", kind)));
    }
    Ok(())
}

impl<'e> Tx<'e> {
    #[inline]
    pub(crate) fn parts(&mut self) -> (&'e Dbs, &mut RwTxn<'e>) {
        (self.dbs, &mut self.txn)
    }

    fn next_id(&mut self) -> Result<u64> {
        let id = match self.dbs.meta.get(&self.txn, NEXT_ID).map_err(err)? {
            Some(s) => s
                .parse::<u64>()
                .map_err(|_| RbacError::Corrupt(format!("id counter is not a number: {:?}", s)))?,
            None => 1,
        };
        self.dbs.meta.put(&mut self.txn, NEXT_ID, &(id + 1).to_string()).map_err(err)?;
        Ok(id)
    }

    // Users

    pub fn create_user(&mut self, new: NewUser) -> Result<User> {
        let email = new.email.trim();
        if email.is_empty() {
            return Err(RbacError::Invalid("user email must not be empty".into()));
        }
        if self.dbs.user_emails.get(&self.txn, email).map_err(err)?.is_some() {
            return Err(RbacError::Conflict(format!("user with email '{}' already exists", email)));
        }
        let now = epoch_millis();
        let user = User {
            id: UserId(self.next_id()?),
            email: email.to_string(),
            name: new.name,
            created_at: now,
            updated_at: now,
        };
        self.dbs.users.put(&mut self.txn, &user.id.0, &user).map_err(err)?;
        self.dbs.user_emails.put(&mut self.txn, &user.email, &user.id.0).map_err(err)?;
        debug!(user = %user.id, email = %user.email, "user created");
        Ok(user)
    }

    /// Delete a user and every role it holds
    pub fn delete_user(&mut self, id: UserId) -> Result<bool> {
        let Some(user) = self.dbs.users.get(&self.txn, &id.0).map_err(err)? else {
            return Ok(false);
        };
        for role in self.dbs.user_roles.list_fwd(&self.txn, id.0)? {
            self.dbs.user_roles.del(&mut self.txn, id.0, role)?;
        }
        self.dbs.user_emails.delete(&mut self.txn, &user.email).map_err(err)?;
        self.dbs.users.delete(&mut self.txn, &id.0).map_err(err)?;
        debug!(user = %id, "user deleted");
        Ok(true)
    }

    // Roles

    /// Create a role. Names listed in `policy.privileged_roles` are always privileged.
    pub fn create_role(&mut self, new: NewRole) -> Result<Role> {
        require_name("role", &new.name)?;
        if self.dbs.role_names.get(&self.txn, &new.name).map_err(err)?.is_some() {
            return Err(RbacError::Conflict(format!("role '{}' already exists", new.name)));
        }
        let now = epoch_millis();
        let privileged = new.privileged || self.policy.is_privileged_name(&new.name);
        let role = Role {
            id: RoleId(self.next_id()?),
            name: new.name,
            description: new.description,
            privileged,
            created_at: now,
            updated_at: now,
        };
        self.dbs.roles.put(&mut self.txn, &role.id.0, &role).map_err(err)?;
        self.dbs.role_names.put(&mut self.txn, &role.name, &role.id.0).map_err(err)?;
        debug!(role = %role.name, privileged, "role created");
        Ok(role)
    }

    pub fn set_role_privileged(&mut self, id: RoleId, privileged: bool) -> Result<Role> {
        let mut role = self
            .dbs
            .roles
            .get(&self.txn, &id.0)
            .map_err(err)?
            .ok_or_else(|| RbacError::NotFound(format!("role {}", id)))?;
        if role.privileged != privileged {
            role.privileged = privileged;
            role.updated_at = epoch_millis();
            self.dbs.roles.put(&mut self.txn, &id.0, &role).map_err(err)?;
            debug!(role = %role.name, privileged, "role privilege changed");
        }
        Ok(role)
    }

    /// Delete a role, its memberships and its grants
    pub fn delete_role(&mut self, id: RoleId) -> Result<bool> {
        let Some(role) = self.dbs.roles.get(&self.txn, &id.0).map_err(err)? else {
            return Ok(false);
        };
        for user in self.dbs.user_roles.list_rev(&self.txn, id.0)? {
            self.dbs.user_roles.del(&mut self.txn, user, id.0)?;
        }
        for perm in self.dbs.role_perms.list_fwd(&self.txn, id.0)? {
            self.dbs.role_perms.del(&mut self.txn, id.0, perm)?;
        }
        self.dbs.role_names.delete(&mut self.txn, &role.name).map_err(err)?;
        self.dbs.roles.delete(&mut self.txn, &id.0).map_err(err)?;
        debug!(role = %role.name, "role deleted");
        Ok(true)
    }

    // Resources

    pub fn create_resource(&mut self, new: NewResource) -> Result<Resource> {
        validate_resource_name(&new.name)?;
        if self.dbs.resource_names.get(&self.txn, &new.name).map_err(err)?.is_some() {
            return Err(RbacError::Conflict(format!("resource '{}' already exists", new.name)));
        }
        let now = epoch_millis();
        let resource = Resource {
            id: ResourceId(self.next_id()?),
            name: new.name,
            label: new.label,
            created_at: now,
            updated_at: now,
        };
        self.dbs.resources.put(&mut self.txn, &resource.id.0, &resource).map_err(err)?;
        self.dbs.resource_names.put(&mut self.txn, &resource.name, &resource.id.0).map_err(err)?;
        debug!(resource = %resource.name, "resource created");
        Ok(resource)
    }

    /// Delete a resource according to the configured [`ResourceDeletePolicy`]
    pub fn delete_resource(&mut self, id: ResourceId) -> Result<bool> {
        let policy = self.policy.resource_delete;
        self.delete_resource_with(id, policy)
    }

    pub fn delete_resource_with(&mut self, id: ResourceId, policy: ResourceDeletePolicy) -> Result<bool> {
        let Some(resource) = self.dbs.resources.get(&self.txn, &id.0).map_err(err)? else {
            return Ok(false);
        };
        let perms = list_pfx(&self.txn, &self.dbs.resource_perms, id.0)?;
        if !perms.is_empty() {
            match policy {
                ResourceDeletePolicy::Restrict => {
                    return Err(RbacError::Restricted(format!(
                        "resource '{}' is referenced by {} permission(s)",
                        resource.name,
                        perms.len()
                    )));
                }
                ResourceDeletePolicy::Cascade => {
                    for perm in perms {
                        self.delete_permission(PermissionId(perm))?;
                    }
                }
            }
        }
        self.dbs.resource_names.delete(&mut self.txn, &resource.name).map_err(err)?;
        self.dbs.resources.delete(&mut self.txn, &id.0).map_err(err)?;
        debug!(resource = %resource.name, ?policy, "resource deleted");
        Ok(true)
    }

    // Permissions

    pub fn create_permission(&mut self, new: NewPermission) -> Result<Permission> {
        require_name("permission", &new.name)?;
        validate_action(&new.action)?;
        if self.dbs.resources.get(&self.txn, &new.resource_id.0).map_err(err)?.is_none() {
            return Err(RbacError::NotFound(format!("resource {}", new.resource_id)));
        }
        if self.dbs.permission_names.get(&self.txn, &new.name).map_err(err)?.is_some() {
            return Err(RbacError::Conflict(format!("permission '{}' already exists", new.name)));
        }
        let now = epoch_millis();
        let perm = Permission {
            id: PermissionId(self.next_id()?),
            name: new.name,
            description: new.description,
            action: new.action,
            resource_id: new.resource_id,
            created_at: now,
            updated_at: now,
        };
        self.dbs.permissions.put(&mut self.txn, &perm.id.0, &perm).map_err(err)?;
        self.dbs.permission_names.put(&mut self.txn, &perm.name, &perm.id.0).map_err(err)?;
        self.dbs
            .resource_perms
            .put(&mut self.txn, &key(perm.resource_id.0, perm.id.0), &now)
            .map_err(err)?;
        debug!(permission = %perm.name, action = %perm.action, "permission created");
        Ok(perm)
    }

    /// Delete a permission and every role grant of it
    pub fn delete_permission(&mut self, id: PermissionId) -> Result<bool> {
        let Some(perm) = self.dbs.permissions.get(&self.txn, &id.0).map_err(err)? else {
            return Ok(false);
        };
        for role in self.dbs.role_perms.list_rev(&self.txn, id.0)? {
            self.dbs.role_perms.del(&mut self.txn, role, id.0)?;
        }
        self.dbs
            .resource_perms
            .delete(&mut self.txn, &key(perm.resource_id.0, id.0))
            .map_err(err)?;
        self.dbs.permission_names.delete(&mut self.txn, &perm.name).map_err(err)?;
        self.dbs.permissions.delete(&mut self.txn, &id.0).map_err(err)?;
        debug!(permission = %perm.name, "permission deleted");
        Ok(true)
    }

    // Join relations

    pub fn assign_role(&mut self, user: UserId, role: RoleId) -> Result<()> {
        if self.dbs.users.get(&self.txn, &user.0).map_err(err)?.is_none() {
            return Err(RbacError::NotFound(format!("user {}", user)));
        }
        if self.dbs.roles.get(&self.txn, &role.0).map_err(err)?.is_none() {
            return Err(RbacError::NotFound(format!("role {}", role)));
        }
        if !self.dbs.user_roles.insert(&mut self.txn, user.0, role.0, epoch_millis())? {
            return Err(RbacError::Conflict(format!("user {} already holds role {}", user, role)));
        }
        Ok(())
    }

    pub fn remove_role(&mut self, user: UserId, role: RoleId) -> Result<bool> {
        self.dbs.user_roles.del(&mut self.txn, user.0, role.0)
    }

    pub fn assign_permission(&mut self, role: RoleId, perm: PermissionId) -> Result<()> {
        if self.dbs.roles.get(&self.txn, &role.0).map_err(err)?.is_none() {
            return Err(RbacError::NotFound(format!("role {}", role)));
        }
        if self.dbs.permissions.get(&self.txn, &perm.0).map_err(err)?.is_none() {
            return Err(RbacError::NotFound(format!("permission {}", perm)));
        }
        if !self.dbs.role_perms.insert(&mut self.txn, role.0, perm.0, epoch_millis())? {
            return Err(RbacError::Conflict(format!("role {} already grants permission {}", role, perm)));
        }
        Ok(())
    }

    pub fn remove_permission(&mut self, role: RoleId, perm: PermissionId) -> Result<bool> {
        self.dbs.role_perms.del(&mut self.txn, role.0, perm.0)
    }

    // Lookups inside the write transaction

    pub fn role_by_name(&mut self, name: &str) -> Result<Option<Role>> {
        crate::read::role_by_name_in(self.dbs, &self.txn, name)
    }

    pub fn resource_by_name(&mut self, name: &str) -> Result<Option<Resource>> {
        crate::read::resource_by_name_in(self.dbs, &self.txn, name)
    }

    pub fn permission_by_name(&mut self, name: &str) -> Result<Option<Permission>> {
        crate::read::permission_by_name_in(self.dbs, &self.txn, name)
    }

    /// Permission granting `key.action()` on the resource named `key.resource()`
    pub fn permission_for(&mut self, key: &PermissionKey) -> Result<Option<Permission>> {
        let Some(resource) = self.resource_by_name(key.resource())? else {
            return Ok(None);
        };
        for id in list_pfx(&self.txn, &self.dbs.resource_perms, resource.id.0)? {
            if let Some(p) = self.dbs.permissions.get(&self.txn, &id).map_err(err)? {
                if p.action == key.action() {
                    return Ok(Some(p));
                }
            }
        }
        Ok(None)
    }

    pub fn role_grants(&mut self, role: RoleId, perm: PermissionId) -> Result<bool> {
        self.dbs.role_perms.contains(&self.txn, role.0, perm.0)
    }
}
