//! Read operations over the permission graph (no permission checks)

use heed::RoTxn;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::db::{list_pfx, Dbs, NameIdx, Store, Table};
use crate::error::{err, Result};
use crate::model::{Permission, PermissionId, Resource, ResourceId, Role, RoleId, User, UserId};

fn by_name<T>(tx: &RoTxn, idx: &NameIdx, table: &Table<T>, name: &str) -> Result<Option<T>>
where
    T: Serialize + DeserializeOwned + 'static,
{
    match idx.get(tx, name).map_err(err)? {
        Some(id) => table.get(tx, &id).map_err(err),
        None => Ok(None),
    }
}

fn all<T>(tx: &RoTxn, table: &Table<T>) -> Result<Vec<T>>
where
    T: Serialize + DeserializeOwned + 'static,
{
    let mut r = Vec::new();
    for item in table.iter(tx).map_err(err)? {
        let (_, v) = item.map_err(err)?;
        r.push(v);
    }
    Ok(r)
}

pub(crate) fn role_by_name_in(d: &Dbs, tx: &RoTxn, name: &str) -> Result<Option<Role>> {
    by_name(tx, &d.role_names, &d.roles, name)
}

pub(crate) fn resource_by_name_in(d: &Dbs, tx: &RoTxn, name: &str) -> Result<Option<Resource>> {
    by_name(tx, &d.resource_names, &d.resources, name)
}

pub(crate) fn permission_by_name_in(d: &Dbs, tx: &RoTxn, name: &str) -> Result<Option<Permission>> {
    by_name(tx, &d.permission_names, &d.permissions, name)
}

impl Store {
    pub fn get_user(&self, id: UserId) -> Result<Option<User>> {
        self.read(|d, tx| d.users.get(tx, &id.0).map_err(err))
    }

    pub fn user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.read(|d, tx| by_name(tx, &d.user_emails, &d.users, email))
    }

    pub fn get_role(&self, id: RoleId) -> Result<Option<Role>> {
        self.read(|d, tx| d.roles.get(tx, &id.0).map_err(err))
    }

    pub fn role_by_name(&self, name: &str) -> Result<Option<Role>> {
        self.read(|d, tx| role_by_name_in(d, tx, name))
    }

    pub fn get_resource(&self, id: ResourceId) -> Result<Option<Resource>> {
        self.read(|d, tx| d.resources.get(tx, &id.0).map_err(err))
    }

    pub fn resource_by_name(&self, name: &str) -> Result<Option<Resource>> {
        self.read(|d, tx| resource_by_name_in(d, tx, name))
    }

    pub fn get_permission(&self, id: PermissionId) -> Result<Option<Permission>> {
        self.read(|d, tx| d.permissions.get(tx, &id.0).map_err(err))
    }

    pub fn permission_by_name(&self, name: &str) -> Result<Option<Permission>> {
        self.read(|d, tx| permission_by_name_in(d, tx, name))
    }

    pub fn list_users(&self) -> Result<Vec<User>> {
        self.read(|d, tx| all(tx, &d.users))
    }

    pub fn list_roles(&self) -> Result<Vec<Role>> {
        self.read(|d, tx| all(tx, &d.roles))
    }

    pub fn list_resources(&self) -> Result<Vec<Resource>> {
        self.read(|d, tx| all(tx, &d.resources))
    }

    pub fn list_permissions(&self) -> Result<Vec<Permission>> {
        self.read(|d, tx| all(tx, &d.permissions))
    }

    /// Permissions granted by a role; dangling links are skipped
    pub fn role_permissions(&self, role: RoleId) -> Result<Vec<Permission>> {
        self.read(|d, tx| {
            let mut r = Vec::new();
            for id in d.role_perms.list_fwd(tx, role.0)? {
                if let Some(p) = d.permissions.get(tx, &id).map_err(err)? {
                    r.push(p);
                }
            }
            Ok(r)
        })
    }

    /// Users holding a role
    pub fn role_members(&self, role: RoleId) -> Result<Vec<UserId>> {
        self.read(|d, tx| Ok(d.user_roles.list_rev(tx, role.0)?.into_iter().map(UserId).collect()))
    }

    /// Permissions owned by a resource
    pub fn resource_permissions(&self, resource: ResourceId) -> Result<Vec<Permission>> {
        self.read(|d, tx| {
            let mut r = Vec::new();
            for id in list_pfx(tx, &d.resource_perms, resource.0)? {
                if let Some(p) = d.permissions.get(tx, &id).map_err(err)? {
                    r.push(p);
                }
            }
            Ok(r)
        })
    }
}
