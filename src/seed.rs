//! Idempotent initial graph: application resources, their permissions,
//! the privileged roles and any configured roles with their grants

use tracing::info;

use crate::config::RbacConfig;
use crate::db::Store;
use crate::error::{RbacError, Result};
use crate::model::{NewPermission, NewResource, NewRole};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub resources_created: usize,
    pub permissions_created: usize,
    pub roles_created: usize,
    pub grants_created: usize,
}

/// Create whatever part of the configured graph is missing.
///
/// Existing resources, permissions and roles are left as they are: a role
/// that already exists keeps its description and `privileged` flag. Grants
/// listed under `seed.roles` that are missing are added.
#[tracing::instrument(level = "debug", skip_all)]
pub fn seed(store: &Store, cfg: &RbacConfig) -> Result<SeedReport> {
    let mut report = SeedReport::default();
    if !cfg.seed.enabled {
        return Ok(report);
    }
    store.transact(|tx| {
        for r in &cfg.seed.resources {
            let resource = match tx.resource_by_name(&r.name)? {
                Some(existing) => existing,
                None => {
                    report.resources_created += 1;
                    tx.create_resource(NewResource::new(&r.name, &r.label))?
                }
            };
            for action in &cfg.seed.actions {
                let new = NewPermission::for_resource(action, &resource);
                if tx.permission_by_name(&new.name)?.is_none() {
                    tx.create_permission(new)?;
                    report.permissions_created += 1;
                }
            }
        }
        for name in &cfg.policy.privileged_roles {
            if tx.role_by_name(name)?.is_none() {
                tx.create_role(NewRole::new(name).privileged(true))?;
                report.roles_created += 1;
            }
        }
        for r in &cfg.seed.roles {
            let role = match tx.role_by_name(&r.name)? {
                Some(existing) => existing,
                None => {
                    let mut new = NewRole::new(&r.name);
                    if let Some(d) = &r.description {
                        new = new.description(d);
                    }
                    report.roles_created += 1;
                    tx.create_role(new)?
                }
            };
            for key in &r.permissions {
                let perm = tx.permission_for(key)?.ok_or_else(|| {
                    RbacError::Config(format!("seed role '{}' grants unknown permission '{}'", r.name, key))
                })?;
                if !tx.role_grants(role.id, perm.id)? {
                    tx.assign_permission(role.id, perm.id)?;
                    report.grants_created += 1;
                }
            }
        }
        Ok(())
    })?;
    info!(
        resources = report.resources_created,
        permissions = report.permissions_created,
        roles = report.roles_created,
        grants = report.grants_created,
        "permission graph seeded"
    );
    Ok(report)
}
