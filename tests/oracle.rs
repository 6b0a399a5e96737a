//! Point queries and mutation primitives

use fleet_rbac::*;
use tempfile::TempDir;

fn setup() -> (TempDir, Store) {
    let dir = TempDir::new().unwrap();
    let store = Store::open_path(dir.path()).unwrap();
    (dir, store)
}

/// Role "ops" granted create:engin and update:engin, held by one user
fn ops_user(store: &Store) -> (User, Role, Resource) {
    store
        .transact(|tx| {
            let engin = tx.create_resource(NewResource::new("engin", "Engins"))?;
            let create = tx.create_permission(NewPermission::for_resource("create", &engin))?;
            let update = tx.create_permission(NewPermission::for_resource("update", &engin))?;
            tx.create_permission(NewPermission::for_resource("delete", &engin))?;
            let ops = tx.create_role(NewRole::new("ops"))?;
            tx.assign_permission(ops.id, create.id)?;
            tx.assign_permission(ops.id, update.id)?;
            let u = tx.create_user(NewUser::new("ops@fleet.test", "Ops"))?;
            tx.assign_role(u.id, ops.id)?;
            Ok((u, ops, engin))
        })
        .unwrap()
}

// ============================================================================
// Batch queries
// ============================================================================

#[test]
fn all_and_any_over_ops_role() {
    let (_dir, store) = setup();
    let (u, _, _) = ops_user(&store);

    assert!(store.has_all_permissions(u.id, &[("create", "engin"), ("update", "engin")]).unwrap());
    assert!(!store.has_all_permissions(u.id, &[("create", "engin"), ("delete", "engin")]).unwrap());
    assert!(store.has_any_permission(u.id, &[("create", "engin"), ("delete", "engin")]).unwrap());
    assert!(!store.has_any_permission(u.id, &[("delete", "engin"), ("read", "site")]).unwrap());
}

#[test]
fn empty_lists_are_vacuous() {
    let (_dir, store) = setup();
    let (u, _, _) = ops_user(&store);

    assert!(store.has_all_permissions(u.id, &[]).unwrap());
    assert!(!store.has_any_permission(u.id, &[]).unwrap());
    assert!(store.has_all_permissions(UserId(777), &[]).unwrap());
    assert!(store.check_multiple_permissions(u.id, &[]).unwrap().is_empty());
}

#[test]
fn batch_matches_individual_checks() {
    let (_dir, store) = setup();
    let (u, _, _) = ops_user(&store);
    let checks = [("create", "engin"), ("delete", "engin"), ("read", "site"), ("update", "engin")];

    let batch = store.check_multiple_permissions(u.id, &checks).unwrap();
    assert_eq!(batch.len(), checks.len());
    for (a, r) in checks {
        assert_eq!(batch[&format!("{}:{}", a, r)], store.has_permission(u.id, a, r).unwrap());
    }
    assert_eq!(batch["create:engin"], true);
    assert_eq!(batch["delete:engin"], false);
}

// ============================================================================
// Roles
// ============================================================================

#[test]
fn user_without_roles() {
    let (_dir, store) = setup();
    let u = store.transact(|tx| tx.create_user(NewUser::new("u@fleet.test", "U"))).unwrap();

    assert!(store.get_user_roles(u.id).unwrap().is_empty());
    assert!(!store.is_admin(u.id).unwrap());
    assert!(!store.is_super_admin(u.id).unwrap());
    assert!(!store.is_privileged(u.id).unwrap());
}

#[test]
fn role_introspection() {
    let (_dir, store) = setup();
    let (u, _, _) = ops_user(&store);
    let admin = store.transact(|tx| tx.create_role(NewRole::new(ADMIN_ROLE))).unwrap();

    assert!(store.has_role(u.id, "ops").unwrap());
    assert!(!store.has_role(u.id, "OPS").unwrap());
    assert!(!store.is_admin(u.id).unwrap());

    store.assign_role_to_user(u.id, admin.id).unwrap();
    let mut roles = store.get_user_roles(u.id).unwrap();
    roles.sort();
    assert_eq!(roles, vec!["admin".to_string(), "ops".to_string()]);
    assert!(store.is_admin(u.id).unwrap());
    assert!(!store.is_super_admin(u.id).unwrap());
    assert!(store.is_privileged(u.id).unwrap());
}

#[test]
fn has_role_does_not_need_permissions() {
    let (_dir, store) = setup();
    let (u, r) = store
        .transact(|tx| {
            let u = tx.create_user(NewUser::new("u@fleet.test", "U"))?;
            let r = tx.create_role(NewRole::new(SUPER_ADMIN_ROLE))?;
            tx.assign_role(u.id, r.id)?;
            Ok((u, r))
        })
        .unwrap();

    assert!(r.privileged);
    assert!(store.is_super_admin(u.id).unwrap());
    assert!(store.resolve_permissions(u.id).unwrap().is_empty());
}

// ============================================================================
// Mutation primitives
// ============================================================================

#[test]
fn duplicate_assignments_conflict() {
    let (_dir, store) = setup();
    let (u, ops, engin) = ops_user(&store);
    let create = store.permission_by_name("create:engin").unwrap().unwrap();
    assert_eq!(create.resource_id, engin.id);

    assert!(matches!(store.assign_role_to_user(u.id, ops.id), Err(RbacError::Conflict(_))));
    assert!(matches!(store.assign_permission_to_role(ops.id, create.id), Err(RbacError::Conflict(_))));
}

#[test]
fn removing_missing_pairs_is_a_noop() {
    let (_dir, store) = setup();
    let (u, ops, _) = ops_user(&store);
    let delete = store.permission_by_name("delete:engin").unwrap().unwrap();

    assert!(!store.remove_permission_from_role(ops.id, delete.id).unwrap());
    assert!(!store.remove_role_from_user(UserId(123_456), ops.id).unwrap());
    assert!(store.remove_role_from_user(u.id, ops.id).unwrap());
    assert!(!store.remove_role_from_user(u.id, ops.id).unwrap());
}

#[test]
fn assigning_missing_entities_fails() {
    let (_dir, store) = setup();
    let (u, ops, _) = ops_user(&store);

    assert!(matches!(store.assign_role_to_user(u.id, RoleId(9999)), Err(RbacError::NotFound(_))));
    assert!(matches!(store.assign_role_to_user(UserId(9999), ops.id), Err(RbacError::NotFound(_))));
    assert!(matches!(
        store.assign_permission_to_role(ops.id, PermissionId(9999)),
        Err(RbacError::NotFound(_))
    ));
}

#[test]
fn queries_with_colons_never_match() {
    let (_dir, store) = setup();
    let (u, _, _) = ops_user(&store);

    assert!(!store.has_permission(u.id, "create:engin", "").unwrap());
    assert!(!store.has_permission(u.id, "", "create:engin").unwrap());
    assert!(!store.has_permission(u.id, "create", "engin:extra").unwrap());
}
