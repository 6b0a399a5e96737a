//! Route guard decisions: bypass, 401, 403, fail-closed 503

use fleet_rbac::*;
use tempfile::TempDir;

/// Stand-in for an inbound request carrying an optional session
struct Req {
    session: Option<UserId>,
    broken: bool,
}

impl Req {
    fn as_user(id: UserId) -> Self {
        Req { session: Some(id), broken: false }
    }

    fn anonymous() -> Self {
        Req { session: None, broken: false }
    }

    fn broken_session() -> Self {
        Req { session: None, broken: true }
    }
}

fn session(req: &Req) -> Result<Option<Principal>> {
    if req.broken {
        return Err(RbacError::Session("session backend unreachable".into()));
    }
    Ok(req.session.map(Principal::new))
}

type Guard = RouteGuard<fn(&Req) -> Result<Option<Principal>>>;

fn setup() -> (TempDir, Guard) {
    let dir = TempDir::new().unwrap();
    let store = Store::open_path(dir.path()).unwrap();
    (dir, RouteGuard::new(store, session as fn(&Req) -> Result<Option<Principal>>))
}

/// A user holding exactly one role that grants nothing
fn user_with_empty_role(store: &Store, role: NewRole) -> User {
    store
        .transact(|tx| {
            tx.create_resource(NewResource::new("site", "Sites"))?;
            let r = tx.create_role(role)?;
            let u = tx.create_user(NewUser::new("u@fleet.test", "U"))?;
            tx.assign_role(u.id, r.id)?;
            Ok(u)
        })
        .unwrap()
}

// ============================================================================
// Privileged bypass
// ============================================================================

#[test]
fn admin_without_permissions_is_let_through() {
    let (_dir, guard) = setup();
    let u = user_with_empty_role(guard.store(), NewRole::new(ADMIN_ROLE));
    let req = Req::as_user(u.id);

    assert!(guard.protect_route(&req, "delete", "site").is_none());
    assert!(guard.protect_route(&req, "purge", "nonexistent-resource").is_none());
    assert_eq!(guard.evaluate(&req, "read", "site"), Decision::Bypassed);
}

#[test]
fn super_admin_is_let_through() {
    let (_dir, guard) = setup();
    let u = user_with_empty_role(guard.store(), NewRole::new(SUPER_ADMIN_ROLE));
    assert!(guard.protect_delete_route(&Req::as_user(u.id), "engin").is_none());
}

#[test]
fn editor_without_permissions_is_forbidden() {
    let (_dir, guard) = setup();
    let u = user_with_empty_role(guard.store(), NewRole::new("editor"));

    let denial = guard.protect_route(&Req::as_user(u.id), "read", "site").unwrap();
    assert_eq!(denial.status, 403);
    assert_eq!(denial.code, DenialCode::Forbidden);
}

#[test]
fn privilege_is_role_data_not_name() {
    let (_dir, guard) = setup();
    let u = user_with_empty_role(guard.store(), NewRole::new("fleet-owner").privileged(true));
    assert_eq!(guard.evaluate(&Req::as_user(u.id), "delete", "site"), Decision::Bypassed);

    let role = guard.store().role_by_name("fleet-owner").unwrap().unwrap();
    guard.store().transact(|tx| tx.set_role_privileged(role.id, false)).unwrap();
    assert_eq!(guard.evaluate(&Req::as_user(u.id), "delete", "site"), Decision::Forbidden);
}

#[test]
fn bypass_follows_configured_privileged_roles() {
    let dir = TempDir::new().unwrap();
    let policy = PolicySettings { privileged_roles: vec!["root".into()], ..Default::default() };
    let store = Store::open(&StorageSettings::at(dir.path()), &policy).unwrap();
    let guard: Guard = RouteGuard::new(store, session as fn(&Req) -> Result<Option<Principal>>);

    let admin = user_with_empty_role(guard.store(), NewRole::new(ADMIN_ROLE));
    assert!(guard.store().is_admin(admin.id).unwrap());
    assert_eq!(guard.evaluate(&Req::as_user(admin.id), "read", "site"), Decision::Forbidden);

    let root = guard
        .store()
        .transact(|tx| {
            let r = tx.create_role(NewRole::new("root"))?;
            let u = tx.create_user(NewUser::new("root@fleet.test", "Root"))?;
            tx.assign_role(u.id, r.id)?;
            Ok(u)
        })
        .unwrap();
    assert!(!guard.store().is_admin(root.id).unwrap());
    assert_eq!(guard.evaluate(&Req::as_user(root.id), "read", "site"), Decision::Bypassed);
}

// ============================================================================
// Authentication and permission checks
// ============================================================================

#[test]
fn no_session_is_unauthenticated() {
    let (_dir, guard) = setup();
    let denial = guard.protect_route(&Req::anonymous(), "read", "site").unwrap();
    assert_eq!(denial.status, 401);
    assert_eq!(denial.code, DenialCode::Unauthenticated);
}

#[test]
fn permission_decides_for_regular_users() {
    let (_dir, guard) = setup();
    let u = guard
        .store()
        .transact(|tx| {
            let site = tx.create_resource(NewResource::new("site", "Sites"))?;
            let read = tx.create_permission(NewPermission::for_resource(READ, &site))?;
            let viewer = tx.create_role(NewRole::new("viewer"))?;
            tx.assign_permission(viewer.id, read.id)?;
            let u = tx.create_user(NewUser::new("v@fleet.test", "V"))?;
            tx.assign_role(u.id, viewer.id)?;
            Ok(u)
        })
        .unwrap();
    let req = Req::as_user(u.id);

    assert_eq!(guard.evaluate(&req, "read", "site"), Decision::Allowed);
    assert!(guard.protect_read_route(&req, "site").is_none());
    assert_eq!(guard.protect_update_route(&req, "site").unwrap().status, 403);
    assert_eq!(guard.protect_create_route(&req, "site").unwrap().status, 403);
    assert_eq!(guard.protect_delete_route(&req, "site").unwrap().status, 403);
    assert_eq!(guard.protect_write_route(&req, "site").unwrap().status, 403);
}

#[test]
fn unknown_user_in_session_is_forbidden() {
    let (_dir, guard) = setup();
    let denial = guard.protect_route(&Req::as_user(UserId(31337)), "read", "site").unwrap();
    assert_eq!(denial.status, 403);
}

#[test]
fn write_sugar_checks_write_action() {
    let (_dir, guard) = setup();
    let u = guard
        .store()
        .transact(|tx| {
            let panne = tx.create_resource(NewResource::new("panne", "Pannes"))?;
            let write = tx.create_permission(NewPermission::for_resource(WRITE, &panne))?;
            let tech = tx.create_role(NewRole::new("technicien"))?;
            tx.assign_permission(tech.id, write.id)?;
            let u = tx.create_user(NewUser::new("t@fleet.test", "T"))?;
            tx.assign_role(u.id, tech.id)?;
            Ok(u)
        })
        .unwrap();

    assert!(guard.protect_write_route(&Req::as_user(u.id), "panne").is_none());
    assert!(guard.protect_update_route(&Req::as_user(u.id), "panne").is_some());
}

#[test]
fn revocation_applies_to_next_request() {
    let (_dir, guard) = setup();
    let (u, role, perm) = guard
        .store()
        .transact(|tx| {
            let engin = tx.create_resource(NewResource::new("engin", "Engins"))?;
            let p = tx.create_permission(NewPermission::for_resource(UPDATE, &engin))?;
            let r = tx.create_role(NewRole::new("ops"))?;
            tx.assign_permission(r.id, p.id)?;
            let u = tx.create_user(NewUser::new("o@fleet.test", "O"))?;
            tx.assign_role(u.id, r.id)?;
            Ok((u, r, p))
        })
        .unwrap();
    let req = Req::as_user(u.id);
    assert!(guard.protect_update_route(&req, "engin").is_none());

    guard.store().remove_permission_from_role(role.id, perm.id).unwrap();
    assert_eq!(guard.protect_update_route(&req, "engin").unwrap().status, 403);
}

// ============================================================================
// Fail closed
// ============================================================================

#[test]
fn session_failure_is_503_not_allow() {
    let (_dir, guard) = setup();
    let decision = guard.evaluate(&Req::broken_session(), "read", "site");
    assert!(matches!(decision, Decision::Failed(RbacError::Session(_))));

    let denial = guard.protect_route(&Req::broken_session(), "read", "site").unwrap();
    assert_eq!(denial.status, 503);
    assert_eq!(denial.code, DenialCode::AuthorizationUnavailable);
}

#[test]
fn explicit_principal_skips_session_provider() {
    let (_dir, guard) = setup();
    let u = user_with_empty_role(guard.store(), NewRole::new(ADMIN_ROLE));

    assert_eq!(guard.decide(None, "read", "site"), Decision::Unauthenticated);
    assert_eq!(guard.decide(Some(&Principal::new(u.id)), "read", "site"), Decision::Bypassed);
}

#[test]
fn closure_sessions_work() {
    let dir = TempDir::new().unwrap();
    let store = Store::open_path(dir.path()).unwrap();
    let u = user_with_empty_role(&store, NewRole::new(ADMIN_ROLE));
    let guard = RouteGuard::new(store, move |_: &()| -> Result<Option<Principal>> {
        Ok(Some(Principal::new(u.id)))
    });
    assert!(guard.protect_read_route(&(), "site").is_none());
}
