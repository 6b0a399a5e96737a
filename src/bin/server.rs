//! fleet-rbac HTTP server
//!
//! Run with: cargo run --features server --bin fleet-rbac-server
//!
//! The caller's user id is taken from the `x-user-id` header.
//!
//! Endpoints:
//!   GET    /health                              - Liveness
//!   GET    /users/:id/permissions               - Effective grants (read:permission)
//!   POST   /users/:id/check                     - Batch permission check (read:permission)
//!   POST   /users/:id/roles/:role_id            - Assign role (update:user)
//!   DELETE /users/:id/roles/:role_id            - Remove role (update:user)
//!   POST   /roles/:id/permissions/:perm_id      - Grant permission (update:role)
//!   DELETE /roles/:id/permissions/:perm_id      - Revoke permission (update:role)
//!   GET    /sites                               - Guarded demo route (read:site)
//!   POST   /engins                              - Guarded demo route (create:engin)

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use fleet_rbac::http::{error_response, HeaderSession, HttpGuard};
use fleet_rbac::{seed, PermissionId, RbacConfig, RoleId, RouteGuard, Store, UserId};

// ============================================================================
// State
// ============================================================================

#[derive(Clone)]
struct AppState {
    guard: Arc<HttpGuard>,
}

impl AppState {
    fn store(&self) -> &Store {
        self.guard.store()
    }
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Deserialize)]
struct CheckItem {
    action: String,
    resource: String,
}

#[derive(Deserialize)]
struct CheckReq {
    checks: Vec<CheckItem>,
}

#[derive(Serialize)]
struct GrantsRes {
    user_id: UserId,
    roles: Vec<String>,
    privileged: bool,
    permissions: Vec<String>,
}

#[derive(Serialize)]
struct CheckRes {
    results: HashMap<String, bool>,
    all: bool,
    any: bool,
}

#[derive(Serialize)]
struct ChangeRes {
    changed: bool,
}

// ============================================================================
// Handlers
// ============================================================================

async fn health() -> &'static str {
    "ok"
}

async fn user_permissions(State(st): State<AppState>, headers: HeaderMap, Path(id): Path<u64>) -> Response {
    if let Some(d) = st.guard.protect_read_route(&headers, "permission") {
        return d.into_response();
    }
    match st.store().resolve_grants(UserId(id)) {
        Ok(g) => Json(GrantsRes {
            user_id: UserId(id),
            roles: g.roles,
            privileged: g.privileged,
            permissions: g.permissions.to_strings(),
        })
        .into_response(),
        Err(e) => error_response(&e),
    }
}

async fn check(
    State(st): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<u64>,
    Json(req): Json<CheckReq>,
) -> Response {
    if let Some(d) = st.guard.protect_read_route(&headers, "permission") {
        return d.into_response();
    }
    let pairs: Vec<(&str, &str)> = req.checks.iter().map(|c| (c.action.as_str(), c.resource.as_str())).collect();
    match st.store().check_multiple_permissions(UserId(id), &pairs) {
        Ok(results) => {
            let all = results.values().all(|v| *v);
            let any = results.values().any(|v| *v);
            Json(CheckRes { results, all, any }).into_response()
        }
        Err(e) => error_response(&e),
    }
}

async fn assign_role(State(st): State<AppState>, headers: HeaderMap, Path((id, role)): Path<(u64, u64)>) -> Response {
    if let Some(d) = st.guard.protect_update_route(&headers, "user") {
        return d.into_response();
    }
    match st.store().assign_role_to_user(UserId(id), RoleId(role)) {
        Ok(()) => (StatusCode::CREATED, Json(ChangeRes { changed: true })).into_response(),
        Err(e) => error_response(&e),
    }
}

async fn remove_role(State(st): State<AppState>, headers: HeaderMap, Path((id, role)): Path<(u64, u64)>) -> Response {
    if let Some(d) = st.guard.protect_update_route(&headers, "user") {
        return d.into_response();
    }
    match st.store().remove_role_from_user(UserId(id), RoleId(role)) {
        Ok(changed) => Json(ChangeRes { changed }).into_response(),
        Err(e) => error_response(&e),
    }
}

async fn assign_permission(
    State(st): State<AppState>,
    headers: HeaderMap,
    Path((id, perm)): Path<(u64, u64)>,
) -> Response {
    if let Some(d) = st.guard.protect_update_route(&headers, "role") {
        return d.into_response();
    }
    match st.store().assign_permission_to_role(RoleId(id), PermissionId(perm)) {
        Ok(()) => (StatusCode::CREATED, Json(ChangeRes { changed: true })).into_response(),
        Err(e) => error_response(&e),
    }
}

async fn remove_permission(
    State(st): State<AppState>,
    headers: HeaderMap,
    Path((id, perm)): Path<(u64, u64)>,
) -> Response {
    if let Some(d) = st.guard.protect_update_route(&headers, "role") {
        return d.into_response();
    }
    match st.store().remove_permission_from_role(RoleId(id), PermissionId(perm)) {
        Ok(changed) => Json(ChangeRes { changed }).into_response(),
        Err(e) => error_response(&e),
    }
}

async fn list_sites(State(st): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(d) = st.guard.protect_read_route(&headers, "site") {
        return d.into_response();
    }
    Json(serde_json::json!({ "sites": [] })).into_response()
}

async fn create_engin(State(st): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(d) = st.guard.protect_create_route(&headers, "engin") {
        return d.into_response();
    }
    (StatusCode::CREATED, Json(serde_json::json!({ "created": true }))).into_response()
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cfg = match std::env::var("FLEET_RBAC_CONFIG") {
        Ok(path) => RbacConfig::load(path)?,
        Err(_) => RbacConfig::from_env()?,
    };
    let store = Store::from_config(&cfg)?;
    seed(&store, &cfg)?;

    let state = AppState { guard: Arc::new(RouteGuard::new(store, HeaderSession)) };

    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    let app = Router::new()
        .route("/health", get(health))
        .route("/users/:id/permissions", get(user_permissions))
        .route("/users/:id/check", post(check))
        .route("/users/:id/roles/:role_id", post(assign_role).delete(remove_role))
        .route("/roles/:id/permissions/:perm_id", post(assign_permission).delete(remove_permission))
        .route("/sites", get(list_sites))
        .route("/engins", post(create_engin))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state);

    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".into());
    let addr = format!("0.0.0.0:{}", port);
    info!(%addr, "fleet-rbac server listening");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
