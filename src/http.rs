//! axum integration: denial responses and a header-based session provider

use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::error::{RbacError, Result};
use crate::guard::{Denial, Principal, RouteGuard, SessionProvider};
use crate::model::UserId;

/// Header carrying the authenticated user id, set by the upstream session layer
pub const USER_HEADER: &str = "x-user-id";

impl IntoResponse for Denial {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::SERVICE_UNAVAILABLE);
        (status, Json(self)).into_response()
    }
}

/// Maps store errors raised by handlers (not by the guard) to responses
pub fn error_response(e: &RbacError) -> Response {
    let status = match e {
        RbacError::NotFound(_) => StatusCode::NOT_FOUND,
        RbacError::Conflict(_) | RbacError::Restricted(_) => StatusCode::CONFLICT,
        RbacError::Invalid(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(serde_json::json!({ "error": e.to_string() }))).into_response()
}

/// Reads [`USER_HEADER`]. A missing header is "no session"; a malformed one
/// is a session-layer failure.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderSession;

impl SessionProvider<HeaderMap> for HeaderSession {
    fn principal(&self, headers: &HeaderMap) -> Result<Option<Principal>> {
        let Some(v) = headers.get(USER_HEADER) else {
            return Ok(None);
        };
        let raw = v.to_str().map_err(|e| RbacError::Session(e.to_string()))?;
        let id: u64 = raw
            .trim()
            .parse()
            .map_err(|_| RbacError::Session(format!("malformed {} header", USER_HEADER)))?;
        Ok(Some(Principal::new(UserId(id))))
    }
}

pub type HttpGuard = RouteGuard<HeaderSession>;
