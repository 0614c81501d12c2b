//! Authenticated principal extraction and authorization helpers.
//!
//! Flow Overview: read the session cookie, resolve it to an account, and
//! return a principal downstream handlers can authorize against. Directory
//! management additionally requires the ADMIN role.

use axum::http::{HeaderMap, StatusCode};
use sqlx::PgPool;

use crate::form::Role;

use super::session::authenticate_session;

/// Authenticated caller context derived from the session cookie.
#[derive(Clone, Debug)]
pub struct Principal {
    pub user_id: uuid::Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
}

/// Resolve a session cookie into a principal, or return 401.
pub async fn require_auth(headers: &HeaderMap, pool: &PgPool) -> Result<Principal, StatusCode> {
    match authenticate_session(headers, pool).await {
        Ok(Some(record)) => Ok(Principal {
            user_id: record.user_id,
            name: record.name,
            email: record.email,
            role: record.role,
        }),
        Ok(None) => Err(StatusCode::UNAUTHORIZED),
        Err(status) => Err(status),
    }
}

/// Like [`require_auth`], but directory management is ADMIN-only.
pub async fn require_admin(headers: &HeaderMap, pool: &PgPool) -> Result<Principal, StatusCode> {
    let principal = require_auth(headers, pool).await?;
    if principal.role != Role::Admin {
        return Err(StatusCode::FORBIDDEN);
    }
    Ok(principal)
}
