//! Admin-managed user directory.
//!
//! Flow Overview:
//! 1) Authenticate the request via session cookie.
//! 2) Require the ADMIN role for every route here.
//! 3) Run the create/edit validation profile and the business rules, then
//!    apply exactly one mutation.
//!
//! Create and edit use distinct validation profiles selected by the route, so
//! "edit mode" never depends on which fields happen to be present in the
//! payload.

use axum::{
    extract::{Extension, Path, Query},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use std::sync::Arc;
use tracing::error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::form::{
    keys,
    validate::{self, ProfileMode},
    ActionResult, Role,
};

use super::auth::principal::require_admin;
use super::auth::state::AppConfig;
use super::auth::storage::{
    create_account, email_taken_by_other, find_account_by_email, parse_role, soft_delete_account,
    CreateOutcome,
};
use super::auth::utils::{hash_password, is_unique_violation};
use super::auth::FormReply;

#[derive(Debug, Serialize, ToSchema)]
pub struct AccountSummary {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub email_verified: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AccountDetail {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub email_verified: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// Create and edit share one payload; the route decides which profile runs.
#[derive(ToSchema, Serialize, Deserialize, Debug, Default)]
pub struct DirectoryUserRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub password_confirmation: String,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    role: Option<String>,
}

#[utoipa::path(
    get,
    path = "/v1/users",
    params(
        ("role" = Option<String>, Query, description = "Filter by role (ADMIN or USER)")
    ),
    responses(
        (status = 200, description = "Directory listing.", body = [AccountSummary]),
        (status = 400, description = "Unknown role filter."),
        (status = 401, description = "Missing or invalid session cookie."),
        (status = 403, description = "Caller is not an admin."),
    ),
    tag = "users"
)]
pub async fn list_users(
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
    pool: Extension<PgPool>,
) -> impl IntoResponse {
    if let Err(status) = require_admin(&headers, &pool).await {
        return status.into_response();
    }

    let role_filter = match query.role.as_deref() {
        None => None,
        Some(value) => match Role::parse(value) {
            Some(role) => Some(role),
            None => return (StatusCode::BAD_REQUEST, "Unknown role.").into_response(),
        },
    };

    match fetch_account_summaries(&pool, role_filter).await {
        Ok(list) => (StatusCode::OK, Json(list)).into_response(),
        Err(err) => {
            error!("Failed to list accounts: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/v1/users/{id}",
    params(
        ("id" = String, Path, description = "Account id")
    ),
    responses(
        (status = 200, description = "Account detail.", body = AccountDetail),
        (status = 400, description = "Invalid account id."),
        (status = 401, description = "Missing or invalid session cookie."),
        (status = 403, description = "Caller is not an admin."),
        (status = 404, description = "Account not found."),
    ),
    tag = "users"
)]
pub async fn get_user(
    Path(id): Path<String>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
) -> impl IntoResponse {
    if let Err(status) = require_admin(&headers, &pool).await {
        return status.into_response();
    }

    let user_id = match Uuid::parse_str(id.trim()) {
        Ok(id) => id,
        Err(_) => return StatusCode::BAD_REQUEST.into_response(),
    };

    match fetch_account_detail(&pool, user_id).await {
        Ok(Some(detail)) => (StatusCode::OK, Json(detail)).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => {
            error!("Failed to fetch account detail: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Create a directory record with the submitted role.
#[utoipa::path(
    post,
    path = "/v1/users",
    request_body = DirectoryUserRequest,
    responses(
        (status = 200, description = "Account created", body = ActionResult),
        (status = 401, description = "Missing or invalid session cookie."),
        (status = 403, description = "Caller is not an admin."),
        (status = 409, description = "Email already registered", body = ActionResult),
        (status = 422, description = "Validation errors", body = ActionResult)
    ),
    tag = "users"
)]
pub async fn create_user(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    config: Extension<Arc<AppConfig>>,
    payload: Option<Json<DirectoryUserRequest>>,
) -> impl IntoResponse {
    if let Err(status) = require_admin(&headers, &pool).await {
        return status.into_response();
    }

    let request: DirectoryUserRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let fields = match validate::admin_user(
        ProfileMode::Create,
        &request.name,
        &request.email,
        &request.role,
        &request.password,
        &request.password_confirmation,
    ) {
        Ok(fields) => fields,
        Err(errors) => return FormReply::Rejected(errors).into_response(),
    };

    match find_account_by_email(&pool, &fields.email).await {
        Ok(Some(_)) => return FormReply::Denied(keys::EMAIL_ALREADY_REGISTERED).into_response(),
        Ok(None) => {}
        Err(err) => {
            error!("Failed to check email availability: {err}");
            return FormReply::Failed.into_response();
        }
    }

    let Some(password) = fields.password.as_deref() else {
        // The create profile always yields a password.
        return FormReply::Failed.into_response();
    };
    let password_hash = match hash_password(password) {
        Ok(hash) => hash,
        Err(err) => {
            error!("Failed to hash password: {err}");
            return FormReply::Failed.into_response();
        }
    };

    match create_account(
        &pool,
        &fields.name,
        &fields.email,
        &password_hash,
        fields.role,
        &config,
    )
    .await
    {
        Ok(CreateOutcome::Created { .. }) => {
            FormReply::Committed(ActionResult::committed()).into_response()
        }
        Ok(CreateOutcome::Conflict) => {
            FormReply::Denied(keys::EMAIL_ALREADY_REGISTERED).into_response()
        }
        Err(err) => {
            error!("Failed to create account: {err}");
            FormReply::Failed.into_response()
        }
    }
}

/// Edit a directory record; the password only changes when one is submitted.
#[utoipa::path(
    put,
    path = "/v1/users/{id}",
    request_body = DirectoryUserRequest,
    params(
        ("id" = String, Path, description = "Account id")
    ),
    responses(
        (status = 200, description = "Account updated", body = ActionResult),
        (status = 400, description = "Invalid account id."),
        (status = 401, description = "Missing or invalid session cookie."),
        (status = 403, description = "Caller is not an admin."),
        (status = 409, description = "Email conflict or unknown account", body = ActionResult),
        (status = 422, description = "Validation errors", body = ActionResult)
    ),
    tag = "users"
)]
pub async fn update_user(
    Path(id): Path<String>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    payload: Option<Json<DirectoryUserRequest>>,
) -> impl IntoResponse {
    if let Err(status) = require_admin(&headers, &pool).await {
        return status.into_response();
    }

    let user_id = match Uuid::parse_str(id.trim()) {
        Ok(id) => id,
        Err(_) => return StatusCode::BAD_REQUEST.into_response(),
    };

    let request: DirectoryUserRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let fields = match validate::admin_user(
        ProfileMode::Edit,
        &request.name,
        &request.email,
        &request.role,
        &request.password,
        &request.password_confirmation,
    ) {
        Ok(fields) => fields,
        Err(errors) => return FormReply::Rejected(errors).into_response(),
    };

    match email_taken_by_other(&pool, &fields.email, user_id).await {
        Ok(true) => return FormReply::Denied(keys::EMAIL_ALREADY_REGISTERED).into_response(),
        Ok(false) => {}
        Err(err) => {
            error!("Failed to check email ownership: {err}");
            return FormReply::Failed.into_response();
        }
    }

    let password_hash = match fields.password.as_deref().map(hash_password).transpose() {
        Ok(hash) => hash,
        Err(err) => {
            error!("Failed to hash password: {err}");
            return FormReply::Failed.into_response();
        }
    };

    match update_directory_record(
        &pool,
        user_id,
        &fields.name,
        &fields.email,
        fields.role,
        password_hash.as_deref(),
    )
    .await
    {
        Ok(DirectoryUpdate::Updated) => {
            FormReply::Committed(ActionResult::committed()).into_response()
        }
        Ok(DirectoryUpdate::Conflict) => {
            FormReply::Denied(keys::EMAIL_ALREADY_REGISTERED).into_response()
        }
        Ok(DirectoryUpdate::Missing) => FormReply::Denied(keys::ACCOUNT_NOT_FOUND).into_response(),
        Err(err) => {
            error!("Failed to update account: {err}");
            FormReply::Failed.into_response()
        }
    }
}

/// Soft-delete a directory record.
///
/// Deleting the caller's own account through this path is refused with a
/// warning: well-formed input, disallowed action.
#[utoipa::path(
    delete,
    path = "/v1/users/{id}",
    params(
        ("id" = String, Path, description = "Account id")
    ),
    responses(
        (status = 200, description = "Account deleted", body = ActionResult),
        (status = 400, description = "Invalid account id."),
        (status = 401, description = "Missing or invalid session cookie."),
        (status = 403, description = "Caller is not an admin."),
        (status = 409, description = "Self-deletion or unknown account", body = ActionResult),
    ),
    tag = "users"
)]
pub async fn delete_user(
    Path(id): Path<String>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
) -> impl IntoResponse {
    let principal = match require_admin(&headers, &pool).await {
        Ok(principal) => principal,
        Err(status) => return status.into_response(),
    };

    let user_id = match Uuid::parse_str(id.trim()) {
        Ok(id) => id,
        Err(_) => return StatusCode::BAD_REQUEST.into_response(),
    };

    if user_id == principal.user_id {
        return FormReply::Denied(keys::DELETE_OWN_ACCOUNT).into_response();
    }

    match soft_delete_account(&pool, user_id).await {
        Ok(true) => FormReply::Committed(ActionResult::committed()).into_response(),
        Ok(false) => FormReply::Denied(keys::ACCOUNT_NOT_FOUND).into_response(),
        Err(err) => {
            error!("Failed to delete account: {err}");
            FormReply::Failed.into_response()
        }
    }
}

#[derive(Debug)]
enum DirectoryUpdate {
    Updated,
    Conflict,
    Missing,
}

async fn fetch_account_summaries(
    pool: &PgPool,
    role: Option<Role>,
) -> anyhow::Result<Vec<AccountSummary>> {
    let query = r"
        SELECT
            id::text AS id,
            name,
            email,
            role,
            (email_verified_at IS NOT NULL) AS email_verified
        FROM users
        WHERE deleted_at IS NULL
          AND ($1::text IS NULL OR role = $1)
        ORDER BY created_at DESC
    ";
    let rows = sqlx::query(query)
        .bind(role.map(Role::as_str))
        .fetch_all(pool)
        .await?;
    rows.into_iter()
        .map(|row| {
            let role: String = row.get("role");
            Ok(AccountSummary {
                id: row.get("id"),
                name: row.get("name"),
                email: row.get("email"),
                role: parse_role(&role)?,
                email_verified: row.get("email_verified"),
            })
        })
        .collect()
}

async fn fetch_account_detail(pool: &PgPool, user_id: Uuid) -> anyhow::Result<Option<AccountDetail>> {
    let query = r#"
        SELECT
            id::text AS id,
            name,
            email,
            role,
            (email_verified_at IS NOT NULL) AS email_verified,
            to_char(created_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at,
            to_char(updated_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS updated_at
        FROM users
        WHERE id = $1 AND deleted_at IS NULL
        LIMIT 1
    "#;
    let row = sqlx::query(query).bind(user_id).fetch_optional(pool).await?;
    row.map(|row| {
        let role: String = row.get("role");
        Ok(AccountDetail {
            id: row.get("id"),
            name: row.get("name"),
            email: row.get("email"),
            role: parse_role(&role)?,
            email_verified: row.get("email_verified"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    })
    .transpose()
}

async fn update_directory_record(
    pool: &PgPool,
    user_id: Uuid,
    name: &str,
    email: &str,
    role: Role,
    password_hash: Option<&str>,
) -> anyhow::Result<DirectoryUpdate> {
    let query = r"
        UPDATE users
        SET name = $2,
            email = $3,
            role = $4,
            password_hash = COALESCE($5, password_hash),
            updated_at = NOW()
        WHERE id = $1 AND deleted_at IS NULL
    ";
    let result = sqlx::query(query)
        .bind(user_id)
        .bind(name)
        .bind(email)
        .bind(role.as_str())
        .bind(password_hash)
        .execute(pool)
        .await;

    match result {
        Ok(result) if result.rows_affected() > 0 => Ok(DirectoryUpdate::Updated),
        Ok(_) => Ok(DirectoryUpdate::Missing),
        Err(err) if is_unique_violation(&err) => Ok(DirectoryUpdate::Conflict),
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use axum::http::HeaderMap;
    use sqlx::postgres::PgPoolOptions;

    #[tokio::test]
    async fn list_users_requires_session() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = list_users(
            HeaderMap::new(),
            Query(ListQuery { role: None }),
            Extension(pool),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn delete_user_requires_session() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = delete_user(
            Path("not-a-uuid".to_string()),
            HeaderMap::new(),
            Extension(pool),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }
}
