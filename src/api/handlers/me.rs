//! Authenticated self-service endpoints.
//!
//! Flow Overview:
//! 1) Authenticate via session cookie.
//! 2) Validate the submitted fields for the operation.
//! 3) Re-check the business rules (email ownership, current password).
//! 4) Apply exactly one mutation and answer with an `ActionResult`.

use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use tracing::error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::form::{keys, validate, ActionResult, Role};

use super::auth::principal::require_auth;
use super::auth::storage::{
    email_taken_by_other, find_account_by_id, parse_role, soft_delete_account,
    update_password_hash, update_profile_fields, UpdateOutcome,
};
use super::auth::utils::{hash_password, verify_password};
use super::auth::FormReply;

#[derive(Debug, Serialize, ToSchema)]
pub struct ProfileResponse {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub email_verified: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Default)]
pub struct ProfileUpdateRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Default)]
pub struct PasswordUpdateRequest {
    #[serde(default)]
    pub current_password: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub password_confirmation: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Default)]
pub struct DeleteAccountRequest {
    #[serde(default)]
    pub password: String,
}

#[utoipa::path(
    get,
    path = "/v1/me",
    responses(
        (status = 200, description = "The authenticated account profile.", body = ProfileResponse),
        (status = 401, description = "Missing or invalid session cookie."),
    ),
    tag = "me"
)]
pub async fn get_me(headers: HeaderMap, pool: Extension<PgPool>) -> impl IntoResponse {
    let principal = match require_auth(&headers, &pool).await {
        Ok(principal) => principal,
        Err(status) => return status.into_response(),
    };

    match fetch_profile(&pool, principal.user_id).await {
        Ok(Some(profile)) => (StatusCode::OK, Json(profile)).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => {
            error!("Failed to fetch profile: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Update the caller's name and email.
#[utoipa::path(
    patch,
    path = "/v1/me",
    request_body = ProfileUpdateRequest,
    responses(
        (status = 200, description = "Profile saved", body = ActionResult),
        (status = 401, description = "Missing or invalid session cookie."),
        (status = 409, description = "Email owned by another account", body = ActionResult),
        (status = 422, description = "Validation errors", body = ActionResult)
    ),
    tag = "me"
)]
pub async fn update_profile(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    payload: Option<Json<ProfileUpdateRequest>>,
) -> impl IntoResponse {
    let principal = match require_auth(&headers, &pool).await {
        Ok(principal) => principal,
        Err(status) => return status.into_response(),
    };

    let request: ProfileUpdateRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let fields = match validate::profile_update(&request.name, &request.email) {
        Ok(fields) => fields,
        Err(errors) => return FormReply::Rejected(errors).into_response(),
    };

    match email_taken_by_other(&pool, &fields.email, principal.user_id).await {
        Ok(true) => return FormReply::Denied(keys::EMAIL_ALREADY_REGISTERED).into_response(),
        Ok(false) => {}
        Err(err) => {
            error!("Failed to check email ownership: {err}");
            return FormReply::Failed.into_response();
        }
    }

    match update_profile_fields(&pool, principal.user_id, &fields.name, &fields.email).await {
        Ok(UpdateOutcome::Updated) => FormReply::Committed(ActionResult::saved()).into_response(),
        Ok(UpdateOutcome::Conflict) => {
            FormReply::Denied(keys::EMAIL_ALREADY_REGISTERED).into_response()
        }
        Ok(UpdateOutcome::Missing) => FormReply::Denied(keys::ACCOUNT_NOT_FOUND).into_response(),
        Err(err) => {
            error!("Failed to update profile: {err}");
            FormReply::Failed.into_response()
        }
    }
}

/// Change the caller's password after re-confirming the current one.
#[utoipa::path(
    put,
    path = "/v1/me/password",
    request_body = PasswordUpdateRequest,
    responses(
        (status = 200, description = "Password changed", body = ActionResult),
        (status = 401, description = "Missing or invalid session cookie."),
        (status = 409, description = "Current password incorrect", body = ActionResult),
        (status = 422, description = "Validation errors", body = ActionResult)
    ),
    tag = "me"
)]
pub async fn update_password(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    payload: Option<Json<PasswordUpdateRequest>>,
) -> impl IntoResponse {
    let principal = match require_auth(&headers, &pool).await {
        Ok(principal) => principal,
        Err(status) => return status.into_response(),
    };

    let request: PasswordUpdateRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let fields = match validate::password_update(
        &request.current_password,
        &request.password,
        &request.password_confirmation,
    ) {
        Ok(fields) => fields,
        Err(errors) => return FormReply::Rejected(errors).into_response(),
    };

    let account = match find_account_by_id(&pool, principal.user_id).await {
        Ok(Some(account)) => account,
        Ok(None) => return FormReply::Denied(keys::ACCOUNT_NOT_FOUND).into_response(),
        Err(err) => {
            error!("Failed to load account: {err}");
            return FormReply::Failed.into_response();
        }
    };

    // A stale current password fails here even when the session is valid, so
    // a repeat submission after a successful change is denied.
    if !verify_password(&fields.current_password, &account.password_hash) {
        return FormReply::Denied(keys::CURRENT_PASSWORD_INCORRECT).into_response();
    }

    let password_hash = match hash_password(&fields.password) {
        Ok(hash) => hash,
        Err(err) => {
            error!("Failed to hash password: {err}");
            return FormReply::Failed.into_response();
        }
    };

    match update_password_hash(&pool, principal.user_id, &password_hash).await {
        Ok(true) => FormReply::Committed(ActionResult::committed()).into_response(),
        Ok(false) => FormReply::Denied(keys::ACCOUNT_NOT_FOUND).into_response(),
        Err(err) => {
            error!("Failed to update password: {err}");
            FormReply::Failed.into_response()
        }
    }
}

/// Soft-delete the caller's account after password re-confirmation.
#[utoipa::path(
    post,
    path = "/v1/me/delete",
    request_body = DeleteAccountRequest,
    responses(
        (status = 200, description = "Account deleted; the client ends the session", body = ActionResult),
        (status = 401, description = "Missing or invalid session cookie."),
        (status = 409, description = "Password incorrect", body = ActionResult),
        (status = 422, description = "Validation errors", body = ActionResult)
    ),
    tag = "me"
)]
pub async fn delete_account(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    payload: Option<Json<DeleteAccountRequest>>,
) -> impl IntoResponse {
    let principal = match require_auth(&headers, &pool).await {
        Ok(principal) => principal,
        Err(status) => return status.into_response(),
    };

    let request: DeleteAccountRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let fields = match validate::account_delete(&request.password) {
        Ok(fields) => fields,
        Err(errors) => return FormReply::Rejected(errors).into_response(),
    };

    let account = match find_account_by_id(&pool, principal.user_id).await {
        Ok(Some(account)) => account,
        Ok(None) => return FormReply::Denied(keys::ACCOUNT_NOT_FOUND).into_response(),
        Err(err) => {
            error!("Failed to load account: {err}");
            return FormReply::Failed.into_response();
        }
    };

    if !verify_password(&fields.password, &account.password_hash) {
        return FormReply::Denied(keys::PASSWORD_INCORRECT).into_response();
    }

    match soft_delete_account(&pool, principal.user_id).await {
        Ok(true) => FormReply::Committed(ActionResult::committed()).into_response(),
        Ok(false) => FormReply::Denied(keys::ACCOUNT_NOT_FOUND).into_response(),
        Err(err) => {
            error!("Failed to delete account: {err}");
            FormReply::Failed.into_response()
        }
    }
}

async fn fetch_profile(pool: &PgPool, user_id: Uuid) -> anyhow::Result<Option<ProfileResponse>> {
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
        Ok(ProfileResponse {
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

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use sqlx::postgres::PgPoolOptions;

    #[tokio::test]
    async fn get_me_requires_session() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = get_me(HeaderMap::new(), Extension(pool)).await.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn update_profile_requires_session() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = update_profile(
            HeaderMap::new(),
            Extension(pool),
            Some(Json(ProfileUpdateRequest {
                name: "Alice".to_string(),
                email: "alice@example.com".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn delete_account_requires_session() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = delete_account(
            HeaderMap::new(),
            Extension(pool),
            Some(Json(DeleteAccountRequest {
                password: "longenough".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }
}
