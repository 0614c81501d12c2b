//! Self-registration of an admin account.

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;

use crate::form::{keys, validate, ActionResult};

use super::state::AppConfig;
use super::storage::{create_account, find_account_by_email, CreateOutcome};
use super::types::RegisterRequest;
use super::utils::hash_password;
use super::FormReply;

/// Register a new admin account and queue its verification email.
#[utoipa::path(
    post,
    path = "/v1/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "Account created", body = ActionResult),
        (status = 409, description = "Email already registered", body = ActionResult),
        (status = 422, description = "Validation errors", body = ActionResult)
    ),
    tag = "auth"
)]
pub async fn register(
    pool: Extension<PgPool>,
    config: Extension<Arc<AppConfig>>,
    payload: Option<Json<RegisterRequest>>,
) -> impl IntoResponse {
    let request: RegisterRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let fields = match validate::create_admin(
        &request.name,
        &request.email,
        &request.password,
        &request.password_confirmation,
    ) {
        Ok(fields) => fields,
        Err(errors) => return FormReply::Rejected(errors).into_response(),
    };

    // Friendly pre-check; the partial unique index still backstops races.
    match find_account_by_email(&pool, &fields.email).await {
        Ok(Some(_)) => return FormReply::Denied(keys::EMAIL_ALREADY_REGISTERED).into_response(),
        Ok(None) => {}
        Err(err) => {
            error!("Failed to check email availability: {err}");
            return FormReply::Failed.into_response();
        }
    }

    let password_hash = match hash_password(&fields.password) {
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
        crate::form::Role::Admin,
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

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use sqlx::postgres::PgPoolOptions;

    fn config() -> Arc<AppConfig> {
        Arc::new(AppConfig::new("http://localhost:3000".to_string()))
    }

    #[tokio::test]
    async fn register_missing_payload() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = register(Extension(pool), Extension(config()), None)
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn register_rejects_invalid_fields_before_touching_storage() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let request = RegisterRequest {
            name: String::new(),
            email: "a@b.com".to_string(),
            password: "short".to_string(),
            password_confirmation: "short".to_string(),
        };
        let response = register(Extension(pool), Extension(config()), Some(Json(request)))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        Ok(())
    }
}
