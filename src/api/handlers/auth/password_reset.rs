//! Password reset: request a link, then redeem the token.

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;

use crate::form::{keys, validate, ActionResult};

use super::state::AppConfig;
use super::storage::{enqueue_password_reset, reset_password_with_token, ForgotOutcome};
use super::types::{ForgotPasswordRequest, ResetPasswordRequest};
use super::utils::{hash_password, hash_token};
use super::FormReply;

/// Request a reset link.
///
/// The reply is the same whether or not the address has an account; only the
/// owner of the mailbox learns more.
#[utoipa::path(
    post,
    path = "/v1/auth/forgot-password",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 200, description = "Reset link queued if the account exists", body = ActionResult),
        (status = 422, description = "Validation errors", body = ActionResult)
    ),
    tag = "auth"
)]
pub async fn forgot_password(
    pool: Extension<PgPool>,
    config: Extension<Arc<AppConfig>>,
    payload: Option<Json<ForgotPasswordRequest>>,
) -> impl IntoResponse {
    let request: ForgotPasswordRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let fields = match validate::password_forgot(&request.email) {
        Ok(fields) => fields,
        Err(errors) => return FormReply::Rejected(errors).into_response(),
    };

    match enqueue_password_reset(&pool, &fields.email, &config).await {
        Ok(ForgotOutcome::Queued | ForgotOutcome::Noop) => {
            FormReply::Committed(ActionResult::committed_with(keys::RESET_LINK_SENT))
                .into_response()
        }
        Err(err) => {
            error!("Failed to enqueue password reset: {err}");
            FormReply::Failed.into_response()
        }
    }
}

/// Redeem a reset token and set the new password.
///
/// Token consumption and the password write commit together; a token that was
/// already used, expired, or belongs to another email yields a warning and no
/// mutation.
#[utoipa::path(
    post,
    path = "/v1/auth/reset-password",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password reset", body = ActionResult),
        (status = 409, description = "Invalid, expired, or already used token", body = ActionResult),
        (status = 422, description = "Validation errors", body = ActionResult)
    ),
    tag = "auth"
)]
pub async fn reset_password(
    pool: Extension<PgPool>,
    payload: Option<Json<ResetPasswordRequest>>,
) -> impl IntoResponse {
    let request: ResetPasswordRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let fields = match validate::password_reset(
        &request.email,
        &request.token,
        &request.password,
        &request.password_confirmation,
    ) {
        Ok(fields) => fields,
        Err(errors) => return FormReply::Rejected(errors).into_response(),
    };

    let password_hash = match hash_password(&fields.password) {
        Ok(hash) => hash,
        Err(err) => {
            error!("Failed to hash password: {err}");
            return FormReply::Failed.into_response();
        }
    };

    let token_hash = hash_token(&fields.token);
    match reset_password_with_token(&pool, &fields.email, &token_hash, &password_hash).await {
        Ok(true) => FormReply::Committed(ActionResult::committed_with(keys::PASSWORD_RESET_DONE))
            .into_response(),
        Ok(false) => FormReply::Denied(keys::TOKEN_INVALID).into_response(),
        Err(err) => {
            error!("Failed to reset password: {err}");
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
    async fn forgot_password_missing_payload() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = forgot_password(Extension(pool), Extension(config()), None)
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn forgot_password_rejects_malformed_email() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = forgot_password(
            Extension(pool),
            Extension(config()),
            Some(Json(ForgotPasswordRequest {
                email: "not-an-email".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        Ok(())
    }

    #[tokio::test]
    async fn reset_password_rejects_mismatched_confirmation() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = reset_password(
            Extension(pool),
            Some(Json(ResetPasswordRequest {
                email: "alice@example.com".to_string(),
                token: "token".to_string(),
                password: "longenough".to_string(),
                password_confirmation: "different".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        Ok(())
    }
}
