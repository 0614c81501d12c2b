//! Email verification endpoints.

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;

use crate::form::{keys, validate, ActionResult, FieldErrors};

use super::state::AppConfig;
use super::storage::{
    consume_verification_token, enqueue_resend_verification, ResendOutcome,
};
use super::types::{ResendVerificationRequest, VerifyEmailRequest};
use super::utils::hash_token;
use super::FormReply;

/// Verify the email link by consuming the hashed token and marking the
/// account verified.
#[utoipa::path(
    post,
    path = "/v1/auth/verify-email",
    request_body = VerifyEmailRequest,
    responses(
        (status = 200, description = "Email verified", body = ActionResult),
        (status = 409, description = "Invalid, expired, or already used token", body = ActionResult),
        (status = 422, description = "Validation errors", body = ActionResult)
    ),
    tag = "auth"
)]
pub async fn verify_email(
    pool: Extension<PgPool>,
    payload: Option<Json<VerifyEmailRequest>>,
) -> impl IntoResponse {
    let request: VerifyEmailRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let token = request.token.trim();
    if token.is_empty() {
        let mut errors = FieldErrors::new();
        errors.insert("token".to_string(), vec![keys::TOKEN_REQUIRED.to_string()]);
        return FormReply::Rejected(errors).into_response();
    }

    // Hash the token before lookup; raw tokens are never stored server-side.
    let token_hash = hash_token(token);
    let mut tx = match pool.begin().await {
        Ok(tx) => tx,
        Err(err) => {
            error!("Failed to start verify-email transaction: {err}");
            return FormReply::Failed.into_response();
        }
    };

    match consume_verification_token(&mut tx, &token_hash).await {
        Ok(true) => {
            if let Err(err) = tx.commit().await {
                error!("Failed to commit verify-email transaction: {err}");
                return FormReply::Failed.into_response();
            }
            FormReply::Committed(ActionResult::committed_with(keys::EMAIL_VERIFIED))
                .into_response()
        }
        Ok(false) => {
            let _ = tx.rollback().await;
            FormReply::Denied(keys::TOKEN_INVALID).into_response()
        }
        Err(err) => {
            error!("Failed to verify email: {err}");
            let _ = tx.rollback().await;
            FormReply::Failed.into_response()
        }
    }
}

/// Resend a verification email.
///
/// The outcome is always reported as success so the endpoint cannot be used
/// to probe which addresses have accounts.
#[utoipa::path(
    post,
    path = "/v1/auth/resend-verification",
    request_body = ResendVerificationRequest,
    responses(
        (status = 200, description = "Resend accepted", body = ActionResult)
    ),
    tag = "auth"
)]
pub async fn resend_verification(
    pool: Extension<PgPool>,
    config: Extension<Arc<AppConfig>>,
    payload: Option<Json<ResendVerificationRequest>>,
) -> impl IntoResponse {
    let request: ResendVerificationRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let email = validate::normalize_email(&request.email);
    if !validate::valid_email(&email) {
        // Opaque success even for malformed emails, same as unknown ones.
        return FormReply::Committed(ActionResult::committed()).into_response();
    }

    match enqueue_resend_verification(&pool, &email, &config).await {
        Ok(ResendOutcome::Queued | ResendOutcome::Cooldown | ResendOutcome::Noop) => {
            FormReply::Committed(ActionResult::committed()).into_response()
        }
        Err(err) => {
            error!("Failed to enqueue resend verification: {err}");
            // Avoid leaking failures; the caller still sees success.
            FormReply::Committed(ActionResult::committed()).into_response()
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
    async fn verify_email_missing_payload() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = verify_email(Extension(pool), None).await.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn verify_email_empty_token() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = verify_email(
            Extension(pool),
            Some(Json(VerifyEmailRequest {
                token: " ".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        Ok(())
    }

    #[tokio::test]
    async fn resend_verification_missing_payload() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = resend_verification(Extension(pool), Extension(config()), None)
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn resend_verification_is_opaque_for_malformed_email() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = resend_verification(
            Extension(pool),
            Extension(config()),
            Some(Json(ResendVerificationRequest {
                email: "not-an-email".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::OK);
        Ok(())
    }
}
