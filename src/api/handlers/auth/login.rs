//! Password sign-in.

use axum::{
    extract::Extension,
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;

use crate::form::{keys, validate, ActionResult};

use super::session::session_cookie;
use super::state::AppConfig;
use super::storage::{find_account_by_email, insert_session};
use super::types::LoginRequest;
use super::utils::verify_password;
use super::FormReply;

/// Verify credentials and open a session.
///
/// Unknown email and wrong password produce the same warning so the endpoint
/// cannot be used to probe for accounts.
#[utoipa::path(
    post,
    path = "/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in; session cookie set", body = ActionResult),
        (status = 401, description = "Invalid credentials", body = ActionResult),
        (status = 422, description = "Validation errors", body = ActionResult)
    ),
    tag = "auth"
)]
pub async fn login(
    pool: Extension<PgPool>,
    config: Extension<Arc<AppConfig>>,
    payload: Option<Json<LoginRequest>>,
) -> impl IntoResponse {
    let request: LoginRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let fields = match validate::sign_in(&request.email, &request.password) {
        Ok(fields) => fields,
        Err(errors) => return FormReply::Rejected(errors).into_response(),
    };

    let account = match find_account_by_email(&pool, &fields.email).await {
        Ok(Some(account)) => account,
        Ok(None) => return FormReply::Unauthorized(keys::INVALID_CREDENTIALS).into_response(),
        Err(err) => {
            error!("Failed to lookup account: {err}");
            return FormReply::Failed.into_response();
        }
    };

    if !verify_password(&fields.password, &account.password_hash) {
        return FormReply::Unauthorized(keys::INVALID_CREDENTIALS).into_response();
    }

    let token = match insert_session(&pool, account.id, config.session_ttl_seconds()).await {
        Ok(token) => token,
        Err(err) => {
            error!("Failed to insert session: {err}");
            return FormReply::Failed.into_response();
        }
    };

    let mut headers = HeaderMap::new();
    match session_cookie(&config, &token) {
        Ok(cookie) => {
            headers.insert(SET_COOKIE, cookie);
        }
        Err(err) => {
            error!("Failed to build session cookie: {err}");
            return FormReply::Failed.into_response();
        }
    }

    (StatusCode::OK, headers, Json(ActionResult::committed())).into_response()
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
    async fn login_missing_payload() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = login(Extension(pool), Extension(config()), None)
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn login_rejects_out_of_bounds_password() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let request = LoginRequest {
            email: "alice@example.com".to_string(),
            password: "x".repeat(33),
        };
        let response = login(Extension(pool), Extension(config()), Some(Json(request)))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        Ok(())
    }
}
