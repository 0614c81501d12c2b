//! Database gateway for accounts, sessions, and single-use tokens.
//!
//! Soft-deleted accounts are excluded from every lookup here; a deleted row
//! only exists for audit. Mutations that owe the user an email enqueue the
//! outbox row inside their own transaction.

use anyhow::{anyhow, Context, Result};
use serde_json::json;
use sqlx::{PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use crate::api::email::{TEMPLATE_RESET_PASSWORD, TEMPLATE_VERIFY_EMAIL};
use crate::form::Role;

use super::state::AppConfig;
use super::utils::{
    build_reset_url, build_verify_url, generate_token, hash_token, is_unique_violation,
};

/// Account row as needed by credential checks.
#[derive(Debug)]
pub(crate) struct AccountRecord {
    pub(crate) id: Uuid,
    pub(crate) password_hash: String,
}

/// Outcome when attempting to create a new account + verification record.
#[derive(Debug)]
pub(crate) enum CreateOutcome {
    Created { id: Uuid },
    Conflict,
}

/// Outcome of an account field update.
#[derive(Debug)]
pub(crate) enum UpdateOutcome {
    Updated,
    Conflict,
    Missing,
}

/// Outcome for a resend request (outcome stays opaque to the caller).
#[derive(Debug)]
pub(crate) enum ResendOutcome {
    Queued,
    Cooldown,
    Noop,
}

/// Outcome for a password-reset request (also opaque to the caller).
#[derive(Debug)]
pub(crate) enum ForgotOutcome {
    Queued,
    Noop,
}

/// Minimal data returned for a valid session cookie.
#[derive(Debug)]
pub(crate) struct SessionRecord {
    pub(crate) user_id: Uuid,
    pub(crate) name: String,
    pub(crate) email: String,
    pub(crate) role: Role,
}

pub(crate) fn parse_role(value: &str) -> Result<Role> {
    Role::parse(value).ok_or_else(|| anyhow!("unknown role stored for account: {value}"))
}

fn account_from_row(row: &sqlx::postgres::PgRow) -> AccountRecord {
    AccountRecord {
        id: row.get("id"),
        password_hash: row.get("password_hash"),
    }
}

pub(crate) async fn find_account_by_email(
    pool: &PgPool,
    email: &str,
) -> Result<Option<AccountRecord>> {
    let query = r"
        SELECT id, password_hash
        FROM users
        WHERE email = $1 AND deleted_at IS NULL
        LIMIT 1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup account by email")?;

    Ok(row.as_ref().map(account_from_row))
}

pub(crate) async fn find_account_by_id(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Option<AccountRecord>> {
    let query = r"
        SELECT id, password_hash
        FROM users
        WHERE id = $1 AND deleted_at IS NULL
        LIMIT 1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(user_id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup account by id")?;

    Ok(row.as_ref().map(account_from_row))
}

/// Does a different non-deleted account already own this email?
pub(crate) async fn email_taken_by_other(
    pool: &PgPool,
    email: &str,
    excluding: Uuid,
) -> Result<bool> {
    let query = r"
        SELECT 1
        FROM users
        WHERE email = $1 AND id <> $2 AND deleted_at IS NULL
        LIMIT 1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .bind(excluding)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to check email ownership")?;
    Ok(row.is_some())
}

/// Create an account plus its verification token and outbox row in one
/// transaction. The partial unique index on active emails is the concurrency
/// backstop behind the handler's pre-check.
pub(crate) async fn create_account(
    pool: &PgPool,
    name: &str,
    email: &str,
    password_hash: &str,
    role: Role,
    config: &AppConfig,
) -> Result<CreateOutcome> {
    let mut tx = pool.begin().await.context("begin create transaction")?;

    let query = r"
        INSERT INTO users (name, email, password_hash, role)
        VALUES ($1, $2, $3, $4)
        RETURNING id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(name)
        .bind(email)
        .bind(password_hash)
        .bind(role.as_str())
        .fetch_one(&mut *tx)
        .instrument(span)
        .await;

    let user_id: Uuid = match row {
        Ok(row) => row.get("id"),
        Err(err) => {
            if is_unique_violation(&err) {
                let _ = tx.rollback().await;
                return Ok(CreateOutcome::Conflict);
            }
            return Err(err).context("failed to insert account");
        }
    };

    let _token = insert_verification_records(&mut tx, user_id, email, config).await?;

    tx.commit().await.context("commit create transaction")?;

    Ok(CreateOutcome::Created { id: user_id })
}

pub(crate) async fn insert_verification_records(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    user_id: Uuid,
    email: &str,
    config: &AppConfig,
) -> Result<String> {
    // Generate a raw token for the email link and store only its hash.
    let token = generate_token()?;
    let token_hash = hash_token(&token);

    let query = r"
        INSERT INTO email_verification_tokens (user_id, token_hash, expires_at)
        VALUES ($1, $2, NOW() + ($3 * INTERVAL '1 second'))
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .bind(token_hash)
        .bind(config.verify_token_ttl_seconds())
        .execute(&mut **tx)
        .instrument(span)
        .await
        .context("failed to insert email verification token")?;

    let verify_url = build_verify_url(config.base_url(), email, &token);
    enqueue_outbox(tx, email, TEMPLATE_VERIFY_EMAIL, &json!({
        "email": email,
        "verify_url": verify_url,
    }))
    .await?;

    Ok(token)
}

async fn enqueue_outbox(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    to_email: &str,
    template: &str,
    payload: &serde_json::Value,
) -> Result<()> {
    let payload_text = serde_json::to_string(payload).context("failed to serialize email payload")?;

    let query = r"
        INSERT INTO email_outbox (to_email, template, payload_json)
        VALUES ($1, $2, $3::jsonb)
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(to_email)
        .bind(template)
        .bind(payload_text)
        .execute(&mut **tx)
        .instrument(span)
        .await
        .context("failed to insert email outbox row")?;

    Ok(())
}

/// Consume a verification token and mark the owning account verified, in the
/// caller's transaction. Returns false when the token is unknown, expired, or
/// already consumed; the conditional update makes sure exactly one of two
/// racing requests wins.
pub(crate) async fn consume_verification_token(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    token_hash: &[u8],
) -> Result<bool> {
    let query = r"
        UPDATE email_verification_tokens
        SET consumed_at = NOW()
        WHERE token_hash = $1
          AND consumed_at IS NULL
          AND expires_at > NOW()
        RETURNING user_id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(token_hash)
        .fetch_optional(&mut **tx)
        .instrument(span)
        .await
        .context("failed to consume verification token")?;

    let Some(row) = row else {
        return Ok(false);
    };

    let user_id: Uuid = row.get("user_id");
    let query = r"
        UPDATE users
        SET email_verified_at = NOW(),
            updated_at = NOW()
        WHERE id = $1 AND deleted_at IS NULL
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .execute(&mut **tx)
        .instrument(span)
        .await
        .context("failed to mark account verified")?;

    Ok(true)
}

pub(crate) async fn enqueue_resend_verification(
    pool: &PgPool,
    email: &str,
    config: &AppConfig,
) -> Result<ResendOutcome> {
    let mut tx = pool.begin().await.context("begin resend transaction")?;

    let query = r"
        SELECT id, email, (email_verified_at IS NOT NULL) AS verified
        FROM users
        WHERE email = $1 AND deleted_at IS NULL
        LIMIT 1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .fetch_optional(&mut *tx)
        .instrument(span)
        .await
        .context("failed to lookup account for resend")?;

    let Some(row) = row else {
        tx.commit().await.context("commit resend noop")?;
        return Ok(ResendOutcome::Noop);
    };

    let already_verified: bool = row.get("verified");
    if already_verified {
        tx.commit().await.context("commit resend noop")?;
        return Ok(ResendOutcome::Noop);
    }

    let user_id: Uuid = row.get("id");
    if resend_cooldown_active(&mut tx, user_id, config.resend_cooldown_seconds()).await? {
        tx.commit().await.context("commit resend cooldown")?;
        return Ok(ResendOutcome::Cooldown);
    }

    let email: String = row.get("email");
    let _ = insert_verification_records(&mut tx, user_id, &email, config).await?;
    tx.commit().await.context("commit resend enqueue")?;
    Ok(ResendOutcome::Queued)
}

async fn resend_cooldown_active(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    user_id: Uuid,
    cooldown_seconds: i64,
) -> Result<bool> {
    // Cooldown prevents repeated resend requests from spamming the outbox.
    let query = r"
        SELECT 1
        FROM email_verification_tokens
        WHERE user_id = $1
          AND created_at > NOW() - ($2 * INTERVAL '1 second')
        LIMIT 1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(user_id)
        .bind(cooldown_seconds)
        .fetch_optional(&mut **tx)
        .instrument(span)
        .await
        .context("failed to check resend cooldown")?;
    Ok(row.is_some())
}

/// Record a reset token and its outbox row if the email belongs to an active
/// account. The caller reports the same outcome either way.
pub(crate) async fn enqueue_password_reset(
    pool: &PgPool,
    email: &str,
    config: &AppConfig,
) -> Result<ForgotOutcome> {
    let mut tx = pool.begin().await.context("begin forgot transaction")?;

    let query = r"
        SELECT id, email
        FROM users
        WHERE email = $1 AND deleted_at IS NULL
        LIMIT 1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .fetch_optional(&mut *tx)
        .instrument(span)
        .await
        .context("failed to lookup account for reset")?;

    let Some(row) = row else {
        tx.commit().await.context("commit forgot noop")?;
        return Ok(ForgotOutcome::Noop);
    };

    let user_id: Uuid = row.get("id");
    let email: String = row.get("email");

    let token = generate_token()?;
    let token_hash = hash_token(&token);

    let query = r"
        INSERT INTO password_reset_tokens (user_id, token_hash, expires_at)
        VALUES ($1, $2, NOW() + ($3 * INTERVAL '1 second'))
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .bind(token_hash)
        .bind(config.reset_token_ttl_seconds())
        .execute(&mut *tx)
        .instrument(span)
        .await
        .context("failed to insert password reset token")?;

    let reset_url = build_reset_url(config.base_url(), &email, &token);
    enqueue_outbox(&mut tx, &email, TEMPLATE_RESET_PASSWORD, &json!({
        "email": email,
        "reset_url": reset_url,
    }))
    .await?;

    tx.commit().await.context("commit forgot enqueue")?;
    Ok(ForgotOutcome::Queued)
}

/// Consume a reset token and write the new password hash in one transaction.
///
/// The conditional update is the whole race story: of two concurrent requests
/// holding the same token, exactly one sees `consumed_at IS NULL` and commits;
/// the other returns false and the caller reports the token as used.
pub(crate) async fn reset_password_with_token(
    pool: &PgPool,
    email: &str,
    token_hash: &[u8],
    new_password_hash: &str,
) -> Result<bool> {
    let mut tx = pool.begin().await.context("begin reset transaction")?;

    let query = r"
        UPDATE password_reset_tokens AS prt
        SET consumed_at = NOW()
        FROM users AS u
        WHERE prt.token_hash = $1
          AND prt.consumed_at IS NULL
          AND prt.expires_at > NOW()
          AND u.id = prt.user_id
          AND u.email = $2
          AND u.deleted_at IS NULL
        RETURNING u.id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(token_hash)
        .bind(email)
        .fetch_optional(&mut *tx)
        .instrument(span)
        .await
        .context("failed to consume reset token")?;

    let Some(row) = row else {
        let _ = tx.rollback().await;
        return Ok(false);
    };

    let user_id: Uuid = row.get("id");
    let query = r"
        UPDATE users
        SET password_hash = $2,
            updated_at = NOW()
        WHERE id = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .bind(new_password_hash)
        .execute(&mut *tx)
        .instrument(span)
        .await
        .context("failed to store reset password")?;

    tx.commit().await.context("commit reset transaction")?;
    Ok(true)
}

pub(crate) async fn update_password_hash(
    pool: &PgPool,
    user_id: Uuid,
    password_hash: &str,
) -> Result<bool> {
    let query = r"
        UPDATE users
        SET password_hash = $2,
            updated_at = NOW()
        WHERE id = $1 AND deleted_at IS NULL
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(user_id)
        .bind(password_hash)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to update password hash")?;
    Ok(result.rows_affected() > 0)
}

pub(crate) async fn update_profile_fields(
    pool: &PgPool,
    user_id: Uuid,
    name: &str,
    email: &str,
) -> Result<UpdateOutcome> {
    let query = r"
        UPDATE users
        SET name = $2,
            email = $3,
            updated_at = NOW()
        WHERE id = $1 AND deleted_at IS NULL
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(user_id)
        .bind(name)
        .bind(email)
        .execute(pool)
        .instrument(span)
        .await;

    match result {
        Ok(result) if result.rows_affected() > 0 => Ok(UpdateOutcome::Updated),
        Ok(_) => Ok(UpdateOutcome::Missing),
        Err(err) if is_unique_violation(&err) => Ok(UpdateOutcome::Conflict),
        Err(err) => Err(err).context("failed to update profile fields"),
    }
}

pub(crate) async fn soft_delete_account(pool: &PgPool, user_id: Uuid) -> Result<bool> {
    // Already-deleted rows are left untouched so the marker keeps its
    // original timestamp.
    let query = r"
        UPDATE users
        SET deleted_at = NOW(),
            updated_at = NOW()
        WHERE id = $1 AND deleted_at IS NULL
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(user_id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to soft delete account")?;
    Ok(result.rows_affected() > 0)
}

pub(crate) async fn insert_session(
    pool: &PgPool,
    user_id: Uuid,
    ttl_seconds: i64,
) -> Result<String> {
    // Generate a random token, store only its hash, and return the raw value
    // so the caller can set the session cookie.
    let query = r"
        INSERT INTO user_sessions (user_id, session_hash, expires_at)
        VALUES ($1, $2, NOW() + ($3 * INTERVAL '1 second'))
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );

    for _ in 0..3 {
        let token = generate_token()?;
        let token_hash = hash_token(&token);
        let result = sqlx::query(query)
            .bind(user_id)
            .bind(token_hash)
            .bind(ttl_seconds)
            .execute(pool)
            .instrument(span.clone())
            .await;

        match result {
            Ok(_) => return Ok(token),
            Err(err) if is_unique_violation(&err) => {}
            Err(err) => return Err(err).context("failed to insert session"),
        }
    }

    Err(anyhow!("failed to generate unique session token"))
}

pub(crate) async fn lookup_session(
    pool: &PgPool,
    token_hash: &[u8],
) -> Result<Option<SessionRecord>> {
    // Only accept unexpired sessions belonging to non-deleted accounts.
    let query = r"
        SELECT users.id, users.name, users.email, users.role
        FROM user_sessions
        JOIN users ON users.id = user_sessions.user_id
        WHERE user_sessions.session_hash = $1
          AND user_sessions.expires_at > NOW()
          AND users.deleted_at IS NULL
        LIMIT 1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(token_hash)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup session")?;

    let Some(row) = row else {
        return Ok(None);
    };

    // Record activity for audit/visibility without extending the session TTL.
    let query = r"
        UPDATE user_sessions
        SET last_seen_at = NOW()
        WHERE session_hash = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(token_hash)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to update session last_seen_at")?;

    let role: String = row.get("role");
    Ok(Some(SessionRecord {
        user_id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        role: parse_role(&role)?,
    }))
}

pub(crate) async fn delete_session(pool: &PgPool, token_hash: &[u8]) -> Result<()> {
    // Logout is idempotent; it's fine if no rows are deleted.
    let query = "DELETE FROM user_sessions WHERE session_hash = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(token_hash)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to delete session")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{CreateOutcome, ForgotOutcome, ResendOutcome, SessionRecord, UpdateOutcome};
    use crate::form::Role;
    use uuid::Uuid;

    #[test]
    fn create_outcome_debug_names() {
        let created = CreateOutcome::Created { id: Uuid::nil() };
        assert!(format!("{created:?}").starts_with("Created"));
        assert_eq!(format!("{:?}", CreateOutcome::Conflict), "Conflict");
    }

    #[test]
    fn update_outcome_debug_names() {
        assert_eq!(format!("{:?}", UpdateOutcome::Updated), "Updated");
        assert_eq!(format!("{:?}", UpdateOutcome::Conflict), "Conflict");
        assert_eq!(format!("{:?}", UpdateOutcome::Missing), "Missing");
    }

    #[test]
    fn opaque_outcome_debug_names() {
        assert_eq!(format!("{:?}", ResendOutcome::Queued), "Queued");
        assert_eq!(format!("{:?}", ResendOutcome::Cooldown), "Cooldown");
        assert_eq!(format!("{:?}", ResendOutcome::Noop), "Noop");
        assert_eq!(format!("{:?}", ForgotOutcome::Queued), "Queued");
        assert_eq!(format!("{:?}", ForgotOutcome::Noop), "Noop");
    }

    #[test]
    fn session_record_holds_values() {
        let record = SessionRecord {
            user_id: Uuid::nil(),
            name: "Alice".to_string(),
            email: "alice@example.com".to_string(),
            role: Role::Admin,
        };
        assert_eq!(record.user_id, Uuid::nil());
        assert_eq!(record.name, "Alice");
        assert_eq!(record.email, "alice@example.com");
        assert_eq!(record.role, Role::Admin);
    }
}
