//! Authentication and account-pipeline handlers.
//!
//! Flow Overview: every mutating operation runs the same sequence: extract
//! submitted fields, validate them against the operation's profile, check the
//! business rules schema validation cannot express, perform exactly one
//! persistence mutation, and answer with an `ActionResult`. Validation and
//! business outcomes are data, never faults; only infrastructure errors reach
//! the generic failure reply.

pub mod login;
pub mod password_reset;
pub mod principal;
pub mod session;
pub mod signup;
pub mod state;
pub mod storage;
pub mod types;
pub mod utils;
pub mod verification;

pub use self::state::AppConfig;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};

use crate::form::{ActionResult, FieldErrors};

/// Terminal states of one submission, mapped onto HTTP.
///
/// Rejected and Denied are retryable with corrected input; Failed is
/// retryable as-is because nothing was committed.
#[derive(Debug)]
pub(crate) enum FormReply {
    /// Schema validation failed; per-field error keys, no side effects.
    Rejected(FieldErrors),
    /// A business rule refused well-formed input.
    Denied(&'static str),
    /// Credential check failed; same body shape as Denied, 401 instead of 409.
    Unauthorized(&'static str),
    /// The primary mutation committed.
    Committed(ActionResult),
    /// Infrastructure fault; no partial state.
    Failed,
}

impl IntoResponse for FormReply {
    fn into_response(self) -> Response {
        match self {
            Self::Rejected(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(ActionResult::rejected(errors)),
            )
                .into_response(),
            Self::Denied(warning) => {
                (StatusCode::CONFLICT, Json(ActionResult::denied(warning))).into_response()
            }
            Self::Unauthorized(warning) => {
                (StatusCode::UNAUTHORIZED, Json(ActionResult::denied(warning))).into_response()
            }
            Self::Committed(result) => (StatusCode::OK, Json(result)).into_response(),
            Self::Failed => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ActionResult::failed()),
            )
                .into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::keys;

    #[test]
    fn reply_status_codes() {
        let mut errors = FieldErrors::new();
        errors.insert("name".to_string(), vec![keys::NAME_REQUIRED.to_string()]);

        let response = FormReply::Rejected(errors).into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let response = FormReply::Denied(keys::EMAIL_ALREADY_REGISTERED).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = FormReply::Unauthorized(keys::INVALID_CREDENTIALS).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = FormReply::Committed(ActionResult::committed()).into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let response = FormReply::Failed.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
