//! Form submission primitives shared by the HTTP handlers and the client-side
//! form controller.
//!
//! Every mutating operation funnels through the same shape: submitted field
//! values are validated against a per-operation profile, business rules are
//! re-checked, exactly one persistence mutation runs, and the caller receives
//! an [`ActionResult`] carrying either per-field error keys, a global warning
//! key, or a success message. Keys are language-neutral; rendering them into
//! human text is the UI's concern.

pub mod controller;
pub mod keys;
pub mod policy;
pub mod validate;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

/// Account role stored on every directory record.
#[derive(ToSchema, Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "ADMIN",
            Self::User => "USER",
        }
    }

    /// Parse the exact submitted value; anything else is a validation error.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "ADMIN" => Some(Self::Admin),
            "USER" => Some(Self::User),
            _ => None,
        }
    }
}

/// Validation failures keyed by field name, each holding ordered message keys.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Overall message attached to a committed submission.
///
/// Some operations report a bare success flag, others a message key the UI
/// translates; both travel in the same slot.
#[derive(ToSchema, Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(untagged)]
pub enum Message {
    Flag(bool),
    Key(String),
}

/// Outcome of one form submission.
///
/// Produced fresh per call and never persisted. Field errors and warnings are
/// mutually exclusive by construction: a warning is only issued after schema
/// validation passed.
#[derive(ToSchema, Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct ActionResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<FieldErrors>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl ActionResult {
    /// Validation failed; no side effects took place.
    #[must_use]
    pub fn rejected(errors: FieldErrors) -> Self {
        Self {
            errors: Some(errors),
            ..Self::default()
        }
    }

    /// Well-formed input hit a business rule; no side effects took place.
    #[must_use]
    pub fn denied(warning: &str) -> Self {
        Self {
            warning: Some(warning.to_string()),
            ..Self::default()
        }
    }

    /// The mutation committed; report a bare success flag.
    #[must_use]
    pub fn committed() -> Self {
        Self {
            message: Some(Message::Flag(true)),
            ..Self::default()
        }
    }

    /// The mutation committed; report a message key.
    #[must_use]
    pub fn committed_with(message: &str) -> Self {
        Self {
            message: Some(Message::Key(message.to_string())),
            ..Self::default()
        }
    }

    /// The mutation committed; report through the `success` flag used by
    /// profile-style forms.
    #[must_use]
    pub fn saved() -> Self {
        Self {
            success: Some(true),
            ..Self::default()
        }
    }

    /// Infrastructure fault; nothing was committed. Distinct from a business
    /// warning so the UI can offer a retry instead of a correction.
    #[must_use]
    pub fn failed() -> Self {
        Self {
            success: Some(false),
            message: Some(Message::Key(keys::SERVER_ERROR.to_string())),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn has_field_errors(&self) -> bool {
        self.errors.as_ref().is_some_and(|errors| !errors.is_empty())
    }

    /// True when the submission's primary mutation committed.
    #[must_use]
    pub fn is_committed(&self) -> bool {
        !self.has_field_errors()
            && self.warning.is_none()
            && self.success != Some(false)
            && (self.message.is_some() || self.success == Some(true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn role_round_trips_exact_values() {
        assert_eq!(Role::parse("ADMIN"), Some(Role::Admin));
        assert_eq!(Role::parse("USER"), Some(Role::User));
        assert_eq!(Role::parse("admin"), None);
        assert_eq!(Role::parse(" ADMIN "), None);
        assert_eq!(Role::Admin.as_str(), "ADMIN");
        assert_eq!(Role::User.as_str(), "USER");
    }

    #[test]
    fn committed_states() {
        assert!(ActionResult::committed().is_committed());
        assert!(ActionResult::committed_with("Done").is_committed());
        assert!(ActionResult::saved().is_committed());
        assert!(!ActionResult::denied("Nope").is_committed());
        assert!(!ActionResult::failed().is_committed());

        let mut errors = FieldErrors::new();
        errors.insert("name".to_string(), vec!["NameRequired".to_string()]);
        assert!(!ActionResult::rejected(errors).is_committed());
    }

    #[test]
    fn serializes_only_populated_fields() -> Result<()> {
        let value = serde_json::to_value(ActionResult::saved())?;
        assert_eq!(value, serde_json::json!({ "success": true }));

        let value = serde_json::to_value(ActionResult::committed())?;
        assert_eq!(value, serde_json::json!({ "message": true }));

        let value = serde_json::to_value(ActionResult::denied("EmailAlreadyRegistered"))?;
        assert_eq!(
            value,
            serde_json::json!({ "warning": "EmailAlreadyRegistered" })
        );
        Ok(())
    }

    #[test]
    fn message_slot_accepts_flag_and_key() -> Result<()> {
        let flag: Message = serde_json::from_value(serde_json::json!(true))?;
        assert_eq!(flag, Message::Flag(true));

        let key: Message = serde_json::from_value(serde_json::json!("ResetLinkSent"))?;
        assert_eq!(key, Message::Key("ResetLinkSent".to_string()));
        Ok(())
    }
}
