//! Client-side form state holder.
//!
//! The controller owns the entered field values, the last [`ActionResult`],
//! and an in-flight flag. Submission is a two-step handshake so the transport
//! stays out of this module: [`FormController::begin_submit`] snapshots the
//! fields and marks the form pending, the caller dispatches them however it
//! likes, and [`FormController::complete_submit`] stores the outcome. A
//! second `begin_submit` while pending returns `None`: the duplicate is
//! dropped, not queued.

use std::collections::BTreeMap;

use super::ActionResult;

/// Fields cleared after a committed submission. Everything else is retained
/// so corrections stay additive.
pub const SENSITIVE_FIELDS: [&str; 3] = ["password", "password_confirmation", "current_password"];

/// Snapshot of field values handed to the dispatcher.
pub type FieldValues = BTreeMap<String, String>;

#[derive(Debug, Default)]
pub struct FormController {
    fields: FieldValues,
    result: Option<ActionResult>,
    pending: bool,
}

impl FormController {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_field(&mut self, name: &str, value: impl Into<String>) {
        self.fields.insert(name.to_string(), value.into());
    }

    /// Current value of a field; absent fields read as empty.
    #[must_use]
    pub fn field(&self, name: &str) -> &str {
        self.fields.get(name).map_or("", String::as_str)
    }

    #[must_use]
    pub fn result(&self) -> Option<&ActionResult> {
        self.result.as_ref()
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Snapshot the current field values and mark the form in-flight.
    ///
    /// Returns `None` while a prior submission is outstanding.
    #[must_use]
    pub fn begin_submit(&mut self) -> Option<FieldValues> {
        if self.pending {
            return None;
        }
        self.pending = true;
        Some(self.fields.clone())
    }

    /// Store the outcome of the in-flight submission.
    ///
    /// Field-error results keep the entered values untouched; committed
    /// results clear the sensitive fields.
    pub fn complete_submit(&mut self, result: ActionResult) {
        if result.is_committed() {
            for field in SENSITIVE_FIELDS {
                self.fields.remove(field);
            }
        }
        self.result = Some(result);
        self.pending = false;
    }

    /// Reset values and outcome, e.g. when navigating away.
    pub fn clear(&mut self) {
        self.fields.clear();
        self.result = None;
        self.pending = false;
    }
}

#[cfg(test)]
mod tests {
    use super::super::FieldErrors;
    use super::*;

    fn filled_controller() -> FormController {
        let mut controller = FormController::new();
        controller.set_field("name", "Alice");
        controller.set_field("email", "alice@example.com");
        controller.set_field("password", "longenough");
        controller.set_field("password_confirmation", "longenough");
        controller
    }

    #[test]
    fn begin_submit_snapshots_fields() {
        let mut controller = filled_controller();

        let snapshot = controller.begin_submit().expect("first submit");
        assert_eq!(snapshot.get("name").map(String::as_str), Some("Alice"));
        assert!(controller.is_pending());
    }

    #[test]
    fn duplicate_submit_is_dropped_while_pending() {
        let mut controller = filled_controller();

        assert!(controller.begin_submit().is_some());
        assert!(controller.begin_submit().is_none());

        controller.complete_submit(ActionResult::committed());
        assert!(controller.begin_submit().is_some());
    }

    #[test]
    fn field_errors_retain_entered_values() {
        let mut controller = filled_controller();
        let _ = controller.begin_submit();

        let mut errors = FieldErrors::new();
        errors.insert("email".to_string(), vec!["EmailInvalid".to_string()]);
        controller.complete_submit(ActionResult::rejected(errors));

        assert_eq!(controller.field("name"), "Alice");
        assert_eq!(controller.field("password"), "longenough");
        assert!(!controller.is_pending());
        assert!(controller.result().is_some_and(ActionResult::has_field_errors));
    }

    #[test]
    fn committed_result_clears_sensitive_fields_only() {
        let mut controller = filled_controller();
        controller.set_field("current_password", "oldsecret");
        let _ = controller.begin_submit();

        controller.complete_submit(ActionResult::committed());

        assert_eq!(controller.field("password"), "");
        assert_eq!(controller.field("password_confirmation"), "");
        assert_eq!(controller.field("current_password"), "");
        assert_eq!(controller.field("name"), "Alice");
    }

    #[test]
    fn warning_keeps_sensitive_fields_for_correction() {
        let mut controller = filled_controller();
        let _ = controller.begin_submit();

        controller.complete_submit(ActionResult::denied("EmailAlreadyRegistered"));

        assert_eq!(controller.field("password"), "longenough");
        assert!(!controller.is_pending());
    }

    #[test]
    fn clear_resets_everything() {
        let mut controller = filled_controller();
        let _ = controller.begin_submit();
        controller.complete_submit(ActionResult::committed());

        controller.clear();

        assert_eq!(controller.field("name"), "");
        assert!(controller.result().is_none());
        assert!(!controller.is_pending());
    }
}
