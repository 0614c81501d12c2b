//! Per-operation validation profiles.
//!
//! Each profile checks every field-level rule and reports all violations in
//! one pass, keyed by field, so the form can render every problem at once.
//! Cross-field rules (password confirmation) run only once the field-level
//! rules pass, and attach their error to the confirmation field, not the
//! password field.

use regex::Regex;

use super::keys;
use super::{FieldErrors, Role};

const PASSWORD_MIN_LEN: usize = 8;
const PASSWORD_MAX_LEN: usize = 32;

/// Whether an admin-user submission creates a record or edits an existing
/// one. Selected by the caller (route), never inferred from submitted data.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProfileMode {
    Create,
    Edit,
}

/// Validated fields for self-registration of an admin account.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreateAdmin {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Validated fields for admin-managed create/update of a directory record.
///
/// `password` is `None` on edits that leave the password untouched.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdminUser {
    pub name: String,
    pub email: String,
    pub role: Role,
    pub password: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignIn {
    pub email: String,
    pub password: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub name: String,
    pub email: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PasswordUpdate {
    pub current_password: String,
    pub password: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccountDelete {
    pub password: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PasswordForgot {
    pub email: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PasswordReset {
    pub email: String,
    pub token: String,
    pub password: String,
}

/// Normalize an email for lookup/uniqueness checks.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Basic email format check on already-normalized input.
#[must_use]
pub fn valid_email(email_normalized: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email_normalized))
}

#[derive(Debug, Default)]
struct Violations(FieldErrors);

impl Violations {
    fn push(&mut self, field: &str, key: &str) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(key.to_string());
    }

    fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn reject<T>(self) -> Result<T, FieldErrors> {
        Err(self.0)
    }
}

fn check_name(violations: &mut Violations, name: &str) {
    if name.trim().is_empty() {
        violations.push("name", keys::NAME_REQUIRED);
    }
}

fn check_email(violations: &mut Violations, email: &str) -> String {
    let email = normalize_email(email);
    if !valid_email(&email) {
        violations.push("email", keys::EMAIL_INVALID);
    }
    email
}

fn too_short(value: &str, min: usize) -> bool {
    value.chars().count() < min
}

pub fn create_admin(
    name: &str,
    email: &str,
    password: &str,
    password_confirmation: &str,
) -> Result<CreateAdmin, FieldErrors> {
    let mut violations = Violations::default();

    check_name(&mut violations, name);
    let email = check_email(&mut violations, email);
    if too_short(password, PASSWORD_MIN_LEN) {
        violations.push("password", keys::PASSWORD_MIN);
    }
    if password_confirmation.is_empty() {
        violations.push("password_confirmation", keys::PASSWORD_CONFIRM_REQUIRED);
    }

    // Cross-field rules only apply once the field-level rules pass.
    if violations.is_empty() && password != password_confirmation {
        violations.push("password_confirmation", keys::PASSWORD_MATCH);
    }

    if !violations.is_empty() {
        return violations.reject();
    }

    Ok(CreateAdmin {
        name: name.trim().to_string(),
        email,
        password: password.to_string(),
    })
}

/// Shared profile for admin-managed creates and edits.
///
/// In [`ProfileMode::Edit`], password and confirmation become optional; a
/// supplied password still has to match its confirmation.
pub fn admin_user(
    mode: ProfileMode,
    name: &str,
    email: &str,
    role: &str,
    password: &str,
    password_confirmation: &str,
) -> Result<AdminUser, FieldErrors> {
    let mut violations = Violations::default();

    check_name(&mut violations, name);
    let email = check_email(&mut violations, email);

    match mode {
        ProfileMode::Create => {
            if too_short(password, PASSWORD_MIN_LEN) {
                violations.push("password", keys::PASSWORD_MIN);
            }
            if password_confirmation.is_empty() {
                violations.push("password_confirmation", keys::PASSWORD_CONFIRM_REQUIRED);
            }
        }
        ProfileMode::Edit => {
            if !password.is_empty() && too_short(password, PASSWORD_MIN_LEN) {
                violations.push("password", keys::PASSWORD_MIN);
            }
        }
    }

    let role = match Role::parse(role) {
        Some(role) => Some(role),
        None => {
            violations.push("role", keys::ROLE_REQUIRED);
            None
        }
    };

    if violations.is_empty() && !password.is_empty() && password != password_confirmation {
        violations.push("password_confirmation", keys::PASSWORD_MATCH);
    }

    if !violations.is_empty() {
        return violations.reject();
    }

    // An empty violation set implies the role parsed.
    let Some(role) = role else {
        return violations.reject();
    };

    Ok(AdminUser {
        name: name.trim().to_string(),
        email,
        role,
        password: if password.is_empty() {
            None
        } else {
            Some(password.to_string())
        },
    })
}

pub fn sign_in(email: &str, password: &str) -> Result<SignIn, FieldErrors> {
    let mut violations = Violations::default();

    let email = check_email(&mut violations, email);
    if too_short(password, PASSWORD_MIN_LEN) {
        violations.push("password", keys::PASSWORD_REQUIRED);
    } else if password.chars().count() > PASSWORD_MAX_LEN {
        violations.push("password", keys::PASSWORD_MAX);
    }

    if !violations.is_empty() {
        return violations.reject();
    }

    Ok(SignIn {
        email,
        password: password.to_string(),
    })
}

pub fn profile_update(name: &str, email: &str) -> Result<ProfileUpdate, FieldErrors> {
    let mut violations = Violations::default();

    check_name(&mut violations, name);
    let email = check_email(&mut violations, email);

    if !violations.is_empty() {
        return violations.reject();
    }

    Ok(ProfileUpdate {
        name: name.trim().to_string(),
        email,
    })
}

pub fn password_update(
    current_password: &str,
    password: &str,
    password_confirmation: &str,
) -> Result<PasswordUpdate, FieldErrors> {
    let mut violations = Violations::default();

    if too_short(current_password, PASSWORD_MIN_LEN) {
        violations.push("current_password", keys::PASSWORD_CURRENT_MIN);
    }
    if too_short(password, PASSWORD_MIN_LEN) {
        violations.push("password", keys::PASSWORD_MIN);
    }
    if too_short(password_confirmation, PASSWORD_MIN_LEN) {
        violations.push("password_confirmation", keys::PASSWORD_CONFIRM_REQUIRED);
    }

    if violations.is_empty() && password != password_confirmation {
        violations.push("password_confirmation", keys::PASSWORD_MATCH);
    }

    if !violations.is_empty() {
        return violations.reject();
    }

    Ok(PasswordUpdate {
        current_password: current_password.to_string(),
        password: password.to_string(),
    })
}

pub fn account_delete(password: &str) -> Result<AccountDelete, FieldErrors> {
    let mut violations = Violations::default();

    if too_short(password, PASSWORD_MIN_LEN) {
        violations.push("password", keys::PASSWORD_MIN);
    }

    if !violations.is_empty() {
        return violations.reject();
    }

    Ok(AccountDelete {
        password: password.to_string(),
    })
}

pub fn password_forgot(email: &str) -> Result<PasswordForgot, FieldErrors> {
    let mut violations = Violations::default();

    let email = check_email(&mut violations, email);

    if !violations.is_empty() {
        return violations.reject();
    }

    Ok(PasswordForgot { email })
}

pub fn password_reset(
    email: &str,
    token: &str,
    password: &str,
    password_confirmation: &str,
) -> Result<PasswordReset, FieldErrors> {
    let mut violations = Violations::default();

    let email = check_email(&mut violations, email);
    if token.trim().is_empty() {
        violations.push("token", keys::TOKEN_REQUIRED);
    }
    if too_short(password, PASSWORD_MIN_LEN) {
        violations.push("password", keys::PASSWORD_MIN);
    }
    if password_confirmation.is_empty() {
        violations.push("password_confirmation", keys::PASSWORD_CONFIRM_REQUIRED);
    }

    if violations.is_empty() && password != password_confirmation {
        violations.push("password_confirmation", keys::PASSWORD_MATCH);
    }

    if !violations.is_empty() {
        return violations.reject();
    }

    Ok(PasswordReset {
        email,
        token: token.trim().to_string(),
        password: password.to_string(),
    })
}
