//! Language-neutral keys carried by [`super::ActionResult`].
//!
//! The UI owns the translation catalog; the pipeline only ever speaks in
//! these identifiers.

// Per-field validation errors.
pub const NAME_REQUIRED: &str = "NameRequired";
pub const EMAIL_INVALID: &str = "EmailInvalid";
pub const PASSWORD_MIN: &str = "PasswordMin";
pub const PASSWORD_MAX: &str = "PasswordMax";
pub const PASSWORD_REQUIRED: &str = "PasswordRequired";
pub const PASSWORD_CONFIRM_REQUIRED: &str = "PasswordConfirmRequired";
pub const PASSWORD_MATCH: &str = "PasswordMatch";
pub const PASSWORD_CURRENT_MIN: &str = "PasswordCurrentMin";
pub const ROLE_REQUIRED: &str = "RoleRequiredAdminUser";
pub const TOKEN_REQUIRED: &str = "TokenRequired";

// Business-rule warnings (global, issued only after validation passed).
pub const EMAIL_ALREADY_REGISTERED: &str = "EmailAlreadyRegistered";
pub const INVALID_CREDENTIALS: &str = "InvalidCredentials";
pub const CURRENT_PASSWORD_INCORRECT: &str = "CurrentPasswordIncorrect";
pub const PASSWORD_INCORRECT: &str = "PasswordIncorrect";
pub const DELETE_OWN_ACCOUNT: &str = "DeleteOwnAccount";
pub const TOKEN_INVALID: &str = "TokenInvalidOrUsed";
pub const ACCOUNT_NOT_FOUND: &str = "AccountNotFound";

// Success messages.
pub const RESET_LINK_SENT: &str = "ResetLinkSent";
pub const EMAIL_VERIFIED: &str = "EmailVerified";
pub const PASSWORD_RESET_DONE: &str = "PasswordResetDone";

// Infrastructure failure, surfaced without detail.
pub const SERVER_ERROR: &str = "ServerError";
