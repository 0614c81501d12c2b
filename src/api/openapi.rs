use utoipa::OpenApi;

use crate::api::handlers::{auth, health, me, users};
use crate::form::{ActionResult, Message, Role};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "tessera",
        description = "User directory and authentication",
        license(name = "BSD-3-Clause")
    ),
    paths(
        health::health,
        auth::signup::register,
        auth::login::login,
        auth::session::session,
        auth::session::logout,
        auth::verification::verify_email,
        auth::verification::resend_verification,
        auth::password_reset::forgot_password,
        auth::password_reset::reset_password,
        me::get_me,
        me::update_profile,
        me::update_password,
        me::delete_account,
        users::list_users,
        users::get_user,
        users::create_user,
        users::update_user,
        users::delete_user,
    ),
    components(schemas(
        ActionResult,
        Message,
        Role,
        auth::types::RegisterRequest,
        auth::types::LoginRequest,
        auth::types::VerifyEmailRequest,
        auth::types::ResendVerificationRequest,
        auth::types::ForgotPasswordRequest,
        auth::types::ResetPasswordRequest,
        auth::types::SessionResponse,
        me::ProfileUpdateRequest,
        me::PasswordUpdateRequest,
        me::DeleteAccountRequest,
        me::ProfileResponse,
        users::DirectoryUserRequest,
        users::AccountSummary,
        users::AccountDetail,
    ))
)]
pub struct ApiDoc;
