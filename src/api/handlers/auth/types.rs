//! Request/response types for auth endpoints.
//!
//! Fields default to empty strings so a missing form value reaches the
//! validator as "not filled in" rather than failing deserialization.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::form::Role;

#[derive(ToSchema, Serialize, Deserialize, Debug, Default)]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub password_confirmation: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Default)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Default)]
pub struct VerifyEmailRequest {
    #[serde(default)]
    pub token: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Default)]
pub struct ResendVerificationRequest {
    #[serde(default)]
    pub email: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Default)]
pub struct ForgotPasswordRequest {
    #[serde(default)]
    pub email: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Default)]
pub struct ResetPasswordRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub password_confirmation: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SessionResponse {
    pub user_id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn missing_fields_default_to_empty() -> Result<()> {
        let request: RegisterRequest = serde_json::from_value(serde_json::json!({
            "email": "alice@example.com"
        }))?;
        assert_eq!(request.email, "alice@example.com");
        assert_eq!(request.name, "");
        assert_eq!(request.password, "");
        assert_eq!(request.password_confirmation, "");
        Ok(())
    }

    #[test]
    fn session_response_serializes_role_uppercase() -> Result<()> {
        let response = SessionResponse {
            user_id: "id".to_string(),
            name: "Alice".to_string(),
            email: "alice@example.com".to_string(),
            role: Role::Admin,
        };
        let value = serde_json::to_value(&response)?;
        assert_eq!(value.get("role"), Some(&serde_json::json!("ADMIN")));
        Ok(())
    }
}
