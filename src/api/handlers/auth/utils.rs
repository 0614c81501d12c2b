//! Password hashing and token helpers.

use anyhow::{anyhow, Context, Result};
use argon2::{
    password_hash::{rand_core::OsRng as SaltRng, PasswordHash, PasswordHasher, PasswordVerifier,
        SaltString},
    Argon2,
};
use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};

/// Hash a password for storage with argon2id and a fresh salt.
pub(crate) fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut SaltRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| anyhow!("failed to hash password: {err}"))?;
    Ok(hash.to_string())
}

/// Verify a candidate password against a stored hash.
///
/// A malformed stored hash verifies as false rather than erroring: the caller
/// treats it the same as a wrong password.
pub(crate) fn verify_password(password: &str, stored_hash: &str) -> bool {
    PasswordHash::new(stored_hash).is_ok_and(|parsed| {
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    })
}

/// Create a new single-use token for email links.
///
/// The returned value is only ever sent to the user; the database stores a
/// hash.
pub(crate) fn generate_token() -> Result<String> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate token")?;
    Ok(Base64UrlUnpadded::encode_string(&bytes))
}

/// Hash a token so the raw value never touches the database.
pub(crate) fn hash_token(token: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().to_vec()
}

/// Build the frontend verification link included in outbound emails.
pub(crate) fn build_verify_url(base_url: &str, email: &str, token: &str) -> String {
    let base = base_url.trim_end_matches('/');
    format!("{base}/auth/verify-email?email={email}&token={token}")
}

/// Build the frontend reset link included in outbound emails.
pub(crate) fn build_reset_url(base_url: &str, email: &str, token: &str) -> String {
    let base = base_url.trim_end_matches('/');
    format!("{base}/auth/reset-password?email={email}&token={token}")
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::error::{DatabaseError, ErrorKind};
    use std::borrow::Cow;
    use std::error::Error as StdError;
    use std::fmt;

    #[test]
    fn password_round_trip() {
        let hash = hash_password("longenough").expect("hashing succeeds");
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("longenough", &hash));
        assert!(!verify_password("different", &hash));
    }

    #[test]
    fn malformed_stored_hash_verifies_false() {
        assert!(!verify_password("whatever", "not-a-phc-string"));
    }

    #[test]
    fn generated_tokens_decode_to_32_bytes() {
        let decoded_len = generate_token()
            .ok()
            .and_then(|token| Base64UrlUnpadded::decode_vec(&token).ok())
            .map(|bytes| bytes.len());
        assert_eq!(decoded_len, Some(32));
    }

    #[test]
    fn hash_token_stable() {
        let first = hash_token("token");
        let second = hash_token("token");
        let different = hash_token("other");
        assert_eq!(first, second);
        assert_ne!(first, different);
    }

    #[test]
    fn link_builders_trim_trailing_slash() {
        let url = build_verify_url("https://directory.example.com/", "a@b.com", "tok");
        assert_eq!(
            url,
            "https://directory.example.com/auth/verify-email?email=a@b.com&token=tok"
        );

        let url = build_reset_url("https://directory.example.com", "a@b.com", "tok");
        assert_eq!(
            url,
            "https://directory.example.com/auth/reset-password?email=a@b.com&token=tok"
        );
    }

    #[derive(Debug)]
    struct TestDbError {
        code: Option<&'static str>,
    }

    impl fmt::Display for TestDbError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "test database error")
        }
    }

    impl StdError for TestDbError {}

    impl DatabaseError for TestDbError {
        fn message(&self) -> &'static str {
            "test database error"
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            self.code.map(Cow::Borrowed)
        }

        fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> ErrorKind {
            ErrorKind::UniqueViolation
        }
    }

    #[test]
    fn is_unique_violation_matches_sqlstate() {
        let err = sqlx::Error::Database(Box::new(TestDbError {
            code: Some("23505"),
        }));
        assert!(is_unique_violation(&err));

        let err = sqlx::Error::Database(Box::new(TestDbError {
            code: Some("99999"),
        }));
        assert!(!is_unique_violation(&err));

        let err = sqlx::Error::RowNotFound;
        assert!(!is_unique_violation(&err));
    }
}
