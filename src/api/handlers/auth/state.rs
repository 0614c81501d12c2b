//! Service configuration shared by the handlers.

use url::Url;

const DEFAULT_VERIFY_TOKEN_TTL_SECONDS: i64 = 30 * 60;
const DEFAULT_RESET_TOKEN_TTL_SECONDS: i64 = 60 * 60;
const DEFAULT_RESEND_COOLDOWN_SECONDS: i64 = 60;
const DEFAULT_SESSION_TTL_SECONDS: i64 = 12 * 60 * 60;

/// Runtime configuration: the public base URL (email links, CORS, cookie
/// security) and the lifetimes of tokens and sessions.
#[derive(Clone, Debug)]
pub struct AppConfig {
    base_url: String,
    verify_token_ttl_seconds: i64,
    reset_token_ttl_seconds: i64,
    resend_cooldown_seconds: i64,
    session_ttl_seconds: i64,
}

impl AppConfig {
    #[must_use]
    pub fn new(base_url: String) -> Self {
        // Keep the stored form canonical so link building can just append.
        let base_url = base_url.trim_end_matches('/').to_string();

        Self {
            base_url,
            verify_token_ttl_seconds: DEFAULT_VERIFY_TOKEN_TTL_SECONDS,
            reset_token_ttl_seconds: DEFAULT_RESET_TOKEN_TTL_SECONDS,
            resend_cooldown_seconds: DEFAULT_RESEND_COOLDOWN_SECONDS,
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
        }
    }

    #[must_use]
    pub fn with_verify_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.verify_token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_reset_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.reset_token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_resend_cooldown_seconds(mut self, seconds: i64) -> Self {
        self.resend_cooldown_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: i64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Host component of the base URL, mostly for log context.
    #[must_use]
    pub fn host(&self) -> String {
        Url::parse(&self.base_url)
            .ok()
            .and_then(|url| url.host_str().map(ToString::to_string))
            .unwrap_or_else(|| "localhost".to_string())
    }

    pub(crate) fn verify_token_ttl_seconds(&self) -> i64 {
        self.verify_token_ttl_seconds
    }

    pub(crate) fn reset_token_ttl_seconds(&self) -> i64 {
        self.reset_token_ttl_seconds
    }

    pub(crate) fn resend_cooldown_seconds(&self) -> i64 {
        self.resend_cooldown_seconds
    }

    pub(crate) fn session_ttl_seconds(&self) -> i64 {
        self.session_ttl_seconds
    }

    pub(crate) fn session_cookie_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_and_overrides() {
        let config = AppConfig::new("https://directory.example.com/".to_string());

        assert_eq!(config.base_url(), "https://directory.example.com");
        assert_eq!(config.host(), "directory.example.com");
        assert_eq!(
            config.verify_token_ttl_seconds(),
            DEFAULT_VERIFY_TOKEN_TTL_SECONDS
        );
        assert_eq!(
            config.reset_token_ttl_seconds(),
            DEFAULT_RESET_TOKEN_TTL_SECONDS
        );
        assert_eq!(
            config.resend_cooldown_seconds(),
            DEFAULT_RESEND_COOLDOWN_SECONDS
        );
        assert_eq!(config.session_ttl_seconds(), DEFAULT_SESSION_TTL_SECONDS);
        assert!(config.session_cookie_secure());

        let config = config
            .with_verify_token_ttl_seconds(120)
            .with_reset_token_ttl_seconds(240)
            .with_resend_cooldown_seconds(30)
            .with_session_ttl_seconds(3600);

        assert_eq!(config.verify_token_ttl_seconds(), 120);
        assert_eq!(config.reset_token_ttl_seconds(), 240);
        assert_eq!(config.resend_cooldown_seconds(), 30);
        assert_eq!(config.session_ttl_seconds(), 3600);
    }

    #[test]
    fn plain_http_base_url_keeps_cookies_insecure() {
        let config = AppConfig::new("http://localhost:3000".to_string());
        assert!(!config.session_cookie_secure());
        assert_eq!(config.host(), "localhost");
    }
}
