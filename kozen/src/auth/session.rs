//! Server-side session management.
//!
//! Sessions map an opaque server-issued token, delivered via an HTTP cookie,
//! to the authenticated username. The table is process-wide and in-memory:
//! entries are created on successful signup or login, destroyed on logout,
//! and expire after a fixed absolute lifetime with no sliding renewal.
//! Expired entries are dropped lazily when read.

use base64::{Engine as _, engine::general_purpose};
use dashmap::DashMap;
use rand::prelude::RngExt;
use rand::rng;
use std::time::{Duration, Instant};

use crate::config::Config;

/// A live session entry.
#[derive(Debug, Clone)]
struct Session {
    user: String,
    expires_at: Instant,
}

/// Process-wide session table.
#[derive(Debug)]
pub struct SessionManager {
    sessions: DashMap<String, Session>,
    lifetime: Duration,
}

impl SessionManager {
    pub fn new(lifetime: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            lifetime,
        }
    }

    /// Create a session for `user` and return the opaque token.
    ///
    /// The caller delivers the token to the client as a cookie; the token is
    /// the sole key back into this table.
    pub fn create(&self, user: &str) -> String {
        let token = generate_session_token();
        self.sessions.insert(
            token.clone(),
            Session {
                user: user.to_string(),
                expires_at: Instant::now() + self.lifetime,
            },
        );
        token
    }

    /// Resolve a token to its username, dropping the entry if it has expired.
    pub fn get(&self, token: &str) -> Option<String> {
        let expired = match self.sessions.get(token) {
            Some(session) if session.expires_at > Instant::now() => return Some(session.user.clone()),
            Some(_) => true,
            None => false,
        };

        if expired {
            self.sessions.remove(token);
        }
        None
    }

    /// Destroy a session. Returns whether a live entry was removed.
    pub fn destroy(&self, token: &str) -> bool {
        self.sessions.remove(token).is_some()
    }
}

/// Generate a secure random session token.
pub fn generate_session_token() -> String {
    // Generate 32 bytes (256 bits) of cryptographically secure random data
    let mut token_bytes = [0u8; 32];
    rng().fill(&mut token_bytes);

    // Encode as base64url without padding
    general_purpose::URL_SAFE_NO_PAD.encode(token_bytes)
}

/// Build the Set-Cookie value that delivers a session token to the client.
pub fn create_session_cookie(token: &str, config: &Config) -> String {
    let session_config = &config.auth.session;
    let max_age = session_config.timeout.as_secs();

    format!(
        "{}={}; Path=/; HttpOnly;{} SameSite={}; Max-Age={}",
        session_config.cookie_name,
        token,
        secure_attribute(config),
        session_config.cookie_same_site,
        max_age
    )
}

/// Build the Set-Cookie value that clears the session cookie.
pub fn clear_session_cookie(config: &Config) -> String {
    format!(
        "{}=; Path=/; HttpOnly;{} SameSite={}; Max-Age=0",
        config.auth.session.cookie_name,
        secure_attribute(config),
        config.auth.session.cookie_same_site
    )
}

// The Secure attribute is presence-only; emitting "Secure=false" would still
// mark the cookie secure and break plain-HTTP development
fn secure_attribute(config: &Config) -> &'static str {
    if config.cookie_secure() { " Secure;" } else { "" }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_get() {
        let manager = SessionManager::new(Duration::from_secs(3600));
        let token = manager.create("alice");

        assert_eq!(manager.get(&token).as_deref(), Some("alice"));
        assert_eq!(manager.get("unknown-token"), None);
    }

    #[test]
    fn test_destroy() {
        let manager = SessionManager::new(Duration::from_secs(3600));
        let token = manager.create("alice");

        assert!(manager.destroy(&token));
        assert_eq!(manager.get(&token), None);

        // Destroying again is a no-op
        assert!(!manager.destroy(&token));
    }

    #[test]
    fn test_expired_session_is_absent() {
        let manager = SessionManager::new(Duration::from_millis(0));
        let token = manager.create("alice");

        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(manager.get(&token), None);
    }

    #[test]
    fn test_tokens_are_unique_and_opaque() {
        let token1 = generate_session_token();
        let token2 = generate_session_token();

        assert_ne!(token1, token2);

        // Tokens should be base64url encoded (43 chars for 32 bytes)
        assert_eq!(token1.len(), 43);
        assert!(token1.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        assert!(!token1.contains('='));
    }

    #[test]
    fn test_session_cookie_attributes() {
        let config = Config::default();
        let cookie = create_session_cookie("tok123", &config);

        assert!(cookie.starts_with("kozen_session=tok123;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=strict"));
        assert!(cookie.contains("Max-Age=86400"));
        assert!(!cookie.contains("Secure"), "dev cookies must stay usable over plain HTTP");

        let cleared = clear_session_cookie(&config);
        assert!(cleared.starts_with("kozen_session=;"));
        assert!(cleared.contains("Max-Age=0"));
    }

    #[test]
    fn test_secure_flag_in_production() {
        let mut config = Config::default();
        config.environment = crate::config::Environment::Production;

        let cookie = create_session_cookie("tok123", &config);
        assert!(cookie.contains("Secure;"));
    }
}
