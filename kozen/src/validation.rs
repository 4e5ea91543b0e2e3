//! Request validation and sanitization.
//!
//! Stateless structural checks applied to incoming fields before any handler
//! logic runs. Each validator returns a tagged result: the sanitized fields
//! on success, or a [`Error::Validation`] describing the first failed rule.

use crate::config::Config;
use crate::errors::{Error, Result};

/// Sanitized signup/login fields.
///
/// The username has been trimmed and HTML-escaped for storage and display.
/// The password is untouched: it is hashed, never rendered.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Validate and sanitize a `{username, password}` pair.
pub fn validate_credentials(username: &str, password: &str, config: &Config) -> Result<Credentials> {
    let username = username.trim();
    if username.is_empty() || password.is_empty() {
        return Err(Error::Validation {
            message: "Username and password are required".to_string(),
        });
    }

    let username_rules = &config.auth.username;
    if username.chars().count() < username_rules.min_length || username.chars().count() > username_rules.max_length {
        return Err(Error::Validation {
            message: format!(
                "Username must be between {} and {} characters",
                username_rules.min_length, username_rules.max_length
            ),
        });
    }

    let password_rules = &config.auth.password;
    if password.chars().count() < password_rules.min_length {
        return Err(Error::Validation {
            message: format!("Password must be at least {} characters", password_rules.min_length),
        });
    }
    if password.chars().count() > password_rules.max_length {
        return Err(Error::Validation {
            message: format!("Password must be no more than {} characters", password_rules.max_length),
        });
    }

    Ok(Credentials {
        username: escape_html(username),
        password: password.to_string(),
    })
}

/// Maximum chat message length in characters.
pub const MAX_MESSAGE_LENGTH: usize = 1000;

/// Validate and sanitize the free-text chat message field.
///
/// The body must carry `message` as a string of at most
/// [`MAX_MESSAGE_LENGTH`] characters; the returned value is trimmed and
/// HTML-escaped.
pub fn validate_chat_message(body: &serde_json::Value) -> Result<String> {
    let message = match body.get("message") {
        Some(serde_json::Value::String(message)) => message,
        _ => {
            return Err(Error::Validation {
                message: "Message is required and must be a string".to_string(),
            });
        }
    };

    if message.chars().count() > MAX_MESSAGE_LENGTH {
        return Err(Error::Validation {
            message: format!("Message too long (max {MAX_MESSAGE_LENGTH} characters)"),
        });
    }

    Ok(escape_html(message.trim()))
}

/// HTML-escape a string for storage and display.
///
/// Replaces the same character set as the original deployment's sanitizer:
/// `& < > " ' \` /`.
pub fn escape_html(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            '`' => escaped.push_str("&#96;"),
            '/' => escaped.push_str("&#x2F;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
