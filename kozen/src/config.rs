//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable overrides. The configuration
//! file path defaults to `config.yaml` but can be specified via `-f` flag or `KOZEN_CONFIG`
//! environment variable.
//!
//! ## Loading Priority
//!
//! Configuration sources are merged in the following order (later sources override earlier ones):
//!
//! 1. **YAML config file** - Base configuration (default: `config.yaml`)
//! 2. **Environment variables** - Variables prefixed with `KOZEN_` override YAML values
//! 3. **GEMINI_API_KEY** - Special case: overrides `upstream.api_key` if set
//!
//! For nested config values, use double underscores in environment variables. For example,
//! `KOZEN_UPSTREAM__MODEL=gemini-2.5-flash` sets the `upstream.model` field.
//!
//! ## Usage
//!
//! ```no_run
//! use clap::Parser;
//! use kozen::config::{Args, Config};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let args = Args::parse();
//! let config = Config::load(&args)?;
//!
//! println!("Server will bind to {}:{}", config.host, config.port);
//! # Ok(())
//! # }
//! ```

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use std::{fmt, path::PathBuf, time::Duration};
use url::Url;

use crate::errors::Error;

/// Simple CLI args - just for specifying config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "KOZEN_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    /// Useful for CI/CD pipelines to catch config errors before deployment.
    #[arg(long)]
    pub validate: bool,
}

/// Main application configuration.
///
/// This is the root configuration structure loaded from YAML and environment variables.
/// All fields have sensible defaults defined in the `Default` implementation.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to (e.g., "0.0.0.0" for all interfaces)
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// Runtime mode, reported by the health endpoint and used to force
    /// secure session cookies in production
    pub environment: Environment,
    /// Credential store backend
    pub store: StoreConfig,
    /// Upstream generative-language API settings
    pub upstream: UpstreamConfig,
    /// Authentication configuration (password policy, sessions)
    pub auth: AuthConfig,
    /// Per-client request limits for the chat API
    pub limits: LimitsConfig,
    /// CORS configuration for browser clients
    pub cors: CorsConfig,
    /// Directory of static assets served under `/public`
    pub public_dir: PathBuf,
}

/// Runtime mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn is_production(self) -> bool {
        matches!(self, Environment::Production)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Credential store backend selection.
///
/// The store is a key-value-by-username collection. It can either live purely
/// in memory (single-process, lost on restart) or be persisted to a JSON file
/// with write-through semantics.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StoreConfig {
    /// Keep user records in memory only
    Memory,
    /// Persist user records to a JSON file
    File {
        /// Path of the JSON file holding user records
        path: PathBuf,
    },
}

/// Upstream generative-language API settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct UpstreamConfig {
    /// API key for the upstream service. Usually supplied via the
    /// `GEMINI_API_KEY` environment variable rather than the config file.
    pub api_key: Option<String>,
    /// Base URL of the upstream service
    pub base_url: Url,
    /// Model identifier passed to the generateContent endpoint
    pub model: String,
    /// Hard deadline for the outbound call; the request is aborted once it elapses
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

/// Authentication configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthConfig {
    /// Username validation rules
    pub username: UsernameConfig,
    /// Password validation rules and hashing parameters
    pub password: PasswordConfig,
    /// Session cookie configuration
    pub session: SessionConfig,
}

/// Username validation rules.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct UsernameConfig {
    /// Minimum username length
    pub min_length: usize,
    /// Maximum username length
    pub max_length: usize,
}

/// Password validation rules and hashing parameters.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PasswordConfig {
    /// Minimum password length
    pub min_length: usize,
    /// Maximum password length
    pub max_length: usize,
    /// Argon2 memory cost in KiB (default: 19456 KiB = 19 MB, secure for production)
    pub argon2_memory_kib: u32,
    /// Argon2 iterations (default: 2, secure for production)
    pub argon2_iterations: u32,
    /// Argon2 parallelism (default: 1)
    pub argon2_parallelism: u32,
}

/// Session cookie configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// Absolute session lifetime (no sliding renewal)
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Cookie name for the session token
    pub cookie_name: String,
    /// Set Secure flag on cookies (HTTPS only). Always forced on in production.
    pub cookie_secure: bool,
    /// SameSite cookie attribute ("strict", "lax", or "none")
    pub cookie_same_site: String,
}

/// Per-client request limits.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct LimitsConfig {
    /// Rate limit applied to the chat API
    pub chat: RateLimitConfig,
}

/// Fixed-window rate limit settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct RateLimitConfig {
    /// Maximum requests per client address per window
    pub max_requests: u32,
    /// Window duration
    #[serde(with = "humantime_serde")]
    pub window: Duration,
}

/// CORS (Cross-Origin Resource Sharing) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CorsConfig {
    /// Allowed origins for CORS requests
    pub allowed_origins: Vec<CorsOrigin>,
    /// Allow credentials (cookies) in CORS requests
    pub allow_credentials: bool,
    /// Cache preflight requests for this many seconds
    pub max_age: Option<u64>,
}

/// CORS origin specification.
///
/// Can be either a wildcard (`*`) to allow all origins, or a specific URL.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum CorsOrigin {
    /// Allow all origins (`*`)
    #[serde(deserialize_with = "parse_wildcard")]
    Wildcard,
    /// Specific origin URL (e.g., `https://app.example.com`)
    #[serde(deserialize_with = "parse_url")]
    Url(Url),
}

fn parse_wildcard<'de, D>(deserializer: D) -> Result<(), D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    if s == "*" {
        Ok(())
    } else {
        Err(serde::de::Error::custom("Expected '*'"))
    }
}

fn parse_url<'de, D>(deserializer: D) -> Result<Url, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    Url::parse(&s).map_err(serde::de::Error::custom)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            environment: Environment::Development,
            store: StoreConfig::Memory,
            upstream: UpstreamConfig::default(),
            auth: AuthConfig::default(),
            limits: LimitsConfig::default(),
            cors: CorsConfig::default(),
            public_dir: PathBuf::from("public"),
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: Url::parse("https://generativelanguage.googleapis.com").unwrap(),
            model: "gemini-2.5-flash".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl Default for UsernameConfig {
    fn default() -> Self {
        Self {
            min_length: 3,
            max_length: 30,
        }
    }
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            min_length: 6,
            max_length: 64,
            // Secure defaults for production (Argon2id RFC recommendations)
            argon2_memory_kib: 19456, // 19 MB
            argon2_iterations: 2,
            argon2_parallelism: 1,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(24 * 60 * 60), // 24 hours
            cookie_name: "kozen_session".to_string(),
            cookie_secure: false,
            cookie_same_site: "strict".to_string(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 50,
            window: Duration::from_secs(15 * 60), // 15 minutes
        }
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![
                CorsOrigin::Url(Url::parse("http://localhost:8000").unwrap()), // Development frontend
            ],
            allow_credentials: true,
            max_age: Some(3600), // Cache preflight for 1 hour
        }
    }
}

impl Config {
    fn figment(args: &Args) -> Figment {
        Figment::new()
            .merge(Yaml::file(&args.config))
            .merge(Env::prefixed("KOZEN_").split("__"))
    }

    #[allow(clippy::result_large_err)]
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let mut config: Self = Self::figment(args).extract()?;

        // The upstream credential is conventionally provided as GEMINI_API_KEY
        // rather than through the KOZEN_ namespace
        if let Ok(api_key) = std::env::var("GEMINI_API_KEY")
            && !api_key.is_empty()
        {
            config.upstream.api_key = Some(api_key);
        }

        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    /// Address the HTTP listener binds to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Whether session cookies must carry the Secure flag
    pub fn cookie_secure(&self) -> bool {
        self.auth.session.cookie_secure || self.environment.is_production()
    }

    /// Validate the configuration for consistency and required fields
    pub fn validate(&self) -> Result<(), Error> {
        if self.auth.username.min_length > self.auth.username.max_length {
            return Err(Error::Internal {
                operation: format!(
                    "Config validation: Invalid username configuration: min_length ({}) cannot be greater than max_length ({})",
                    self.auth.username.min_length, self.auth.username.max_length
                ),
            });
        }

        if self.auth.password.min_length < 1 {
            return Err(Error::Internal {
                operation: "Config validation: Invalid password configuration: min_length must be at least 1".to_string(),
            });
        }

        if self.auth.password.min_length > self.auth.password.max_length {
            return Err(Error::Internal {
                operation: format!(
                    "Config validation: Invalid password configuration: min_length ({}) cannot be greater than max_length ({})",
                    self.auth.password.min_length, self.auth.password.max_length
                ),
            });
        }

        // Validate session lifetime is reasonable
        if self.auth.session.timeout.as_secs() < 300 {
            // Less than 5 minutes
            return Err(Error::Internal {
                operation: "Config validation: Session lifetime is too short (minimum 5 minutes)".to_string(),
            });
        }

        if self.auth.session.timeout.as_secs() > 86400 * 30 {
            // More than 30 days
            return Err(Error::Internal {
                operation: "Config validation: Session lifetime is too long (maximum 30 days)".to_string(),
            });
        }

        if !matches!(self.auth.session.cookie_same_site.as_str(), "strict" | "lax" | "none") {
            return Err(Error::Internal {
                operation: format!(
                    "Config validation: Invalid cookie_same_site value '{}'. Use \"strict\", \"lax\" or \"none\".",
                    self.auth.session.cookie_same_site
                ),
            });
        }

        if self.limits.chat.max_requests == 0 {
            return Err(Error::Internal {
                operation: "Config validation: chat rate limit max_requests cannot be 0".to_string(),
            });
        }

        if self.limits.chat.window.is_zero() {
            return Err(Error::Internal {
                operation: "Config validation: chat rate limit window cannot be 0".to_string(),
            });
        }

        if self.upstream.timeout.is_zero() {
            return Err(Error::Internal {
                operation: "Config validation: upstream timeout cannot be 0".to_string(),
            });
        }

        // Validate CORS configuration
        if self.cors.allowed_origins.is_empty() {
            return Err(Error::Internal {
                operation: "Config validation: CORS allowed_origins cannot be empty. Add at least one allowed origin.".to_string(),
            });
        }

        // Validate that wildcard is not used with credentials
        let has_wildcard = self.cors.allowed_origins.iter().any(|origin| matches!(origin, CorsOrigin::Wildcard));
        if has_wildcard && self.cors.allow_credentials {
            return Err(Error::Internal {
                operation: "Config validation: CORS cannot use wildcard origin '*' with allow_credentials=true. Specify explicit origins."
                    .to_string(),
            });
        }

        Ok(())
    }
}
