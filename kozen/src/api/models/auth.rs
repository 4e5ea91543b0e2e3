//! API request models for authentication.

use serde::Deserialize;

/// Form body accepted by both `POST /user/signup` and `POST /user/login`.
///
/// Fields arrive unvalidated; [`crate::validation::validate_credentials`]
/// turns them into sanitized credentials before any handler logic runs.
#[derive(Debug, Clone, Deserialize)]
pub struct CredentialsForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}
