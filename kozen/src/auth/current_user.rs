//! Extractors for getting the authenticated user in handlers.

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, request::Parts},
};
use tracing::trace;

use crate::{
    AppState,
    config::Config,
    errors::{Error, Result},
};

/// The authenticated user for the current request.
///
/// Extraction fails with 401 unless the request carries a session cookie that
/// resolves to a live entry in the session table. Session presence is the
/// sole authorization signal for protected routes.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub username: String,
}

/// Like [`CurrentUser`], but never rejects - used by pages that redirect
/// anonymous visitors instead of answering 401.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<CurrentUser>);

/// Extract the session token from a request's cookie header, if present.
pub(crate) fn session_token_from_headers(headers: &HeaderMap, config: &Config) -> Option<String> {
    let cookie_header = headers.get(axum::http::header::COOKIE)?;
    let cookie_str = cookie_header.to_str().ok()?;
    let cookie_name = &config.auth.session.cookie_name;

    for cookie in cookie_str.split(';') {
        let cookie = cookie.trim();
        if let Some((name, value)) = cookie.split_once('=')
            && name == cookie_name
        {
            return Some(value.to_string());
        }
    }
    None
}

fn lookup_user(parts: &Parts, state: &AppState) -> Option<CurrentUser> {
    let token = session_token_from_headers(&parts.headers, &state.config)?;
    state.sessions.get(&token).map(|username| CurrentUser { username })
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        match lookup_user(parts, state) {
            Some(user) => Ok(user),
            None => {
                trace!("No live session found on request");
                Err(Error::Unauthenticated { message: None })
            }
        }
    }
}

impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> std::result::Result<Self, Self::Rejection> {
        Ok(MaybeUser(lookup_user(parts, state)))
    }
}
