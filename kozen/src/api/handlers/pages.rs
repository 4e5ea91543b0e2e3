//! Page handlers: home, not-found, and the generic error page.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use minijinja::context;

use super::redirect_found;
use crate::{AppState, auth::current_user::MaybeUser, errors::Error};

/// `GET /` - the chat page for signed-in users, a redirect for everyone else.
#[tracing::instrument(skip_all)]
pub async fn home(State(state): State<AppState>, MaybeUser(user): MaybeUser) -> Response {
    let Some(user) = user else {
        return redirect_found("/user/login");
    };

    match state.views.render("home.html", context! { username => user.username }) {
        Ok(html) => html.into_response(),
        Err(e) => error_page(&state, e),
    }
}

/// Fallback for unmatched routes.
#[tracing::instrument(skip_all)]
pub async fn not_found(State(state): State<AppState>) -> Response {
    match state.views.render("not_found.html", context! {}) {
        Ok(html) => (StatusCode::NOT_FOUND, html).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Top-level failure path for HTML flows: log the full error server-side and
/// render the generic error page instead of exposing detail.
pub(crate) fn error_page(state: &AppState, err: Error) -> Response {
    tracing::error!("Unhandled error in page flow: {:#}", err);
    match state.views.render("error.html", context! {}) {
        Ok(html) => (StatusCode::INTERNAL_SERVER_ERROR, html).into_response(),
        // Rendering itself failed; fall back to the JSON error shape
        Err(render_err) => render_err.into_response(),
    }
}
