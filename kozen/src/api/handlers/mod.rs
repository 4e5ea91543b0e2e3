pub mod auth;
pub mod chat;
pub mod pages;

use axum::{
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};

/// A 302 redirect, as the browser-facing flows answer after form posts.
pub(crate) fn redirect_found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}
