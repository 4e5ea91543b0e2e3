//! Authentication system.
//!
//! This module covers the credential-and-session side of the application:
//!
//! - [`password`]: Password hashing and verification using Argon2, plus
//!   detection of legacy plaintext records. Legacy records are upgraded
//!   lazily: the first successful login after hash adoption replaces the
//!   stored plaintext with a salted hash (see the login handler in
//!   [`crate::api::handlers::auth`]).
//! - [`session`]: Process-wide session table mapping opaque cookie-delivered
//!   tokens to usernames, with a fixed absolute lifetime.
//! - [`current_user`]: Extractors for getting the authenticated user in
//!   handlers.
//!
//! # Usage in Handlers
//!
//! ```ignore
//! use kozen::auth::current_user::CurrentUser;
//!
//! async fn protected_handler(user: CurrentUser) -> String {
//!     format!("Hello, {}!", user.username)
//! }
//! ```

pub mod current_user;
pub mod password;
pub mod session;
