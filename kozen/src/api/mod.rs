//! API layer for HTTP request handling and data models.
//!
//! This module contains the HTTP surface, organized into:
//!
//! - **[`handlers`]**: Axum route handlers for all endpoints
//! - **[`models`]**: Request/response data structures for API communication
//!
//! # Surface Structure
//!
//! The surface is divided into three functional areas:
//!
//! - **Authentication** (`/user/*`): Signup, login and logout, answering with
//!   rendered HTML pages and redirects
//! - **Chat API** (`/api/*`): The JSON chat proxy and the health check
//! - **Pages** (`/`, fallback): The home page and the not-found page

pub mod handlers;
pub mod models;
