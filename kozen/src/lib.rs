//! # kozen: Authenticated Chat Gateway
//!
//! `kozen` is a small web application that puts username/password accounts
//! and server-side sessions in front of a third-party generative-language
//! API. Signed-in users chat through a single proxy endpoint; the gateway
//! validates and sanitizes every message, forwards it upstream with a hard
//! deadline, and relays a sanitized, length-bounded reply.
//!
//! ## Overview
//!
//! The application serves three route groups. The **authentication pages**
//! (`/user/*`) handle signup, login and logout with rendered HTML and
//! redirects. The **chat API** (`/api/*`) exposes the JSON proxy endpoint and
//! a health check. The **home page** (`/`) hosts the chat UI and redirects
//! anonymous visitors to the login page.
//!
//! Credentials live in a key-value-by-username store behind the
//! [`store::CredentialStore`] trait, either purely in memory or persisted to
//! a JSON file. Passwords are hashed with Argon2id; records created before
//! hash adoption may still hold plaintext, and are upgraded in place the
//! first time their owner logs in successfully (see [`auth`]). Sessions are
//! opaque random tokens held in a process-wide table and delivered via an
//! HttpOnly cookie with a fixed absolute lifetime.
//!
//! ### Request Flow
//!
//! An inbound request passes through the tower middleware stack (trace,
//! CORS), then the endpoint's extractors (session lookup, client address),
//! then the endpoint-specific validator, and only then reaches handler
//! logic. The chat endpoint additionally applies a per-address fixed-window
//! rate limit before anything is sent upstream. Store writes strictly
//! precede session establishment, so a crash between the two never leaves a
//! session without a backing record.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use kozen::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = kozen::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     kozen::telemetry::init_telemetry()?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!     })
//!     .await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! See the [`config`] module for configuration options.

pub mod api;
pub mod auth;
pub mod config;
pub mod errors;
pub mod limits;
pub mod store;
pub mod telemetry;
pub mod upstream;
pub mod validation;
pub mod views;

#[cfg(test)]
pub mod test_utils;

use std::sync::Arc;

use axum::{
    Router,
    http::{self, HeaderValue},
    routing::{get, post},
};
use bon::Builder;
use tokio::net::TcpListener;
use tower_http::{
    cors::CorsLayer,
    services::ServeDir,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info, instrument};

use crate::auth::session::SessionManager;
use crate::config::CorsOrigin;
use crate::limits::Limiters;
use crate::store::SharedStore;
use crate::upstream::UpstreamClient;
use crate::views::Views;

pub use config::Config;

/// Application state shared across all request handlers.
///
/// This struct contains all the shared resources needed by the handlers:
/// configuration, the credential store handle, the session table, the rate
/// limiters, the upstream client and the template environment.
///
/// # Example
///
/// ```ignore
/// let state = AppState::builder()
///     .config(config)
///     .store(store)
///     .sessions(sessions)
///     .limiters(limiters)
///     .upstream(upstream)
///     .views(views)
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub config: Config,
    pub store: SharedStore,
    pub sessions: Arc<SessionManager>,
    pub limiters: Limiters,
    pub upstream: UpstreamClient,
    pub views: Arc<Views>,
}

/// Create CORS layer from configuration
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let mut origins = Vec::new();
    for origin in &config.cors.allowed_origins {
        let header_value = match origin {
            CorsOrigin::Wildcard => "*".parse::<HeaderValue>()?,
            CorsOrigin::Url(url) => url.as_str().trim_end_matches('/').parse::<HeaderValue>()?,
        };
        origins.push(header_value);
    }

    let mut cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(config.cors.allow_credentials)
        .expose_headers(vec![http::header::LOCATION]);

    if let Some(max_age) = config.cors.max_age {
        cors = cors.max_age(std::time::Duration::from_secs(max_age));
    }

    Ok(cors)
}

/// Build the main application router with all endpoints and middleware.
///
/// This function constructs the complete Axum router with:
/// - Authentication routes (signup, login, logout)
/// - The chat API (proxy endpoint + health check)
/// - The home page and the not-found fallback
/// - Static asset serving under `/public`
/// - CORS configuration
/// - Tracing middleware
///
/// # Errors
///
/// Returns an error if the CORS configuration is invalid.
#[instrument(skip_all)]
pub fn build_router(state: &AppState) -> anyhow::Result<Router> {
    // Authentication routes (rendered pages and redirects)
    let auth_routes = Router::new()
        .route(
            "/user/signup",
            get(api::handlers::auth::signup_page).post(api::handlers::auth::signup),
        )
        .route(
            "/user/login",
            get(api::handlers::auth::login_page).post(api::handlers::auth::login),
        )
        .route("/user/logout", get(api::handlers::auth::logout))
        .with_state(state.clone());

    // JSON chat API
    let api_routes = Router::new()
        .route("/chat", post(api::handlers::chat::chat))
        .route("/health", get(api::handlers::chat::health))
        .with_state(state.clone());

    // Pages, with the generic not-found fallback for unmatched routes
    let page_routes = Router::new()
        .route("/", get(api::handlers::pages::home))
        .fallback(api::handlers::pages::not_found)
        .with_state(state.clone());

    let router = page_routes
        .merge(auth_routes)
        .nest("/api", api_routes)
        .nest_service("/public", ServeDir::new(&state.config.public_dir));

    // Create CORS layer from config
    let cors_layer = create_cors_layer(&state.config)?;
    let router = router.layer(cors_layer);

    // Add tracing layer
    let router = router.layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    Ok(router)
}

/// The assembled application, ready to serve.
pub struct Application {
    router: Router,
    config: Config,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        debug!("Starting chat gateway with configuration: {:#?}", config);

        let store = store::open(&config.store).await?;
        let sessions = Arc::new(SessionManager::new(config.auth.session.timeout));
        let limiters = Limiters::new(&config.limits);
        let upstream = UpstreamClient::new(&config.upstream);
        let views = Arc::new(Views::new()?);

        let state = AppState::builder()
            .config(config.clone())
            .store(store)
            .sessions(sessions)
            .limiters(limiters)
            .upstream(upstream)
            .views(views)
            .build();

        let router = build_router(&state)?;

        Ok(Self { router, config })
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "Chat gateway listening on http://{}, available at http://localhost:{}",
            bind_addr, self.config.port
        );

        // Run the server with graceful shutdown; peer addresses feed the rate limiter
        axum::serve(
            listener,
            self.router.into_make_service_with_connect_info::<std::net::SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await?;

        Ok(())
    }
}
