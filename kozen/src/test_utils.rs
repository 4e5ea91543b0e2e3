//! Shared constructors for tests.

use std::sync::Arc;

use axum_test::TestServer;

use crate::{
    AppState, build_router,
    auth::session::SessionManager,
    config::Config,
    limits::Limiters,
    store::{MemoryStore, SharedStore},
    upstream::UpstreamClient,
    views::Views,
};

/// Default test configuration: in-memory store, cheap Argon2 parameters and a
/// placeholder upstream credential.
pub fn create_test_config() -> Config {
    let mut config = Config::default();
    // Keep password hashing cheap in tests
    config.auth.password.argon2_memory_kib = 8;
    config.auth.password.argon2_iterations = 1;
    config.auth.password.argon2_parallelism = 1;
    config.upstream.api_key = Some("test-key".to_string());
    config
}

pub fn create_test_state() -> AppState {
    create_test_state_with(create_test_config())
}

pub fn create_test_state_with(config: Config) -> AppState {
    // The crate builds reqwest with the `rustls-no-provider` feature, so a
    // process-level crypto provider must be installed before any TLS client is
    // constructed. `main` does this at startup; tests bypass `main`, so install
    // it here. `install_default` returns Err once already installed — ignore it.
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    let store: SharedStore = Arc::new(MemoryStore::new());
    let sessions = Arc::new(SessionManager::new(config.auth.session.timeout));
    let limiters = Limiters::new(&config.limits);
    let upstream = UpstreamClient::new(&config.upstream);
    let views = Arc::new(Views::new().expect("templates should register"));

    AppState::builder()
        .config(config)
        .store(store)
        .sessions(sessions)
        .limiters(limiters)
        .upstream(upstream)
        .views(views)
        .build()
}

/// A running test server plus the state behind it, so tests can inspect the
/// store and session table directly.
pub struct TestApp {
    pub server: TestServer,
    pub state: AppState,
}

pub async fn create_test_app() -> TestApp {
    create_test_app_with(create_test_config()).await
}

pub async fn create_test_app_with(config: Config) -> TestApp {
    let state = create_test_state_with(config);
    let router = build_router(&state).expect("router should build");
    let server = TestServer::new(router).expect("Failed to create test server");
    TestApp { server, state }
}

/// Form body for the signup/login endpoints.
pub fn signup_form(username: &str, password: &str) -> Vec<(String, String)> {
    vec![
        ("username".to_string(), username.to_string()),
        ("password".to_string(), password.to_string()),
    ]
}
