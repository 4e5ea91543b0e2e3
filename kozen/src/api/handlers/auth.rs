//! Signup, login and logout handlers.
//!
//! These flows answer with rendered HTML pages and redirects rather than
//! JSON. Failures never reveal whether the username or the password was
//! wrong: bad-username and bad-password logins produce byte-identical
//! responses, preventing username enumeration.

use axum::{
    Form,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::{AppendHeaders, IntoResponse, Response},
};
use minijinja::context;

use super::{pages, redirect_found};
use crate::{
    AppState,
    api::models::auth::CredentialsForm,
    auth::{
        current_user::session_token_from_headers,
        password::{self, Argon2Params},
        session,
    },
    errors::{Error, Result},
    store::{StoreError, StoredPassword, UserRecord},
    validation,
};

/// The uniform rejection for every failed login, regardless of cause.
const INVALID_CREDENTIALS: &str = "Invalid username or password";

/// `GET /user/signup`
#[tracing::instrument(skip_all)]
pub async fn signup_page(State(state): State<AppState>) -> Response {
    render_auth_page(&state, "signup.html", None, StatusCode::OK)
}

/// `GET /user/login`
#[tracing::instrument(skip_all)]
pub async fn login_page(State(state): State<AppState>) -> Response {
    render_auth_page(&state, "login.html", None, StatusCode::OK)
}

/// `POST /user/signup`
#[tracing::instrument(skip_all)]
pub async fn signup(State(state): State<AppState>, Form(form): Form<CredentialsForm>) -> Response {
    match signup_inner(&state, form).await {
        Ok(response) => response,
        Err(e) => pages::error_page(&state, e),
    }
}

async fn signup_inner(state: &AppState, form: CredentialsForm) -> Result<Response> {
    let credentials = match validation::validate_credentials(&form.username, &form.password, &state.config) {
        Ok(credentials) => credentials,
        Err(e) => {
            return Ok(render_auth_page(state, "signup.html", Some(&e.user_message()), StatusCode::BAD_REQUEST));
        }
    };

    // Cheap pre-check; the store's uniqueness constraint still backs this up
    // if a concurrent signup races us to the same username
    if state.store.find_by_username(&credentials.username).await?.is_some() {
        return Ok(render_auth_page(
            state,
            "signup.html",
            Some("Username already exists"),
            StatusCode::CONFLICT,
        ));
    }

    let password_hash = hash_password(state, credentials.password.clone()).await?;

    let record = UserRecord::new(credentials.username.clone(), StoredPassword::Hashed(password_hash));
    match state.store.create(record).await {
        Ok(_) => {}
        Err(StoreError::DuplicateUsername { .. }) => {
            return Ok(render_auth_page(
                state,
                "signup.html",
                Some("Username already exists"),
                StatusCode::CONFLICT,
            ));
        }
        Err(e) => return Err(e.into()),
    }

    // The store write has completed; only now establish the session, so a
    // crash between the two never leaves a session without a backing record
    Ok(establish_session(state, &credentials.username))
}

/// `POST /user/login`
#[tracing::instrument(skip_all)]
pub async fn login(State(state): State<AppState>, Form(form): Form<CredentialsForm>) -> Response {
    match login_inner(&state, form).await {
        Ok(response) => response,
        Err(e) => pages::error_page(&state, e),
    }
}

async fn login_inner(state: &AppState, form: CredentialsForm) -> Result<Response> {
    let credentials = match validation::validate_credentials(&form.username, &form.password, &state.config) {
        Ok(credentials) => credentials,
        Err(e) => {
            return Ok(render_auth_page(state, "login.html", Some(&e.user_message()), StatusCode::BAD_REQUEST));
        }
    };

    let Some(record) = state.store.find_by_username(&credentials.username).await? else {
        return Ok(login_rejected(state));
    };

    match &record.password {
        StoredPassword::Hashed(hash) => {
            let is_valid = match verify_password(credentials.password.clone(), hash.clone()).await {
                Ok(is_valid) => is_valid,
                Err(e) => return Ok(login_failed(state, e)),
            };

            if !is_valid {
                return Ok(login_rejected(state));
            }
        }
        StoredPassword::Plaintext(stored) => {
            // Legacy record predating hash adoption: compared by direct
            // equality, then upgraded in place before the login completes
            if credentials.password != *stored {
                return Ok(login_rejected(state));
            }

            let password_hash = match hash_password(state, credentials.password.clone()).await {
                Ok(hash) => hash,
                Err(e) => return Ok(login_failed(state, e)),
            };

            state
                .store
                .update_password(record.id, StoredPassword::Hashed(password_hash))
                .await?;
            tracing::info!("Upgraded legacy credential for user: {}", record.username);
        }
    }

    Ok(establish_session(state, &record.username))
}

/// `GET /user/logout`
#[tracing::instrument(skip_all)]
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Result<Response> {
    if let Some(token) = session_token_from_headers(&headers, &state.config) {
        state.sessions.destroy(&token);
    }

    let cookie = session::clear_session_cookie(&state.config);
    Ok((AppendHeaders([(header::SET_COOKIE, cookie)]), redirect_found("/user/login")).into_response())
}

/// Hash a password on a blocking thread to avoid blocking the async runtime.
async fn hash_password(state: &AppState, password: String) -> Result<String> {
    let params = Argon2Params::from(&state.config.auth.password);
    tokio::task::spawn_blocking(move || password::hash_string_with_params(&password, Some(params)))
        .await
        .map_err(|e| Error::Internal {
            operation: format!("spawn password hashing task: {e}"),
        })?
}

/// Verify a password on a blocking thread to avoid blocking the async runtime.
async fn verify_password(password: String, hash: String) -> Result<bool> {
    tokio::task::spawn_blocking(move || password::verify_string(&password, &hash))
        .await
        .map_err(|e| Error::Internal {
            operation: format!("spawn password verification task: {e}"),
        })?
}

fn establish_session(state: &AppState, username: &str) -> Response {
    let token = state.sessions.create(username);
    let cookie = session::create_session_cookie(&token, &state.config);
    (AppendHeaders([(header::SET_COOKIE, cookie)]), redirect_found("/")).into_response()
}

/// The enumeration-safe rejection: identical for unknown usernames and wrong
/// passwords.
fn login_rejected(state: &AppState) -> Response {
    render_auth_page(state, "login.html", Some(INVALID_CREDENTIALS), StatusCode::UNAUTHORIZED)
}

/// Hashing or verification broke internally. The user sees a generic login
/// failure; the detail stays in the server log.
fn login_failed(state: &AppState, err: Error) -> Response {
    tracing::error!("Credential processing failed during login: {:#}", err);
    render_auth_page(
        state,
        "login.html",
        Some("Login failed, please try again"),
        StatusCode::INTERNAL_SERVER_ERROR,
    )
}

fn render_auth_page(state: &AppState, template: &str, error: Option<&str>, status: StatusCode) -> Response {
    match state.views.render(template, context! { error }) {
        Ok(html) => (status, html).into_response(),
        Err(e) => e.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::CredentialStore;
    use crate::test_utils::{create_test_app, signup_form};

    async fn seeded_record(app: &crate::test_utils::TestApp, username: &str, password: StoredPassword) -> UserRecord {
        app.state
            .store
            .create(UserRecord::new(username.to_string(), password))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_signup_creates_hashed_record_and_session() {
        let app = create_test_app().await;

        let response = app.server.post("/user/signup").form(&signup_form("alice", "hunter2")).await;
        response.assert_status(StatusCode::FOUND);
        assert_eq!(response.headers().get("location").unwrap(), "/");

        let cookie = response.headers().get("set-cookie").unwrap().to_str().unwrap();
        assert!(cookie.starts_with("kozen_session="));
        assert!(cookie.contains("HttpOnly"));

        // The stored password is never the plaintext
        let record = app.state.store.find_by_username("alice").await.unwrap().unwrap();
        assert!(matches!(&record.password, StoredPassword::Hashed(h) if h != "hunter2"));
        assert!(password::verify_string("hunter2", record.password.as_str()).unwrap());

        // The cookie holds a live session for the new user
        let token = cookie.split(';').next().unwrap().trim_start_matches("kozen_session=");
        assert_eq!(app.state.sessions.get(token).as_deref(), Some("alice"));
    }

    #[tokio::test]
    async fn test_signup_duplicate_username_leaves_record_alone() {
        let app = create_test_app().await;
        let original = seeded_record(&app, "alice", StoredPassword::Plaintext("hunter2".to_string())).await;

        let response = app.server.post("/user/signup").form(&signup_form("alice", "other-password")).await;
        response.assert_status(StatusCode::CONFLICT);
        assert!(response.text().contains("Username already exists"));

        let record = app.state.store.find_by_username("alice").await.unwrap().unwrap();
        assert_eq!(record.id, original.id);
        assert_eq!(record.password.as_str(), "hunter2");
    }

    #[tokio::test]
    async fn test_signup_validation_failures_render_page() {
        let app = create_test_app().await;

        let response = app.server.post("/user/signup").form(&signup_form("ab", "hunter2")).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert!(response.text().contains("Username must be between"));

        let response = app.server.post("/user/signup").form(&signup_form("alice", "12345")).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert!(response.text().contains("Password must be at least"));

        assert!(app.state.store.find_by_username("alice").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_signup_escapes_username() {
        let app = create_test_app().await;

        let response = app.server.post("/user/signup").form(&signup_form("<alice>bob", "hunter2")).await;
        response.assert_status(StatusCode::FOUND);

        assert!(app.state.store.find_by_username("&lt;alice&gt;bob").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_login_with_hashed_record() {
        let app = create_test_app().await;
        let hash = password::hash_string_with_params("hunter2", Some(Argon2Params::from(&app.state.config.auth.password))).unwrap();
        seeded_record(&app, "alice", StoredPassword::Hashed(hash)).await;

        let response = app.server.post("/user/login").form(&signup_form("alice", "hunter2")).await;
        response.assert_status(StatusCode::FOUND);
        assert_eq!(response.headers().get("location").unwrap(), "/");

        let cookie = response.headers().get("set-cookie").unwrap().to_str().unwrap();
        let token = cookie.split(';').next().unwrap().trim_start_matches("kozen_session=");
        assert_eq!(app.state.sessions.get(token).as_deref(), Some("alice"));
    }

    #[tokio::test]
    async fn test_login_migrates_legacy_plaintext_record() {
        let app = create_test_app().await;
        let original = seeded_record(&app, "alice", StoredPassword::Plaintext("hunter2".to_string())).await;

        let response = app.server.post("/user/login").form(&signup_form("alice", "hunter2")).await;
        response.assert_status(StatusCode::FOUND);

        // The record is now hash-tagged and no longer the original plaintext
        let record = app.state.store.find_by_username("alice").await.unwrap().unwrap();
        assert_eq!(record.id, original.id);
        let StoredPassword::Hashed(hash) = &record.password else {
            panic!("record should have been migrated to a hash");
        };
        assert_ne!(hash, "hunter2");
        assert!(password::verify_string("hunter2", hash).unwrap());

        // Logging in again takes the verify path against the migrated hash
        let response = app.server.post("/user/login").form(&signup_form("alice", "hunter2")).await;
        response.assert_status(StatusCode::FOUND);
        let again = app.state.store.find_by_username("alice").await.unwrap().unwrap();
        assert_eq!(again.password.as_str(), hash, "a hashed record is not re-hashed");
    }

    #[tokio::test]
    async fn test_login_wrong_password_does_not_migrate() {
        let app = create_test_app().await;
        seeded_record(&app, "alice", StoredPassword::Plaintext("hunter2".to_string())).await;

        let response = app.server.post("/user/login").form(&signup_form("alice", "wrong-password")).await;
        response.assert_status(StatusCode::UNAUTHORIZED);

        let record = app.state.store.find_by_username("alice").await.unwrap().unwrap();
        assert_eq!(record.password.as_str(), "hunter2");
    }

    #[tokio::test]
    async fn test_login_rejections_are_byte_identical() {
        let app = create_test_app().await;
        let hash = password::hash_string_with_params("hunter2", Some(Argon2Params::from(&app.state.config.auth.password))).unwrap();
        seeded_record(&app, "alice", StoredPassword::Hashed(hash)).await;

        let wrong_password = app.server.post("/user/login").form(&signup_form("alice", "not-hunter2")).await;
        let unknown_user = app.server.post("/user/login").form(&signup_form("mallory", "not-hunter2")).await;

        assert_eq!(wrong_password.status_code(), unknown_user.status_code());
        assert_eq!(wrong_password.text(), unknown_user.text());
        assert!(wrong_password.text().contains(INVALID_CREDENTIALS));
    }

    #[tokio::test]
    async fn test_logout_destroys_session() {
        let app = create_test_app().await;
        let token = app.state.sessions.create("alice");

        let response = app
            .server
            .get("/user/logout")
            .add_header("cookie", format!("kozen_session={token}"))
            .await;
        response.assert_status(StatusCode::FOUND);
        assert_eq!(response.headers().get("location").unwrap(), "/user/login");

        let cleared = response.headers().get("set-cookie").unwrap().to_str().unwrap();
        assert!(cleared.contains("Max-Age=0"));
        assert_eq!(app.state.sessions.get(&token), None);

        // A subsequent request to the home page redirects to login
        let home = app.server.get("/").add_header("cookie", format!("kozen_session={token}")).await;
        home.assert_status(StatusCode::FOUND);
        assert_eq!(home.headers().get("location").unwrap(), "/user/login");
    }

    #[tokio::test]
    async fn test_auth_pages_render() {
        let app = create_test_app().await;

        let login = app.server.get("/user/login").await;
        login.assert_status_ok();
        assert!(login.text().contains("Log in"));

        let signup = app.server.get("/user/signup").await;
        signup.assert_status_ok();
        assert!(signup.text().contains("Sign up"));
    }
}
