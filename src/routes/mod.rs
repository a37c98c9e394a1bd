//! HTTP surface: one router, shared state, and the error type every handler
//! returns.

mod auth;
mod chat;
mod publish;
mod sessions;
mod settings;

use crate::auth::AuthError;
use crate::config::Config;
use crate::db::models::User;
use crate::db::Database;
use crate::llm::LlmError;
use crate::publish::PublishError;
use crate::session::SessionStore;
use axum::extract::Request;
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Shown in the conversation when the model call fails.
pub const ERROR_NOTICE: &str = "⚠️ Sorry, I encountered an error. Please try again.";

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub sessions: Arc<SessionStore>,
    pub config: Arc<Config>,
    /// Parent of every reveal's token; cancelled on shutdown.
    pub shutdown: CancellationToken,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(chat::index))
        .route("/api/health", get(chat::health))
        .route("/api/chat", post(chat::chat))
        .route("/api/extract", post(chat::extract))
        .route("/api/models", get(chat::models))
        .route("/api/sessions", post(sessions::create))
        .route(
            "/api/sessions/:id",
            get(sessions::get).delete(sessions::remove),
        )
        .route("/api/sessions/:id/mode", put(sessions::set_mode))
        .route(
            "/api/sessions/:id/messages",
            post(sessions::send).delete(sessions::clear),
        )
        .route(
            "/api/sessions/:id/messages/:message_id/reveal",
            get(sessions::reveal),
        )
        .route("/api/publish", post(publish::publish))
        .route("/api/published/:slug", get(publish::published))
        .route("/published/:slug", get(publish::viewer))
        .route("/published/:slug/raw", get(publish::raw))
        .route("/api/auth/signup", post(auth::signup))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/me", get(auth::me))
        .route("/api/settings", get(settings::get_settings))
        .route(
            "/api/settings/:key",
            put(settings::set_setting).delete(settings::delete_setting),
        )
        .layer(middleware::from_fn(cors))
        .with_state(state)
}

/// Paths that never get cross-origin headers.
const SAME_ORIGIN_PREFIX: &str = "/api/settings";

/// Any origin may call the API, except for the settings routes; preflights
/// are answered here.
async fn cors(request: Request, next: Next) -> Response {
    let same_origin_only = request.uri().path().starts_with(SAME_ORIGIN_PREFIX);
    let mut response = if request.method() == Method::OPTIONS {
        StatusCode::NO_CONTENT.into_response()
    } else {
        next.run(request).await
    };
    if same_origin_only {
        return response;
    }
    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("authorization, x-client-info, apikey, content-type"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, PUT, DELETE, OPTIONS"),
    );
    response
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Publish(#[from] PublishError),
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Llm(LlmError::Api { status: 429, .. }) => StatusCode::TOO_MANY_REQUESTS,
            AppError::Llm(LlmError::Api { status: 402, .. }) => StatusCode::PAYMENT_REQUIRED,
            AppError::Llm(LlmError::InvalidImage(_)) => StatusCode::BAD_REQUEST,
            AppError::Auth(AuthError::Invalid(_)) => StatusCode::BAD_REQUEST,
            AppError::Auth(AuthError::AlreadyRegistered) => StatusCode::CONFLICT,
            AppError::Auth(AuthError::InvalidCredentials | AuthError::NotSignedIn) => {
                StatusCode::UNAUTHORIZED
            }
            AppError::Publish(PublishError::MissingTitle | PublishError::EmptyContent) => {
                StatusCode::BAD_REQUEST
            }
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// What the client gets to see.
    pub fn message(&self) -> String {
        match self {
            AppError::Llm(LlmError::Api { status: 429, .. }) => {
                "Rate limit exceeded. Please try again later.".to_string()
            }
            AppError::Llm(LlmError::Api { status: 402, .. }) => {
                "AI credits depleted. Please add credits to continue.".to_string()
            }
            // Upstream details stay in the log.
            AppError::Llm(
                LlmError::Http(_)
                | LlmError::Api { .. }
                | LlmError::Parse(_)
                | LlmError::ModelNotFound { .. },
            ) => ERROR_NOTICE.to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = Json(serde_json::json!({ "error": self.message() }));
        (status, body).into_response()
    }
}

pub(crate) fn bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AppError::Auth(AuthError::NotSignedIn))
}

/// The account behind the request's bearer token.
pub(crate) fn signed_in_user(state: &AppState, headers: &HeaderMap) -> Result<User, AppError> {
    Ok(crate::auth::current_user(&state.db, bearer_token(headers)?)?)
}

pub(crate) fn session_not_found(id: &str) -> AppError {
    AppError::NotFound(format!("Session not found: {}", id))
}

#[cfg(test)]
pub(crate) fn test_state() -> (tempfile::TempDir, AppState) {
    let dir = tempfile::tempdir().unwrap();
    let data_dir = dir.path().to_string_lossy().to_string();
    let config = Config::from_lookup(|key| match key {
        "PROBSOLVER_DATA_DIR" => Some(data_dir.clone()),
        "PROBSOLVER_PUBLIC_URL" => Some("http://probsolver.test".to_string()),
        _ => None,
    })
    .unwrap();
    let db = Database::new(dir.path()).unwrap();
    let state = AppState {
        db: Arc::new(db),
        sessions: Arc::new(SessionStore::new()),
        config: Arc::new(config),
        shutdown: CancellationToken::new(),
    };
    (dir, state)
}

#[cfg(test)]
pub(crate) fn with_token(token: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
    );
    headers
}

/// Registers an account and returns a bearer token for it.
#[cfg(test)]
pub(crate) fn signed_in(state: &AppState) -> String {
    let credentials = crate::auth::Credentials {
        email: "owner@example.com".into(),
        password: "secret1".into(),
    };
    crate::auth::sign_up(&state.db, credentials.clone()).unwrap();
    crate::auth::sign_in(&state.db, credentials).unwrap().token
}

#[cfg(test)]
pub(crate) async fn body_json(response: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
