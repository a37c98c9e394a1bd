use super::{AppError, AppState};
use crate::db::models::PublishedSnippet;
use crate::preview::{sandbox_csp, viewer_page};
use crate::publish::public_url;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse};
use axum::Json;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct PublishBody {
    pub title: String,
    pub description: Option<String>,
    pub html_content: String,
}

#[derive(Debug, Serialize)]
pub struct PublishReply {
    pub slug: String,
    pub url: String,
}

pub async fn publish(
    State(state): State<AppState>,
    Json(body): Json<PublishBody>,
) -> Result<(StatusCode, Json<PublishReply>), AppError> {
    let snippet = crate::publish::publish(
        &state.db,
        &body.title,
        body.description.as_deref(),
        &body.html_content,
    )?;
    let url = public_url(&state.config.public_url, &snippet.slug);
    Ok((
        StatusCode::CREATED,
        Json(PublishReply {
            slug: snippet.slug,
            url,
        }),
    ))
}

fn find(state: &AppState, slug: &str) -> Result<PublishedSnippet, AppError> {
    state
        .db
        .get_published(slug)?
        .ok_or_else(|| AppError::NotFound(format!("Snippet not found: {}", slug)))
}

pub async fn published(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<PublishedSnippet>, AppError> {
    find(&state, &slug).map(Json)
}

pub async fn viewer(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Html<String>, AppError> {
    let snippet = find(&state, &slug)?;
    Ok(Html(viewer_page(&snippet.title, &snippet.html_content)))
}

/// The stored document itself, sandboxed by header since there is no iframe
/// around it.
pub async fn raw(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let snippet = find(&state, &slug)?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/html; charset=utf-8".to_string()),
            (header::CONTENT_SECURITY_POLICY, sandbox_csp()),
        ],
        snippet.html_content,
    ))
}
