use super::{session_not_found, AppError, AppState, ERROR_NOTICE};
use crate::config::resolve_provider;
use crate::llm::{ChatRequest, InlineImage};
use crate::session::{Message, Mode, Session};
use crate::typewriter::{self, Granularity, DEFAULT_INTERVAL};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures::stream::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::time::Duration;

#[derive(Debug, Default, Deserialize)]
pub struct CreateSession {
    #[serde(default)]
    pub mode: Mode,
}

pub async fn create(
    State(state): State<AppState>,
    Json(body): Json<CreateSession>,
) -> (StatusCode, Json<Session>) {
    let session = state.sessions.create(body.mode);
    tracing::info!(session = %session.id, mode = session.mode.as_str(), "session created");
    (StatusCode::CREATED, Json(session))
}

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Session>, AppError> {
    state
        .sessions
        .get(&id)
        .map(Json)
        .ok_or_else(|| session_not_found(&id))
}

pub async fn remove(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    if state.sessions.remove(&id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(session_not_found(&id))
    }
}

#[derive(Debug, Deserialize)]
pub struct SetMode {
    pub mode: Mode,
}

/// Takes effect for the next message; a request already in flight keeps the
/// mode it was sent with.
pub async fn set_mode(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<SetMode>,
) -> Result<Json<Session>, AppError> {
    state
        .sessions
        .update(&id, |session| {
            session.set_mode(body.mode);
            session.clone()
        })
        .map(Json)
        .ok_or_else(|| session_not_found(&id))
}

pub async fn clear(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state
        .sessions
        .update(&id, Session::clear)
        .ok_or_else(|| session_not_found(&id))?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct SendMessage {
    #[serde(default)]
    pub prompt: String,
    pub image: Option<InlineImage>,
}

#[derive(Debug, Serialize)]
pub struct SendReply {
    pub message: Message,
    pub model: String,
}

pub async fn send(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<SendMessage>,
) -> Result<Json<SendReply>, AppError> {
    let prompt = body.prompt.trim().to_string();
    if prompt.is_empty() && body.image.is_none() {
        return Err(AppError::BadRequest("Prompt is required".into()));
    }
    if let Some(image) = &body.image {
        image.validate()?;
    }
    let provider = resolve_provider(&state.db, &state.config)?;

    // History goes out as it stood before this prompt.
    let snapshot = state
        .sessions
        .update(&id, |session| {
            let snapshot = session.snapshot(provider.history_window());
            if let Some(image) = &body.image {
                session.push_image(image);
            }
            if !prompt.is_empty() {
                session.push_user(&prompt);
            }
            snapshot
        })
        .ok_or_else(|| session_not_found(&id))?;

    tracing::info!(
        session = %id,
        mode = snapshot.mode.as_str(),
        history = snapshot.history.len(),
        "session message"
    );
    let request = ChatRequest::from_snapshot(&snapshot, prompt, body.image);

    match provider.chat(&request).await {
        Ok(reply) => {
            let message = state
                .sessions
                .update(&id, |session| session.push_ai(&reply.content, snapshot.mode).clone())
                .ok_or_else(|| session_not_found(&id))?;
            Ok(Json(SendReply {
                message,
                model: reply.model,
            }))
        }
        Err(e) => {
            state.sessions.update(&id, |session| {
                session.push_notice(ERROR_NOTICE);
            });
            Err(e.into())
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RevealQuery {
    #[serde(default)]
    pub granularity: Granularity,
    pub interval_ms: Option<u64>,
}

/// Replays a stored message as server-sent frames. Each event carries the
/// text revealed so far; the last one has `done: true`.
pub async fn reveal(
    State(state): State<AppState>,
    Path((id, message_id)): Path<(String, String)>,
    Query(query): Query<RevealQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let session = state.sessions.get(&id).ok_or_else(|| session_not_found(&id))?;
    let message = session
        .message(&message_id)
        .ok_or_else(|| AppError::NotFound(format!("Message not found: {}", message_id)))?;

    let interval = query
        .interval_ms
        .map(Duration::from_millis)
        .unwrap_or(DEFAULT_INTERVAL);
    let frames = typewriter::reveal(
        message.content.clone(),
        query.granularity,
        interval,
        state.shutdown.child_token(),
    );
    let events = frames.map(|frame| {
        let event = Event::default()
            .json_data(&frame)
            .unwrap_or_else(|_| Event::default().data(frame.text.clone()));
        Ok(event)
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}
