use super::{AppError, AppState};
use crate::config::{configured_models, resolve_provider};
use crate::llm::{ChatRequest, InlineImage, ModelInfo};
use crate::preview::extract_preview;
use crate::session::{trailing, HistoryEntry, Mode, SessionSnapshot};
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub async fn index() -> Json<Value> {
    Json(json!({
        "message": "ProbSolver AI backend",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

#[derive(Debug, Deserialize)]
pub struct ChatBody {
    #[serde(default)]
    pub prompt: String,
    pub mode: Option<String>,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
    pub image: Option<InlineImage>,
}

#[derive(Debug, Serialize)]
pub struct ChatReply {
    pub response: String,
    pub mode: Mode,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
}

/// Unknown or missing modes answer as the study tutor.
fn parse_mode(mode: Option<&str>) -> Mode {
    match mode {
        None => Mode::default(),
        Some(m) => m.parse().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "falling back to study mode");
            Mode::default()
        }),
    }
}

/// Stateless chat: the client sends its own history and gets the raw reply
/// back, plus the assembled preview in code mode.
pub async fn chat(
    State(state): State<AppState>,
    Json(body): Json<ChatBody>,
) -> Result<Json<ChatReply>, AppError> {
    let prompt = body.prompt.trim();
    if prompt.is_empty() && body.image.is_none() {
        return Err(AppError::BadRequest("Prompt is required".into()));
    }
    if let Some(image) = &body.image {
        image.validate()?;
    }

    let mode = parse_mode(body.mode.as_deref());
    let provider = resolve_provider(&state.db, &state.config)?;
    let snapshot = SessionSnapshot {
        mode,
        history: trailing(&body.history, provider.history_window()),
    };
    tracing::info!(
        mode = mode.as_str(),
        history = snapshot.history.len(),
        has_image = body.image.is_some(),
        "chat request"
    );

    let request = ChatRequest::from_snapshot(&snapshot, prompt, body.image.clone());
    let reply = provider.chat(&request).await?;
    let preview = if mode.uses_preview() {
        extract_preview(&reply.content)
    } else {
        None
    };

    Ok(Json(ChatReply {
        response: reply.content,
        mode,
        model: reply.model,
        preview,
    }))
}

#[derive(Debug, Deserialize)]
pub struct ExtractBody {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct ExtractReply {
    pub html: Option<String>,
}

pub async fn extract(Json(body): Json<ExtractBody>) -> Json<ExtractReply> {
    Json(ExtractReply {
        html: extract_preview(&body.text),
    })
}

pub async fn models(State(state): State<AppState>) -> Json<Vec<ModelInfo>> {
    Json(configured_models(&state.db, &state.config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmError;
    use crate::routes::test_state;

    #[test]
    fn test_parse_mode_falls_back_to_study() {
        assert_eq!(parse_mode(Some("code")), Mode::Code);
        assert_eq!(parse_mode(Some("poetry")), Mode::Study);
        assert_eq!(parse_mode(None), Mode::Study);
    }

    #[tokio::test]
    async fn test_empty_prompt_is_rejected() {
        let (_dir, state) = test_state();
        let body = ChatBody {
            prompt: "   ".into(),
            mode: Some("code".into()),
            history: Vec::new(),
            image: None,
        };
        let err = chat(State(state), Json(body)).await.unwrap_err();
        assert_eq!(err.to_string(), "Prompt is required");
    }

    #[tokio::test]
    async fn test_missing_key_fails_before_network() {
        let (_dir, state) = test_state();
        let body = ChatBody {
            prompt: "What is 2+2?".into(),
            mode: None,
            history: Vec::new(),
            image: None,
        };
        let err = chat(State(state), Json(body)).await.unwrap_err();
        assert!(matches!(err, AppError::Llm(LlmError::MissingApiKey("Gemini"))));
    }

    #[tokio::test]
    async fn test_bad_image_is_rejected() {
        let (_dir, state) = test_state();
        let body = ChatBody {
            prompt: String::new(),
            mode: Some("image".into()),
            history: Vec::new(),
            image: Some(InlineImage {
                mime_type: "application/pdf".into(),
                data: "aGVsbG8=".into(),
            }),
        };
        let err = chat(State(state), Json(body)).await.unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_extract_endpoint() {
        let text = "```html\n<h1>Hi</h1>\n```\n```css\nh1{color:red}\n```".to_string();
        let Json(reply) = extract(Json(ExtractBody { text })).await;
        let html = reply.html.unwrap();
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<h1>Hi</h1>"));

        let Json(reply) = extract(Json(ExtractBody {
            text: "no code here".into(),
        }))
        .await;
        assert!(reply.html.is_none());
    }

    #[tokio::test]
    async fn test_models_listed() {
        let (_dir, state) = test_state();
        let Json(models) = models(State(state)).await;
        assert_eq!(models[0].id, "gemini-2.0-flash");
    }
}
