pub mod gemini;
pub mod openai;

use crate::session::{HistoryEntry, SessionSnapshot};
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::LazyLock;

/// Shown when the provider answers 2xx but without any text.
pub const EMPTY_REPLY: &str = "Sorry, I could not process your request.";

static HTTP: LazyLock<Client> = LazyLock::new(Client::new);

pub(crate) fn http() -> &'static Client {
    &HTTP
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ModelInfo {
    pub id: String,
    pub name: String,
    pub provider: String,
}

/// Base64 image attached to a prompt.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct InlineImage {
    #[serde(alias = "mimeType")]
    pub mime_type: String,
    pub data: String,
}

impl InlineImage {
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }

    pub fn validate(&self) -> Result<(), LlmError> {
        if !self.mime_type.starts_with("image/") {
            return Err(LlmError::InvalidImage(format!(
                "unsupported type {}",
                self.mime_type
            )));
        }
        base64::engine::general_purpose::STANDARD
            .decode(self.data.as_bytes())
            .map_err(|e| LlmError::InvalidImage(e.to_string()))?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub system_instruction: String,
    pub history: Vec<HistoryEntry>,
    pub prompt: String,
    pub image: Option<InlineImage>,
}

impl ChatRequest {
    pub fn from_snapshot(
        snapshot: &SessionSnapshot,
        prompt: impl Into<String>,
        image: Option<InlineImage>,
    ) -> Self {
        Self {
            system_instruction: crate::prompts::system_instruction(snapshot.mode).to_string(),
            history: snapshot.history.clone(),
            prompt: prompt.into(),
            image,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ChatResponse {
    pub content: String,
    pub model: String,
}

/// Where prompts go: Google's generateContent API directly, or an
/// OpenAI-compatible gateway.
#[derive(Debug, Clone)]
pub enum Provider {
    Gemini(gemini::GeminiConfig),
    Gateway(openai::OpenAiConfig),
}

impl Provider {
    /// How many trailing history entries go out with each request.
    pub fn history_window(&self) -> usize {
        match self {
            Provider::Gemini(_) => 3,
            Provider::Gateway(_) => 5,
        }
    }

    pub fn models(&self) -> Vec<ModelInfo> {
        match self {
            Provider::Gemini(config) => config
                .models
                .iter()
                .map(|m| ModelInfo {
                    id: m.clone(),
                    name: m.clone(),
                    provider: "Gemini".into(),
                })
                .collect(),
            Provider::Gateway(config) => vec![ModelInfo {
                id: config.model.clone(),
                name: config.model.clone(),
                provider: "Gateway".into(),
            }],
        }
    }

    pub async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, LlmError> {
        match self {
            Provider::Gemini(config) => gemini::chat(config, request).await,
            Provider::Gateway(config) => openai::chat(config, request).await,
        }
    }
}

/// Try each model in turn. Only a 404 moves on to the next one; any other
/// outcome is returned as is.
pub async fn with_model_fallback<F, Fut>(
    models: &[String],
    mut attempt: F,
) -> Result<ChatResponse, LlmError>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<ChatResponse, LlmError>>,
{
    let mut last_body = String::new();
    for model in models {
        match attempt(model.clone()).await {
            Err(LlmError::Api { status: 404, message }) => {
                tracing::warn!(model = %model, "model not found, trying next");
                last_body = message;
            }
            other => return other,
        }
    }
    Err(LlmError::ModelNotFound { last_body })
}

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(reqwest::Error),
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("{0} API key not configured")]
    MissingApiKey(&'static str),
    #[error("API error: 404 - Model not found. Last response: {last_body}")]
    ModelNotFound { last_body: String },
    #[error("Invalid image: {0}")]
    InvalidImage(String),
}

impl From<reqwest::Error> for LlmError {
    /// The request URL is dropped; it may carry credentials.
    fn from(e: reqwest::Error) -> Self {
        LlmError::Http(e.without_url())
    }
}

impl Serialize for LlmError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{Mode, Sender};
    use std::cell::RefCell;

    fn ok(model: &str) -> Result<ChatResponse, LlmError> {
        Ok(ChatResponse {
            content: "hi".into(),
            model: model.into(),
        })
    }

    fn models() -> Vec<String> {
        vec!["a".into(), "b".into(), "c".into()]
    }

    #[tokio::test]
    async fn test_fallback_moves_past_404() {
        let tried = RefCell::new(Vec::new());
        let result = with_model_fallback(&models(), |m| {
            tried.borrow_mut().push(m.clone());
            async move {
                if m == "c" {
                    ok(&m)
                } else {
                    Err(LlmError::Api {
                        status: 404,
                        message: format!("{} gone", m),
                    })
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(result.model, "c");
        assert_eq!(*tried.borrow(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_fallback_stops_on_other_errors() {
        let tried = RefCell::new(0);
        let err = with_model_fallback(&models(), |_| {
            *tried.borrow_mut() += 1;
            async {
                Err::<ChatResponse, _>(LlmError::Api {
                    status: 429,
                    message: "slow down".into(),
                })
            }
        })
        .await
        .unwrap_err();
        assert!(matches!(err, LlmError::Api { status: 429, .. }));
        assert_eq!(*tried.borrow(), 1);
    }

    #[tokio::test]
    async fn test_fallback_exhausted() {
        let err = with_model_fallback(&models(), |m| async move {
            Err::<ChatResponse, _>(LlmError::Api {
                status: 404,
                message: format!("no {}", m),
            })
        })
        .await
        .unwrap_err();
        match err {
            LlmError::ModelNotFound { last_body } => assert_eq!(last_body, "no c"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_image_validation() {
        let good = InlineImage {
            mime_type: "image/png".into(),
            data: "aGVsbG8=".into(),
        };
        assert!(good.validate().is_ok());
        let bad_type = InlineImage {
            mime_type: "text/plain".into(),
            ..good.clone()
        };
        assert!(bad_type.validate().is_err());
        let bad_data = InlineImage {
            data: "not base64!".into(),
            ..good
        };
        assert!(bad_data.validate().is_err());
    }

    #[test]
    fn test_request_from_snapshot_uses_mode_prompt() {
        let snapshot = SessionSnapshot {
            mode: Mode::Code,
            history: vec![HistoryEntry {
                content: "earlier".into(),
                sender: Sender::User,
                is_image: false,
            }],
        };
        let request = ChatRequest::from_snapshot(&snapshot, "build a clock", None);
        assert_eq!(request.system_instruction, crate::prompts::CODE_PROMPT);
        assert_eq!(request.history.len(), 1);
        assert_eq!(request.prompt, "build a clock");
    }
}
