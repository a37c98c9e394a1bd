use super::{http, with_model_fallback, ChatRequest, ChatResponse, LlmError, EMPTY_REPLY};
use serde::{Deserialize, Serialize};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Tried in order; model ids get retired upstream without notice.
pub const DEFAULT_MODELS: &[&str] = &["gemini-2.0-flash", "gemini-2.5-flash", "gemini-1.5-flash"];

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub base_url: String,
    pub models: Vec<String>,
}

impl GeminiConfig {
    pub fn new(api_key: String, base_url: Option<String>) -> Self {
        Self {
            api_key,
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            models: DEFAULT_MODELS.iter().map(|m| m.to_string()).collect(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    system_instruction: GeminiContent,
}

#[derive(Serialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum GeminiPart {
    Text {
        text: String,
    },
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: GeminiBlob,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiBlob {
    mime_type: String,
    data: String,
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiCandidateContent>,
}

#[derive(Deserialize)]
struct GeminiCandidateContent {
    #[serde(default)]
    parts: Vec<GeminiCandidatePart>,
}

#[derive(Deserialize)]
struct GeminiCandidatePart {
    text: Option<String>,
}

/// generateContent has no chat roles here, so history is folded into the
/// prompt text.
fn context_prompt(request: &ChatRequest) -> String {
    if request.history.is_empty() {
        return request.prompt.clone();
    }
    let history = request
        .history
        .iter()
        .map(|h| format!("{}: {}", h.sender.label(), h.prompt_text()))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "CONVERSATION HISTORY:\n{}\n\nCURRENT QUESTION: {}",
        history, request.prompt
    )
}

fn build_request(request: &ChatRequest) -> GeminiRequest {
    let mut parts = vec![GeminiPart::Text {
        text: context_prompt(request),
    }];
    if let Some(image) = &request.image {
        parts.push(GeminiPart::Inline {
            inline_data: GeminiBlob {
                mime_type: image.mime_type.clone(),
                data: image.data.clone(),
            },
        });
    }

    GeminiRequest {
        contents: vec![GeminiContent { parts }],
        system_instruction: GeminiContent {
            parts: vec![GeminiPart::Text {
                text: request.system_instruction.clone(),
            }],
        },
    }
}

fn reply_text(data: GeminiResponse) -> String {
    data.candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .and_then(|c| c.parts.into_iter().next())
        .and_then(|p| p.text)
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| EMPTY_REPLY.to_string())
}

async fn generate(
    config: &GeminiConfig,
    model: String,
    body: &GeminiRequest,
) -> Result<ChatResponse, LlmError> {
    let url = format!(
        "{}/v1beta/models/{}:generateContent",
        config.base_url.trim_end_matches('/'),
        model
    );

    let resp = http()
        .post(url)
        .header("Content-Type", "application/json")
        .header("x-goog-api-key", &config.api_key)
        .json(body)
        .send()
        .await?;

    if !resp.status().is_success() {
        let status = resp.status().as_u16();
        let text = resp.text().await.unwrap_or_default();
        if status != 404 {
            tracing::error!(status, model = %model, body = %text, "gemini request failed");
        }
        return Err(LlmError::Api {
            status,
            message: text,
        });
    }

    let data: GeminiResponse = resp
        .json()
        .await
        .map_err(|e| LlmError::Parse(e.to_string()))?;

    Ok(ChatResponse {
        content: reply_text(data),
        model,
    })
}

pub async fn chat(config: &GeminiConfig, request: &ChatRequest) -> Result<ChatResponse, LlmError> {
    if config.api_key.is_empty() {
        return Err(LlmError::MissingApiKey("Gemini"));
    }
    let body = build_request(request);
    with_model_fallback(&config.models, |model| generate(config, model, &body)).await
}
