use super::{http, ChatRequest, ChatResponse, LlmError, EMPTY_REPLY};
use crate::session::Sender;
use serde::{Deserialize, Serialize};

pub const DEFAULT_BASE_URL: &str = "https://ai.gateway.lovable.dev/v1";
pub const DEFAULT_MODEL: &str = "google/gemini-3-flash-preview";

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

#[derive(Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    stream: bool,
}

#[derive(Serialize)]
struct OpenAiMessage {
    role: &'static str,
    content: OpenAiContent,
}

#[derive(Serialize)]
#[serde(untagged)]
enum OpenAiContent {
    Text(String),
    Parts(Vec<OpenAiPart>),
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum OpenAiPart {
    Text { text: String },
    ImageUrl { image_url: OpenAiImageUrl },
}

#[derive(Serialize)]
struct OpenAiImageUrl {
    url: String,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    #[serde(default)]
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiReply,
}

#[derive(Deserialize)]
struct OpenAiReply {
    content: Option<String>,
}

fn build_request(config: &OpenAiConfig, request: &ChatRequest) -> OpenAiRequest {
    let mut messages = vec![OpenAiMessage {
        role: "system",
        content: OpenAiContent::Text(request.system_instruction.clone()),
    }];

    messages.extend(request.history.iter().map(|h| OpenAiMessage {
        role: match h.sender {
            Sender::User => "user",
            Sender::Ai => "assistant",
        },
        content: OpenAiContent::Text(h.prompt_text().to_string()),
    }));

    let content = match &request.image {
        Some(image) => OpenAiContent::Parts(vec![
            OpenAiPart::Text {
                text: request.prompt.clone(),
            },
            OpenAiPart::ImageUrl {
                image_url: OpenAiImageUrl {
                    url: image.data_url(),
                },
            },
        ]),
        None => OpenAiContent::Text(request.prompt.clone()),
    };
    messages.push(OpenAiMessage {
        role: "user",
        content,
    });

    OpenAiRequest {
        model: config.model.clone(),
        messages,
        stream: false,
    }
}

fn reply_text(data: OpenAiResponse) -> String {
    data.choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| EMPTY_REPLY.to_string())
}

pub async fn chat(config: &OpenAiConfig, request: &ChatRequest) -> Result<ChatResponse, LlmError> {
    if config.api_key.is_empty() {
        return Err(LlmError::MissingApiKey("Gateway"));
    }
    let body = build_request(config, request);

    let resp = http()
        .post(format!("{}/chat/completions", config.base_url))
        .header("Content-Type", "application/json")
        .header("Authorization", format!("Bearer {}", config.api_key))
        .json(&body)
        .send()
        .await?;

    if !resp.status().is_success() {
        let status = resp.status().as_u16();
        let text = resp.text().await.unwrap_or_default();
        tracing::error!(status, body = %text, "AI gateway error");
        return Err(LlmError::Api {
            status,
            message: text,
        });
    }

    let data: OpenAiResponse = resp
        .json()
        .await
        .map_err(|e| LlmError::Parse(e.to_string()))?;

    Ok(ChatResponse {
        content: reply_text(data),
        model: config.model.clone(),
    })
}
