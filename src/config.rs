//! Process configuration from the environment, plus provider resolution
//! against the settings table.

use crate::db::Database;
use crate::llm::gemini::{self, GeminiConfig};
use crate::llm::openai::{self, OpenAiConfig};
use crate::llm::{LlmError, Provider};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

const DEFAULT_ADDR: &str = "127.0.0.1:3000";

/// Keys accepted by the settings endpoints.
pub const SETTING_KEYS: &[&str] = &[
    "provider",
    "gemini_api_key",
    "gemini_base_url",
    "gateway_api_key",
    "gateway_base_url",
    "gateway_model",
];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid PROBSOLVER_ADDR {value}: {reason}")]
    Addr { value: String, reason: String },
    #[error("Unknown provider: {0} (expected gemini or gateway)")]
    Provider(String),
    #[error("No data directory available; set PROBSOLVER_DATA_DIR")]
    DataDir,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProviderKind {
    #[default]
    Gemini,
    Gateway,
}

impl FromStr for ProviderKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(ProviderKind::Gemini),
            "gateway" => Ok(ProviderKind::Gateway),
            other => Err(ConfigError::Provider(other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub data_dir: PathBuf,
    pub public_url: String,
    pub provider: ProviderKind,
    pub gemini_api_key: Option<String>,
    pub gateway_api_key: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let addr_value = get("PROBSOLVER_ADDR").unwrap_or_else(|| DEFAULT_ADDR.to_string());
        let addr: SocketAddr = addr_value.parse().map_err(|e: std::net::AddrParseError| {
            ConfigError::Addr {
                value: addr_value.clone(),
                reason: e.to_string(),
            }
        })?;

        let data_dir = match get("PROBSOLVER_DATA_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => dirs::data_dir()
                .map(|d| d.join("probsolver"))
                .ok_or(ConfigError::DataDir)?,
        };

        let provider = match get("PROBSOLVER_PROVIDER") {
            Some(p) => p.parse()?,
            None => ProviderKind::default(),
        };

        Ok(Self {
            addr,
            data_dir,
            public_url: get("PROBSOLVER_PUBLIC_URL").unwrap_or_else(|| format!("http://{}", addr)),
            provider,
            gemini_api_key: get("GEMINI_API_KEY"),
            gateway_api_key: get("GATEWAY_API_KEY"),
        })
    }
}

fn setting(db: &Database, key: &str) -> Option<String> {
    db.get_setting(key)
        .ok()
        .flatten()
        .filter(|v| !v.trim().is_empty())
}

/// Build the provider for one request. Stored settings win over the
/// environment; a missing key fails here, before any network call.
pub fn resolve_provider(db: &Database, config: &Config) -> Result<Provider, LlmError> {
    let kind = setting(db, "provider")
        .and_then(|p| p.parse().ok())
        .unwrap_or(config.provider);

    match kind {
        ProviderKind::Gemini => {
            let api_key = setting(db, "gemini_api_key")
                .or_else(|| config.gemini_api_key.clone())
                .ok_or(LlmError::MissingApiKey("Gemini"))?;
            Ok(Provider::Gemini(GeminiConfig::new(
                api_key,
                setting(db, "gemini_base_url"),
            )))
        }
        ProviderKind::Gateway => {
            let api_key = setting(db, "gateway_api_key")
                .or_else(|| config.gateway_api_key.clone())
                .ok_or(LlmError::MissingApiKey("Gateway"))?;
            Ok(Provider::Gateway(OpenAiConfig {
                api_key,
                base_url: setting(db, "gateway_base_url")
                    .unwrap_or_else(|| openai::DEFAULT_BASE_URL.to_string()),
                model: setting(db, "gateway_model")
                    .unwrap_or_else(|| openai::DEFAULT_MODEL.to_string()),
            }))
        }
    }
}

/// Model ids for display; does not need an API key.
pub fn configured_models(db: &Database, config: &Config) -> Vec<crate::llm::ModelInfo> {
    match resolve_provider(db, config) {
        Ok(provider) => provider.models(),
        Err(_) => Provider::Gemini(GeminiConfig::new(String::new(), None)).models(),
    }
}
