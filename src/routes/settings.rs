use super::{signed_in_user, AppError, AppState};
use crate::config::{ProviderKind, SETTING_KEYS};
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;
use std::collections::HashMap;

/// Keep the first and last four characters of long secrets.
fn mask(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 8 {
        return value.to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

fn check_key(key: &str) -> Result<(), AppError> {
    if SETTING_KEYS.contains(&key) {
        Ok(())
    } else {
        Err(AppError::BadRequest(format!("Unknown setting key: {}", key)))
    }
}

/// Every settings route needs a signed-in account.
pub async fn get_settings(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<HashMap<String, String>>, AppError> {
    signed_in_user(&state, &headers)?;
    let mut map = HashMap::new();
    for key in SETTING_KEYS {
        if let Some(value) = state.db.get_setting(key)? {
            let shown = if key.ends_with("_api_key") {
                mask(&value)
            } else {
                value
            };
            map.insert(key.to_string(), shown);
        }
    }
    Ok(Json(map))
}

#[derive(Debug, Deserialize)]
pub struct SettingValue {
    pub value: String,
}

pub async fn set_setting(
    State(state): State<AppState>,
    Path(key): Path<String>,
    headers: HeaderMap,
    Json(body): Json<SettingValue>,
) -> Result<StatusCode, AppError> {
    let user = signed_in_user(&state, &headers)?;
    check_key(&key)?;
    if key == "provider" {
        body.value
            .parse::<ProviderKind>()
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
    }
    state.db.set_setting(&key, body.value.trim())?;
    tracing::info!(key = %key, user_id = %user.id, "setting updated");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_setting(
    State(state): State<AppState>,
    Path(key): Path<String>,
    headers: HeaderMap,
) -> Result<StatusCode, AppError> {
    signed_in_user(&state, &headers)?;
    check_key(&key)?;
    state.db.delete_setting(&key)?;
    Ok(StatusCode::NO_CONTENT)
}
