use axum::http::{HeaderMap, StatusCode, header};
use berth_contracts::Viewer;
use berth_store::sha256_hex;

use super::{ApiError, AppState, json_error, store_unavailable};
use crate::config::AuthMode;

pub(super) async fn extract_viewer(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<Viewer, ApiError> {
    match state.config.auth_mode {
        AuthMode::Local => {
            let username = headers
                .get("x-berth-actor")
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .ok_or_else(|| {
                    json_error(
                        StatusCode::UNAUTHORIZED,
                        "ERR_AUTH_REQUIRED",
                        "x-berth-actor header required in local auth mode".to_string(),
                    )
                })?;

            state
                .store
                .viewer_by_username(username)
                .await
                .map_err(store_unavailable)?
                .ok_or_else(|| {
                    json_error(
                        StatusCode::UNAUTHORIZED,
                        "ERR_AUTH_INVALID",
                        "unknown actor".to_string(),
                    )
                })
        }
        AuthMode::Token => {
            let token = bearer_token(headers)?;
            let token_hash = sha256_hex(token.as_bytes());

            state
                .store
                .viewer_by_token_hash(&token_hash)
                .await
                .map_err(store_unavailable)?
                .ok_or_else(|| {
                    json_error(
                        StatusCode::UNAUTHORIZED,
                        "ERR_AUTH_INVALID",
                        "invalid bearer token".to_string(),
                    )
                })
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> Result<String, ApiError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            json_error(
                StatusCode::UNAUTHORIZED,
                "ERR_AUTH_REQUIRED",
                "authorization header required".to_string(),
            )
        })?;

    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .ok_or_else(|| {
            json_error(
                StatusCode::UNAUTHORIZED,
                "ERR_AUTH_INVALID",
                "authorization header must be a bearer token".to_string(),
            )
        })
}
