use std::collections::BTreeMap;
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use berth_store::{Store, StoreError};
use serde::Serialize;

use crate::config::{StartupError, WebConfig};
use crate::rate_limit::WriteLimiter;

mod lease;
mod pager;
mod paste;
mod viewer;

#[derive(Clone)]
pub struct AppState {
    pub config: WebConfig,
    store: Store,
    write_limiter: WriteLimiter,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error_code: &'static str,
    pub message: String,
}

fn json_error(status: StatusCode, error_code: &'static str, message: String) -> ApiError {
    (status, Json(ErrorResponse {
        error_code,
        message,
    }))
}

/// The merged terminal outcome for a missing record or a capability the
/// viewer does not hold. The message never says which.
fn not_found() -> ApiError {
    json_error(
        StatusCode::NOT_FOUND,
        "ERR_NOT_FOUND",
        "no such record".to_string(),
    )
}

fn store_unavailable(err: StoreError) -> ApiError {
    tracing::error!(error = %err, "record store unavailable");
    json_error(
        StatusCode::SERVICE_UNAVAILABLE,
        "ERR_STORE_UNAVAILABLE",
        "record store unavailable".to_string(),
    )
}

fn rate_limited() -> ApiError {
    json_error(
        StatusCode::TOO_MANY_REQUESTS,
        "ERR_RATE_LIMITED",
        "rate limit exceeded for write actions".to_string(),
    )
}

pub async fn router(config: WebConfig) -> Result<Router, StartupError> {
    let store = Store::connect_and_migrate(
        &config.db_url,
        Duration::from_millis(config.store_timeout_ms),
    )
    .await
    .map_err(|err| StartupError {
        code: "ERR_DB_UNAVAILABLE",
        message: format!("failed to initialize record store: {}", err),
    })?;

    let write_limiter = WriteLimiter::new(Duration::from_secs(config.rate_limit_window_secs.max(1)));

    let state = AppState {
        config,
        store,
        write_limiter,
    };

    Ok(Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route("/lease/{id}", get(lease::lease_view))
        .route("/lease/{id}/release", post(lease::lease_release))
        .route(
            "/paste/create",
            get(paste::create_form).post(paste::create_submit),
        )
        .route("/paste/{id}", get(paste::paste_view))
        .route(
            "/paste/{id}/edit",
            get(paste::edit_form).post(paste::edit_submit),
        )
        .with_state(state))
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Debug, Serialize)]
struct ReadyzResponse {
    status: &'static str,
    checks: BTreeMap<&'static str, bool>,
}

async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let mut checks = BTreeMap::new();
    checks.insert("store", state.store.ping().await.is_ok());

    let all_ready = checks.values().all(|ok| *ok);
    let status = if all_ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(ReadyzResponse {
            status: if all_ready { "ready" } else { "not_ready" },
            checks,
        }),
    )
}

async fn metrics(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    if state.config.metrics_require_auth
        && let Err(err) = viewer::extract_viewer(&state, &headers).await
    {
        return err.into_response();
    }

    match crate::metrics::render() {
        Ok((body, content_type)) => {
            let mut headers = HeaderMap::new();
            if let Ok(value) = HeaderValue::from_str(content_type.as_str()) {
                headers.insert(header::CONTENT_TYPE, value);
            }
            (headers, body).into_response()
        }
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}
