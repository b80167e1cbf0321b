//! Request Handlers

use super::{errors::ApiError, middleware::RequestId};
use crate::dispatcher::RequestDispatcher;
use crate::protocol::request::ProviderParams;
use crate::protocol::response::ProviderResponse;
use crate::signature::SIGNATURE_HEADER;
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header, HeaderMap},
    response::IntoResponse,
    Extension, Json,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// Shared application state
pub struct AppState {
    pub dispatcher: Arc<RequestDispatcher>,
    pub version: String,
    pub metrics_enabled: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// GET /health
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: state.version.clone(),
    })
}

/// GET /groove?request=...
pub async fn provider_get_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Query(pairs): Query<Vec<(String, String)>>,
    headers: HeaderMap,
) -> Result<Json<ProviderResponse>, ApiError> {
    dispatch(&state, request_id, pairs, &headers, None).await
}

/// POST /groove?request=wagerbybatch with the bets as JSON
pub async fn provider_post_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Query(pairs): Query<Vec<(String, String)>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ProviderResponse>, ApiError> {
    let body = (!body.is_empty()).then_some(body.as_ref());
    dispatch(&state, request_id, pairs, &headers, body).await
}

async fn dispatch(
    state: &AppState,
    request_id: RequestId,
    pairs: Vec<(String, String)>,
    headers: &HeaderMap,
    body: Option<&[u8]>,
) -> Result<Json<ProviderResponse>, ApiError> {
    let params = ProviderParams::from_pairs(pairs);
    let signature = headers.get(SIGNATURE_HEADER).and_then(|value| value.to_str().ok());

    debug!(
        request_id = %request_id.0,
        request = params.get("request").unwrap_or_default(),
        "Provider call"
    );

    state
        .dispatcher
        .dispatch(&params, signature, body)
        .await
        .map(Json)
        .map_err(|err| ApiError::protocol(request_id.0, err))
}

/// GET /metrics
pub async fn metrics_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    if !state.metrics_enabled {
        return Ok(([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], String::new()));
    }
    let text = state
        .dispatcher
        .metrics()
        .render()
        .map_err(|e| ApiError::internal_error(request_id.0, format!("Failed to render metrics: {}", e)))?;
    Ok(([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], text))
}
