use axum::{body::Bytes, extract::State, http::HeaderMap, response::IntoResponse};
use serde::Serialize;
use tracing::info;

use crate::api::AppState;
use crate::error::AppResult;
use crate::middleware::error::{tag_request, ApiResponse};
use crate::services::CallbackKind;

const CALLBACK_TOKEN_HEADER: &str = "x-callback-token";

#[derive(Debug, Serialize)]
pub struct CallbackAck {
    pub applied: bool,
}

async fn ingest(
    state: AppState,
    kind: CallbackKind,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<ApiResponse<CallbackAck>> {
    info!(kind = kind.as_str(), bytes = body.len(), "Received callback");

    let token = headers
        .get(CALLBACK_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok());

    let outcome = state
        .callbacks
        .ingest(kind, token, &body)
        .await
        .map_err(tag_request(&headers))?;

    Ok(ApiResponse::ok(CallbackAck {
        applied: outcome.applied(),
    }))
}

/// POST /api/callbacks/payment-requests
pub async fn payment_request_callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<impl IntoResponse> {
    ingest(state, CallbackKind::PaymentRequest, headers, body).await
}

/// POST /api/callbacks/payment-methods
pub async fn payment_method_callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<impl IntoResponse> {
    ingest(state, CallbackKind::PaymentMethod, headers, body).await
}
