use axum::{
    body::Bytes,
    extract::{Path, State},
    http::HeaderMap,
    response::IntoResponse,
};

use crate::api::AppState;
use crate::error::{AppError, AppResult, ValidationError};
use crate::middleware::error::{tag_request, ApiResponse};
use crate::services::PayoutRequest;

/// POST /api/payouts
pub async fn create_payout(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<impl IntoResponse> {
    let request: PayoutRequest = serde_json::from_slice(&body)
        .map_err(|e| {
            AppError::validation(ValidationError::MalformedPayload {
                reason: e.to_string(),
            })
        })
        .map_err(tag_request(&headers))?;

    let payout = state
        .payouts
        .create_payout(request)
        .await
        .map_err(tag_request(&headers))?;

    Ok(ApiResponse::created(payout))
}

/// GET /api/admin/balance
pub async fn get_admin_balance(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<impl IntoResponse> {
    let balance = state
        .payouts
        .get_balance()
        .await
        .map_err(tag_request(&headers))?;

    Ok(ApiResponse::ok(balance))
}

/// GET /api/payouts/{payout_id}
pub async fn get_payout(
    State(state): State<AppState>,
    Path(payout_id): Path<String>,
    headers: HeaderMap,
) -> AppResult<impl IntoResponse> {
    let payout = state
        .payouts
        .get_payout_by_id(&payout_id)
        .await
        .map_err(tag_request(&headers))?;

    Ok(ApiResponse::ok(payout))
}

/// POST /api/payouts/{payout_id}/cancel
pub async fn cancel_payout(
    State(state): State<AppState>,
    Path(payout_id): Path<String>,
    headers: HeaderMap,
) -> AppResult<impl IntoResponse> {
    let payout = state
        .payouts
        .cancel_payout(&payout_id)
        .await
        .map_err(tag_request(&headers))?;

    Ok(ApiResponse::ok(payout))
}
