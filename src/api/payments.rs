use axum::{
    extract::{Path, State},
    http::HeaderMap,
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use crate::api::AppState;
use crate::error::{AppError, AppResult, ValidationError};
use crate::middleware::error::{tag_request, ApiResponse};

fn parse_order_id(raw: &str) -> AppResult<i64> {
    raw.parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| {
            AppError::validation(ValidationError::InvalidField {
                field: "order_id".to_string(),
                reason: "must be a positive integer".to_string(),
            })
        })
}

/// POST /api/orders/{order_id}/payments/qr
pub async fn create_qr_payment(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
    headers: HeaderMap,
) -> AppResult<impl IntoResponse> {
    let order_id = parse_order_id(&order_id).map_err(tag_request(&headers))?;
    let idempotency_key = headers
        .get("idempotency-key")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.trim().is_empty())
        .map(|v| v.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    info!(order_id = order_id, "QR payment requested");

    let transaction = state
        .engine
        .create_payment_request(order_id, &idempotency_key)
        .await
        .map_err(tag_request(&headers))?;

    Ok(ApiResponse::created(transaction))
}

/// GET /api/orders/{order_id}/transaction
pub async fn get_order_transaction(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
    headers: HeaderMap,
) -> AppResult<impl IntoResponse> {
    let order_id = parse_order_id(&order_id).map_err(tag_request(&headers))?;
    let details = state
        .engine
        .get_transaction_for_order(order_id)
        .await
        .map_err(tag_request(&headers))?;

    Ok(ApiResponse::ok(details))
}

/// GET /api/transactions/{transaction_id}
pub async fn get_transaction(
    State(state): State<AppState>,
    Path(transaction_id): Path<String>,
    headers: HeaderMap,
) -> AppResult<impl IntoResponse> {
    let details = state
        .engine
        .get_transaction(&transaction_id)
        .await
        .map_err(tag_request(&headers))?;

    Ok(ApiResponse::ok(details))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_id_must_be_positive_integer() {
        assert_eq!(parse_order_id("42").unwrap(), 42);
        assert!(parse_order_id("0").is_err());
        assert!(parse_order_id("abc").is_err());
    }
}
