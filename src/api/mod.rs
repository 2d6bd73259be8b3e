//! HTTP routing layer

pub mod payments;
pub mod payouts;
pub mod webhooks;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use tower::ServiceBuilder;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};

use crate::database::LedgerStore;
use crate::health::HealthChecker;
use crate::middleware::logging::{request_logging_middleware, UuidRequestId};
use crate::payments::GatewayRegistry;
use crate::services::{CallbackIngestor, ReconciliationEngine, WalletCoordinator};

/// Shared handles passed to every handler
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ReconciliationEngine>,
    pub payouts: Arc<WalletCoordinator>,
    pub callbacks: Arc<CallbackIngestor>,
    pub health: HealthChecker,
}

impl AppState {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        gateways: GatewayRegistry,
        currency: &str,
        callback_token: Option<String>,
        deadline: Duration,
    ) -> Self {
        let engine = Arc::new(ReconciliationEngine::new(
            store.clone(),
            gateways.clone(),
            currency,
            deadline,
        ));
        let payouts = Arc::new(WalletCoordinator::new(
            store.clone(),
            gateways,
            currency,
            deadline,
        ));
        let callbacks = Arc::new(CallbackIngestor::new(engine.clone(), callback_token));

        Self {
            engine,
            payouts,
            callbacks,
            health: HealthChecker::new(store),
        }
    }
}

/// GET /health
async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let status = state.health.check_health().await;
    let code = if status.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(status))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/api/orders/{order_id}/payments/qr",
            post(payments::create_qr_payment),
        )
        .route(
            "/api/orders/{order_id}/transaction",
            get(payments::get_order_transaction),
        )
        .route(
            "/api/transactions/{transaction_id}",
            get(payments::get_transaction),
        )
        .route("/api/payouts", post(payouts::create_payout))
        .route("/api/admin/balance", get(payouts::get_admin_balance))
        .route("/api/payouts/{payout_id}", get(payouts::get_payout))
        .route(
            "/api/payouts/{payout_id}/cancel",
            post(payouts::cancel_payout),
        )
        .route(
            "/api/callbacks/payment-requests",
            post(webhooks::payment_request_callback),
        )
        .route(
            "/api/callbacks/payment-methods",
            post(webhooks::payment_method_callback),
        )
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
                .layer(axum::middleware::from_fn(request_logging_middleware))
                .layer(PropagateRequestIdLayer::x_request_id()),
        )
}
