//! Payment request creation and callback reconciliation.
//!
//! Every operation opens one ledger transaction, does all of its reads and
//! writes (and, for payment creation, the gateway call) inside it, and
//! commits only when every step succeeded.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::database::models::{GatewayTransaction, Order};
use crate::database::{LedgerStore, LedgerTx, TransactionLookup};
use crate::error::{AppError, AppResult, DomainError, ValidationError};
use crate::payments::types::{BasketItem, BasketItemType, PaymentRequestParams};
use crate::payments::GatewayRegistry;
use crate::services::status::{is_open_attempt, resolve_payment_status, OrderPaymentStatus};
use crate::services::{finish, gateway_failure, ledger_failure, with_deadline};

/// Assembles the gateway basket for an order: one entry per line item in
/// stored order, then delivery, then discount.
pub fn build_basket(order: &Order, currency: &str) -> Vec<BasketItem> {
    let mut basket: Vec<BasketItem> = order
        .items
        .iter()
        .map(|item| BasketItem {
            reference_id: item.product_id.to_string(),
            name: item.product_name.clone(),
            net_unit_amount: item.price,
            quantity: item.quantity,
            currency: currency.to_string(),
            category: "product".to_string(),
            item_type: BasketItemType::PhysicalProduct,
        })
        .collect();

    if order.delivery_cost > Decimal::ZERO {
        basket.push(BasketItem {
            reference_id: "delivery".to_string(),
            name: "Delivery".to_string(),
            net_unit_amount: order.delivery_cost,
            quantity: 1,
            currency: currency.to_string(),
            category: "delivery".to_string(),
            item_type: BasketItemType::Fee,
        });
    }

    if order.total_discount > Decimal::ZERO {
        basket.push(BasketItem {
            reference_id: "discount".to_string(),
            name: "Discount".to_string(),
            net_unit_amount: -order.total_discount,
            quantity: 1,
            currency: currency.to_string(),
            category: "discount".to_string(),
            item_type: BasketItemType::Discount,
        });
    }

    basket
}

/// A transaction together with the order it pays for
#[derive(Debug, Clone, Serialize)]
pub struct TransactionDetails {
    #[serde(flatten)]
    pub transaction: GatewayTransaction,
    pub order: Order,
}

/// A gateway-reported status for a transaction, located by one of its keys
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub lookup: TransactionLookup,
    pub status: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackOutcome {
    Applied,
    /// Stored status already equals the incoming one
    Unchanged,
    /// No local transaction for the key
    Untracked,
}

impl CallbackOutcome {
    pub fn applied(&self) -> bool {
        matches!(self, CallbackOutcome::Applied)
    }
}

pub struct ReconciliationEngine {
    store: Arc<dyn LedgerStore>,
    gateways: GatewayRegistry,
    currency: String,
    deadline: Duration,
}

impl ReconciliationEngine {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        gateways: GatewayRegistry,
        currency: impl Into<String>,
        deadline: Duration,
    ) -> Self {
        Self {
            store,
            gateways,
            currency: currency.into(),
            deadline,
        }
    }

    /// Creates a QR payment request at the payment gateway for an order and
    /// records the resulting transaction.
    pub async fn create_payment_request(
        &self,
        order_id: i64,
        idempotency_key: &str,
    ) -> AppResult<GatewayTransaction> {
        const OP: &str = "create_payment_request";
        if idempotency_key.trim().is_empty() {
            return Err(AppError::validation(ValidationError::MissingField {
                field: "idempotency_key".to_string(),
            }));
        }

        with_deadline(OP, self.deadline, async {
            let mut tx = self
                .store
                .begin()
                .await
                .map_err(|e| ledger_failure(OP, "begin", e))?;
            let result = self
                .create_payment_request_in(tx.as_mut(), order_id, idempotency_key)
                .await;
            finish(tx, result, OP).await
        })
        .await
    }

    async fn create_payment_request_in(
        &self,
        tx: &mut dyn LedgerTx,
        order_id: i64,
        idempotency_key: &str,
    ) -> AppResult<GatewayTransaction> {
        const OP: &str = "create_payment_request";

        let order = tx
            .find_order(order_id, true)
            .await
            .map_err(|e| ledger_failure(OP, "find_order", e))?
            .ok_or_else(|| {
                warn!(operation = OP, order_id = order_id, "order not found");
                AppError::domain(DomainError::OrderNotFound { order_id })
            })?;

        if order.amount <= Decimal::ZERO {
            return Err(AppError::validation(ValidationError::InvalidAmount {
                amount: order.amount.to_string(),
                reason: "order amount must be greater than zero".to_string(),
            }));
        }

        Self::ensure_payable(tx, &order).await?;

        let gateway = self.gateways.payments();
        let provider = gateway.name();
        let params = PaymentRequestParams {
            basket: build_basket(&order, &self.currency),
            reference_id: order.invoice.clone(),
            amount: order.amount,
            currency: self.currency.clone(),
            description: format!("Payment for order {}", order.invoice),
            customer_id: Some(order.user_id.to_string()),
            metadata: serde_json::json!({
                "order_id": order.id,
                "invoice": order.invoice,
            }),
            idempotency_key: idempotency_key.to_string(),
        };

        debug!(
            operation = OP,
            order_id = order_id,
            basket_items = params.basket.len(),
            provider = %provider,
            "requesting payment"
        );

        let record = gateway
            .create_payment_request(params)
            .await
            .map_err(|e| gateway_failure(OP, provider.as_str(), e))?;

        let now = Utc::now();
        let transaction = GatewayTransaction {
            id: record.id,
            order_id: order.id,
            provider: provider.as_str().to_string(),
            reference_id: record.reference_id,
            amount: record.amount,
            currency: record.currency,
            payment_method: record.payment_method,
            channel_code: record.channel_code,
            payment_method_id: record.payment_method_id,
            qr_string: record.qr_string,
            status: record.status,
            expires_at: record.expires_at,
            metadata: record.metadata,
            created_at: record.created.unwrap_or(now),
            updated_at: record.updated.unwrap_or(now),
        };

        tx.insert_transaction(&transaction)
            .await
            .map_err(|e| ledger_failure(OP, "insert_transaction", e))?;

        info!(
            operation = OP,
            order_id = order_id,
            transaction_id = %transaction.id,
            status = %transaction.status,
            "payment request recorded"
        );
        Ok(transaction)
    }

    /// A paid order, or one with an attempt that is still open, must not be
    /// charged again.
    async fn ensure_payable(tx: &mut dyn LedgerTx, order: &Order) -> AppResult<()> {
        const OP: &str = "create_payment_request";

        if order.payment_status == OrderPaymentStatus::Paid.code() {
            warn!(operation = OP, order_id = order.id, "order already paid");
            return Err(AppError::domain(DomainError::OrderAlreadyPaid {
                order_id: order.id,
            }));
        }

        let existing = tx
            .find_transactions_for_order(order.id)
            .await
            .map_err(|e| ledger_failure(OP, "find_transactions_for_order", e))?;
        if let Some(open) = existing.iter().find(|t| is_open_attempt(&t.status)) {
            warn!(
                operation = OP,
                order_id = order.id,
                transaction_id = %open.id,
                status = %open.status,
                "order already has an open payment request"
            );
            return Err(AppError::domain(DomainError::PaymentInProgress {
                order_id: order.id,
                transaction_id: open.id.clone(),
            }));
        }
        Ok(())
    }

    pub async fn get_transaction(&self, transaction_id: &str) -> AppResult<TransactionDetails> {
        const OP: &str = "get_transaction";

        with_deadline(OP, self.deadline, async {
            let mut tx = self
                .store
                .begin()
                .await
                .map_err(|e| ledger_failure(OP, "begin", e))?;
            let result = Self::load_details(tx.as_mut(), transaction_id).await;
            finish(tx, result, OP).await
        })
        .await
    }

    /// The most recent transaction recorded for an order, with the order.
    pub async fn get_transaction_for_order(&self, order_id: i64) -> AppResult<TransactionDetails> {
        const OP: &str = "get_transaction_for_order";

        with_deadline(OP, self.deadline, async {
            let mut tx = self
                .store
                .begin()
                .await
                .map_err(|e| ledger_failure(OP, "begin", e))?;
            let result = Self::load_order_details(tx.as_mut(), order_id).await;
            finish(tx, result, OP).await
        })
        .await
    }

    async fn load_order_details(
        tx: &mut dyn LedgerTx,
        order_id: i64,
    ) -> AppResult<TransactionDetails> {
        const OP: &str = "get_transaction_for_order";

        let order = tx
            .find_order(order_id, true)
            .await
            .map_err(|e| ledger_failure(OP, "find_order", e))?
            .ok_or_else(|| AppError::domain(DomainError::OrderNotFound { order_id }))?;

        let transaction = tx
            .find_transactions_for_order(order_id)
            .await
            .map_err(|e| ledger_failure(OP, "find_transactions_for_order", e))?
            .into_iter()
            .next()
            .ok_or_else(|| {
                AppError::domain(DomainError::TransactionNotFound {
                    transaction_id: format!("order:{}", order_id),
                })
            })?;

        Ok(TransactionDetails { transaction, order })
    }

    async fn load_details(
        tx: &mut dyn LedgerTx,
        transaction_id: &str,
    ) -> AppResult<TransactionDetails> {
        const OP: &str = "get_transaction";

        let transaction = tx
            .find_transaction(&TransactionLookup::Id(transaction_id.to_string()))
            .await
            .map_err(|e| ledger_failure(OP, "find_transaction", e))?
            .ok_or_else(|| {
                AppError::domain(DomainError::TransactionNotFound {
                    transaction_id: transaction_id.to_string(),
                })
            })?;

        let order = tx
            .find_order(transaction.order_id, true)
            .await
            .map_err(|e| ledger_failure(OP, "find_order", e))?
            .ok_or_else(|| {
                AppError::domain(DomainError::OrderNotFound {
                    order_id: transaction.order_id,
                })
            })?;

        Ok(TransactionDetails { transaction, order })
    }

    /// Applies a gateway-reported status to the matching transaction and its
    /// order. Untracked keys and repeated statuses are acknowledged without
    /// writing anything.
    pub async fn apply_status(&self, update: StatusUpdate) -> AppResult<CallbackOutcome> {
        const OP: &str = "apply_status";

        with_deadline(OP, self.deadline, async {
            let mut tx = self
                .store
                .begin()
                .await
                .map_err(|e| ledger_failure(OP, "begin", e))?;
            let result = Self::apply_status_in(tx.as_mut(), &update).await;
            finish(tx, result, OP).await
        })
        .await
    }

    async fn apply_status_in(
        tx: &mut dyn LedgerTx,
        update: &StatusUpdate,
    ) -> AppResult<CallbackOutcome> {
        const OP: &str = "apply_status";

        let Some(transaction) = tx
            .find_transaction(&update.lookup)
            .await
            .map_err(|e| ledger_failure(OP, "find_transaction", e))?
        else {
            info!(
                operation = OP,
                lookup = update.lookup.column(),
                key = update.lookup.key(),
                status = %update.status,
                "callback for untracked transaction acknowledged"
            );
            return Ok(CallbackOutcome::Untracked);
        };

        if transaction.status.trim().eq_ignore_ascii_case(update.status.trim()) {
            debug!(
                operation = OP,
                transaction_id = %transaction.id,
                status = %update.status,
                "status already applied"
            );
            return Ok(CallbackOutcome::Unchanged);
        }

        let order = tx
            .find_order(transaction.order_id, false)
            .await
            .map_err(|e| ledger_failure(OP, "find_order", e))?
            .ok_or_else(|| {
                AppError::domain(DomainError::OrderNotFound {
                    order_id: transaction.order_id,
                })
            })?;

        let now = Utc::now();
        tx.update_transaction_status(&transaction.id, &update.status, now)
            .await
            .map_err(|e| ledger_failure(OP, "update_transaction_status", e))?;

        let current = order.payment_status;
        let next = resolve_payment_status(&update.status, current);

        if OrderPaymentStatus::from_gateway(&update.status).is_none() {
            warn!(
                operation = OP,
                transaction_id = %transaction.id,
                status = %update.status,
                "unmapped gateway status, order payment status kept"
            );
        }

        // last received status wins; surface regressions out of a final state
        let leaving_terminal = OrderPaymentStatus::from_code(current)
            .map(|s| s.is_terminal())
            .unwrap_or(false);
        if leaving_terminal && next != current {
            warn!(
                operation = OP,
                transaction_id = %transaction.id,
                order_id = order.id,
                from_status = current,
                to_status = next,
                previous_gateway_status = %transaction.status,
                incoming_gateway_status = %update.status,
                "order leaves a terminal payment status, callbacks may be out of order"
            );
        }

        tx.update_order_payment_status(order.id, next, now)
            .await
            .map_err(|e| ledger_failure(OP, "update_order_payment_status", e))?;

        info!(
            operation = OP,
            transaction_id = %transaction.id,
            order_id = order.id,
            gateway_status = %update.status,
            payment_status = next,
            "callback applied"
        );
        Ok(CallbackOutcome::Applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::OrderItem;

    fn order(delivery: i64, discount: i64) -> Order {
        let now = Utc::now();
        Order {
            id: 1,
            user_id: 9,
            invoice: "INV-1".to_string(),
            amount: Decimal::from(100_000),
            delivery_cost: Decimal::from(delivery),
            total_discount: Decimal::from(discount),
            payment_status: 0,
            created_at: now,
            updated_at: now,
            items: vec![
                OrderItem {
                    id: 1,
                    order_id: 1,
                    product_id: 31,
                    product_name: "Beans".to_string(),
                    price: Decimal::from(20_000),
                    quantity: 3,
                },
                OrderItem {
                    id: 2,
                    order_id: 1,
                    product_id: 17,
                    product_name: "Filter".to_string(),
                    price: Decimal::from(10_000),
                    quantity: 1,
                },
            ],
        }
    }

    #[test]
    fn basket_appends_delivery_then_discount() {
        let basket = build_basket(&order(5_000, 2_500), "IDR");
        let refs: Vec<&str> = basket.iter().map(|b| b.reference_id.as_str()).collect();
        assert_eq!(refs, vec!["31", "17", "delivery", "discount"]);
        assert_eq!(basket[3].net_unit_amount, Decimal::from(-2_500));
        assert_eq!(basket[3].item_type, BasketItemType::Discount);
        assert!(basket.iter().all(|b| b.currency == "IDR"));
    }

    #[test]
    fn basket_skips_zero_delivery_and_discount() {
        let basket = build_basket(&order(0, 0), "IDR");
        assert_eq!(basket.len(), 2);
        assert!(basket.iter().all(|b| b.category == "product"));
    }

    #[test]
    fn outcome_reports_applied_only_for_writes() {
        assert!(CallbackOutcome::Applied.applied());
        assert!(!CallbackOutcome::Unchanged.applied());
        assert!(!CallbackOutcome::Untracked.applied());
    }
}
