//! Transactional persistence interface consumed by the reconciliation engine
//! and the wallet coordinator.
//!
//! A [`LedgerTx`] is a single database transaction. Dropping it without calling
//! [`LedgerTx::commit`] discards every write made through it, which is what makes
//! deadline cancellation safe: the future owning the transaction is dropped and
//! the store rolls back.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::database::error::DatabaseError;
use crate::database::models::{GatewayPayout, GatewayTransaction, Order, PayoutSync, Wallet};

pub type LedgerResult<T> = Result<T, DatabaseError>;

/// How a callback locates its gateway transaction row
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionLookup {
    /// External transaction id (primary key)
    Id(String),
    /// Gateway payment-method id (secondary key)
    PaymentMethodId(String),
}

impl TransactionLookup {
    pub fn key(&self) -> &str {
        match self {
            TransactionLookup::Id(id) | TransactionLookup::PaymentMethodId(id) => id,
        }
    }

    pub fn column(&self) -> &'static str {
        match self {
            TransactionLookup::Id(_) => "id",
            TransactionLookup::PaymentMethodId(_) => "payment_method_id",
        }
    }
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn begin(&self) -> LedgerResult<Box<dyn LedgerTx>>;

    /// Sum of balances of active wallets, read outside any transaction.
    async fn sum_active_wallet_balances(&self) -> LedgerResult<Decimal>;

    /// Cheap reachability probe used by the health check.
    async fn ping(&self) -> LedgerResult<()>;
}

#[async_trait]
pub trait LedgerTx: Send {
    /// Find an order and lock it for the rest of the transaction, optionally
    /// preloading its line items in stored order.
    async fn find_order(&mut self, order_id: i64, with_items: bool)
        -> LedgerResult<Option<Order>>;

    /// Find a gateway transaction and lock it for the rest of the transaction.
    async fn find_transaction(
        &mut self,
        lookup: &TransactionLookup,
    ) -> LedgerResult<Option<GatewayTransaction>>;

    /// Every transaction recorded for an order, newest first.
    async fn find_transactions_for_order(
        &mut self,
        order_id: i64,
    ) -> LedgerResult<Vec<GatewayTransaction>>;

    async fn insert_transaction(&mut self, transaction: &GatewayTransaction) -> LedgerResult<()>;

    /// Partial update of the status and updated-at columns.
    async fn update_transaction_status(
        &mut self,
        transaction_id: &str,
        status: &str,
        updated_at: DateTime<Utc>,
    ) -> LedgerResult<()>;

    /// Partial update of the payment-status and updated-at columns.
    async fn update_order_payment_status(
        &mut self,
        order_id: i64,
        payment_status: i16,
        updated_at: DateTime<Utc>,
    ) -> LedgerResult<()>;

    /// Find a user's wallet and lock it for the rest of the transaction.
    async fn find_wallet_for_user(&mut self, user_id: i64) -> LedgerResult<Option<Wallet>>;

    /// Whole-column write of the balance; never a relative decrement.
    async fn update_wallet_balance(
        &mut self,
        wallet_id: i64,
        balance: Decimal,
        updated_at: DateTime<Utc>,
    ) -> LedgerResult<()>;

    async fn find_payout(&mut self, payout_id: &str) -> LedgerResult<Option<GatewayPayout>>;

    async fn insert_payout(&mut self, payout: &GatewayPayout) -> LedgerResult<()>;

    async fn update_payout(&mut self, payout_id: &str, sync: &PayoutSync) -> LedgerResult<()>;

    async fn commit(self: Box<Self>) -> LedgerResult<()>;

    async fn rollback(self: Box<Self>) -> LedgerResult<()>;
}
