use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::debug;

use crate::database::error::{DatabaseError, DatabaseErrorKind};
use crate::database::ledger::{LedgerResult, LedgerStore, LedgerTx, TransactionLookup};
use crate::database::models::{
    GatewayPayout, GatewayTransaction, Order, OrderItem, PayoutSync, Wallet, WalletStatus,
};

const ORDER_COLUMNS: &str = "id, user_id, invoice, amount, delivery_cost, total_discount, \
                             payment_status, created_at, updated_at";

const TRANSACTION_COLUMNS: &str = "id, order_id, provider, reference_id, amount, currency, \
                                   payment_method, channel_code, payment_method_id, qr_string, \
                                   status, expires_at, metadata, created_at, updated_at";

const PAYOUT_COLUMNS: &str = "id, provider, user_id, business_id, reference_id, amount, currency, \
                              description, channel_code, account_number, account_holder_name, \
                              status, estimated_arrival_at, created_at, updated_at";

/// Postgres-backed ledger store
#[derive(Clone)]
pub struct PgLedgerStore {
    pool: PgPool,
}

impl PgLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn begin(&self) -> LedgerResult<Box<dyn LedgerTx>> {
        let tx = self.pool.begin().await.map_err(DatabaseError::from_sqlx)?;
        Ok(Box::new(PgLedgerTx { tx }))
    }

    async fn sum_active_wallet_balances(&self) -> LedgerResult<Decimal> {
        sqlx::query_scalar::<_, Decimal>(
            "SELECT COALESCE(SUM(balance), 0) FROM wallets WHERE status = $1",
        )
        .bind(WalletStatus::Active.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    async fn ping(&self) -> LedgerResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)?;
        Ok(())
    }
}

/// One open Postgres transaction. sqlx rolls it back when dropped uncommitted.
pub struct PgLedgerTx {
    tx: Transaction<'static, Postgres>,
}

fn ensure_updated(rows: u64, table: &str, id: &str) -> LedgerResult<()> {
    if rows == 0 {
        return Err(DatabaseError::new(DatabaseErrorKind::Query {
            message: format!("no {} row updated for id {}", table, id),
        }));
    }
    Ok(())
}

#[async_trait]
impl LedgerTx for PgLedgerTx {
    async fn find_order(
        &mut self,
        order_id: i64,
        with_items: bool,
    ) -> LedgerResult<Option<Order>> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {} FROM orders WHERE id = $1 FOR UPDATE",
            ORDER_COLUMNS
        ))
        .bind(order_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        let Some(mut order) = order else {
            return Ok(None);
        };

        if with_items {
            order.items = sqlx::query_as::<_, OrderItem>(
                "SELECT id, order_id, product_id, product_name, price, quantity
                 FROM order_items
                 WHERE order_id = $1
                 ORDER BY id ASC",
            )
            .bind(order_id)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(DatabaseError::from_sqlx)?;
        }

        Ok(Some(order))
    }

    async fn find_transaction(
        &mut self,
        lookup: &TransactionLookup,
    ) -> LedgerResult<Option<GatewayTransaction>> {
        sqlx::query_as::<_, GatewayTransaction>(&format!(
            "SELECT {} FROM gateway_transactions WHERE {} = $1 FOR UPDATE",
            TRANSACTION_COLUMNS,
            lookup.column()
        ))
        .bind(lookup.key())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    async fn find_transactions_for_order(
        &mut self,
        order_id: i64,
    ) -> LedgerResult<Vec<GatewayTransaction>> {
        sqlx::query_as::<_, GatewayTransaction>(&format!(
            "SELECT {} FROM gateway_transactions
             WHERE order_id = $1
             ORDER BY created_at DESC, id DESC",
            TRANSACTION_COLUMNS
        ))
        .bind(order_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    async fn insert_transaction(&mut self, transaction: &GatewayTransaction) -> LedgerResult<()> {
        sqlx::query(
            "INSERT INTO gateway_transactions
             (id, order_id, provider, reference_id, amount, currency, payment_method,
              channel_code, payment_method_id, qr_string, status, expires_at, metadata,
              created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)",
        )
        .bind(&transaction.id)
        .bind(transaction.order_id)
        .bind(&transaction.provider)
        .bind(&transaction.reference_id)
        .bind(transaction.amount)
        .bind(&transaction.currency)
        .bind(&transaction.payment_method)
        .bind(&transaction.channel_code)
        .bind(&transaction.payment_method_id)
        .bind(&transaction.qr_string)
        .bind(&transaction.status)
        .bind(transaction.expires_at)
        .bind(&transaction.metadata)
        .bind(transaction.created_at)
        .bind(transaction.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        debug!(transaction_id = %transaction.id, "gateway transaction inserted");
        Ok(())
    }

    async fn update_transaction_status(
        &mut self,
        transaction_id: &str,
        status: &str,
        updated_at: DateTime<Utc>,
    ) -> LedgerResult<()> {
        let result = sqlx::query(
            "UPDATE gateway_transactions SET status = $2, updated_at = $3 WHERE id = $1",
        )
        .bind(transaction_id)
        .bind(status)
        .bind(updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        ensure_updated(result.rows_affected(), "gateway_transactions", transaction_id)
    }

    async fn update_order_payment_status(
        &mut self,
        order_id: i64,
        payment_status: i16,
        updated_at: DateTime<Utc>,
    ) -> LedgerResult<()> {
        let result =
            sqlx::query("UPDATE orders SET payment_status = $2, updated_at = $3 WHERE id = $1")
                .bind(order_id)
                .bind(payment_status)
                .bind(updated_at)
                .execute(&mut *self.tx)
                .await
                .map_err(DatabaseError::from_sqlx)?;

        ensure_updated(result.rows_affected(), "orders", &order_id.to_string())
    }

    async fn find_wallet_for_user(&mut self, user_id: i64) -> LedgerResult<Option<Wallet>> {
        sqlx::query_as::<_, Wallet>(
            "SELECT id, user_id, balance, status, updated_at
             FROM wallets
             WHERE user_id = $1
             FOR UPDATE",
        )
        .bind(user_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    async fn update_wallet_balance(
        &mut self,
        wallet_id: i64,
        balance: Decimal,
        updated_at: DateTime<Utc>,
    ) -> LedgerResult<()> {
        let result = sqlx::query("UPDATE wallets SET balance = $2, updated_at = $3 WHERE id = $1")
            .bind(wallet_id)
            .bind(balance)
            .bind(updated_at)
            .execute(&mut *self.tx)
            .await
            .map_err(DatabaseError::from_sqlx)?;

        ensure_updated(result.rows_affected(), "wallets", &wallet_id.to_string())
    }

    async fn find_payout(&mut self, payout_id: &str) -> LedgerResult<Option<GatewayPayout>> {
        sqlx::query_as::<_, GatewayPayout>(&format!(
            "SELECT {} FROM gateway_payouts WHERE id = $1 FOR UPDATE",
            PAYOUT_COLUMNS
        ))
        .bind(payout_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    async fn insert_payout(&mut self, payout: &GatewayPayout) -> LedgerResult<()> {
        sqlx::query(
            "INSERT INTO gateway_payouts
             (id, provider, user_id, business_id, reference_id, amount, currency, description,
              channel_code, account_number, account_holder_name, status, estimated_arrival_at,
              created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)",
        )
        .bind(&payout.id)
        .bind(&payout.provider)
        .bind(payout.user_id)
        .bind(&payout.business_id)
        .bind(&payout.reference_id)
        .bind(payout.amount)
        .bind(&payout.currency)
        .bind(&payout.description)
        .bind(&payout.channel_code)
        .bind(&payout.account_number)
        .bind(&payout.account_holder_name)
        .bind(&payout.status)
        .bind(payout.estimated_arrival_at)
        .bind(payout.created_at)
        .bind(payout.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        debug!(payout_id = %payout.id, "gateway payout inserted");
        Ok(())
    }

    async fn update_payout(&mut self, payout_id: &str, sync: &PayoutSync) -> LedgerResult<()> {
        let result = sqlx::query(
            "UPDATE gateway_payouts
             SET status = $2, amount = $3, channel_code = $4, account_number = $5,
                 account_holder_name = $6, estimated_arrival_at = $7, updated_at = $8
             WHERE id = $1",
        )
        .bind(payout_id)
        .bind(&sync.status)
        .bind(sync.amount)
        .bind(&sync.channel_code)
        .bind(&sync.account_number)
        .bind(&sync.account_holder_name)
        .bind(sync.estimated_arrival_at)
        .bind(sync.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        ensure_updated(result.rows_affected(), "gateway_payouts", payout_id)
    }

    async fn commit(self: Box<Self>) -> LedgerResult<()> {
        self.tx.commit().await.map_err(|e| {
            DatabaseError::transaction(format!("commit failed: {}", e))
        })
    }

    async fn rollback(self: Box<Self>) -> LedgerResult<()> {
        self.tx.rollback().await.map_err(|e| {
            DatabaseError::transaction(format!("rollback failed: {}", e))
        })
    }
}
