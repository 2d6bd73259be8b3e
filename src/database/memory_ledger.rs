//! In-process ledger store used for local development (`SKIP_EXTERNALS=true`)
//! and by the test-suite.
//!
//! A transaction takes the store-wide lock for its whole lifetime and works on a
//! private copy of the data. `commit` publishes the copy; `rollback` or drop
//! discards it. That gives serializable isolation, which is stronger than what
//! the Postgres store needs to provide.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::database::error::{DatabaseError, DatabaseErrorKind};
use crate::database::ledger::{LedgerResult, LedgerStore, LedgerTx, TransactionLookup};
use crate::database::models::{GatewayPayout, GatewayTransaction, Order, PayoutSync, Wallet};

#[derive(Debug, Clone, Default)]
pub struct LedgerData {
    pub orders: HashMap<i64, Order>,
    pub transactions: HashMap<String, GatewayTransaction>,
    pub payouts: HashMap<String, GatewayPayout>,
    /// Keyed by user id
    pub wallets: HashMap<i64, Wallet>,
}

/// Where an injected failure fires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePoint {
    Begin,
    Insert,
    Update,
    Commit,
}

#[derive(Clone, Default)]
pub struct InMemoryLedgerStore {
    data: Arc<Mutex<LedgerData>>,
    failure: Arc<StdMutex<Option<FailurePoint>>>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed_order(&self, order: Order) {
        self.data.lock().await.orders.insert(order.id, order);
    }

    pub async fn seed_wallet(&self, wallet: Wallet) {
        self.data.lock().await.wallets.insert(wallet.user_id, wallet);
    }

    pub async fn seed_transaction(&self, transaction: GatewayTransaction) {
        self.data
            .lock()
            .await
            .transactions
            .insert(transaction.id.clone(), transaction);
    }

    pub async fn seed_payout(&self, payout: GatewayPayout) {
        self.data
            .lock()
            .await
            .payouts
            .insert(payout.id.clone(), payout);
    }

    /// Committed state, for assertions.
    pub async fn snapshot(&self) -> LedgerData {
        self.data.lock().await.clone()
    }

    /// Make every subsequent operation of the given kind fail until cleared.
    pub fn fail_on(&self, point: FailurePoint) {
        if let Ok(mut failure) = self.failure.lock() {
            *failure = Some(point);
        }
    }

    pub fn clear_failure(&self) {
        if let Ok(mut failure) = self.failure.lock() {
            *failure = None;
        }
    }

    fn check(failure: &StdMutex<Option<FailurePoint>>, point: FailurePoint) -> LedgerResult<()> {
        let armed = failure.lock().map(|f| *f == Some(point)).unwrap_or(false);
        if armed {
            return Err(DatabaseError::new(DatabaseErrorKind::Simulated {
                message: format!("injected {:?} failure", point),
            }));
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn begin(&self) -> LedgerResult<Box<dyn LedgerTx>> {
        Self::check(&self.failure, FailurePoint::Begin)?;
        let guard = self.data.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(InMemoryLedgerTx {
            guard,
            working,
            failure: self.failure.clone(),
        }))
    }

    async fn sum_active_wallet_balances(&self) -> LedgerResult<Decimal> {
        let data = self.data.lock().await;
        Ok(data
            .wallets
            .values()
            .filter(|w| w.is_active())
            .map(|w| w.balance)
            .sum())
    }

    async fn ping(&self) -> LedgerResult<()> {
        Ok(())
    }
}

pub struct InMemoryLedgerTx {
    guard: OwnedMutexGuard<LedgerData>,
    working: LedgerData,
    failure: Arc<StdMutex<Option<FailurePoint>>>,
}

impl InMemoryLedgerTx {
    fn check(&self, point: FailurePoint) -> LedgerResult<()> {
        InMemoryLedgerStore::check(&self.failure, point)
    }
}

fn missing(table: &str, id: &str) -> DatabaseError {
    DatabaseError::new(DatabaseErrorKind::Query {
        message: format!("no {} row updated for id {}", table, id),
    })
}

fn duplicate(table: &str, id: &str) -> DatabaseError {
    DatabaseError::new(DatabaseErrorKind::Constraint {
        message: format!("duplicate key in {} for id {}", table, id),
    })
}

#[async_trait]
impl LedgerTx for InMemoryLedgerTx {
    async fn find_order(
        &mut self,
        order_id: i64,
        with_items: bool,
    ) -> LedgerResult<Option<Order>> {
        Ok(self.working.orders.get(&order_id).cloned().map(|mut order| {
            if !with_items {
                order.items.clear();
            }
            order
        }))
    }

    async fn find_transaction(
        &mut self,
        lookup: &TransactionLookup,
    ) -> LedgerResult<Option<GatewayTransaction>> {
        Ok(match lookup {
            TransactionLookup::Id(id) => self.working.transactions.get(id).cloned(),
            TransactionLookup::PaymentMethodId(pm_id) => self
                .working
                .transactions
                .values()
                .find(|t| t.payment_method_id.as_deref() == Some(pm_id.as_str()))
                .cloned(),
        })
    }

    async fn find_transactions_for_order(
        &mut self,
        order_id: i64,
    ) -> LedgerResult<Vec<GatewayTransaction>> {
        let mut rows: Vec<GatewayTransaction> = self
            .working
            .transactions
            .values()
            .filter(|t| t.order_id == order_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(rows)
    }

    async fn insert_transaction(&mut self, transaction: &GatewayTransaction) -> LedgerResult<()> {
        self.check(FailurePoint::Insert)?;
        if self.working.transactions.contains_key(&transaction.id) {
            return Err(duplicate("gateway_transactions", &transaction.id));
        }
        self.working
            .transactions
            .insert(transaction.id.clone(), transaction.clone());
        Ok(())
    }

    async fn update_transaction_status(
        &mut self,
        transaction_id: &str,
        status: &str,
        updated_at: DateTime<Utc>,
    ) -> LedgerResult<()> {
        self.check(FailurePoint::Update)?;
        let row = self
            .working
            .transactions
            .get_mut(transaction_id)
            .ok_or_else(|| missing("gateway_transactions", transaction_id))?;
        row.status = status.to_string();
        row.updated_at = updated_at;
        Ok(())
    }

    async fn update_order_payment_status(
        &mut self,
        order_id: i64,
        payment_status: i16,
        updated_at: DateTime<Utc>,
    ) -> LedgerResult<()> {
        self.check(FailurePoint::Update)?;
        let row = self
            .working
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| missing("orders", &order_id.to_string()))?;
        row.payment_status = payment_status;
        row.updated_at = updated_at;
        Ok(())
    }

    async fn find_wallet_for_user(&mut self, user_id: i64) -> LedgerResult<Option<Wallet>> {
        Ok(self.working.wallets.get(&user_id).cloned())
    }

    async fn update_wallet_balance(
        &mut self,
        wallet_id: i64,
        balance: Decimal,
        updated_at: DateTime<Utc>,
    ) -> LedgerResult<()> {
        self.check(FailurePoint::Update)?;
        let row = self
            .working
            .wallets
            .values_mut()
            .find(|w| w.id == wallet_id)
            .ok_or_else(|| missing("wallets", &wallet_id.to_string()))?;
        row.balance = balance;
        row.updated_at = updated_at;
        Ok(())
    }

    async fn find_payout(&mut self, payout_id: &str) -> LedgerResult<Option<GatewayPayout>> {
        Ok(self.working.payouts.get(payout_id).cloned())
    }

    async fn insert_payout(&mut self, payout: &GatewayPayout) -> LedgerResult<()> {
        self.check(FailurePoint::Insert)?;
        if self.working.payouts.contains_key(&payout.id) {
            return Err(duplicate("gateway_payouts", &payout.id));
        }
        self.working
            .payouts
            .insert(payout.id.clone(), payout.clone());
        Ok(())
    }

    async fn update_payout(&mut self, payout_id: &str, sync: &PayoutSync) -> LedgerResult<()> {
        self.check(FailurePoint::Update)?;
        let row = self
            .working
            .payouts
            .get_mut(payout_id)
            .ok_or_else(|| missing("gateway_payouts", payout_id))?;
        row.status = sync.status.clone();
        row.amount = sync.amount;
        row.channel_code = sync.channel_code.clone();
        row.account_number = sync.account_number.clone();
        row.account_holder_name = sync.account_holder_name.clone();
        row.estimated_arrival_at = sync.estimated_arrival_at;
        row.updated_at = sync.updated_at;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> LedgerResult<()> {
        self.check(FailurePoint::Commit)?;
        let InMemoryLedgerTx {
            mut guard, working, ..
        } = *self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> LedgerResult<()> {
        Ok(())
    }
}
