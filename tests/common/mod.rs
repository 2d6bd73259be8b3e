#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;

use storefront_payments::api::AppState;
use storefront_payments::database::models::{Order, OrderItem, Wallet, WalletStatus};
use storefront_payments::database::{InMemoryLedgerStore, LedgerStore};
use storefront_payments::payments::error::{PaymentError, PaymentResult};
use storefront_payments::payments::types::{
    GatewayBalance, PaymentRequestParams, PayoutParams, PayoutRecord, ProviderName,
    TransactionRecord,
};
use storefront_payments::payments::{GatewayRegistry, PaymentGateway};
use storefront_payments::services::{ReconciliationEngine, WalletCoordinator};

pub const CURRENCY: &str = "IDR";
pub const DEADLINE: Duration = Duration::from_secs(5);

/// In-process gateway that records every call and answers from local state
pub struct MockGateway {
    counter: AtomicUsize,
    pub payment_requests: Mutex<Vec<PaymentRequestParams>>,
    pub payout_requests: Mutex<Vec<PayoutParams>>,
    pub payouts: Mutex<HashMap<String, PayoutRecord>>,
    pub fail_payments: AtomicBool,
    pub fail_payouts: AtomicBool,
    pub payout_delay: Mutex<Option<Duration>>,
    pub balance: Mutex<Decimal>,
}

impl Default for MockGateway {
    fn default() -> Self {
        Self {
            counter: AtomicUsize::new(0),
            payment_requests: Mutex::new(Vec::new()),
            payout_requests: Mutex::new(Vec::new()),
            payouts: Mutex::new(HashMap::new()),
            fail_payments: AtomicBool::new(false),
            fail_payouts: AtomicBool::new(false),
            payout_delay: Mutex::new(None),
            balance: Mutex::new(Decimal::ZERO),
        }
    }
}

impl MockGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn next_id(&self) -> usize {
        self.counter.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn rejected(message: &str) -> PaymentError {
        PaymentError::ProviderError {
            provider: "xendit".to_string(),
            message: message.to_string(),
            provider_code: Some("API_VALIDATION_ERROR".to_string()),
            retryable: false,
        }
    }

    pub fn set_payout_status(&self, payout_id: &str, status: &str) {
        if let Some(record) = self.payouts.lock().unwrap().get_mut(payout_id) {
            record.status = status.to_string();
        }
    }

    pub fn set_balance(&self, balance: i64) {
        *self.balance.lock().unwrap() = Decimal::from(balance);
    }

    pub fn last_payment_request(&self) -> Option<PaymentRequestParams> {
        self.payment_requests.lock().unwrap().last().cloned()
    }

    pub fn payout_request_count(&self) -> usize {
        self.payout_requests.lock().unwrap().len()
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_payment_request(
        &self,
        params: PaymentRequestParams,
    ) -> PaymentResult<TransactionRecord> {
        self.payment_requests.lock().unwrap().push(params.clone());
        if self.fail_payments.load(Ordering::SeqCst) {
            return Err(Self::rejected("upstream rejected payment request"));
        }

        let n = self.next_id();
        Ok(TransactionRecord {
            id: format!("pr-{}", n),
            reference_id: params.reference_id,
            amount: params.amount,
            currency: params.currency,
            payment_method: "QR_CODE".to_string(),
            channel_code: "QRIS".to_string(),
            payment_method_id: Some(format!("pm-{}", n)),
            qr_string: Some(format!("00020101021226{}", n)),
            status: "PENDING".to_string(),
            expires_at: Some(Utc::now() + chrono::Duration::minutes(15)),
            metadata: params.metadata,
            created: Some(Utc::now()),
            updated: None,
        })
    }

    async fn get_payment_request(&self, id: &str) -> PaymentResult<TransactionRecord> {
        Err(Self::rejected(&format!("payment request {} not tracked", id)))
    }

    async fn create_payout(&self, params: PayoutParams) -> PaymentResult<PayoutRecord> {
        self.payout_requests.lock().unwrap().push(params.clone());
        let delay = *self.payout_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_payouts.load(Ordering::SeqCst) {
            return Err(Self::rejected("upstream rejected payout"));
        }

        let record = PayoutRecord {
            id: format!("disb-{}", self.next_id()),
            business_id: "biz-1".to_string(),
            reference_id: params.reference_id,
            amount: params.amount,
            currency: params.currency,
            description: params.description,
            channel_code: params.channel_code,
            account: params.account,
            status: "ACCEPTED".to_string(),
            estimated_arrival_at: None,
            created: Some(Utc::now()),
            updated: None,
        };
        self.payouts
            .lock()
            .unwrap()
            .insert(record.id.clone(), record.clone());
        Ok(record)
    }

    async fn get_payout_by_id(&self, id: &str) -> PaymentResult<PayoutRecord> {
        self.payouts
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| Self::rejected("payout not found"))
    }

    async fn cancel_payout(&self, id: &str) -> PaymentResult<PayoutRecord> {
        let mut payouts = self.payouts.lock().unwrap();
        let record = payouts
            .get_mut(id)
            .ok_or_else(|| Self::rejected("payout not found"))?;
        record.status = "CANCELLED".to_string();
        Ok(record.clone())
    }

    async fn get_balance(&self, _currency: &str) -> PaymentResult<GatewayBalance> {
        Ok(GatewayBalance {
            balance: *self.balance.lock().unwrap(),
        })
    }

    fn name(&self) -> ProviderName {
        ProviderName::Xendit
    }
}

pub fn registry(gateway: &Arc<MockGateway>) -> GatewayRegistry {
    GatewayRegistry::single(gateway.clone())
}

pub fn engine(store: &InMemoryLedgerStore, gateway: &Arc<MockGateway>) -> ReconciliationEngine {
    ReconciliationEngine::new(
        Arc::new(store.clone()) as Arc<dyn LedgerStore>,
        registry(gateway),
        CURRENCY,
        DEADLINE,
    )
}

pub fn coordinator(store: &InMemoryLedgerStore, gateway: &Arc<MockGateway>) -> WalletCoordinator {
    WalletCoordinator::new(
        Arc::new(store.clone()) as Arc<dyn LedgerStore>,
        registry(gateway),
        CURRENCY,
        DEADLINE,
    )
}

pub fn app_state(
    store: &InMemoryLedgerStore,
    gateway: &Arc<MockGateway>,
    callback_token: Option<&str>,
) -> AppState {
    AppState::new(
        Arc::new(store.clone()),
        registry(gateway),
        CURRENCY,
        callback_token.map(|t| t.to_string()),
        DEADLINE,
    )
}

/// Order #42: two lines (2 x 15000, 1 x 30000), delivery 5000, no discount
pub fn order_42() -> Order {
    let now = Utc::now();
    Order {
        id: 42,
        user_id: 7,
        invoice: "INV-42".to_string(),
        amount: Decimal::from(60_000),
        delivery_cost: Decimal::from(5_000),
        total_discount: Decimal::ZERO,
        payment_status: 0,
        created_at: now,
        updated_at: now,
        items: vec![
            OrderItem {
                id: 1,
                order_id: 42,
                product_id: 101,
                product_name: "Kopi Susu".to_string(),
                price: Decimal::from(15_000),
                quantity: 2,
            },
            OrderItem {
                id: 2,
                order_id: 42,
                product_id: 102,
                product_name: "Roti Bakar".to_string(),
                price: Decimal::from(30_000),
                quantity: 1,
            },
        ],
    }
}

pub fn wallet(user_id: i64, balance: i64) -> Wallet {
    Wallet {
        id: user_id + 1000,
        user_id,
        balance: Decimal::from(balance),
        status: WalletStatus::Active.as_str().to_string(),
        updated_at: Utc::now(),
    }
}

pub fn inactive_wallet(user_id: i64, balance: i64) -> Wallet {
    Wallet {
        status: WalletStatus::Inactive.as_str().to_string(),
        ..wallet(user_id, balance)
    }
}
