//! Rows of the payment ledger: orders, gateway transactions, payouts and wallets

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::FromRow;

/// A purchase. `payment_status` holds the signed code from [`crate::services::status::OrderPaymentStatus`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Order {
    pub id: i64,
    pub user_id: i64,
    pub invoice: String,
    pub amount: Decimal,
    pub delivery_cost: Decimal,
    pub total_discount: Decimal,
    pub payment_status: i16,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Only populated when loaded with items
    #[sqlx(skip)]
    #[serde(default)]
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    pub product_id: i64,
    pub product_name: String,
    pub price: Decimal,
    pub quantity: i32,
}

/// One external payment attempt for an order. The id is assigned by the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct GatewayTransaction {
    pub id: String,
    pub order_id: i64,
    pub provider: String,
    pub reference_id: String,
    pub amount: Decimal,
    pub currency: String,
    pub payment_method: String,
    pub channel_code: String,
    /// Secondary gateway identifier, used by payment-method callbacks
    pub payment_method_id: Option<String>,
    pub qr_string: Option<String>,
    pub status: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub metadata: JsonValue,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Outbound disbursement to a user. The local row caches gateway state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct GatewayPayout {
    pub id: String,
    pub provider: String,
    pub user_id: i64,
    pub business_id: String,
    pub reference_id: String,
    pub amount: Decimal,
    pub currency: String,
    pub description: String,
    pub channel_code: String,
    pub account_number: String,
    pub account_holder_name: String,
    pub status: String,
    pub estimated_arrival_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Gateway-owned payout fields copied onto the local row on every read/cancel
#[derive(Debug, Clone, PartialEq)]
pub struct PayoutSync {
    pub status: String,
    pub amount: Decimal,
    pub channel_code: String,
    pub account_number: String,
    pub account_holder_name: String,
    pub estimated_arrival_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WalletStatus {
    Active,
    Inactive,
}

impl WalletStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WalletStatus::Active => "active",
            WalletStatus::Inactive => "inactive",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Wallet {
    pub id: i64,
    pub user_id: i64,
    pub balance: Decimal,
    pub status: String,
    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    pub fn is_active(&self) -> bool {
        self.status == WalletStatus::Active.as_str()
    }
}
