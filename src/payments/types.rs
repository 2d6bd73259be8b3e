use crate::payments::error::PaymentError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ProviderName {
    Xendit,
    Flip,
}

impl ProviderName {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderName::Xendit => "xendit",
            ProviderName::Flip => "flip",
        }
    }
}

impl std::fmt::Display for ProviderName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ProviderName {
    type Err = PaymentError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "xendit" => Ok(ProviderName::Xendit),
            "flip" => Ok(ProviderName::Flip),
            _ => Err(PaymentError::ValidationError {
                message: format!("unsupported gateway: {}", value),
                field: Some("provider".to_string()),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BasketItemType {
    PhysicalProduct,
    Fee,
    Discount,
}

/// One priced line of what is being paid for
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BasketItem {
    pub reference_id: String,
    pub name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub net_unit_amount: Decimal,
    pub quantity: i32,
    pub currency: String,
    pub category: String,
    #[serde(rename = "type")]
    pub item_type: BasketItemType,
}

impl BasketItem {
    pub fn line_total(&self) -> Decimal {
        self.net_unit_amount * Decimal::from(self.quantity)
    }
}

#[derive(Debug, Clone)]
pub struct PaymentRequestParams {
    pub basket: Vec<BasketItem>,
    pub reference_id: String,
    pub amount: Decimal,
    pub currency: String,
    pub description: String,
    pub customer_id: Option<String>,
    pub metadata: JsonValue,
    pub idempotency_key: String,
}

/// Gateway view of a payment attempt, normalised across gateways
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionRecord {
    pub id: String,
    pub reference_id: String,
    pub amount: Decimal,
    pub currency: String,
    pub payment_method: String,
    pub channel_code: String,
    pub payment_method_id: Option<String>,
    pub qr_string: Option<String>,
    pub status: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub metadata: JsonValue,
    pub created: Option<DateTime<Utc>>,
    pub updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PayoutAccount {
    pub account_number: String,
    pub account_holder_name: String,
}

#[derive(Debug, Clone)]
pub struct PayoutParams {
    pub reference_id: String,
    pub channel_code: String,
    pub account: PayoutAccount,
    pub amount: Decimal,
    pub currency: String,
    pub description: String,
    pub idempotency_key: String,
}

/// Gateway view of a payout, normalised across gateways
#[derive(Debug, Clone, PartialEq)]
pub struct PayoutRecord {
    pub id: String,
    pub business_id: String,
    pub reference_id: String,
    pub amount: Decimal,
    pub currency: String,
    pub description: String,
    pub channel_code: String,
    pub account: PayoutAccount,
    pub status: String,
    pub estimated_arrival_at: Option<DateTime<Utc>>,
    pub created: Option<DateTime<Utc>>,
    pub updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PayoutStatus {
    Pending,
    Accepted,
    Cancelled,
    Failed,
    Succeeded,
    Expired,
    Refunded,
}

impl PayoutStatus {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_uppercase().as_str() {
            "PENDING" => Some(PayoutStatus::Pending),
            "ACCEPTED" => Some(PayoutStatus::Accepted),
            "CANCELLED" | "CANCELED" => Some(PayoutStatus::Cancelled),
            "FAILED" => Some(PayoutStatus::Failed),
            "SUCCEEDED" => Some(PayoutStatus::Succeeded),
            "EXPIRED" => Some(PayoutStatus::Expired),
            "REFUNDED" => Some(PayoutStatus::Refunded),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PayoutStatus::Pending => "PENDING",
            PayoutStatus::Accepted => "ACCEPTED",
            PayoutStatus::Cancelled => "CANCELLED",
            PayoutStatus::Failed => "FAILED",
            PayoutStatus::Succeeded => "SUCCEEDED",
            PayoutStatus::Expired => "EXPIRED",
            PayoutStatus::Refunded => "REFUNDED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, PayoutStatus::Pending | PayoutStatus::Accepted)
    }

    /// Terminal states in which the money never left the platform
    pub fn returns_funds(&self) -> bool {
        matches!(
            self,
            PayoutStatus::Cancelled
                | PayoutStatus::Failed
                | PayoutStatus::Expired
                | PayoutStatus::Refunded
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GatewayBalance {
    pub balance: Decimal,
}
