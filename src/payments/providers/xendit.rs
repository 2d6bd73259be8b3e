use crate::config::XenditSettings;
use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::provider::PaymentGateway;
use crate::payments::types::{
    BasketItem, GatewayBalance, PaymentRequestParams, PayoutAccount, PayoutParams, PayoutRecord,
    ProviderName, TransactionRecord,
};
use crate::payments::utils::{PaymentHttpClient, RequestBody};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::info;

const QR_CHANNEL: &str = "QRIS";

pub struct XenditGateway {
    settings: XenditSettings,
    http: PaymentHttpClient,
}

impl XenditGateway {
    pub fn new(settings: XenditSettings) -> PaymentResult<Self> {
        let http = PaymentHttpClient::new("xendit", Duration::from_secs(settings.timeout_secs))?;
        Ok(Self { settings, http })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.settings.base_url.trim_end_matches('/'), path)
    }

    fn encode<T: Serialize>(payload: &T) -> PaymentResult<JsonValue> {
        serde_json::to_value(payload).map_err(|e| PaymentError::ValidationError {
            message: format!("failed to encode xendit request: {}", e),
            field: None,
        })
    }
}

#[async_trait]
impl PaymentGateway for XenditGateway {
    async fn create_payment_request(
        &self,
        params: PaymentRequestParams,
    ) -> PaymentResult<TransactionRecord> {
        let payload = Self::encode(&PaymentRequestBody {
            reference_id: &params.reference_id,
            amount: params.amount,
            currency: &params.currency,
            country: &self.settings.country,
            description: &params.description,
            customer_id: params.customer_id.as_deref(),
            metadata: &params.metadata,
            payment_method: PaymentMethodBody {
                kind: "QR_CODE",
                reusability: "ONE_TIME_USE",
                qr_code: QrCodeBody {
                    channel_code: QR_CHANNEL,
                },
            },
            items: &params.basket,
        })?;

        let raw: XenditPaymentRequest = self
            .http
            .request_json(
                reqwest::Method::POST,
                &self.endpoint("/payment_requests"),
                &self.settings.secret_key,
                RequestBody::Json(&payload),
                &[("idempotency-key", params.idempotency_key.as_str())],
            )
            .await?;

        info!(
            payment_request_id = %raw.id,
            reference_id = %raw.reference_id,
            status = %raw.status,
            "xendit payment request created"
        );
        Ok(raw.into_record())
    }

    async fn get_payment_request(&self, id: &str) -> PaymentResult<TransactionRecord> {
        let raw: XenditPaymentRequest = self
            .http
            .request_json(
                reqwest::Method::GET,
                &self.endpoint(&format!("/payment_requests/{}", id)),
                &self.settings.secret_key,
                RequestBody::Empty,
                &[],
            )
            .await?;
        Ok(raw.into_record())
    }

    async fn create_payout(&self, params: PayoutParams) -> PaymentResult<PayoutRecord> {
        let payload = Self::encode(&PayoutBody {
            reference_id: &params.reference_id,
            channel_code: &params.channel_code,
            channel_properties: &params.account,
            amount: params.amount,
            currency: &params.currency,
            description: &params.description,
        })?;

        let raw: XenditPayout = self
            .http
            .request_json(
                reqwest::Method::POST,
                &self.endpoint("/v2/payouts"),
                &self.settings.secret_key,
                RequestBody::Json(&payload),
                &[("idempotency-key", params.idempotency_key.as_str())],
            )
            .await?;

        info!(payout_id = %raw.id, status = %raw.status, "xendit payout created");
        Ok(raw.into_record())
    }

    async fn get_payout_by_id(&self, id: &str) -> PaymentResult<PayoutRecord> {
        let raw: XenditPayout = self
            .http
            .request_json(
                reqwest::Method::GET,
                &self.endpoint(&format!("/v2/payouts/{}", id)),
                &self.settings.secret_key,
                RequestBody::Empty,
                &[],
            )
            .await?;
        Ok(raw.into_record())
    }

    async fn cancel_payout(&self, id: &str) -> PaymentResult<PayoutRecord> {
        let raw: XenditPayout = self
            .http
            .request_json(
                reqwest::Method::POST,
                &self.endpoint(&format!("/v2/payouts/{}/cancel", id)),
                &self.settings.secret_key,
                RequestBody::Empty,
                &[],
            )
            .await?;

        info!(payout_id = %raw.id, status = %raw.status, "xendit payout cancelled");
        Ok(raw.into_record())
    }

    async fn get_balance(&self, currency: &str) -> PaymentResult<GatewayBalance> {
        let raw: XenditBalance = self
            .http
            .request_json(
                reqwest::Method::GET,
                &self.endpoint(&format!("/balance?account_type=CASH&currency={}", currency)),
                &self.settings.secret_key,
                RequestBody::Empty,
                &[],
            )
            .await?;
        Ok(GatewayBalance {
            balance: raw.balance,
        })
    }

    fn name(&self) -> ProviderName {
        ProviderName::Xendit
    }
}

#[derive(Serialize)]
struct PaymentRequestBody<'a> {
    reference_id: &'a str,
    #[serde(with = "rust_decimal::serde::float")]
    amount: Decimal,
    currency: &'a str,
    country: &'a str,
    description: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    customer_id: Option<&'a str>,
    metadata: &'a JsonValue,
    payment_method: PaymentMethodBody<'a>,
    items: &'a [BasketItem],
}

#[derive(Serialize)]
struct PaymentMethodBody<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    reusability: &'a str,
    qr_code: QrCodeBody<'a>,
}

#[derive(Serialize)]
struct QrCodeBody<'a> {
    channel_code: &'a str,
}

#[derive(Serialize)]
struct PayoutBody<'a> {
    reference_id: &'a str,
    channel_code: &'a str,
    channel_properties: &'a PayoutAccount,
    #[serde(with = "rust_decimal::serde::float")]
    amount: Decimal,
    currency: &'a str,
    description: &'a str,
}

#[derive(Debug, Deserialize)]
struct XenditPaymentRequest {
    id: String,
    reference_id: String,
    #[serde(with = "rust_decimal::serde::float")]
    amount: Decimal,
    currency: String,
    status: String,
    #[serde(default)]
    metadata: Option<JsonValue>,
    payment_method: XenditPaymentMethod,
    #[serde(default)]
    created: Option<DateTime<Utc>>,
    #[serde(default)]
    updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct XenditPaymentMethod {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    qr_code: Option<XenditQrCode>,
}

#[derive(Debug, Deserialize)]
struct XenditQrCode {
    #[serde(default)]
    channel_code: Option<String>,
    #[serde(default)]
    channel_properties: Option<XenditQrProperties>,
}

#[derive(Debug, Deserialize)]
struct XenditQrProperties {
    #[serde(default)]
    qr_string: Option<String>,
    #[serde(default)]
    expires_at: Option<DateTime<Utc>>,
}

impl XenditPaymentRequest {
    fn into_record(self) -> TransactionRecord {
        let qr = self.payment_method.qr_code;
        let channel_code = qr
            .as_ref()
            .and_then(|q| q.channel_code.clone())
            .unwrap_or_default();
        let properties = qr.and_then(|q| q.channel_properties);

        TransactionRecord {
            id: self.id,
            reference_id: self.reference_id,
            amount: self.amount,
            currency: self.currency,
            payment_method: self.payment_method.kind,
            channel_code,
            payment_method_id: Some(self.payment_method.id),
            qr_string: properties.as_ref().and_then(|p| p.qr_string.clone()),
            status: self.status,
            expires_at: properties.and_then(|p| p.expires_at),
            metadata: self.metadata.unwrap_or_else(|| JsonValue::Object(Default::default())),
            created: self.created,
            updated: self.updated,
        }
    }
}

#[derive(Debug, Deserialize)]
struct XenditPayout {
    id: String,
    #[serde(default)]
    business_id: String,
    reference_id: String,
    #[serde(with = "rust_decimal::serde::float")]
    amount: Decimal,
    currency: String,
    #[serde(default)]
    description: Option<String>,
    channel_code: String,
    channel_properties: PayoutAccount,
    status: String,
    #[serde(default)]
    estimated_arrival_time: Option<DateTime<Utc>>,
    #[serde(default)]
    created: Option<DateTime<Utc>>,
    #[serde(default)]
    updated: Option<DateTime<Utc>>,
}

impl XenditPayout {
    fn into_record(self) -> PayoutRecord {
        PayoutRecord {
            id: self.id,
            business_id: self.business_id,
            reference_id: self.reference_id,
            amount: self.amount,
            currency: self.currency,
            description: self.description.unwrap_or_default(),
            channel_code: self.channel_code,
            account: self.channel_properties,
            status: self.status,
            estimated_arrival_at: self.estimated_arrival_time,
            created: self.created,
            updated: self.updated,
        }
    }
}

#[derive(Debug, Deserialize)]
struct XenditBalance {
    #[serde(with = "rust_decimal::serde::float")]
    balance: Decimal,
}
