use crate::config::FlipSettings;
use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::provider::PaymentGateway;
use crate::payments::types::{
    GatewayBalance, PaymentRequestParams, PayoutAccount, PayoutParams, PayoutRecord, ProviderName,
    TransactionRecord,
};
use crate::payments::utils::{PaymentHttpClient, RequestBody};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;
use tracing::info;

/// Flip reports local (WIB, UTC+7) timestamps without an offset.
const WIB_OFFSET_SECS: i32 = 7 * 3600;

pub struct FlipGateway {
    settings: FlipSettings,
    http: PaymentHttpClient,
}

impl FlipGateway {
    pub fn new(settings: FlipSettings) -> PaymentResult<Self> {
        let http = PaymentHttpClient::new("flip", Duration::from_secs(settings.timeout_secs))?;
        Ok(Self { settings, http })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.settings.base_url.trim_end_matches('/'), path)
    }
}

/// Flip only takes whole rupiah. Fractional amounts are rejected rather than
/// truncated, so a payout never leaves for less than was debited.
fn whole_amount(amount: Decimal) -> PaymentResult<String> {
    if !amount.fract().is_zero() {
        return Err(PaymentError::ValidationError {
            message: format!("flip amounts must be whole rupiah, got {}", amount),
            field: Some("amount".to_string()),
        });
    }
    Ok(amount.trunc().to_string())
}

fn parse_wib(value: &str) -> Option<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M"))
        .ok()?;
    let offset = FixedOffset::east_opt(WIB_OFFSET_SECS)?;
    offset
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Bill link states expressed in the payment-request vocabulary
fn bill_status(status: &str) -> String {
    match status.to_uppercase().as_str() {
        "ACTIVE" => "PENDING".to_string(),
        "INACTIVE" => "EXPIRED".to_string(),
        other => other.to_string(),
    }
}

fn disbursement_status(status: &str) -> String {
    match status.to_uppercase().as_str() {
        "DONE" => "SUCCEEDED".to_string(),
        other => other.to_string(),
    }
}

#[async_trait]
impl PaymentGateway for FlipGateway {
    async fn create_payment_request(
        &self,
        params: PaymentRequestParams,
    ) -> PaymentResult<TransactionRecord> {
        let form = [
            ("title", params.description.clone()),
            ("type", "SINGLE".to_string()),
            ("amount", whole_amount(params.amount)?),
            ("step", "1".to_string()),
        ];

        let raw: FlipBill = self
            .http
            .request_json(
                reqwest::Method::POST,
                &self.endpoint("/v2/pwf/bill"),
                &self.settings.secret_key,
                RequestBody::Form(&form),
                &[("idempotency-key", params.idempotency_key.as_str())],
            )
            .await?;

        info!(link_id = raw.link_id, status = %raw.status, "flip bill created");
        Ok(raw.into_record(params.reference_id, params.currency))
    }

    async fn get_payment_request(&self, id: &str) -> PaymentResult<TransactionRecord> {
        let raw: FlipBill = self
            .http
            .request_json(
                reqwest::Method::GET,
                &self.endpoint(&format!("/v2/pwf/{}/bill", id)),
                &self.settings.secret_key,
                RequestBody::Empty,
                &[],
            )
            .await?;
        let reference = raw.title.clone();
        Ok(raw.into_record(reference, "IDR".to_string()))
    }

    async fn create_payout(&self, params: PayoutParams) -> PaymentResult<PayoutRecord> {
        let form = [
            ("account_number", params.account.account_number.clone()),
            ("bank_code", params.channel_code.to_lowercase()),
            ("amount", whole_amount(params.amount)?),
            ("remark", params.description.clone()),
        ];

        let raw: FlipDisbursement = self
            .http
            .request_json(
                reqwest::Method::POST,
                &self.endpoint("/v3/disbursement"),
                &self.settings.secret_key,
                RequestBody::Form(&form),
                &[("idempotency-key", params.idempotency_key.as_str())],
            )
            .await?;

        info!(disbursement_id = raw.id, status = %raw.status, "flip disbursement created");
        let mut record = raw.into_record(&params.currency);
        record.reference_id = params.reference_id;
        if record.account.account_holder_name.is_empty() {
            record.account.account_holder_name = params.account.account_holder_name;
        }
        Ok(record)
    }

    async fn get_payout_by_id(&self, id: &str) -> PaymentResult<PayoutRecord> {
        let raw: FlipDisbursement = self
            .http
            .request_json(
                reqwest::Method::GET,
                &self.endpoint(&format!("/v3/get-disbursement?id={}", id)),
                &self.settings.secret_key,
                RequestBody::Empty,
                &[],
            )
            .await?;
        Ok(raw.into_record("IDR"))
    }

    async fn cancel_payout(&self, _id: &str) -> PaymentResult<PayoutRecord> {
        Err(PaymentError::Unsupported {
            provider: "flip".to_string(),
            operation: "payout cancellation".to_string(),
        })
    }

    async fn get_balance(&self, _currency: &str) -> PaymentResult<GatewayBalance> {
        let raw: FlipBalance = self
            .http
            .request_json(
                reqwest::Method::GET,
                &self.endpoint("/v2/general/balance"),
                &self.settings.secret_key,
                RequestBody::Empty,
                &[],
            )
            .await?;
        Ok(GatewayBalance {
            balance: Decimal::from(raw.balance),
        })
    }

    fn name(&self) -> ProviderName {
        ProviderName::Flip
    }
}

#[derive(Debug, Deserialize)]
struct FlipBill {
    link_id: i64,
    #[serde(default)]
    link_url: String,
    #[serde(default)]
    title: String,
    amount: i64,
    status: String,
    #[serde(default)]
    expired_date: Option<String>,
}

impl FlipBill {
    fn into_record(self, reference_id: String, currency: String) -> TransactionRecord {
        TransactionRecord {
            id: self.link_id.to_string(),
            reference_id,
            amount: Decimal::from(self.amount),
            currency,
            payment_method: "BILL_LINK".to_string(),
            channel_code: "FLIP".to_string(),
            payment_method_id: None,
            qr_string: None,
            status: bill_status(&self.status),
            expires_at: self.expired_date.as_deref().and_then(parse_wib),
            metadata: serde_json::json!({ "link_url": self.link_url }),
            created: None,
            updated: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct FlipDisbursement {
    id: i64,
    #[serde(default)]
    user_id: i64,
    amount: i64,
    status: String,
    #[serde(default)]
    timestamp: Option<String>,
    bank_code: String,
    account_number: String,
    #[serde(default)]
    recipient_name: String,
    #[serde(default)]
    remark: String,
    #[serde(default)]
    time_served: Option<String>,
    #[serde(default)]
    idempotency_key: Option<String>,
}

impl FlipDisbursement {
    fn into_record(self, currency: &str) -> PayoutRecord {
        let created = self.timestamp.as_deref().and_then(parse_wib);
        PayoutRecord {
            id: self.id.to_string(),
            business_id: self.user_id.to_string(),
            reference_id: self.idempotency_key.unwrap_or_default(),
            amount: Decimal::from(self.amount),
            currency: currency.to_string(),
            description: self.remark,
            channel_code: self.bank_code.to_uppercase(),
            account: PayoutAccount {
                account_number: self.account_number,
                account_holder_name: self.recipient_name,
            },
            status: disbursement_status(&self.status),
            estimated_arrival_at: self.time_served.as_deref().and_then(parse_wib),
            created,
            updated: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct FlipBalance {
    balance: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_local_timestamps_as_utc_plus_seven() {
        let parsed = parse_wib("2025-01-01 17:00:00").expect("should parse");
        assert_eq!(parsed.to_rfc3339(), "2025-01-01T10:00:00+00:00");
        assert!(parse_wib("2025-01-01 17:00").is_some());
        assert!(parse_wib("(not set)").is_none());
    }

    #[test]
    fn disbursement_maps_done_to_succeeded() {
        let raw: FlipDisbursement = serde_json::from_value(serde_json::json!({
            "id": 987,
            "user_id": 12,
            "amount": 50000,
            "status": "DONE",
            "timestamp": "2025-01-01 17:00:00",
            "bank_code": "bca",
            "account_number": "1234567890",
            "recipient_name": "BUDI",
            "remark": "withdrawal",
            "time_served": "(not set)",
            "idempotency_key": "payout-12-1"
        }))
        .expect("fixture should decode");

        let record = raw.into_record("IDR");
        assert_eq!(record.id, "987");
        assert_eq!(record.status, "SUCCEEDED");
        assert_eq!(record.channel_code, "BCA");
        assert_eq!(record.reference_id, "payout-12-1");
        assert!(record.estimated_arrival_at.is_none());
    }

    #[test]
    fn bill_states_use_payment_vocabulary() {
        assert_eq!(bill_status("ACTIVE"), "PENDING");
        assert_eq!(bill_status("INACTIVE"), "EXPIRED");
    }

    #[test]
    fn amounts_must_be_whole_rupiah() {
        assert_eq!(whole_amount(Decimal::from(60_000)).unwrap(), "60000");
        assert_eq!(whole_amount(Decimal::new(6_000_000, 2)).unwrap(), "60000");

        let err = whole_amount(Decimal::new(6_000_050, 2)).unwrap_err();
        assert!(matches!(err, PaymentError::ValidationError { .. }));
        assert!(!err.is_retryable());
    }
}
