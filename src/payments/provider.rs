use crate::payments::error::PaymentResult;
use crate::payments::types::{
    GatewayBalance, PaymentRequestParams, PayoutParams, PayoutRecord, ProviderName,
    TransactionRecord,
};
use async_trait::async_trait;

/// Outbound operations against one payment gateway account.
///
/// Implementations make exactly one HTTP attempt per call; retries are the
/// caller's decision.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_payment_request(
        &self,
        params: PaymentRequestParams,
    ) -> PaymentResult<TransactionRecord>;

    async fn get_payment_request(&self, id: &str) -> PaymentResult<TransactionRecord>;

    async fn create_payout(&self, params: PayoutParams) -> PaymentResult<PayoutRecord>;

    async fn get_payout_by_id(&self, id: &str) -> PaymentResult<PayoutRecord>;

    async fn cancel_payout(&self, id: &str) -> PaymentResult<PayoutRecord>;

    async fn get_balance(&self, currency: &str) -> PaymentResult<GatewayBalance>;

    fn name(&self) -> ProviderName;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payments::error::PaymentError;
    use crate::payments::types::PayoutAccount;
    use rust_decimal::Decimal;

    struct StaticGateway;

    #[async_trait]
    impl PaymentGateway for StaticGateway {
        async fn create_payment_request(
            &self,
            params: PaymentRequestParams,
        ) -> PaymentResult<TransactionRecord> {
            Ok(TransactionRecord {
                id: "pr-1".to_string(),
                reference_id: params.reference_id,
                amount: params.amount,
                currency: params.currency,
                payment_method: "QR_CODE".to_string(),
                channel_code: "QRIS".to_string(),
                payment_method_id: Some("pm-1".to_string()),
                qr_string: Some("000201".to_string()),
                status: "PENDING".to_string(),
                expires_at: None,
                metadata: params.metadata,
                created: None,
                updated: None,
            })
        }

        async fn get_payment_request(&self, _id: &str) -> PaymentResult<TransactionRecord> {
            Err(PaymentError::NetworkError {
                message: "offline".to_string(),
            })
        }

        async fn create_payout(&self, params: PayoutParams) -> PaymentResult<PayoutRecord> {
            Ok(PayoutRecord {
                id: "disb-1".to_string(),
                business_id: "biz".to_string(),
                reference_id: params.reference_id,
                amount: params.amount,
                currency: params.currency,
                description: params.description,
                channel_code: params.channel_code,
                account: params.account,
                status: "ACCEPTED".to_string(),
                estimated_arrival_at: None,
                created: None,
                updated: None,
            })
        }

        async fn get_payout_by_id(&self, _id: &str) -> PaymentResult<PayoutRecord> {
            Err(PaymentError::NetworkError {
                message: "offline".to_string(),
            })
        }

        async fn cancel_payout(&self, _id: &str) -> PaymentResult<PayoutRecord> {
            Err(PaymentError::Unsupported {
                provider: "static".to_string(),
                operation: "payout cancellation".to_string(),
            })
        }

        async fn get_balance(&self, _currency: &str) -> PaymentResult<GatewayBalance> {
            Ok(GatewayBalance {
                balance: Decimal::from(1_000_000),
            })
        }

        fn name(&self) -> ProviderName {
            ProviderName::Xendit
        }
    }

    #[tokio::test]
    async fn trait_objects_can_be_shared() {
        let gateway: std::sync::Arc<dyn PaymentGateway> = std::sync::Arc::new(StaticGateway);
        let payout = gateway
            .create_payout(PayoutParams {
                reference_id: "payout-1-1".to_string(),
                channel_code: "ID_BCA".to_string(),
                account: PayoutAccount {
                    account_number: "1234567890".to_string(),
                    account_holder_name: "Budi".to_string(),
                },
                amount: Decimal::from(50_000),
                currency: "IDR".to_string(),
                description: "withdrawal".to_string(),
                idempotency_key: "k".to_string(),
            })
            .await
            .expect("payout should succeed");
        assert_eq!(payout.status, "ACCEPTED");
        assert!(gateway.cancel_payout("disb-1").await.is_err());
        assert_eq!(gateway.name(), ProviderName::Xendit);
    }
}
