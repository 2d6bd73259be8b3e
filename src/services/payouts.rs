//! Wallet-funded payouts.
//!
//! The wallet debit, the gateway payout call and the payout row insert share
//! one ledger transaction: the balance only changes durably when the payout
//! row is committed.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::database::models::{GatewayPayout, PayoutSync};
use crate::database::{LedgerStore, LedgerTx};
use crate::error::{AppError, AppResult, DomainError, ValidationError};
use crate::logging::mask_account_number;
use crate::payments::types::{PayoutAccount, PayoutParams, PayoutRecord, PayoutStatus, ProviderName};
use crate::payments::{GatewayRegistry, PaymentGateway};
use crate::services::{finish, gateway_failure, ledger_failure, with_deadline};

const IDEMPOTENCY_PREFIX: &str = "storefront-payout";

#[derive(Debug, Clone, Deserialize)]
pub struct PayoutRequest {
    pub user_id: i64,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub account_number: String,
    pub account_holder_name: String,
    pub channel_code: String,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl PayoutRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.amount <= Decimal::ZERO {
            return Err(ValidationError::InvalidAmount {
                amount: self.amount.to_string(),
                reason: "Amount must be greater than zero".to_string(),
            });
        }
        for (field, value) in [
            ("account_number", &self.account_number),
            ("account_holder_name", &self.account_holder_name),
            ("channel_code", &self.channel_code),
        ] {
            if value.trim().is_empty() {
                return Err(ValidationError::MissingField {
                    field: field.to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Platform balance that can still be withdrawn after user wallets are covered
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BalanceSummary {
    pub currency: String,
    pub gateway_balance: Decimal,
    pub wallet_balances: Decimal,
    pub withdrawable: Decimal,
}

/// Strictly increasing nanosecond stamps for payout keys
#[derive(Debug, Default)]
struct KeyClock {
    last: AtomicI64,
}

impl KeyClock {
    fn next(&self) -> i64 {
        let now = Utc::now()
            .timestamp_nanos_opt()
            .unwrap_or_else(|| Utc::now().timestamp_micros() * 1_000);
        match self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            }) {
            Ok(prev) | Err(prev) => now.max(prev + 1),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum PayoutAction {
    Fetch,
    Cancel,
}

impl PayoutAction {
    fn operation(&self) -> &'static str {
        match self {
            PayoutAction::Fetch => "get_payout",
            PayoutAction::Cancel => "cancel_payout",
        }
    }
}

pub struct WalletCoordinator {
    store: Arc<dyn LedgerStore>,
    gateways: GatewayRegistry,
    currency: String,
    deadline: Duration,
    clock: KeyClock,
}

impl WalletCoordinator {
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
            clock: KeyClock::default(),
        }
    }

    /// Fresh idempotency key and reference id for one payout attempt
    fn payout_keys(&self, user_id: i64) -> (String, String) {
        let stamp = self.clock.next();
        (
            format!("{}-{}", IDEMPOTENCY_PREFIX, stamp),
            format!("payout-{}-{}", user_id, stamp),
        )
    }

    pub async fn create_payout(&self, request: PayoutRequest) -> AppResult<GatewayPayout> {
        const OP: &str = "create_payout";
        request.validate().map_err(AppError::validation)?;

        with_deadline(OP, self.deadline, async {
            let mut tx = self
                .store
                .begin()
                .await
                .map_err(|e| ledger_failure(OP, "begin", e))?;
            let result = self.create_payout_in(tx.as_mut(), &request).await;
            finish(tx, result, OP).await
        })
        .await
    }

    async fn create_payout_in(
        &self,
        tx: &mut dyn LedgerTx,
        request: &PayoutRequest,
    ) -> AppResult<GatewayPayout> {
        const OP: &str = "create_payout";
        let user_id = request.user_id;

        let wallet = tx
            .find_wallet_for_user(user_id)
            .await
            .map_err(|e| ledger_failure(OP, "find_wallet", e))?
            .ok_or_else(|| AppError::domain(DomainError::WalletNotFound { user_id }))?;

        if !wallet.is_active() {
            return Err(AppError::validation(ValidationError::InvalidField {
                field: "user_id".to_string(),
                reason: "wallet is not active".to_string(),
            }));
        }

        if request.amount > wallet.balance {
            warn!(
                operation = OP,
                user_id = user_id,
                available = %wallet.balance,
                required = %request.amount,
                "insufficient wallet balance"
            );
            return Err(AppError::domain(DomainError::InsufficientBalance {
                available: wallet.balance.to_string(),
                required: request.amount.to_string(),
            }));
        }

        let now = Utc::now();
        let remaining = wallet.balance - request.amount;
        tx.update_wallet_balance(wallet.id, remaining, now)
            .await
            .map_err(|e| ledger_failure(OP, "debit_wallet", e))?;

        let (idempotency_key, reference_id) = self.payout_keys(user_id);
        let currency = request
            .currency
            .clone()
            .unwrap_or_else(|| self.currency.clone());
        let description = request
            .description
            .clone()
            .unwrap_or_else(|| format!("Wallet withdrawal for user {}", user_id));

        let gateway = self.gateways.payouts();
        let provider = gateway.name();
        info!(
            operation = OP,
            user_id = user_id,
            reference_id = %reference_id,
            amount = %request.amount,
            channel_code = %request.channel_code,
            account = %mask_account_number(&request.account_number),
            provider = %provider,
            "requesting payout"
        );

        let record = gateway
            .create_payout(PayoutParams {
                reference_id: reference_id.clone(),
                channel_code: request.channel_code.clone(),
                account: PayoutAccount {
                    account_number: request.account_number.clone(),
                    account_holder_name: request.account_holder_name.clone(),
                },
                amount: request.amount,
                currency: currency.clone(),
                description: description.clone(),
                idempotency_key,
            })
            .await
            .map_err(|e| gateway_failure(OP, provider.as_str(), e))?;

        let payout = GatewayPayout {
            id: record.id,
            provider: provider.as_str().to_string(),
            user_id,
            business_id: record.business_id,
            reference_id: if record.reference_id.is_empty() {
                reference_id
            } else {
                record.reference_id
            },
            amount: record.amount,
            currency: record.currency,
            description: if record.description.is_empty() {
                description
            } else {
                record.description
            },
            channel_code: record.channel_code,
            account_number: record.account.account_number,
            account_holder_name: record.account.account_holder_name,
            status: record.status,
            estimated_arrival_at: record.estimated_arrival_at,
            created_at: record.created.unwrap_or(now),
            updated_at: record.updated.unwrap_or(now),
        };

        tx.insert_payout(&payout)
            .await
            .map_err(|e| ledger_failure(OP, "insert_payout", e))?;

        info!(
            operation = OP,
            user_id = user_id,
            payout_id = %payout.id,
            status = %payout.status,
            "payout recorded"
        );
        Ok(payout)
    }

    /// Gateway balance minus the sum of active wallet balances. The two reads
    /// are independent, so the figure may be slightly stale.
    pub async fn get_balance(&self) -> AppResult<BalanceSummary> {
        const OP: &str = "get_balance";

        with_deadline(OP, self.deadline, async {
            let gateway = self.gateways.payouts();
            let gateway_balance = gateway
                .get_balance(&self.currency)
                .await
                .map_err(|e| gateway_failure(OP, gateway.name().as_str(), e))?
                .balance;
            let wallet_balances = self
                .store
                .sum_active_wallet_balances()
                .await
                .map_err(|e| ledger_failure(OP, "sum_wallets", e))?;

            Ok(BalanceSummary {
                currency: self.currency.clone(),
                gateway_balance,
                wallet_balances,
                withdrawable: gateway_balance - wallet_balances,
            })
        })
        .await
    }

    pub async fn get_payout_by_id(&self, payout_id: &str) -> AppResult<GatewayPayout> {
        self.sync_payout(payout_id, PayoutAction::Fetch).await
    }

    pub async fn cancel_payout(&self, payout_id: &str) -> AppResult<GatewayPayout> {
        self.sync_payout(payout_id, PayoutAction::Cancel).await
    }

    async fn sync_payout(&self, payout_id: &str, action: PayoutAction) -> AppResult<GatewayPayout> {
        let op = action.operation();

        with_deadline(op, self.deadline, async {
            let mut tx = self
                .store
                .begin()
                .await
                .map_err(|e| ledger_failure(op, "begin", e))?;
            let result = self.sync_payout_in(tx.as_mut(), payout_id, action).await;
            finish(tx, result, op).await
        })
        .await
    }

    async fn sync_payout_in(
        &self,
        tx: &mut dyn LedgerTx,
        payout_id: &str,
        action: PayoutAction,
    ) -> AppResult<GatewayPayout> {
        let op = action.operation();

        let local = tx
            .find_payout(payout_id)
            .await
            .map_err(|e| ledger_failure(op, "find_payout", e))?
            .ok_or_else(|| {
                AppError::domain(DomainError::PayoutNotFound {
                    payout_id: payout_id.to_string(),
                })
            })?;

        let gateway = self.gateway_for(&local.provider)?;
        let record = match action {
            PayoutAction::Fetch => gateway.get_payout_by_id(payout_id).await,
            PayoutAction::Cancel => gateway.cancel_payout(payout_id).await,
        }
        .map_err(|e| gateway_failure(op, &local.provider, e))?;

        let now = Utc::now();
        let sync = merge_sync(&local, &record, now);

        let was_open = PayoutStatus::parse(&local.status)
            .map(|s| !s.is_terminal())
            .unwrap_or(false);
        let now_reversed = PayoutStatus::parse(&sync.status)
            .map(|s| s.returns_funds())
            .unwrap_or(false);

        if was_open && now_reversed {
            self.credit_back(tx, &local, &sync.status, now).await?;
        }

        tx.update_payout(payout_id, &sync)
            .await
            .map_err(|e| ledger_failure(op, "update_payout", e))?;

        if local.status != sync.status {
            info!(
                operation = op,
                payout_id = payout_id,
                from_status = %local.status,
                to_status = %sync.status,
                "payout status reconciled"
            );
        }

        Ok(GatewayPayout {
            status: sync.status,
            amount: sync.amount,
            channel_code: sync.channel_code,
            account_number: sync.account_number,
            account_holder_name: sync.account_holder_name,
            estimated_arrival_at: sync.estimated_arrival_at,
            updated_at: sync.updated_at,
            ..local
        })
    }

    /// Returns the debited amount of a payout that will never be disbursed.
    async fn credit_back(
        &self,
        tx: &mut dyn LedgerTx,
        payout: &GatewayPayout,
        status: &str,
        now: chrono::DateTime<Utc>,
    ) -> AppResult<()> {
        const OP: &str = "payout_reversal";

        let wallet = tx
            .find_wallet_for_user(payout.user_id)
            .await
            .map_err(|e| ledger_failure(OP, "find_wallet", e))?
            .ok_or_else(|| {
                AppError::domain(DomainError::WalletNotFound {
                    user_id: payout.user_id,
                })
            })?;

        let restored = wallet.balance + payout.amount;
        tx.update_wallet_balance(wallet.id, restored, now)
            .await
            .map_err(|e| ledger_failure(OP, "credit_wallet", e))?;

        info!(
            operation = OP,
            payout_id = %payout.id,
            user_id = payout.user_id,
            amount = %payout.amount,
            status = status,
            "payout reversed, wallet credited"
        );
        Ok(())
    }

    fn gateway_for(&self, provider: &str) -> AppResult<Arc<dyn PaymentGateway>> {
        let name: ProviderName = provider.parse()?;
        Ok(self.gateways.get(name)?)
    }
}

/// Gateway-owned fields win; blanks from the gateway keep the local value.
fn merge_sync(
    local: &GatewayPayout,
    record: &PayoutRecord,
    now: chrono::DateTime<Utc>,
) -> PayoutSync {
    fn pick(remote: &str, local: &str) -> String {
        if remote.trim().is_empty() {
            local.to_string()
        } else {
            remote.to_string()
        }
    }

    PayoutSync {
        status: pick(&record.status, &local.status),
        amount: record.amount,
        channel_code: pick(&record.channel_code, &local.channel_code),
        account_number: pick(&record.account.account_number, &local.account_number),
        account_holder_name: pick(
            &record.account.account_holder_name,
            &local.account_holder_name,
        ),
        estimated_arrival_at: record.estimated_arrival_at.or(local.estimated_arrival_at),
        updated_at: record.updated.unwrap_or(now),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_clock_is_strictly_increasing() {
        let clock = KeyClock::default();
        let mut last = clock.next();
        for _ in 0..1000 {
            let next = clock.next();
            assert!(next > last);
            last = next;
        }
    }

    #[test]
    fn payout_request_validation() {
        let mut request = PayoutRequest {
            user_id: 1,
            amount: Decimal::from(10_000),
            account_number: "1234567890".to_string(),
            account_holder_name: "Budi".to_string(),
            channel_code: "ID_BCA".to_string(),
            currency: None,
            description: None,
        };
        assert!(request.validate().is_ok());

        request.amount = Decimal::ZERO;
        assert!(matches!(
            request.validate(),
            Err(ValidationError::InvalidAmount { .. })
        ));

        request.amount = Decimal::from(1);
        request.channel_code = " ".to_string();
        assert!(matches!(
            request.validate(),
            Err(ValidationError::MissingField { field }) if field == "channel_code"
        ));
    }

    #[test]
    fn merge_keeps_local_values_for_blank_gateway_fields() {
        let now = Utc::now();
        let local = GatewayPayout {
            id: "disb-1".to_string(),
            provider: "flip".to_string(),
            user_id: 3,
            business_id: "b".to_string(),
            reference_id: "payout-3-1".to_string(),
            amount: Decimal::from(5_000),
            currency: "IDR".to_string(),
            description: "w".to_string(),
            channel_code: "BCA".to_string(),
            account_number: "111".to_string(),
            account_holder_name: "Sari".to_string(),
            status: "PENDING".to_string(),
            estimated_arrival_at: None,
            created_at: now,
            updated_at: now,
        };
        let record = PayoutRecord {
            id: "disb-1".to_string(),
            business_id: "b".to_string(),
            reference_id: String::new(),
            amount: Decimal::from(5_000),
            currency: "IDR".to_string(),
            description: String::new(),
            channel_code: "BCA".to_string(),
            account: PayoutAccount {
                account_number: "111".to_string(),
                account_holder_name: String::new(),
            },
            status: "SUCCEEDED".to_string(),
            estimated_arrival_at: None,
            created: None,
            updated: None,
        };

        let sync = merge_sync(&local, &record, now);
        assert_eq!(sync.status, "SUCCEEDED");
        assert_eq!(sync.account_holder_name, "Sari");
        assert_eq!(sync.updated_at, now);
    }
}
