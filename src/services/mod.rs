//! Business logic: payment reconciliation, wallet payouts and callback ingestion

pub mod callbacks;
pub mod payouts;
pub mod reconciliation;
pub mod status;

use std::future::Future;
use std::time::Duration;

use tracing::{error, warn};

use crate::database::error::DatabaseError;
use crate::database::LedgerTx;
use crate::error::{AppError, AppErrorKind, AppResult, ExternalError};
use crate::payments::PaymentError;

pub use callbacks::{CallbackIngestor, CallbackKind};
pub use payouts::{BalanceSummary, PayoutRequest, WalletCoordinator};
pub use reconciliation::{
    build_basket, CallbackOutcome, ReconciliationEngine, StatusUpdate, TransactionDetails,
};
pub use status::OrderPaymentStatus;

/// Runs one operation under the request deadline. When the deadline elapses
/// the operation future is dropped, which rolls back any open ledger
/// transaction it holds.
pub(crate) async fn with_deadline<T, F>(
    operation: &'static str,
    deadline: Duration,
    fut: F,
) -> AppResult<T>
where
    F: Future<Output = AppResult<T>>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => {
            warn!(
                operation = operation,
                timeout_secs = deadline.as_secs(),
                "operation deadline elapsed, work rolled back"
            );
            Err(AppError::new(AppErrorKind::External(ExternalError::Timeout {
                service: operation.to_string(),
                timeout_secs: deadline.as_secs(),
            })))
        }
    }
}

/// Commits on success, rolls back on failure.
pub(crate) async fn finish<T>(
    tx: Box<dyn LedgerTx>,
    result: AppResult<T>,
    operation: &'static str,
) -> AppResult<T> {
    match result {
        Ok(value) => {
            tx.commit()
                .await
                .map_err(|e| ledger_failure(operation, "commit", e))?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                warn!(
                    operation = operation,
                    error = %rollback_err,
                    "rollback failed"
                );
            }
            Err(err)
        }
    }
}

pub(crate) fn ledger_failure(operation: &'static str, step: &str, err: DatabaseError) -> AppError {
    error!(
        operation = operation,
        step = step,
        error = %err,
        retryable = err.is_retryable(),
        "ledger operation failed"
    );
    AppError::from(err).with_context(format!("{}: {}", operation, step))
}

pub(crate) fn gateway_failure(operation: &'static str, provider: &str, err: PaymentError) -> AppError {
    error!(
        operation = operation,
        provider = provider,
        provider_code = ?err.provider_code(),
        error = %err,
        "gateway call failed"
    );
    AppError::from(err).with_context(operation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[tokio::test]
    async fn elapsed_deadline_becomes_timeout_error() {
        let result: AppResult<()> = with_deadline("slow_op", Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;

        let err = result.expect_err("deadline should elapse");
        assert_eq!(err.status_code(), 504);
        assert_eq!(err.error_code(), ErrorCode::ExternalServiceTimeout);
    }

    #[tokio::test]
    async fn fast_operation_passes_through() {
        let result = with_deadline("fast_op", Duration::from_secs(1), async { Ok(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }
}
