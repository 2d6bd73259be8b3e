//! Unified error handling for the payments backend
//!
//! Every failure that can reach the HTTP boundary is expressed as an [`AppError`],
//! which carries the HTTP status mapping, a machine-readable [`ErrorCode`] and a
//! user-facing message that never contains upstream or driver details.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error codes for programmatic handling by clients
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErrorCode {
    // Domain errors (4xx)
    #[serde(rename = "INSUFFICIENT_BALANCE")]
    InsufficientBalance,
    #[serde(rename = "ORDER_NOT_FOUND")]
    OrderNotFound,
    #[serde(rename = "TRANSACTION_NOT_FOUND")]
    TransactionNotFound,
    #[serde(rename = "PAYOUT_NOT_FOUND")]
    PayoutNotFound,
    #[serde(rename = "WALLET_NOT_FOUND")]
    WalletNotFound,
    #[serde(rename = "INVALID_CALLBACK_TOKEN")]
    InvalidCallbackToken,
    #[serde(rename = "ORDER_ALREADY_PAID")]
    OrderAlreadyPaid,
    #[serde(rename = "PAYMENT_IN_PROGRESS")]
    PaymentInProgress,

    // Infrastructure errors (5xx)
    #[serde(rename = "DATABASE_ERROR")]
    DatabaseError,
    #[serde(rename = "CONFIGURATION_ERROR")]
    ConfigurationError,

    // External errors
    #[serde(rename = "PAYMENT_GATEWAY_ERROR")]
    PaymentGatewayError,
    #[serde(rename = "EXTERNAL_SERVICE_TIMEOUT")]
    ExternalServiceTimeout,

    // Generic
    #[serde(rename = "INTERNAL_ERROR")]
    InternalError,
    #[serde(rename = "VALIDATION_ERROR")]
    ValidationError,
}

/// Order, wallet, payout and callback rule violations
#[derive(Debug, Clone)]
pub enum DomainError {
    /// Payout amount exceeds the wallet balance
    InsufficientBalance { available: String, required: String },
    OrderNotFound { order_id: i64 },
    TransactionNotFound { transaction_id: String },
    PayoutNotFound { payout_id: String },
    /// The user has no wallet row
    WalletNotFound { user_id: i64 },
    /// Callback did not carry the configured verification token
    InvalidCallbackToken,
    OrderAlreadyPaid { order_id: i64 },
    /// Another transaction for the order is still pending or paid
    PaymentInProgress { order_id: i64, transaction_id: String },
}

/// Infrastructure-level errors (database, configuration)
#[derive(Debug, Clone)]
pub enum InfrastructureError {
    /// Transaction begin/commit, insert or update failure
    Database { message: String, is_retryable: bool },
    /// Missing or invalid configuration
    Configuration { message: String },
}

/// External service errors
#[derive(Debug, Clone)]
pub enum ExternalError {
    /// Payment or payout gateway returned an error
    PaymentGateway {
        provider: String,
        message: String,
        is_retryable: bool,
    },
    /// Operation deadline elapsed
    Timeout { service: String, timeout_secs: u64 },
}

/// Request payload problems
#[derive(Debug, Clone)]
pub enum ValidationError {
    /// Required field missing
    MissingField { field: String },
    /// Invalid amount (format or value)
    InvalidAmount { amount: String, reason: String },
    /// Field present but unusable
    InvalidField { field: String, reason: String },
    /// Request body could not be decoded
    MalformedPayload { reason: String },
}

/// Error crossing the service and HTTP boundary
#[derive(Debug, Clone)]
pub struct AppError {
    pub kind: AppErrorKind,
    pub request_id: Option<String>,
    pub context: Option<String>,
}

#[derive(Debug, Clone)]
pub enum AppErrorKind {
    Domain(DomainError),
    Infrastructure(InfrastructureError),
    External(ExternalError),
    Validation(ValidationError),
}

impl AppError {
    pub fn new(kind: AppErrorKind) -> Self {
        Self {
            kind,
            request_id: None,
            context: None,
        }
    }

    pub fn domain(err: DomainError) -> Self {
        Self::new(AppErrorKind::Domain(err))
    }

    pub fn validation(err: ValidationError) -> Self {
        Self::new(AppErrorKind::Validation(err))
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// HTTP status for this error
    pub fn status_code(&self) -> u16 {
        match &self.kind {
            AppErrorKind::Domain(err) => match err {
                DomainError::InsufficientBalance { .. } => 400,
                DomainError::OrderNotFound { .. } => 404,
                DomainError::TransactionNotFound { .. } => 404,
                DomainError::PayoutNotFound { .. } => 404,
                DomainError::WalletNotFound { .. } => 404,
                DomainError::InvalidCallbackToken => 401,
                DomainError::OrderAlreadyPaid { .. } => 409,
                DomainError::PaymentInProgress { .. } => 409,
            },
            AppErrorKind::Infrastructure(_) => 500,
            AppErrorKind::External(err) => match err {
                // upstream failures are never attributed to the gateway in the response
                ExternalError::PaymentGateway { .. } => 500,
                ExternalError::Timeout { .. } => 504,
            },
            AppErrorKind::Validation(_) => 400,
        }
    }

    /// Machine-readable code for the error body
    pub fn error_code(&self) -> ErrorCode {
        match &self.kind {
            AppErrorKind::Domain(err) => match err {
                DomainError::InsufficientBalance { .. } => ErrorCode::InsufficientBalance,
                DomainError::OrderNotFound { .. } => ErrorCode::OrderNotFound,
                DomainError::TransactionNotFound { .. } => ErrorCode::TransactionNotFound,
                DomainError::PayoutNotFound { .. } => ErrorCode::PayoutNotFound,
                DomainError::WalletNotFound { .. } => ErrorCode::WalletNotFound,
                DomainError::InvalidCallbackToken => ErrorCode::InvalidCallbackToken,
                DomainError::OrderAlreadyPaid { .. } => ErrorCode::OrderAlreadyPaid,
                DomainError::PaymentInProgress { .. } => ErrorCode::PaymentInProgress,
            },
            AppErrorKind::Infrastructure(err) => match err {
                InfrastructureError::Database { .. } => ErrorCode::DatabaseError,
                InfrastructureError::Configuration { .. } => ErrorCode::ConfigurationError,
            },
            AppErrorKind::External(err) => match err {
                ExternalError::PaymentGateway { .. } => ErrorCode::PaymentGatewayError,
                ExternalError::Timeout { .. } => ErrorCode::ExternalServiceTimeout,
            },
            AppErrorKind::Validation(_) => ErrorCode::ValidationError,
        }
    }

    /// Message safe to return to clients; never carries driver or upstream detail
    pub fn user_message(&self) -> String {
        match &self.kind {
            AppErrorKind::Domain(err) => match err {
                DomainError::InsufficientBalance {
                    available,
                    required,
                } => {
                    format!(
                        "Insufficient balance. Available: {}, Required: {}",
                        available, required
                    )
                }
                DomainError::OrderNotFound { order_id } => {
                    format!("Order '{}' not found", order_id)
                }
                DomainError::TransactionNotFound { transaction_id } => {
                    format!("Transaction '{}' not found", transaction_id)
                }
                DomainError::PayoutNotFound { payout_id } => {
                    format!("Payout '{}' not found", payout_id)
                }
                DomainError::WalletNotFound { user_id } => {
                    format!("Wallet for user '{}' not found", user_id)
                }
                DomainError::InvalidCallbackToken => "Invalid callback token".to_string(),
                DomainError::OrderAlreadyPaid { order_id } => {
                    format!("Order '{}' is already paid", order_id)
                }
                DomainError::PaymentInProgress {
                    order_id,
                    transaction_id,
                } => format!(
                    "Order '{}' already has an open payment '{}'",
                    order_id, transaction_id
                ),
            },
            AppErrorKind::Infrastructure(_) => {
                "Service temporarily unavailable. Please try again later".to_string()
            }
            AppErrorKind::External(err) => match err {
                ExternalError::PaymentGateway { .. } => {
                    "Payment processing failed. Please try again later".to_string()
                }
                ExternalError::Timeout {
                    service,
                    timeout_secs,
                } => {
                    format!(
                        "{} request timed out after {} seconds. Please try again",
                        service, timeout_secs
                    )
                }
            },
            AppErrorKind::Validation(err) => match err {
                ValidationError::MissingField { field } => {
                    format!("Required field '{}' is missing", field)
                }
                ValidationError::InvalidAmount { amount, reason } => {
                    format!("Invalid amount '{}': {}", amount, reason)
                }
                ValidationError::InvalidField { field, reason } => {
                    format!("Invalid value for '{}': {}", field, reason)
                }
                ValidationError::MalformedPayload { reason } => {
                    format!("Malformed request body: {}", reason)
                }
            },
        }
    }

    /// Whether a caller may replay the request unchanged
    pub fn is_retryable(&self) -> bool {
        match &self.kind {
            AppErrorKind::Domain(_) => false,
            AppErrorKind::Infrastructure(err) => match err {
                InfrastructureError::Database { is_retryable, .. } => *is_retryable,
                InfrastructureError::Configuration { .. } => false,
            },
            AppErrorKind::External(err) => match err {
                ExternalError::PaymentGateway { is_retryable, .. } => *is_retryable,
                ExternalError::Timeout { .. } => true,
            },
            AppErrorKind::Validation(_) => false,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.user_message())
    }
}

impl std::error::Error for AppError {}

// From<DatabaseError> lives in database/error.rs and From<PaymentError> in payments/error.rs

/// Result alias used by services and handlers
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_balance_error() {
        let error = AppError::domain(DomainError::InsufficientBalance {
            available: "50".to_string(),
            required: "100".to_string(),
        });

        assert_eq!(error.status_code(), 400);
        assert_eq!(error.error_code(), ErrorCode::InsufficientBalance);
        assert!(error.user_message().contains("Insufficient balance"));
        assert!(!error.is_retryable());
    }

    #[test]
    fn test_gateway_error_hides_upstream_detail() {
        let error = AppError::new(AppErrorKind::External(ExternalError::PaymentGateway {
            provider: "xendit".to_string(),
            message: "HTTP 400: {\"error_code\":\"API_VALIDATION_ERROR\"}".to_string(),
            is_retryable: false,
        }));

        assert_eq!(error.status_code(), 500);
        assert_eq!(error.error_code(), ErrorCode::PaymentGatewayError);
        assert!(!error.user_message().contains("API_VALIDATION_ERROR"));
        assert!(!error.user_message().contains("xendit"));
    }

    #[test]
    fn test_database_error_is_server_error() {
        let error = AppError::new(AppErrorKind::Infrastructure(InfrastructureError::Database {
            message: "connection reset".to_string(),
            is_retryable: true,
        }));

        assert_eq!(error.status_code(), 500);
        assert!(!error.user_message().contains("connection reset"));
        assert!(error.is_retryable());
    }

    #[test]
    fn test_validation_error() {
        let error = AppError::validation(ValidationError::InvalidAmount {
            amount: "-100".to_string(),
            reason: "Amount must be greater than zero".to_string(),
        });

        assert_eq!(error.status_code(), 400);
        assert_eq!(error.error_code(), ErrorCode::ValidationError);
        assert!(!error.is_retryable());
    }

    #[test]
    fn test_context_and_request_id_are_kept() {
        let error = AppError::domain(DomainError::OrderNotFound { order_id: 42 })
            .with_request_id("req_1")
            .with_context("create_payment_request");

        assert_eq!(error.status_code(), 404);
        assert_eq!(error.request_id.as_deref(), Some("req_1"));
        assert_eq!(error.context.as_deref(), Some("create_payment_request"));
    }
}
