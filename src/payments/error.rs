use thiserror::Error;

pub type PaymentResult<T> = Result<T, PaymentError>;

#[derive(Debug, Clone, Error)]
pub enum PaymentError {
    #[error("Validation error: {message}")]
    ValidationError {
        message: String,
        field: Option<String>,
    },

    #[error("Network error: {message}")]
    NetworkError { message: String },

    #[error("Rate limit exceeded: {message}")]
    RateLimitError {
        message: String,
        retry_after_seconds: Option<u64>,
    },

    #[error("Provider error: provider={provider}, message={message}")]
    ProviderError {
        provider: String,
        message: String,
        provider_code: Option<String>,
        retryable: bool,
    },

    #[error("{provider} does not support {operation}")]
    Unsupported {
        provider: String,
        operation: String,
    },
}

impl PaymentError {
    pub fn is_retryable(&self) -> bool {
        match self {
            PaymentError::ValidationError { .. } => false,
            PaymentError::NetworkError { .. } => true,
            PaymentError::RateLimitError { .. } => true,
            PaymentError::ProviderError { retryable, .. } => *retryable,
            PaymentError::Unsupported { .. } => false,
        }
    }

    pub fn provider_code(&self) -> Option<&str> {
        match self {
            PaymentError::ProviderError { provider_code, .. } => provider_code.as_deref(),
            _ => None,
        }
    }
}

impl From<PaymentError> for crate::error::AppError {
    fn from(err: PaymentError) -> Self {
        use crate::error::{AppError, AppErrorKind, ExternalError, ValidationError};

        match err {
            PaymentError::ValidationError { message, field } => {
                AppError::new(AppErrorKind::Validation(ValidationError::InvalidField {
                    field: field.unwrap_or_else(|| "request".to_string()),
                    reason: message,
                }))
            }
            PaymentError::Unsupported {
                provider,
                operation,
            } => AppError::new(AppErrorKind::Validation(ValidationError::InvalidField {
                field: "operation".to_string(),
                reason: format!("{} is not available for {}", operation, provider),
            })),
            PaymentError::ProviderError { ref provider, .. } => {
                AppError::new(AppErrorKind::External(ExternalError::PaymentGateway {
                    provider: provider.clone(),
                    is_retryable: err.is_retryable(),
                    message: err.to_string(),
                }))
            }
            other => AppError::new(AppErrorKind::External(ExternalError::PaymentGateway {
                provider: "gateway".to_string(),
                is_retryable: other.is_retryable(),
                message: other.to_string(),
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AppError, ErrorCode};

    #[test]
    fn provider_errors_become_generic_server_errors() {
        let app: AppError = PaymentError::ProviderError {
            provider: "xendit".to_string(),
            message: "HTTP 400 Bad Request: DUPLICATE_ERROR".to_string(),
            provider_code: Some("DUPLICATE_ERROR".to_string()),
            retryable: false,
        }
        .into();

        assert_eq!(app.status_code(), 500);
        assert_eq!(app.error_code(), ErrorCode::PaymentGatewayError);
        assert!(!app.user_message().contains("DUPLICATE_ERROR"));
    }

    #[test]
    fn unsupported_operation_is_a_client_error() {
        let app: AppError = PaymentError::Unsupported {
            provider: "flip".to_string(),
            operation: "payout cancellation".to_string(),
        }
        .into();

        assert_eq!(app.status_code(), 400);
    }

    #[test]
    fn retryable_flags_are_set() {
        assert!(PaymentError::NetworkError {
            message: "timeout".to_string()
        }
        .is_retryable());
        assert!(!PaymentError::ValidationError {
            message: "bad".to_string(),
            field: None
        }
        .is_retryable());
    }
}
