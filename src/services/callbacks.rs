//! Inbound gateway callbacks: token check, decoding and hand-off to the
//! reconciliation engine.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{info, warn};

use crate::database::TransactionLookup;
use crate::error::{AppError, AppResult, DomainError, ValidationError};
use crate::payments::utils::secure_eq;
use crate::services::reconciliation::{CallbackOutcome, ReconciliationEngine, StatusUpdate};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackKind {
    /// Keyed by the payment request id
    PaymentRequest,
    /// Keyed by the payment method id
    PaymentMethod,
}

impl CallbackKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallbackKind::PaymentRequest => "payment_request",
            CallbackKind::PaymentMethod => "payment_method",
        }
    }
}

#[derive(Debug, Deserialize)]
struct CallbackEnvelope {
    #[serde(default)]
    event: Option<String>,
    data: Option<CallbackData>,
}

#[derive(Debug, Deserialize)]
struct CallbackData {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    payment_request_id: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Decodes a raw callback body into the status update it reports.
pub fn decode_callback(kind: CallbackKind, body: &[u8]) -> Result<StatusUpdate, ValidationError> {
    let envelope: CallbackEnvelope =
        serde_json::from_slice(body).map_err(|e| ValidationError::MalformedPayload {
            reason: e.to_string(),
        })?;

    let data = envelope.data.ok_or_else(|| ValidationError::MissingField {
        field: "data".to_string(),
    })?;

    let status = non_blank(data.status).ok_or_else(|| ValidationError::MissingField {
        field: "data.status".to_string(),
    })?;

    let lookup = match kind {
        CallbackKind::PaymentRequest => non_blank(data.payment_request_id)
            .or_else(|| non_blank(data.id))
            .map(TransactionLookup::Id)
            .ok_or_else(|| ValidationError::MissingField {
                field: "data.payment_request_id".to_string(),
            })?,
        CallbackKind::PaymentMethod => non_blank(data.id)
            .map(TransactionLookup::PaymentMethodId)
            .ok_or_else(|| ValidationError::MissingField {
                field: "data.id".to_string(),
            })?,
    };

    if let Some(event) = envelope.event {
        tracing::debug!(kind = kind.as_str(), event = %event, "callback decoded");
    }

    Ok(StatusUpdate { lookup, status })
}

pub struct CallbackIngestor {
    engine: Arc<ReconciliationEngine>,
    callback_token: Option<String>,
}

impl CallbackIngestor {
    pub fn new(engine: Arc<ReconciliationEngine>, callback_token: Option<String>) -> Self {
        Self {
            engine,
            callback_token,
        }
    }

    /// Accepts any token when none is configured.
    pub fn verify_token(&self, presented: Option<&str>) -> AppResult<()> {
        let Some(expected) = self.callback_token.as_deref() else {
            return Ok(());
        };
        match presented {
            Some(token) if secure_eq(token.as_bytes(), expected.as_bytes()) => Ok(()),
            _ => {
                warn!(token_present = presented.is_some(), "callback token rejected");
                Err(AppError::domain(DomainError::InvalidCallbackToken))
            }
        }
    }

    pub async fn ingest(
        &self,
        kind: CallbackKind,
        token: Option<&str>,
        body: &[u8],
    ) -> AppResult<CallbackOutcome> {
        self.verify_token(token)?;

        let update = decode_callback(kind, body).map_err(|e| {
            warn!(kind = kind.as_str(), error = ?e, "callback rejected");
            AppError::validation(e)
        })?;

        let outcome = self.engine.apply_status(update).await?;
        info!(kind = kind.as_str(), outcome = ?outcome, "callback processed");
        Ok(outcome)
    }
}
