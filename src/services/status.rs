//! Gateway status vocabulary and its mapping onto `orders.payment_status`.

use serde::{Deserialize, Serialize};

/// Signed payment status stored on the order row.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OrderPaymentStatus {
    Failed,
    Expired,
    Cancelled,
    Pending,
    Paid,
}

impl OrderPaymentStatus {
    pub fn code(&self) -> i16 {
        match self {
            OrderPaymentStatus::Paid => 1,
            OrderPaymentStatus::Pending => 0,
            OrderPaymentStatus::Cancelled => -1,
            OrderPaymentStatus::Expired => -2,
            OrderPaymentStatus::Failed => -3,
        }
    }

    pub fn from_code(code: i16) -> Option<Self> {
        match code {
            1 => Some(OrderPaymentStatus::Paid),
            0 => Some(OrderPaymentStatus::Pending),
            -1 => Some(OrderPaymentStatus::Cancelled),
            -2 => Some(OrderPaymentStatus::Expired),
            -3 => Some(OrderPaymentStatus::Failed),
            _ => None,
        }
    }

    /// Maps a gateway payment status string. Matching ignores case and
    /// accepts both spellings of cancelled.
    pub fn from_gateway(status: &str) -> Option<Self> {
        match status.trim().to_lowercase().as_str() {
            "succeeded" => Some(OrderPaymentStatus::Paid),
            "pending" => Some(OrderPaymentStatus::Pending),
            "canceled" | "cancelled" => Some(OrderPaymentStatus::Cancelled),
            "expired" => Some(OrderPaymentStatus::Expired),
            "failed" => Some(OrderPaymentStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderPaymentStatus::Pending)
    }
}

/// Whether a transaction in this gateway status still drives its order.
/// Only cancelled, expired and failed attempts release the order for a new
/// payment request; unrecognised statuses are treated as still open.
pub fn is_open_attempt(gateway_status: &str) -> bool {
    !matches!(
        OrderPaymentStatus::from_gateway(gateway_status),
        Some(OrderPaymentStatus::Cancelled)
            | Some(OrderPaymentStatus::Expired)
            | Some(OrderPaymentStatus::Failed)
    )
}

/// Code to write for an incoming gateway status. Unrecognised strings keep
/// the current code.
pub fn resolve_payment_status(gateway_status: &str, current: i16) -> i16 {
    OrderPaymentStatus::from_gateway(gateway_status)
        .map(|s| s.code())
        .unwrap_or(current)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_statuses_map_to_documented_codes() {
        let table = [
            ("SUCCEEDED", 1),
            ("PENDING", 0),
            ("CANCELED", -1),
            ("EXPIRED", -2),
            ("FAILED", -3),
        ];
        for (status, code) in table {
            assert_eq!(resolve_payment_status(status, 7), code, "{}", status);
        }
    }

    #[test]
    fn only_failed_attempts_release_the_order() {
        assert!(is_open_attempt("PENDING"));
        assert!(is_open_attempt("succeeded"));
        assert!(is_open_attempt("REQUIRES_ACTION"));
        assert!(!is_open_attempt("EXPIRED"));
        assert!(!is_open_attempt("Cancelled"));
        assert!(!is_open_attempt("FAILED"));
    }

    #[test]
    fn unknown_status_keeps_current_code() {
        assert_eq!(resolve_payment_status("REQUIRES_ACTION", 0), 0);
        assert_eq!(resolve_payment_status("", -2), -2);
    }

    #[test]
    fn codes_round_trip() {
        for status in [
            OrderPaymentStatus::Paid,
            OrderPaymentStatus::Pending,
            OrderPaymentStatus::Cancelled,
            OrderPaymentStatus::Expired,
            OrderPaymentStatus::Failed,
        ] {
            assert_eq!(OrderPaymentStatus::from_code(status.code()), Some(status));
        }
        assert!(OrderPaymentStatus::from_code(5).is_none());
        assert!(OrderPaymentStatus::Paid.is_terminal());
        assert!(!OrderPaymentStatus::Pending.is_terminal());
    }
}
