//! Webpay Plus REST wire types.

use serde::{Deserialize, Serialize};
use webpay_checkout_core::{Amount, TransactionStatus};

/// Body of `POST /transactions`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateTransaction {
    pub buy_order: String,
    pub session_id: String,
    pub amount: Amount,
    pub return_url: String,
}

/// Response of `POST /transactions`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TransactionCreated {
    pub token: String,
    pub url: String,
}

impl TransactionCreated {
    /// URL the shopper's browser must be sent to, `{url}?token_ws={token}`.
    #[must_use]
    pub fn redirect_url(&self) -> String {
        format!("{}?token_ws={}", self.url, self.token)
    }
}

/// Response of `PUT /transactions/{token}`.
///
/// Only `buy_order`, `status` and `amount` are relied upon; the rest is kept
/// for logging and the confirmation email.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TransactionCommit {
    pub buy_order: String,
    #[serde(default)]
    pub session_id: Option<String>,
    pub status: TransactionStatus,
    pub amount: Amount,
    #[serde(default)]
    pub authorization_code: Option<String>,
    #[serde(default)]
    pub response_code: Option<i32>,
    #[serde(default)]
    pub transaction_date: Option<String>,
    #[serde(default)]
    pub payment_type_code: Option<String>,
    #[serde(default)]
    pub installments_number: Option<u32>,
    #[serde(default)]
    pub card_detail: Option<CardDetail>,
}

impl TransactionCommit {
    /// Last digits of the card, when Webpay reports them.
    #[must_use]
    pub fn card_number(&self) -> Option<&str> {
        self.card_detail
            .as_ref()
            .and_then(|card| card.card_number.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CardDetail {
    #[serde(default)]
    pub card_number: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_redirect_url() {
        let created = TransactionCreated {
            token: "01ab23".to_string(),
            url: "https://webpay3gint.transbank.cl/webpayserver/initTransaction".to_string(),
        };
        assert_eq!(
            created.redirect_url(),
            "https://webpay3gint.transbank.cl/webpayserver/initTransaction?token_ws=01ab23"
        );
    }

    #[test]
    fn test_commit_from_gateway_payload() {
        let commit: TransactionCommit = serde_json::from_value(serde_json::json!({
            "vci": "TSY",
            "amount": 200,
            "status": "AUTHORIZED",
            "buy_order": "ORD-1",
            "session_id": "sess-1",
            "card_detail": {"card_number": "6623"},
            "accounting_date": "1016",
            "transaction_date": "2026-10-16T14:03:12.011Z",
            "authorization_code": "1213",
            "payment_type_code": "VN",
            "response_code": 0,
            "installments_number": 0
        }))
        .unwrap();

        assert!(commit.status.is_authorized());
        assert_eq!(commit.amount, Amount::from_pesos(200));
        assert_eq!(commit.card_number(), Some("6623"));
        assert_eq!(commit.response_code, Some(0));
        assert_eq!(commit.session_id.as_deref(), Some("sess-1"));
        assert_eq!(
            commit.transaction_date.as_deref(),
            Some("2026-10-16T14:03:12.011Z")
        );
        assert_eq!(commit.payment_type_code.as_deref(), Some("VN"));
        assert_eq!(commit.installments_number, Some(0));
    }

    #[test]
    fn test_commit_with_minimal_payload() {
        let commit: TransactionCommit = serde_json::from_value(serde_json::json!({
            "buy_order": "ORD-1",
            "status": "FAILED",
            "amount": 200
        }))
        .unwrap();

        assert_eq!(commit.status, TransactionStatus::Failed);
        assert_eq!(commit.card_number(), None);
    }

    #[test]
    fn test_create_body_shape() {
        let body = CreateTransaction {
            buy_order: "ORD-1".to_string(),
            session_id: "sess-1".to_string(),
            amount: Amount::from_pesos(200),
            return_url: "http://localhost:4000/api/webpay/retorno".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({
                "buy_order": "ORD-1",
                "session_id": "sess-1",
                "amount": 200,
                "return_url": "http://localhost:4000/api/webpay/retorno"
            })
        );
    }
}
