//! Order snapshots awaiting payment confirmation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cart::{Customer, OrderLine, ValidatedOrder};
use crate::types::Amount;

/// Everything needed to send the purchase confirmation once Webpay calls back.
///
/// Created at checkout, keyed by the gateway token (`order_key`), and taken
/// exactly once by the return handler. It is a best-effort notification
/// record; the payment itself lives in Webpay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSnapshot {
    /// Gateway token issued when the transaction was created.
    pub order_key: String,
    /// Merchant buy order sent to the gateway (`ORD-...`).
    pub buy_order: String,
    pub total: Amount,
    pub items: Vec<OrderLine>,
    pub customer: Customer,
    pub created_at: DateTime<Utc>,
}

impl OrderSnapshot {
    /// Build a snapshot from a validated cart and the gateway's token.
    #[must_use]
    pub fn new(
        order_key: impl Into<String>,
        buy_order: impl Into<String>,
        order: ValidatedOrder,
    ) -> Self {
        Self {
            order_key: order_key.into(),
            buy_order: buy_order.into(),
            total: order.total,
            items: order.lines,
            customer: order.customer,
            created_at: Utc::now(),
        }
    }

    /// Number of units across all lines.
    #[must_use]
    pub fn unit_count(&self) -> u64 {
        self.items.iter().map(|line| u64::from(line.quantity)).sum()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::Email;

    #[test]
    fn test_snapshot_keeps_cart() {
        let order = ValidatedOrder {
            customer: Customer {
                name: "Jane".to_string(),
                email: Email::parse("jane@example.com").unwrap(),
                rut: String::new(),
                phone: String::new(),
                address: String::new(),
                comuna: "Curanilahue".to_string(),
                notes: String::new(),
            },
            lines: vec![OrderLine {
                id: "A".to_string(),
                name: "Widget".to_string(),
                unit_price: Amount::from_pesos(100),
                quantity: 2,
                line_total: Amount::from_pesos(200),
            }],
            total: Amount::from_pesos(200),
        };

        let snapshot = OrderSnapshot::new("tok-1", "ORD-1", order);
        assert_eq!(snapshot.order_key, "tok-1");
        assert_eq!(snapshot.buy_order, "ORD-1");
        assert_eq!(snapshot.total, Amount::from_pesos(200));
        assert_eq!(snapshot.unit_count(), 2);
        assert_eq!(snapshot.customer.comuna, "Curanilahue");
    }
}
