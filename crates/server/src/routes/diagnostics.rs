//! Email diagnostics route.

use axum::{Json, extract::State};
use serde_json::{Value, json};
use tracing::instrument;
use webpay_checkout_core::{Amount, Customer, Email, OrderLine, OrderSnapshot, ValidatedOrder};

use crate::error::{AppError, Result};
use crate::services::notifier::GatewayOutcome;
use crate::state::AppState;

/// Send a sample purchase email through the configured transport.
///
/// Runs synchronously so the caller sees the transport's answer. The sample
/// goes to `TEST_EMAIL_RECIPIENT` as the customer, plus the operator list.
#[instrument(skip(state))]
pub async fn test_email(State(state): State<AppState>) -> Result<Json<Value>> {
    let recipient = state
        .config()
        .email
        .test_recipient
        .as_deref()
        .ok_or_else(|| AppError::BadRequest("TEST_EMAIL_RECIPIENT is not configured.".to_string()))?;
    let email = Email::parse(recipient)
        .map_err(|e| AppError::BadRequest(format!("Invalid TEST_EMAIL_RECIPIENT: {e}")))?;

    state
        .notifier()
        .notify(&sample_order(email), &GatewayOutcome::authorized())
        .await?;

    Ok(Json(json!({ "ok": true, "message": "Test email sent" })))
}

fn sample_order(email: Email) -> OrderSnapshot {
    let line = OrderLine {
        id: "TEST-PRODUCT".to_string(),
        name: "Test product".to_string(),
        unit_price: Amount::from_pesos(5000),
        quantity: 2,
        line_total: Amount::from_pesos(10_000),
    };
    let order = ValidatedOrder {
        customer: Customer {
            name: "Test Customer".to_string(),
            email,
            rut: "11.111.111-1".to_string(),
            phone: "+56 9 1234 5678".to_string(),
            address: "Test address".to_string(),
            comuna: "Curanilahue".to_string(),
            notes: "Test only".to_string(),
        },
        total: line.line_total,
        lines: vec![line],
    };
    OrderSnapshot::new("test-email", "TEST-00001", order)
}
