//! Checkout route handler.
//!
//! Validates the cart, opens a Webpay transaction for the exact total and
//! parks an order snapshot under the gateway token until Webpay calls back.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::instrument;
use uuid::Uuid;
use webpay_checkout_core::{
    Amount, CartItemInput, Customer, CustomerInput, OrderLine, OrderSnapshot, validate_checkout,
};

use crate::error::{AppError, Result};
use crate::state::AppState;
use crate::webpay::CreateTransaction;

/// Checkout request body.
///
/// Both fields are read loosely so that a wrong shape becomes a validation
/// message rather than a deserialization error.
#[derive(Debug, Default, Deserialize)]
pub struct CheckoutRequest {
    #[serde(default)]
    pub items: Value,
    #[serde(default)]
    pub customer: Value,
}

/// Successful checkout response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    pub ok: bool,
    pub message: &'static str,
    pub webpay_url: String,
    pub buy_order: String,
    pub amount: Amount,
    pub items: Vec<OrderLine>,
    pub customer: Customer,
}

/// Validate the cart and start a Webpay payment.
#[instrument(skip(state, body))]
pub async fn checkout(
    State(state): State<AppState>,
    body: std::result::Result<Json<CheckoutRequest>, JsonRejection>,
) -> Result<Json<CheckoutResponse>> {
    let Json(request) =
        body.map_err(|e| AppError::BadRequest(format!("Invalid request body: {}", e.body_text())))?;

    let customer: Option<CustomerInput> = serde_json::from_value(request.customer).ok();
    let items = CartItemInput::list_from_json(request.items);
    let order = validate_checkout(customer.as_ref(), items.as_deref())?;

    let buy_order = new_buy_order();
    let transaction = CreateTransaction {
        buy_order: buy_order.clone(),
        session_id: new_session_id(),
        amount: order.total,
        return_url: state.webpay().return_url().to_string(),
    };

    tracing::info!(
        buy_order = %buy_order,
        amount = %order.total,
        lines = order.lines.len(),
        "Creating Webpay transaction"
    );

    let created = state.webpay().create_transaction(&transaction).await?;

    let snapshot = OrderSnapshot::new(created.token.clone(), buy_order.clone(), order);
    let response = CheckoutResponse {
        ok: true,
        message: "Cart validated and Webpay initialized.",
        webpay_url: created.redirect_url(),
        buy_order,
        amount: snapshot.total,
        items: snapshot.items.clone(),
        customer: snapshot.customer.clone(),
    };
    tracing::info!(
        buy_order = %snapshot.buy_order,
        units = snapshot.unit_count(),
        "Order awaiting Webpay confirmation"
    );
    state.pending().put(&created.token, snapshot).await;

    Ok(Json(response))
}

/// Merchant buy order, `ORD-<unix millis>`.
fn new_buy_order() -> String {
    format!("ORD-{}", Utc::now().timestamp_millis())
}

/// Webpay session id, `sess-<uuid>`.
fn new_session_id() -> String {
    format!("sess-{}", Uuid::new_v4())
}
