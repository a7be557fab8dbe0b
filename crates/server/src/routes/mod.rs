//! HTTP route handlers for the checkout server.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                        - Liveness page
//! GET  /health                  - Health check
//! GET  /health/ready            - Readiness with pending-order count
//!
//! # API
//! POST /api/cart/checkout       - Validate cart, open Webpay transaction
//! GET  /api/webpay/retorno      - Webpay return callback
//! POST /api/webpay/retorno      - Webpay return callback (form post)
//! GET  /api/test-email          - Send a sample purchase email
//! ```

pub mod cart;
pub mod diagnostics;
pub mod home;
pub mod webpay;

use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

/// Create the JSON API and callback routes.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/cart/checkout", post(cart::checkout))
        .route(
            "/webpay/retorno",
            get(webpay::webpay_return).post(webpay::webpay_return),
        )
        .route("/test-email", get(diagnostics::test_email))
}

/// Create all routes for the checkout server.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(home::home))
        .route("/health", get(home::health))
        .route("/health/ready", get(home::ready))
        .nest("/api", api_routes())
}
