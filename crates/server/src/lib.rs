//! Webpay checkout server library.
//!
//! Validates carts, opens Webpay Plus transactions, reconciles the return
//! callback with the gateway and emails the purchase confirmation. The
//! binary in `main.rs` wires this library to a listener; tests drive
//! [`app`] directly.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod error;
pub mod middleware;
pub mod pending;
pub mod routes;
pub mod services;
pub mod state;
pub mod webpay;

use axum::{Router, extract::Request};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use state::AppState;

/// Build the full application router with its middleware stack.
pub fn app(state: AppState) -> Router {
    routes::routes()
        .layer(axum::middleware::from_fn(middleware::request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = tracing::field::Empty,
                )
            }),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}
