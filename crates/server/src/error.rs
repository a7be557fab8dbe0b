//! Unified error handling with Sentry integration.
//!
//! JSON routes return `Result<T, AppError>`. Every error renders as
//! `{"ok": false, "message": ...}`, with an extra `error` field carrying
//! upstream detail for gateway and email failures. Server-side errors are
//! captured to Sentry before responding.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};
use thiserror::Error;
use webpay_checkout_core::CartError;

use crate::services::notifier::NotificationError;
use crate::webpay::WebpayError;

/// Application-level error type for the JSON routes.
#[derive(Debug, Error)]
pub enum AppError {
    /// Cart or customer data failed validation.
    #[error("{0}")]
    Validation(#[from] CartError),

    /// Webpay rejected or could not be reached while creating a transaction.
    #[error("Webpay error: {0}")]
    Gateway(#[from] WebpayError),

    /// A synchronous email send failed.
    #[error("Email error: {0}")]
    Notification(#[from] NotificationError),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl AppError {
    const fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Gateway(_) | Self::Notification(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let body: Value = match &self {
            Self::Validation(err) => json!({ "ok": false, "message": err.to_string() }),
            Self::BadRequest(message) => json!({ "ok": false, "message": message }),
            Self::Gateway(err) => json!({
                "ok": false,
                "message": "Error creating the Webpay transaction.",
                "error": err.payload(),
            }),
            Self::Notification(err) => json!({
                "ok": false,
                "message": "Could not send the test email.",
                "error": err.to_string(),
            }),
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;
