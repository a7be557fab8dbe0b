//! Webpay Plus REST API client.
//!
//! Two calls make up a payment:
//!
//! - `POST {base}/transactions` opens a transaction and returns the token and
//!   the gateway URL the shopper is redirected to
//! - `PUT {base}/transactions/{token}` commits it once Webpay sends the
//!   shopper back, returning the authoritative status
//!
//! Every request carries the commerce credentials as `Tbk-Api-Key-Id` and
//! `Tbk-Api-Key-Secret`.

mod types;

pub use types::*;

use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::instrument;
use url::Url;

use crate::config::WebpayConfig;

/// Errors that can occur when talking to Webpay.
#[derive(Debug, Error)]
pub enum WebpayError {
    /// Network failure or timeout.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Webpay answered with a non-2xx status. `payload` is the response body,
    /// as JSON when it parses, otherwise as a JSON string.
    #[error("Webpay API error: {status} - {payload}")]
    Api { status: u16, payload: Value },

    /// A 2xx body that does not match the expected shape.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Client could not be built from configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl WebpayError {
    /// What the gateway said, suitable for the `error` field of a JSON reply.
    #[must_use]
    pub fn payload(&self) -> Value {
        match self {
            Self::Api { payload, .. } => payload.clone(),
            other => Value::String(other.to_string()),
        }
    }
}

/// Webpay Plus API client.
#[derive(Clone)]
pub struct WebpayClient {
    client: reqwest::Client,
    base_url: Url,
    return_url: Url,
}

impl WebpayClient {
    /// Create a new Webpay client.
    ///
    /// # Errors
    ///
    /// Returns error if the credentials are not valid header values, the base
    /// URL cannot carry a path, or the HTTP client fails to build.
    pub fn new(config: &WebpayConfig) -> Result<Self, WebpayError> {
        if config.base_url.cannot_be_a_base() {
            return Err(WebpayError::Config(format!(
                "base URL cannot carry a path: {}",
                config.base_url
            )));
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            "Tbk-Api-Key-Id",
            HeaderValue::from_str(&config.commerce_code)
                .map_err(|e| WebpayError::Config(format!("Invalid commerce code: {e}")))?,
        );
        let mut secret = HeaderValue::from_str(config.api_key.expose_secret())
            .map_err(|e| WebpayError::Config(format!("Invalid API key format: {e}")))?;
        secret.set_sensitive(true);
        headers.insert("Tbk-Api-Key-Secret", secret);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            return_url: config.return_url.clone(),
        })
    }

    /// The callback URL registered with every new transaction.
    #[must_use]
    pub const fn return_url(&self) -> &Url {
        &self.return_url
    }

    /// Open a new transaction.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or Webpay rejects it.
    #[instrument(skip(self, request), fields(buy_order = %request.buy_order, amount = %request.amount))]
    pub async fn create_transaction(
        &self,
        request: &CreateTransaction,
    ) -> Result<TransactionCreated, WebpayError> {
        let url = self.endpoint(&["transactions"]);

        let response = self.client.post(url).json(request).send().await?;
        let created: TransactionCreated = read_response(response).await?;

        tracing::info!(token = %created.token, "Webpay transaction created");
        Ok(created)
    }

    /// Commit a transaction after the shopper returns from Webpay.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or Webpay rejects it.
    #[instrument(skip(self))]
    pub async fn confirm_transaction(&self, token: &str) -> Result<TransactionCommit, WebpayError> {
        let url = self.endpoint(&["transactions", token]);

        let response = self
            .client
            .put(url)
            .json(&serde_json::json!({}))
            .send()
            .await?;
        let commit: TransactionCommit = read_response(response).await?;

        tracing::info!(
            buy_order = %commit.buy_order,
            status = %commit.status,
            amount = %commit.amount,
            session_id = commit.session_id.as_deref().unwrap_or_default(),
            response_code = ?commit.response_code,
            transaction_date = commit.transaction_date.as_deref().unwrap_or_default(),
            payment_type_code = commit.payment_type_code.as_deref().unwrap_or_default(),
            installments_number = ?commit.installments_number,
            "Webpay transaction confirmed"
        );
        Ok(commit)
    }

    /// Append path segments to the base URL, percent-encoding each one.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}

async fn read_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, WebpayError> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        let payload = serde_json::from_str(&body).unwrap_or(Value::String(body));
        tracing::error!(status = status.as_u16(), %payload, "Webpay rejected request");
        return Err(WebpayError::Api {
            status: status.as_u16(),
            payload,
        });
    }

    serde_json::from_str(&body).map_err(|e| WebpayError::Parse(e.to_string()))
}
