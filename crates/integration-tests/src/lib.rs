//! End-to-end test harness for the checkout backend.
//!
//! [`TestContext`] starts two mock servers, one standing in for the Webpay
//! REST API and one for the Resend email API, builds the real application
//! state against them and drives the router in-process with
//! `tower::ServiceExt::oneshot`.
//!
//! ```rust,ignore
//! let ctx = TestContext::new().await;
//! ctx.mock_create_transaction("tok-1").await;
//! let (status, body) = ctx.post_json("/api/cart/checkout", widget_checkout()).await;
//! ```

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::collections::HashMap;
use std::time::Duration;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
    response::Response,
};
use serde_json::{Value, json};
use tower::ServiceExt;
use webpay_checkout_server::{config::CheckoutConfig, state::AppState};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Frontend base used for the payment result redirects.
pub const FRONTEND_URL: &str = "https://shop.example.cl";

/// Operator address copied on every purchase email.
pub const OPERATOR_EMAIL: &str = "ventas@example.cl";

/// A running application wired to mock Webpay and Resend servers.
pub struct TestContext {
    pub webpay: MockServer,
    pub resend: MockServer,
    pub state: AppState,
    app: Router,
}

impl TestContext {
    /// Build a context with the default test configuration.
    pub async fn new() -> Self {
        Self::with_vars(&[]).await
    }

    /// Build a context, overriding or adding environment variables.
    pub async fn with_vars(overrides: &[(&str, &str)]) -> Self {
        let webpay = MockServer::start().await;
        let resend = MockServer::start().await;

        let mut vars: HashMap<String, String> = [
            ("WEBPAY_BASE_URL", webpay.uri()),
            ("WEBPAY_COMMERCE_CODE", "597055555532".to_string()),
            ("WEBPAY_API_KEY", "579B532A7440BB0C9079DED94D31EA16".to_string()),
            (
                "WEBPAY_RETURN_URL",
                "http://localhost:4000/api/webpay/retorno".to_string(),
            ),
            ("FRONTEND_URL", FRONTEND_URL.to_string()),
            ("RESEND_API_KEY", "re_test_key".to_string()),
            ("RESEND_API_URL", resend.uri()),
            ("PURCHASE_INTERNAL_EMAILS", OPERATOR_EMAIL.to_string()),
            ("TEST_EMAIL_RECIPIENT", "qa@example.cl".to_string()),
            ("NOTIFY_TIMEOUT_SECS", "5".to_string()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
        for (key, value) in overrides {
            vars.insert((*key).to_string(), (*value).to_string());
        }

        let config = CheckoutConfig::from_lookup(|key| vars.get(key).cloned()).unwrap();
        let state = AppState::new(config).unwrap();
        let app = webpay_checkout_server::app(state.clone());

        Mock::given(method("POST"))
            .and(path("/emails"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "email_1"})))
            .mount(&resend)
            .await;

        Self {
            webpay,
            resend,
            state,
            app,
        }
    }

    // =========================================================================
    // Gateway mocks
    // =========================================================================

    /// Answer `POST /transactions` with `token`.
    pub async fn mock_create_transaction(&self, token: &str) {
        Mock::given(method("POST"))
            .and(path("/transactions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "token": token,
                "url": "https://webpay3gint.transbank.cl/webpayserver/initTransaction"
            })))
            .mount(&self.webpay)
            .await;
    }

    /// Answer `PUT /transactions/{token}` with the given status.
    pub async fn mock_commit(&self, token: &str, status: &str, buy_order: &str, amount: u64) {
        Mock::given(method("PUT"))
            .and(path(format!("/transactions/{token}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "vci": "TSY",
                "amount": amount,
                "status": status,
                "buy_order": buy_order,
                "session_id": "sess-test",
                "card_detail": {"card_number": "6623"},
                "authorization_code": "1213",
                "payment_type_code": "VN",
                "response_code": 0,
                "installments_number": 0
            })))
            .mount(&self.webpay)
            .await;
    }

    /// Number of requests Webpay received with the given method.
    pub async fn gateway_calls(&self, http_method: &str) -> usize {
        self.webpay
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.method.as_str() == http_method)
            .count()
    }

    // =========================================================================
    // Email observation
    // =========================================================================

    /// Bodies of every email sent so far.
    pub async fn sent_emails(&self) -> Vec<Value> {
        self.resend
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.url.path() == "/emails")
            .map(|r| serde_json::from_slice(&r.body).unwrap())
            .collect()
    }

    /// Wait until at least `count` emails were sent, or give up after a few
    /// seconds, and return what was sent.
    pub async fn wait_for_emails(&self, count: usize) -> Vec<Value> {
        for _ in 0..100 {
            let sent = self.sent_emails().await;
            if sent.len() >= count {
                return sent;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        self.sent_emails().await
    }

    /// Give the notification worker time to act, then return what was sent.
    pub async fn settle_emails(&self) -> Vec<Value> {
        tokio::time::sleep(Duration::from_millis(300)).await;
        self.sent_emails().await
    }

    // =========================================================================
    // Requests
    // =========================================================================

    /// Send a request through the router.
    pub async fn request(&self, request: Request<Body>) -> Response {
        self.app.clone().oneshot(request).await.unwrap()
    }

    /// `GET` a path.
    pub async fn get(&self, uri: &str) -> Response {
        self.request(Request::get(uri).body(Body::empty()).unwrap())
            .await
    }

    /// `POST` a raw JSON body and decode the JSON reply.
    pub async fn post_raw_json(&self, uri: &str, body: &str) -> (StatusCode, Value) {
        let response = self
            .request(
                Request::post(uri)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await;
        let status = response.status();
        (status, body_json(response).await)
    }

    /// `POST` a JSON value and decode the JSON reply.
    pub async fn post_json(&self, uri: &str, body: &Value) -> (StatusCode, Value) {
        self.post_raw_json(uri, &body.to_string()).await
    }

    /// `POST` a form-encoded body, as Webpay does on return.
    pub async fn post_form(&self, uri: &str, body: &str) -> Response {
        self.request(
            Request::post(uri)
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }
}

/// A valid checkout body for one item.
#[must_use]
pub fn checkout_body(name: &str, price: Value, quantity: Value) -> Value {
    json!({
        "items": [{"id": "A", "name": name, "price": price, "quantity": quantity}],
        "customer": {
            "name": "Jane",
            "email": "jane@example.com",
            "comuna": "Curanilahue"
        }
    })
}

/// Read a response body as JSON.
pub async fn body_json(response: Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// Read a response body as text.
pub async fn body_text(response: Response) -> String {
    String::from_utf8(body_bytes(response).await).unwrap()
}

async fn body_bytes(response: Response) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

/// The `Location` header of a redirect.
#[must_use]
pub fn location(response: &Response) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string()
}
