//! Reconciliation of the Webpay return callback.
//!
//! When Webpay sends the shopper back, the token it carries is committed with
//! the gateway, which is the only source of truth for the payment status. An
//! authorized payment takes the matching pending order out of the store and
//! queues its confirmation email; anything else leaves the store untouched.
//!
//! The pending order is removed with a single atomic `take`, so a duplicate
//! callback for the same token finds nothing and cannot queue a second email.

use thiserror::Error;
use tracing::{error, info, instrument, warn};
use url::Url;
use webpay_checkout_core::{Amount, TransactionStatus};

use super::notifier::{GatewayOutcome, NotificationJob, NotificationQueue};
use crate::pending::PendingOrders;
use crate::webpay::{WebpayClient, WebpayError};

/// Frontend route for authorized payments.
pub const SUCCESS_PATH: &str = "pago-exitoso";

/// Frontend route for rejected, aborted or failed payments.
pub const FAILURE_PATH: &str = "pago-fallido";

/// Status reported to the frontend when the shopper cancelled on Webpay.
pub const ABORTED_STATUS: &str = "ABORTED";

/// Errors that stop a callback from being reconciled.
#[derive(Debug, Error)]
pub enum ReturnError {
    /// The callback carried no `token_ws`.
    #[error("Missing token_ws in the Webpay response")]
    MissingToken,

    /// Webpay could not confirm the transaction.
    #[error("Could not confirm the Webpay transaction: {0}")]
    Confirmation(#[from] WebpayError),
}

/// What happened to the confirmation email of an authorized payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationDispatch {
    /// Handed to the notification worker.
    Queued,
    /// No pending order for the token; nothing to send.
    Skipped,
    /// The order was taken but the queue refused the job.
    Failed,
}

/// Result of a reconciled callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReturnOutcome {
    /// The gateway authorized the payment.
    Authorized {
        buy_order: String,
        amount: Amount,
        dispatch: NotificationDispatch,
    },
    /// The gateway reported any other status.
    Rejected {
        buy_order: String,
        status: TransactionStatus,
    },
    /// The shopper cancelled on the Webpay form; no token was issued back.
    Aborted { buy_order: Option<String> },
}

impl ReturnOutcome {
    /// Frontend page the browser is redirected to.
    #[must_use]
    pub fn redirect_url(&self, frontend_url: &Url) -> Url {
        let mut url = frontend_url.clone();
        let page = match self {
            Self::Authorized { .. } => SUCCESS_PATH,
            Self::Rejected { .. } | Self::Aborted { .. } => FAILURE_PATH,
        };
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().push(page);
        }

        {
            let mut query = url.query_pairs_mut();
            query.clear();
            match self {
                Self::Authorized {
                    buy_order, amount, ..
                } => {
                    query
                        .append_pair("order", buy_order)
                        .append_pair("amount", &amount.to_plain_string());
                }
                Self::Rejected { buy_order, status } => {
                    query
                        .append_pair("order", buy_order)
                        .append_pair("status", status.as_str());
                }
                Self::Aborted { buy_order } => {
                    if let Some(buy_order) = buy_order {
                        query.append_pair("order", buy_order);
                    }
                    query.append_pair("status", ABORTED_STATUS);
                }
            }
        }

        url
    }
}

/// Confirms callbacks with Webpay and dispatches purchase emails.
#[derive(Clone)]
pub struct Reconciler {
    webpay: WebpayClient,
    pending: PendingOrders,
    queue: NotificationQueue,
}

impl Reconciler {
    #[must_use]
    pub const fn new(
        webpay: WebpayClient,
        pending: PendingOrders,
        queue: NotificationQueue,
    ) -> Self {
        Self {
            webpay,
            pending,
            queue,
        }
    }

    /// Reconcile a callback carrying `token`.
    ///
    /// The transaction is confirmed exactly once. Only an authorized payment
    /// touches the pending-order store.
    ///
    /// # Errors
    ///
    /// Returns [`ReturnError::MissingToken`] for a blank token (no gateway
    /// call), or [`ReturnError::Confirmation`] if Webpay cannot confirm.
    #[instrument(skip(self))]
    pub async fn reconcile(&self, token: &str) -> Result<ReturnOutcome, ReturnError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(ReturnError::MissingToken);
        }

        let commit = self.webpay.confirm_transaction(token).await?;

        if !commit.status.is_authorized() {
            info!(
                buy_order = %commit.buy_order,
                status = %commit.status,
                "Payment not authorized"
            );
            return Ok(ReturnOutcome::Rejected {
                buy_order: commit.buy_order,
                status: commit.status,
            });
        }

        let dispatch = match self.pending.take(token).await {
            Some(order) => {
                if order.buy_order != commit.buy_order {
                    warn!(
                        stored = %order.buy_order,
                        confirmed = %commit.buy_order,
                        "Buy order mismatch between pending order and Webpay"
                    );
                }

                let job = NotificationJob {
                    order,
                    outcome: GatewayOutcome::from(&commit),
                };
                match self.queue.enqueue(job) {
                    Ok(()) => {
                        info!(buy_order = %commit.buy_order, "Purchase notification queued");
                        NotificationDispatch::Queued
                    }
                    Err(e) => {
                        error!(
                            buy_order = %commit.buy_order,
                            error = %e,
                            "Purchase notification dropped"
                        );
                        NotificationDispatch::Failed
                    }
                }
            }
            None => {
                warn!(
                    buy_order = %commit.buy_order,
                    "No pending order for authorized payment, skipping notification"
                );
                NotificationDispatch::Skipped
            }
        };

        Ok(ReturnOutcome::Authorized {
            buy_order: commit.buy_order,
            amount: commit.amount,
            dispatch,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use secrecy::SecretString;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::config::{PendingOrderConfig, WebpayConfig};
    use crate::services::notifier::tests::order;

    struct Harness {
        server: MockServer,
        pending: PendingOrders,
        jobs: tokio::sync::mpsc::Receiver<NotificationJob>,
        reconciler: Reconciler,
    }

    async fn harness(queue_capacity: usize) -> Harness {
        let server = MockServer::start().await;
        let webpay = WebpayClient::new(&WebpayConfig {
            base_url: Url::parse(&server.uri()).unwrap(),
            commerce_code: "597055555532".to_string(),
            api_key: SecretString::from("secret"),
            return_url: Url::parse("http://localhost:4000/api/webpay/retorno").unwrap(),
            timeout: Duration::from_secs(5),
        })
        .unwrap();
        let pending = PendingOrders::new(&PendingOrderConfig::default());
        let (queue, jobs) = NotificationQueue::bounded(queue_capacity);
        let reconciler = Reconciler::new(webpay, pending.clone(), queue);

        Harness {
            server,
            pending,
            jobs,
            reconciler,
        }
    }

    async fn gateway_answers(server: &MockServer, status: &str) {
        Mock::given(method("PUT"))
            .and(path("/transactions/tok-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "buy_order": "ORD-1",
                "status": status,
                "amount": 200
            })))
            .expect(1)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn authorized_with_pending_order_queues_once() {
        let mut h = harness(4).await;
        gateway_answers(&h.server, "AUTHORIZED").await;
        h.pending.put("tok-1", order()).await;

        let outcome = h.reconciler.reconcile("tok-1").await.unwrap();

        assert_eq!(
            outcome,
            ReturnOutcome::Authorized {
                buy_order: "ORD-1".to_string(),
                amount: Amount::from_pesos(200),
                dispatch: NotificationDispatch::Queued,
            }
        );
        assert!(h.pending.get("tok-1").await.is_none());

        let job = h.jobs.try_recv().unwrap();
        assert_eq!(job.order.buy_order, "ORD-1");
        assert!(job.outcome.status.is_authorized());
        assert!(h.jobs.try_recv().is_err());
    }

    #[tokio::test]
    async fn authorized_without_pending_order_skips() {
        let mut h = harness(4).await;
        gateway_answers(&h.server, "AUTHORIZED").await;

        let outcome = h.reconciler.reconcile("tok-1").await.unwrap();

        assert!(matches!(
            outcome,
            ReturnOutcome::Authorized {
                dispatch: NotificationDispatch::Skipped,
                ..
            }
        ));
        assert!(h.jobs.try_recv().is_err());
    }

    #[tokio::test]
    async fn rejected_payment_leaves_store_untouched() {
        let mut h = harness(4).await;
        gateway_answers(&h.server, "FAILED").await;
        h.pending.put("tok-1", order()).await;

        let outcome = h.reconciler.reconcile("tok-1").await.unwrap();

        assert_eq!(
            outcome,
            ReturnOutcome::Rejected {
                buy_order: "ORD-1".to_string(),
                status: TransactionStatus::Failed,
            }
        );
        assert!(h.pending.get("tok-1").await.is_some());
        assert!(h.jobs.try_recv().is_err());
    }

    #[tokio::test]
    async fn full_queue_still_removes_order() {
        let h = harness(1).await;
        gateway_answers(&h.server, "AUTHORIZED").await;
        h.pending.put("tok-1", order()).await;
        h.reconciler
            .queue
            .enqueue(NotificationJob {
                order: order(),
                outcome: GatewayOutcome::authorized(),
            })
            .unwrap();

        let outcome = h.reconciler.reconcile("tok-1").await.unwrap();

        assert!(matches!(
            outcome,
            ReturnOutcome::Authorized {
                dispatch: NotificationDispatch::Failed,
                ..
            }
        ));
        assert!(h.pending.get("tok-1").await.is_none());
    }

    #[tokio::test]
    async fn blank_token_never_reaches_gateway() {
        let h = harness(4).await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&h.server)
            .await;

        let err = h.reconciler.reconcile("   ").await.unwrap_err();
        assert!(matches!(err, ReturnError::MissingToken));
    }

    #[tokio::test]
    async fn gateway_error_is_reported() {
        let h = harness(4).await;
        Mock::given(method("PUT"))
            .and(path("/transactions/tok-1"))
            .respond_with(
                ResponseTemplate::new(422)
                    .set_body_json(serde_json::json!({"error_message": "Invalid token"})),
            )
            .mount(&h.server)
            .await;
        h.pending.put("tok-1", order()).await;

        let err = h.reconciler.reconcile("tok-1").await.unwrap_err();

        assert!(matches!(
            err,
            ReturnError::Confirmation(WebpayError::Api { status: 422, .. })
        ));
        assert!(h.pending.get("tok-1").await.is_some());
    }

    #[test]
    fn redirect_urls() {
        let frontend = Url::parse("https://www.solucenter.cl").unwrap();

        let authorized = ReturnOutcome::Authorized {
            buy_order: "ORD-1".to_string(),
            amount: Amount::from_pesos(200),
            dispatch: NotificationDispatch::Queued,
        };
        assert_eq!(
            authorized.redirect_url(&frontend).as_str(),
            "https://www.solucenter.cl/pago-exitoso?order=ORD-1&amount=200"
        );

        let rejected = ReturnOutcome::Rejected {
            buy_order: "ORD-1".to_string(),
            status: TransactionStatus::Failed,
        };
        assert_eq!(
            rejected.redirect_url(&frontend).as_str(),
            "https://www.solucenter.cl/pago-fallido?order=ORD-1&status=FAILED"
        );

        let aborted = ReturnOutcome::Aborted { buy_order: None };
        assert_eq!(
            aborted.redirect_url(&frontend).as_str(),
            "https://www.solucenter.cl/pago-fallido?status=ABORTED"
        );
    }

    #[test]
    fn redirect_keeps_frontend_base_path_and_encodes_values() {
        let frontend = Url::parse("https://example.cl/tienda/").unwrap();
        let rejected = ReturnOutcome::Rejected {
            buy_order: "ORD 1&x".to_string(),
            status: TransactionStatus::Other("WEIRD STATUS".to_string()),
        };

        assert_eq!(
            rejected.redirect_url(&frontend).as_str(),
            "https://example.cl/tienda/pago-fallido?order=ORD+1%26x&status=WEIRD+STATUS"
        );
    }
}
