//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::CheckoutConfig;
use crate::pending::PendingOrders;
use crate::services::notifier::{NotificationError, NotificationQueue, Notifier};
use crate::services::reconcile::Reconciler;
use crate::webpay::{WebpayClient, WebpayError};

/// Error building the application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("webpay client: {0}")]
    Webpay(#[from] WebpayError),
    #[error("email transport: {0}")]
    Notification(#[from] NotificationError),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: CheckoutConfig,
    webpay: WebpayClient,
    pending: PendingOrders,
    notifier: Notifier,
    queue: NotificationQueue,
    reconciler: Reconciler,
}

impl AppState {
    /// Create a new application state.
    ///
    /// Spawns the notification worker, so this must run inside a Tokio
    /// runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the Webpay client or the email transport cannot
    /// be built from the configuration.
    pub fn new(config: CheckoutConfig) -> Result<Self, StateError> {
        let webpay = WebpayClient::new(&config.webpay)?;
        let pending = PendingOrders::new(&config.pending);
        let notifier = Notifier::new(&config.email, &config.store_name)?;
        let (queue, _worker) = NotificationQueue::start(notifier.clone(), config.email.queue_capacity);
        let reconciler = Reconciler::new(webpay.clone(), pending.clone(), queue.clone());

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                webpay,
                pending,
                notifier,
                queue,
                reconciler,
            }),
        })
    }

    /// Get a reference to the checkout configuration.
    #[must_use]
    pub fn config(&self) -> &CheckoutConfig {
        &self.inner.config
    }

    /// Get a reference to the Webpay client.
    #[must_use]
    pub fn webpay(&self) -> &WebpayClient {
        &self.inner.webpay
    }

    /// Get a reference to the pending-order store.
    #[must_use]
    pub fn pending(&self) -> &PendingOrders {
        &self.inner.pending
    }

    /// Get a reference to the purchase email sender.
    #[must_use]
    pub fn notifier(&self) -> &Notifier {
        &self.inner.notifier
    }

    /// Get a reference to the notification queue.
    #[must_use]
    pub fn queue(&self) -> &NotificationQueue {
        &self.inner.queue
    }

    /// Get a reference to the return-callback reconciler.
    #[must_use]
    pub fn reconciler(&self) -> &Reconciler {
        &self.inner.reconciler
    }
}
