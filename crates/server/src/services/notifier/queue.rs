//! Background delivery of purchase emails.
//!
//! The return handler enqueues and moves on; a single worker task drains the
//! bounded channel and calls [`Notifier::notify`] once per job. There are no
//! retries: a job that fails is logged and dropped, so an order is never
//! emailed twice.

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info};
use webpay_checkout_core::OrderSnapshot;

use super::{GatewayOutcome, Notifier};

/// A paid order waiting for its confirmation email.
#[derive(Debug, Clone)]
pub struct NotificationJob {
    pub order: OrderSnapshot,
    pub outcome: GatewayOutcome,
}

/// Errors when handing a job to the worker.
#[derive(Debug, Error)]
pub enum QueueError {
    /// The queue is at capacity.
    #[error("Notification queue is full")]
    Full,

    /// The worker has stopped.
    #[error("Notification worker is not running")]
    Closed,
}

/// Sending half of the notification channel.
#[derive(Clone)]
pub struct NotificationQueue {
    sender: mpsc::Sender<NotificationJob>,
}

impl NotificationQueue {
    /// Spawn the worker and return the queue feeding it.
    ///
    /// The worker exits once every clone of the queue has been dropped and
    /// the remaining jobs are drained.
    #[must_use]
    pub fn start(notifier: Notifier, capacity: usize) -> (Self, JoinHandle<()>) {
        let (queue, receiver) = Self::bounded(capacity);
        let worker = tokio::spawn(run_worker(notifier, receiver));
        (queue, worker)
    }

    /// Create a queue and hand back the receiving half instead of spawning a
    /// worker for it.
    #[must_use]
    pub fn bounded(capacity: usize) -> (Self, mpsc::Receiver<NotificationJob>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }

    /// Hand a job to the worker without waiting.
    ///
    /// # Errors
    ///
    /// Returns error if the queue is full or the worker has stopped.
    pub fn enqueue(&self, job: NotificationJob) -> Result<(), QueueError> {
        self.sender.try_send(job).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => QueueError::Full,
            mpsc::error::TrySendError::Closed(_) => QueueError::Closed,
        })
    }
}

async fn run_worker(notifier: Notifier, mut receiver: mpsc::Receiver<NotificationJob>) {
    info!("Notification worker started");

    while let Some(job) = receiver.recv().await {
        match notifier.notify(&job.order, &job.outcome).await {
            Ok(()) => info!(buy_order = %job.order.buy_order, "Purchase notification delivered"),
            Err(e) => error!(
                buy_order = %job.order.buy_order,
                error = %e,
                "Purchase notification failed"
            ),
        }
    }

    info!("Notification worker stopped");
}
