//! Checkout services: purchase notifications and callback reconciliation.

pub mod notifier;
pub mod reconcile;

pub use notifier::{GatewayOutcome, NotificationError, NotificationQueue, Notifier};
pub use reconcile::{NotificationDispatch, Reconciler, ReturnError, ReturnOutcome};
