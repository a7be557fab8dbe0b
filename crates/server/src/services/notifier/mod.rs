//! Purchase confirmation emails.
//!
//! [`Notifier`] renders one confirmation message per paid order and sends it
//! to the customer plus the shop's operator list in a single delivery. The
//! transport is chosen at startup: the Resend HTTP API when an API key is
//! configured, an SMTP relay otherwise, or nothing at all (every send then
//! fails with [`NotificationError::NotConfigured`]).
//!
//! Request handlers never call [`Notifier::notify`] directly on the payment
//! path; they hand jobs to the [`NotificationQueue`], whose worker owns the
//! delivery. Failures are logged and never reach the shopper.

mod queue;
mod resend;
mod smtp;

pub use queue::{NotificationJob, NotificationQueue, QueueError};

use std::sync::Arc;
use std::time::Duration;

use askama::Template;
use thiserror::Error;
use tracing::instrument;
use webpay_checkout_core::{OrderSnapshot, TransactionStatus};

use crate::config::{EmailConfig, MailTransportConfig};
use crate::webpay::TransactionCommit;

use resend::ResendMailer;
use smtp::SmtpMailer;

/// Errors that can occur when sending a purchase email.
#[derive(Debug, Error)]
pub enum NotificationError {
    /// Network or SMTP failure.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The email API rejected the message.
    #[error("Email API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Delivery did not finish in time.
    #[error("Email delivery timed out after {0:?}")]
    Timeout(Duration),

    /// Sender or recipient address not accepted by the transport.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Template rendering error.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),

    /// No email transport configured.
    #[error("No email transport configured")]
    NotConfigured,
}

impl From<reqwest::Error> for NotificationError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

impl From<lettre::transport::smtp::Error> for NotificationError {
    fn from(err: lettre::transport::smtp::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

impl From<lettre::error::Error> for NotificationError {
    fn from(err: lettre::error::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

/// The parts of the gateway's answer shown in the confirmation email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayOutcome {
    pub status: TransactionStatus,
    pub authorization_code: Option<String>,
    pub card_number: Option<String>,
}

impl GatewayOutcome {
    /// An authorized outcome without card details.
    #[must_use]
    pub const fn authorized() -> Self {
        Self {
            status: TransactionStatus::Authorized,
            authorization_code: None,
            card_number: None,
        }
    }
}

impl From<&TransactionCommit> for GatewayOutcome {
    fn from(commit: &TransactionCommit) -> Self {
        Self {
            status: commit.status.clone(),
            authorization_code: commit.authorization_code.clone(),
            card_number: commit.card_number().map(str::to_string),
        }
    }
}

/// A rendered message ready for a transport.
#[derive(Debug, Clone)]
pub struct OutgoingEmail {
    pub to: Vec<String>,
    pub subject: String,
    pub html: String,
    pub text: String,
}

#[derive(Template)]
#[template(path = "email/order_confirmation.html")]
struct OrderConfirmationHtml<'a> {
    store_name: &'a str,
    order: &'a OrderSnapshot,
    status: &'a str,
    authorization_code: &'a str,
    card_number: &'a str,
}

#[derive(Template)]
#[template(path = "email/order_confirmation.txt")]
struct OrderConfirmationText<'a> {
    store_name: &'a str,
    order: &'a OrderSnapshot,
    status: &'a str,
    authorization_code: &'a str,
    card_number: &'a str,
}

#[derive(Clone)]
enum Mailer {
    Resend(ResendMailer),
    Smtp(SmtpMailer),
    Disabled,
}

impl Mailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), NotificationError> {
        match self {
            Self::Resend(mailer) => mailer.send(email).await,
            Self::Smtp(mailer) => mailer.send(email).await,
            Self::Disabled => Err(NotificationError::NotConfigured),
        }
    }

    const fn name(&self) -> &'static str {
        match self {
            Self::Resend(_) => "resend",
            Self::Smtp(_) => "smtp",
            Self::Disabled => "disabled",
        }
    }
}

/// Purchase confirmation sender.
///
/// Cheap to clone; the worker and the diagnostics route share one instance.
#[derive(Clone)]
pub struct Notifier {
    inner: Arc<NotifierInner>,
}

struct NotifierInner {
    mailer: Mailer,
    store_name: String,
    internal_recipients: Vec<String>,
    send_timeout: Duration,
}

impl Notifier {
    /// Create a notifier from configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the configured transport cannot be built.
    pub fn new(config: &EmailConfig, store_name: &str) -> Result<Self, NotificationError> {
        let mailer = match &config.transport {
            MailTransportConfig::Resend(resend) => Mailer::Resend(ResendMailer::new(resend)?),
            MailTransportConfig::Smtp(smtp) => Mailer::Smtp(SmtpMailer::new(smtp)?),
            MailTransportConfig::Disabled => {
                tracing::warn!("No email transport configured, purchase emails are disabled");
                Mailer::Disabled
            }
        };

        Ok(Self {
            inner: Arc::new(NotifierInner {
                mailer,
                store_name: store_name.to_string(),
                internal_recipients: config.internal_recipients.clone(),
                send_timeout: config.send_timeout,
            }),
        })
    }

    /// Name of the active transport, for diagnostics.
    #[must_use]
    pub fn transport_name(&self) -> &'static str {
        self.inner.mailer.name()
    }

    /// Render the confirmation message for an order.
    ///
    /// # Errors
    ///
    /// Returns error if a template fails to render.
    pub fn compose(
        &self,
        order: &OrderSnapshot,
        outcome: &GatewayOutcome,
    ) -> Result<OutgoingEmail, NotificationError> {
        let store_name = self.inner.store_name.as_str();
        let status = outcome.status.as_str();
        let authorization_code = outcome.authorization_code.as_deref().unwrap_or_default();
        let card_number = outcome.card_number.as_deref().unwrap_or_default();

        let html = OrderConfirmationHtml {
            store_name,
            order,
            status,
            authorization_code,
            card_number,
        }
        .render()?;
        let text = OrderConfirmationText {
            store_name,
            order,
            status,
            authorization_code,
            card_number,
        }
        .render()?;

        Ok(OutgoingEmail {
            to: self.recipients(order),
            subject: format!("Purchase at {store_name} - Order {}", order.buy_order),
            html,
            text,
        })
    }

    /// Send the confirmation for an order, bounded by the send timeout.
    ///
    /// # Errors
    ///
    /// Returns error if rendering or delivery fails, or delivery times out.
    #[instrument(skip(self, order, outcome), fields(buy_order = %order.buy_order, transport = self.transport_name()))]
    pub async fn notify(
        &self,
        order: &OrderSnapshot,
        outcome: &GatewayOutcome,
    ) -> Result<(), NotificationError> {
        let email = self.compose(order, outcome)?;
        let timeout = self.inner.send_timeout;

        tokio::time::timeout(timeout, self.inner.mailer.send(&email))
            .await
            .map_err(|_| NotificationError::Timeout(timeout))??;

        tracing::info!(recipients = email.to.len(), "Purchase email sent");
        Ok(())
    }

    /// Customer first, then operators; duplicates dropped case-insensitively.
    fn recipients(&self, order: &OrderSnapshot) -> Vec<String> {
        let mut to = vec![order.customer.email.as_str().to_string()];
        for address in &self.inner.internal_recipients {
            if !to.iter().any(|existing| existing.eq_ignore_ascii_case(address)) {
                to.push(address.clone());
            }
        }
        to
    }
}
