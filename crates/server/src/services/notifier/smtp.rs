//! SMTP relay transport.

use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, MultiPart, SinglePart, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use secrecy::ExposeSecret;

use super::{NotificationError, OutgoingEmail};
use crate::config::SmtpConfig;

#[derive(Clone)]
pub(super) struct SmtpMailer {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_address: Mailbox,
}

impl SmtpMailer {
    pub(super) fn new(config: &SmtpConfig) -> Result<Self, NotificationError> {
        let from_address = parse_mailbox(&config.from_address)?;

        let credentials = Credentials::new(
            config.username.clone(),
            config.password.expose_secret().to_string(),
        );

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
            .port(config.port)
            .credentials(credentials)
            .build();

        Ok(Self {
            mailer,
            from_address,
        })
    }

    pub(super) async fn send(&self, email: &OutgoingEmail) -> Result<(), NotificationError> {
        let message = build_message(self.from_address.clone(), email)?;
        self.mailer.send(message).await?;
        Ok(())
    }
}

/// Build a multipart (plain text + HTML) message addressed to every recipient.
fn build_message(from: Mailbox, email: &OutgoingEmail) -> Result<Message, NotificationError> {
    let mut builder = Message::builder().from(from).subject(email.subject.as_str());
    for recipient in &email.to {
        builder = builder.to(parse_mailbox(recipient)?);
    }

    let message = builder.multipart(
        MultiPart::alternative()
            .singlepart(
                SinglePart::builder()
                    .header(ContentType::TEXT_PLAIN)
                    .body(email.text.clone()),
            )
            .singlepart(
                SinglePart::builder()
                    .header(ContentType::TEXT_HTML)
                    .body(email.html.clone()),
            ),
    )?;

    Ok(message)
}

fn parse_mailbox(address: &str) -> Result<Mailbox, NotificationError> {
    address
        .parse()
        .map_err(|_| NotificationError::InvalidAddress(address.to_string()))
}
