//! Resend HTTP API transport.

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::Serialize;
use url::Url;

use super::{NotificationError, OutgoingEmail};
use crate::config::ResendConfig;

#[derive(Serialize)]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: &'a [String],
    subject: &'a str,
    html: &'a str,
    text: &'a str,
}

#[derive(Clone)]
pub(super) struct ResendMailer {
    client: reqwest::Client,
    endpoint: Url,
    from_address: String,
}

impl ResendMailer {
    pub(super) fn new(config: &ResendConfig) -> Result<Self, NotificationError> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.api_key.expose_secret()))
            .map_err(|e| NotificationError::Transport(format!("Invalid API key format: {e}")))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        let mut endpoint = config.api_url.clone();
        endpoint
            .path_segments_mut()
            .map_err(|()| NotificationError::Transport(format!("Invalid API URL: {}", config.api_url)))?
            .pop_if_empty()
            .push("emails");

        Ok(Self {
            client,
            endpoint,
            from_address: config.from_address.clone(),
        })
    }

    pub(super) async fn send(&self, email: &OutgoingEmail) -> Result<(), NotificationError> {
        let request = SendEmailRequest {
            from: &self.from_address,
            to: &email.to,
            subject: &email.subject,
            html: &email.html,
            text: &email.text,
        };

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&request)
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(NotificationError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::SecretString;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn mailer(api_url: &str) -> ResendMailer {
        ResendMailer::new(&ResendConfig {
            api_url: Url::parse(api_url).unwrap(),
            api_key: SecretString::from("re_test_key"),
            from_address: "Solucenter <onboarding@resend.dev>".to_string(),
        })
        .unwrap()
    }

    fn email() -> OutgoingEmail {
        OutgoingEmail {
            to: vec!["jane@example.com".to_string()],
            subject: "Purchase at Solucenter - Order ORD-1".to_string(),
            html: "<p>ORD-1</p>".to_string(),
            text: "ORD-1".to_string(),
        }
    }

    #[test]
    fn endpoint_appends_emails_path() {
        assert_eq!(
            mailer("https://api.resend.com").endpoint.as_str(),
            "https://api.resend.com/emails"
        );
        assert_eq!(
            mailer("http://localhost:9000/proxy/").endpoint.as_str(),
            "http://localhost:9000/proxy/emails"
        );
    }

    #[tokio::test]
    async fn api_rejection_is_reported() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/emails"))
            .respond_with(ResponseTemplate::new(403).set_body_string("domain not verified"))
            .mount(&server)
            .await;

        let err = mailer(&server.uri()).send(&email()).await.unwrap_err();

        let NotificationError::Api { status, message } = err else {
            panic!("expected Api error, got {err:?}");
        };
        assert_eq!(status, 403);
        assert_eq!(message, "domain not verified");
    }
}
