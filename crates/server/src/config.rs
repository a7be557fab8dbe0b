//! Checkout server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `WEBPAY_BASE_URL` - Webpay REST base, e.g.
//!   `https://webpay3gint.transbank.cl/rswebpaytransaction/api/webpay/v1.2`
//! - `WEBPAY_COMMERCE_CODE` - Commerce code (`Tbk-Api-Key-Id`)
//! - `WEBPAY_API_KEY` - API key secret (`Tbk-Api-Key-Secret`)
//! - `WEBPAY_RETURN_URL` - Public URL of `/api/webpay/retorno` on this server
//!   (falls back to `FRONTEND_RETURN_URL`)
//!
//! ## Optional
//! - `CHECKOUT_HOST` - Bind address (default: 127.0.0.1)
//! - `CHECKOUT_PORT` - Listen port (default: 4000)
//! - `WEBPAY_TIMEOUT_SECS` - Gateway request timeout (default: 15)
//! - `FRONTEND_URL` - Frontend base for the payment result redirects
//!   (default: <http://localhost:5173>)
//! - `STORE_NAME` - Shop name used in emails and pages (default: Solucenter)
//! - `RESEND_API_KEY` - Enables the Resend email transport
//! - `RESEND_API_URL` - Resend API base (default: <https://api.resend.com>)
//! - `RESEND_FROM_EMAIL` - Sender for Resend
//! - `SMTP_HOST`, `SMTP_PORT`, `SMTP_USERNAME`, `SMTP_PASSWORD`,
//!   `SMTP_FROM_EMAIL` - SMTP transport, used when Resend is not configured
//! - `PURCHASE_INTERNAL_EMAILS` - Comma-separated operator addresses copied on
//!   every purchase email
//! - `TEST_EMAIL_RECIPIENT` - Customer address used by `/api/test-email`
//! - `NOTIFY_TIMEOUT_SECS` - Per-email send timeout (default: 30)
//! - `NOTIFY_QUEUE_CAPACITY` - Pending email jobs before new ones are
//!   dropped (default: 256)
//! - `PENDING_ORDER_TTL_SECS` - How long a checkout waits for its callback
//!   (default: 3600)
//! - `PENDING_ORDER_MAX_ENTRIES` - Pending-order store capacity (default: 10000)
//! - `PENDING_ORDER_SWEEP_SECS` - Expiry sweep interval (default: 60)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

const DEFAULT_FRONTEND_URL: &str = "http://localhost:5173";
const DEFAULT_RESEND_API_URL: &str = "https://api.resend.com";
const DEFAULT_STORE_NAME: &str = "Solucenter";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Checkout server configuration.
#[derive(Debug, Clone)]
pub struct CheckoutConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Frontend base URL for payment result redirects
    pub frontend_url: Url,
    /// Shop name shown in emails and pages
    pub store_name: String,
    /// Webpay REST API configuration
    pub webpay: WebpayConfig,
    /// Purchase email configuration
    pub email: EmailConfig,
    /// Pending-order store limits
    pub pending: PendingOrderConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// Webpay REST API configuration.
///
/// Implements `Debug` manually to redact the API key.
#[derive(Clone)]
pub struct WebpayConfig {
    /// Base URL up to and including the API version
    pub base_url: Url,
    /// Commerce code, sent as `Tbk-Api-Key-Id`
    pub commerce_code: String,
    /// API key, sent as `Tbk-Api-Key-Secret`
    pub api_key: SecretString,
    /// Where Webpay sends the browser back after payment
    pub return_url: Url,
    /// Per-request timeout
    pub timeout: Duration,
}

impl std::fmt::Debug for WebpayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebpayConfig")
            .field("base_url", &self.base_url.as_str())
            .field("commerce_code", &self.commerce_code)
            .field("api_key", &"[REDACTED]")
            .field("return_url", &self.return_url.as_str())
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Purchase email configuration.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    /// Which transport delivers purchase emails
    pub transport: MailTransportConfig,
    /// Operator addresses copied on every purchase email
    pub internal_recipients: Vec<String>,
    /// Customer address used by the test email endpoint
    pub test_recipient: Option<String>,
    /// Per-email send timeout
    pub send_timeout: Duration,
    /// Capacity of the notification queue
    pub queue_capacity: usize,
}

/// Email transport selection.
#[derive(Debug, Clone)]
pub enum MailTransportConfig {
    /// Resend HTTP API.
    Resend(ResendConfig),
    /// Plain SMTP relay with STARTTLS.
    Smtp(SmtpConfig),
    /// No transport configured; sends fail and are logged.
    Disabled,
}

/// Resend HTTP API configuration.
///
/// Implements `Debug` manually to redact the API key.
#[derive(Clone)]
pub struct ResendConfig {
    pub api_url: Url,
    pub api_key: SecretString,
    pub from_address: String,
}

impl std::fmt::Debug for ResendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResendConfig")
            .field("api_url", &self.api_url.as_str())
            .field("api_key", &"[REDACTED]")
            .field("from_address", &self.from_address)
            .finish()
    }
}

/// SMTP relay configuration.
///
/// Implements `Debug` manually to redact the password.
#[derive(Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
    pub from_address: String,
}

impl std::fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("from_address", &self.from_address)
            .finish()
    }
}

/// Pending-order store limits.
#[derive(Debug, Clone)]
pub struct PendingOrderConfig {
    /// How long a checkout waits for its Webpay callback
    pub ttl: Duration,
    /// Maximum number of pending orders kept in memory
    pub max_entries: u64,
    /// Interval of the background expiry sweep
    pub sweep_interval: Duration,
}

impl Default for PendingOrderConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(3600),
            max_entries: 10_000,
            sweep_interval: Duration::from_secs(60),
        }
    }
}

impl CheckoutConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    ///
    /// Empty values are treated as unset.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let store_name = env.or_default("STORE_NAME", DEFAULT_STORE_NAME);

        Ok(Self {
            host: env.parse_or("CHECKOUT_HOST", "127.0.0.1")?,
            port: env.parse_or("CHECKOUT_PORT", "4000")?,
            frontend_url: env.url_or("FRONTEND_URL", DEFAULT_FRONTEND_URL)?,
            webpay: WebpayConfig::from_env(&env)?,
            email: EmailConfig::from_env(&env, &store_name)?,
            pending: PendingOrderConfig::from_env(&env)?,
            sentry_dsn: env.optional("SENTRY_DSN"),
            sentry_environment: env.optional("SENTRY_ENVIRONMENT"),
            store_name,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl WebpayConfig {
    fn from_env<F: Fn(&str) -> Option<String>>(env: &Env<F>) -> Result<Self, ConfigError> {
        let return_url = env
            .optional("WEBPAY_RETURN_URL")
            .or_else(|| env.optional("FRONTEND_RETURN_URL"))
            .ok_or_else(|| ConfigError::MissingEnvVar("WEBPAY_RETURN_URL".to_string()))?;

        Ok(Self {
            base_url: parse_url("WEBPAY_BASE_URL", &env.required("WEBPAY_BASE_URL")?)?,
            commerce_code: env.required("WEBPAY_COMMERCE_CODE")?,
            api_key: SecretString::from(env.required("WEBPAY_API_KEY")?),
            return_url: parse_url("WEBPAY_RETURN_URL", &return_url)?,
            timeout: Duration::from_secs(env.parse_or("WEBPAY_TIMEOUT_SECS", "15")?),
        })
    }
}

impl EmailConfig {
    fn from_env<F: Fn(&str) -> Option<String>>(
        env: &Env<F>,
        store_name: &str,
    ) -> Result<Self, ConfigError> {
        let transport = if let Some(api_key) = env.optional("RESEND_API_KEY") {
            MailTransportConfig::Resend(ResendConfig {
                api_url: env.url_or("RESEND_API_URL", DEFAULT_RESEND_API_URL)?,
                api_key: SecretString::from(api_key),
                from_address: env.or_default(
                    "RESEND_FROM_EMAIL",
                    &format!("{store_name} <onboarding@resend.dev>"),
                ),
            })
        } else if let Some(host) = env.optional("SMTP_HOST") {
            MailTransportConfig::Smtp(SmtpConfig {
                port: env.parse_or("SMTP_PORT", "587")?,
                username: env.required("SMTP_USERNAME")?,
                password: SecretString::from(env.required("SMTP_PASSWORD")?),
                from_address: env.required("SMTP_FROM_EMAIL")?,
                host,
            })
        } else {
            MailTransportConfig::Disabled
        };

        Ok(Self {
            transport,
            internal_recipients: split_recipients(
                env.optional("PURCHASE_INTERNAL_EMAILS").as_deref(),
            ),
            test_recipient: env.optional("TEST_EMAIL_RECIPIENT"),
            send_timeout: Duration::from_secs(env.parse_or("NOTIFY_TIMEOUT_SECS", "30")?),
            queue_capacity: env.parse_or("NOTIFY_QUEUE_CAPACITY", "256")?,
        })
    }
}

impl PendingOrderConfig {
    fn from_env<F: Fn(&str) -> Option<String>>(env: &Env<F>) -> Result<Self, ConfigError> {
        Ok(Self {
            ttl: Duration::from_secs(env.parse_or("PENDING_ORDER_TTL_SECS", "3600")?),
            max_entries: env.parse_or("PENDING_ORDER_MAX_ENTRIES", "10000")?,
            sweep_interval: Duration::from_secs(env.parse_or("PENDING_ORDER_SWEEP_SECS", "60")?),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Split a comma-separated recipient list, dropping blanks and duplicates.
#[must_use]
pub fn split_recipients(raw: Option<&str>) -> Vec<String> {
    let mut recipients: Vec<String> = Vec::new();
    for address in raw.unwrap_or_default().split(',').map(str::trim) {
        if !address.is_empty() && !recipients.iter().any(|r| r.eq_ignore_ascii_case(address)) {
            recipients.push(address.to_string());
        }
    }
    recipients
}

fn parse_url(key: &str, value: &str) -> Result<Url, ConfigError> {
    Url::parse(value).map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Environment lookup with the usual required/optional/default helpers.
struct Env<F>(F);

impl<F: Fn(&str) -> Option<String>> Env<F> {
    /// Get an optional variable; empty values count as unset.
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    /// Get a required variable.
    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.optional(key)
            .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
    }

    /// Get a variable with a default value.
    fn or_default(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    /// Parse a variable, falling back to a default before parsing.
    fn parse_or<T>(&self, key: &str, default: &str) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.or_default(key, default)
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    }

    fn url_or(&self, key: &str, default: &str) -> Result<Url, ConfigError> {
        parse_url(key, &self.or_default(key, default))
    }
}
