//! Webpay transaction status.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Status of a Webpay transaction as reported by the gateway.
///
/// The gateway is the source of truth; this type only names the values it
/// documents and keeps anything else verbatim so it can be echoed back to the
/// frontend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TransactionStatus {
    Initialized,
    Authorized,
    Failed,
    Reversed,
    Nullified,
    PartiallyNullified,
    Captured,
    /// Any status string the gateway returns that is not listed above.
    Other(String),
}

impl TransactionStatus {
    /// The wire representation, e.g. `"AUTHORIZED"`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Initialized => "INITIALIZED",
            Self::Authorized => "AUTHORIZED",
            Self::Failed => "FAILED",
            Self::Reversed => "REVERSED",
            Self::Nullified => "NULLIFIED",
            Self::PartiallyNullified => "PARTIALLY_NULLIFIED",
            Self::Captured => "CAPTURED",
            Self::Other(raw) => raw,
        }
    }

    /// Only `AUTHORIZED` counts as a successful payment.
    #[must_use]
    pub const fn is_authorized(&self) -> bool {
        matches!(self, Self::Authorized)
    }
}

impl From<&str> for TransactionStatus {
    fn from(s: &str) -> Self {
        match s {
            "INITIALIZED" => Self::Initialized,
            "AUTHORIZED" => Self::Authorized,
            "FAILED" => Self::Failed,
            "REVERSED" => Self::Reversed,
            "NULLIFIED" => Self::Nullified,
            "PARTIALLY_NULLIFIED" => Self::PartiallyNullified,
            "CAPTURED" => Self::Captured,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for TransactionStatus {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<TransactionStatus> for String {
    fn from(status: TransactionStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_known_statuses() {
        assert_eq!(
            TransactionStatus::from("AUTHORIZED"),
            TransactionStatus::Authorized
        );
        assert_eq!(
            TransactionStatus::from("PARTIALLY_NULLIFIED"),
            TransactionStatus::PartiallyNullified
        );
        assert!(TransactionStatus::Authorized.is_authorized());
        assert!(!TransactionStatus::Failed.is_authorized());
    }

    #[test]
    fn test_unknown_status_is_kept_verbatim() {
        let status = TransactionStatus::from("authorized");
        assert_eq!(status, TransactionStatus::Other("authorized".to_string()));
        assert!(!status.is_authorized());
        assert_eq!(status.to_string(), "authorized");
    }

    #[test]
    fn test_serde_uses_wire_strings() {
        let status: TransactionStatus = serde_json::from_str("\"FAILED\"").unwrap();
        assert_eq!(status, TransactionStatus::Failed);
        assert_eq!(
            serde_json::to_string(&TransactionStatus::Captured).unwrap(),
            "\"CAPTURED\""
        );
    }
}
