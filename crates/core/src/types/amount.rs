//! Money amounts in Chilean pesos.
//!
//! Webpay transacts CLP, which has no minor unit. Amounts are still kept as
//! [`Decimal`] so that whatever the client submits is summed exactly, with no
//! floating-point drift between the line totals and the grand total.

use core::fmt;
use core::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Errors that can occur when parsing an [`Amount`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AmountError {
    /// The input is empty.
    #[error("amount cannot be empty")]
    Empty,
    /// The input is not a number.
    #[error("amount is not a number: {0}")]
    NotANumber(String),
}

/// A CLP amount.
///
/// Serialized as a plain JSON number (an integer whenever the value is
/// integral), which is what the Webpay REST API expects for `amount`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount(Decimal);

impl Amount {
    /// Zero pesos.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create an amount from whole pesos.
    #[must_use]
    pub fn from_pesos(pesos: i64) -> Self {
        Self(Decimal::from(pesos))
    }

    /// The underlying decimal value.
    #[must_use]
    pub const fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// Whether the amount is strictly greater than zero.
    #[must_use]
    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    /// Whether the amount has no fractional part.
    #[must_use]
    pub fn is_integral(&self) -> bool {
        self.0.fract().is_zero()
    }

    /// `self + rhs`, or `None` if the sum exceeds the decimal range.
    #[must_use]
    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Self)
    }

    /// `self * quantity`, or `None` if the product exceeds the decimal range.
    #[must_use]
    pub fn checked_mul(self, quantity: u32) -> Option<Self> {
        self.0.checked_mul(Decimal::from(quantity)).map(Self)
    }

    /// The amount without currency symbol or grouping, e.g. `"12345"`.
    ///
    /// Used for query strings and anything else machine-read.
    #[must_use]
    pub fn to_plain_string(&self) -> String {
        self.0.normalize().to_string()
    }
}

impl fmt::Display for Amount {
    /// Chilean formatting: `$12.345` (dot thousands separator, comma decimals).
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = self.0.normalize();
        let sign = if value.is_sign_negative() && !value.is_zero() {
            "-"
        } else {
            ""
        };
        let abs = value.abs();
        let digits = abs.trunc().to_string();

        let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, c) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push('.');
            }
            grouped.push(c);
        }

        let fraction = abs.fract();
        if fraction.is_zero() {
            write!(f, "{sign}${grouped}")
        } else {
            let fraction = fraction.to_string();
            let decimals = fraction.trim_start_matches('0').trim_start_matches('.');
            write!(f, "{sign}${grouped},{decimals}")
        }
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    /// Parse `"5990"`, `" 12.5 "` or `"1e3"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(AmountError::Empty);
        }
        Decimal::from_str(s)
            .or_else(|_| Decimal::from_scientific(s))
            .map(Self)
            .map_err(|_| AmountError::NotANumber(s.to_string()))
    }
}

impl From<Decimal> for Amount {
    fn from(value: Decimal) -> Self {
        Self(value)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.is_integral() {
            if let Some(whole) = self.0.to_i64() {
                return serializer.serialize_i64(whole);
            }
        }
        match self.0.to_f64() {
            Some(value) => serializer.serialize_f64(value),
            None => serializer.serialize_str(&self.to_plain_string()),
        }
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(AmountVisitor)
    }
}

struct AmountVisitor;

impl Visitor<'_> for AmountVisitor {
    type Value = Amount;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a number or a numeric string")
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        Ok(Amount(Decimal::from(v)))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        Ok(Amount(Decimal::from(v)))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
        Decimal::from_f64(v)
            .map(Amount)
            .ok_or_else(|| E::custom(format!("amount out of range: {v}")))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        v.parse().map_err(E::custom)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accepts_numeric_strings() {
        assert_eq!("5990".parse::<Amount>().unwrap(), Amount::from_pesos(5990));
        assert_eq!(" 100 ".parse::<Amount>().unwrap(), Amount::from_pesos(100));
        assert_eq!("1e3".parse::<Amount>().unwrap(), Amount::from_pesos(1000));
        assert!(!"12.5".parse::<Amount>().unwrap().is_integral());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!("".parse::<Amount>(), Err(AmountError::Empty));
        assert!(matches!(
            "abc".parse::<Amount>(),
            Err(AmountError::NotANumber(_))
        ));
    }

    #[test]
    fn test_display_groups_thousands() {
        assert_eq!(Amount::from_pesos(0).to_string(), "$0");
        assert_eq!(Amount::from_pesos(990).to_string(), "$990");
        assert_eq!(Amount::from_pesos(5990).to_string(), "$5.990");
        assert_eq!(Amount::from_pesos(1_234_567).to_string(), "$1.234.567");
        assert_eq!("1234.5".parse::<Amount>().unwrap().to_string(), "$1.234,5");
        assert_eq!(Amount::from_pesos(-2500).to_string(), "-$2.500");
    }

    #[test]
    fn test_plain_string() {
        assert_eq!("200.00".parse::<Amount>().unwrap().to_plain_string(), "200");
        assert_eq!(Amount::from_pesos(12345).to_plain_string(), "12345");
    }

    #[test]
    fn test_arithmetic_is_exact() {
        let a: Amount = "0.1".parse().unwrap();
        let b: Amount = "0.2".parse().unwrap();
        assert_eq!(a.checked_add(b), Some("0.3".parse::<Amount>().unwrap()));
        assert_eq!(
            Amount::from_pesos(19990).checked_mul(3),
            Some(Amount::from_pesos(59970))
        );
    }

    #[test]
    fn test_arithmetic_overflow_is_none() {
        let max = Amount::from(Decimal::MAX);
        assert_eq!(max.checked_mul(2), None);
        assert_eq!(max.checked_add(Amount::from_pesos(1)), None);
        assert_eq!(max.checked_mul(1), Some(max));

        let half: Amount = "5e28".parse().unwrap();
        assert_eq!(half.checked_add(half), None);
    }

    #[test]
    fn test_serialize_as_json_number() {
        assert_eq!(
            serde_json::to_string(&Amount::from_pesos(200)).unwrap(),
            "200"
        );
        assert_eq!(
            serde_json::to_string(&"12.5".parse::<Amount>().unwrap()).unwrap(),
            "12.5"
        );
    }

    #[test]
    fn test_deserialize_numbers_and_strings() {
        let from_int: Amount = serde_json::from_str("5990").unwrap();
        let from_str: Amount = serde_json::from_str("\"5990\"").unwrap();
        let from_float: Amount = serde_json::from_str("5990.0").unwrap();
        assert_eq!(from_int, Amount::from_pesos(5990));
        assert_eq!(from_str, from_int);
        assert_eq!(from_float, from_int);
    }
}
