//! Cart and customer validation.
//!
//! The checkout form posts whatever the frontend cart holds: prices and
//! quantities may be JSON numbers or numeric strings, optional contact fields
//! may be missing. [`validate_checkout`] turns that into a [`ValidatedOrder`]
//! with per-line totals, or reports the first offending field.
//!
//! Rules are checked in this order and the first failure wins:
//!
//! 1. the customer has a name and an email
//! 2. the email is well formed
//! 3. the item list is not empty
//! 4. for each item: id and name, then price > 0, then quantity > 0
//! 5. the line totals and their sum fit in an [`Amount`]

use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::types::{Amount, Email, EmailError};

/// Validation failures, phrased for the shopper.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    #[error("Missing customer data (name or email).")]
    MissingCustomer,

    #[error("Invalid customer email: {0}")]
    InvalidEmail(#[from] EmailError),

    #[error("The cart is empty or has an invalid format.")]
    EmptyCart,

    /// `position` is 1-based.
    #[error("Missing id or name in cart item #{position}.")]
    MissingItemField { position: usize },

    #[error("Invalid price for product: {name}")]
    InvalidPrice { name: String },

    #[error("Invalid quantity for product: {name}")]
    InvalidQuantity { name: String },

    /// Every line is valid but their sum does not fit in an amount.
    #[error("The cart total is too large.")]
    TotalTooLarge,
}

/// A cart line as submitted by the frontend.
///
/// Every field is kept as raw JSON so that a malformed value becomes a
/// validation error naming the product rather than a body parse failure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CartItemInput {
    #[serde(default)]
    pub id: Value,
    #[serde(default)]
    pub name: Value,
    #[serde(default)]
    pub price: Value,
    #[serde(default)]
    pub quantity: Value,
}

impl CartItemInput {
    /// Read the `items` field of a checkout body.
    ///
    /// Returns `None` unless `value` is an array. Elements that are not
    /// objects become empty items, which fail validation at their position.
    #[must_use]
    pub fn list_from_json(value: Value) -> Option<Vec<Self>> {
        let Value::Array(elements) = value else {
            return None;
        };
        Some(
            elements
                .into_iter()
                .map(|element| serde_json::from_value(element).unwrap_or_default())
                .collect(),
        )
    }
}

/// Customer contact data as submitted by the checkout form.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CustomerInput {
    pub name: Option<String>,
    pub email: Option<String>,
    pub rut: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub comuna: Option<String>,
    pub notes: Option<String>,
}

/// Validated customer contact data. Optional fields default to `""`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub name: String,
    pub email: Email,
    pub rut: String,
    pub phone: String,
    pub address: String,
    pub comuna: String,
    pub notes: String,
}

/// A normalized cart line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub id: String,
    pub name: String,
    pub unit_price: Amount,
    pub quantity: u32,
    pub line_total: Amount,
}

/// Result of a successful validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedOrder {
    pub customer: Customer,
    pub lines: Vec<OrderLine>,
    /// Sum of all line totals.
    pub total: Amount,
}

/// Validate a checkout submission.
///
/// # Errors
///
/// Returns the [`CartError`] for the first rule that fails.
pub fn validate_checkout(
    customer: Option<&CustomerInput>,
    items: Option<&[CartItemInput]>,
) -> Result<ValidatedOrder, CartError> {
    let customer = validate_customer(customer)?;

    let items = items.unwrap_or_default();
    if items.is_empty() {
        return Err(CartError::EmptyCart);
    }

    let lines = items
        .iter()
        .enumerate()
        .map(|(i, item)| validate_item(i + 1, item))
        .collect::<Result<Vec<_>, _>>()?;

    let total = lines
        .iter()
        .try_fold(Amount::ZERO, |total, line| total.checked_add(line.line_total))
        .ok_or(CartError::TotalTooLarge)?;

    Ok(ValidatedOrder {
        customer,
        lines,
        total,
    })
}

fn validate_customer(input: Option<&CustomerInput>) -> Result<Customer, CartError> {
    let input = input.ok_or(CartError::MissingCustomer)?;

    let name = non_blank(input.name.as_deref()).ok_or(CartError::MissingCustomer)?;
    let email = non_blank(input.email.as_deref()).ok_or(CartError::MissingCustomer)?;
    let email = Email::parse(email)?;

    let optional = |field: &Option<String>| {
        field
            .as_deref()
            .map(str::trim)
            .unwrap_or_default()
            .to_string()
    };

    Ok(Customer {
        name: name.to_string(),
        email,
        rut: optional(&input.rut),
        phone: optional(&input.phone),
        address: optional(&input.address),
        comuna: optional(&input.comuna),
        notes: optional(&input.notes),
    })
}

fn validate_item(position: usize, item: &CartItemInput) -> Result<OrderLine, CartError> {
    let (Some(id), Some(name)) = (text_value(&item.id), text_value(&item.name)) else {
        return Err(CartError::MissingItemField { position });
    };

    let unit_price = numeric_value(&item.price)
        .filter(Amount::is_positive)
        .ok_or_else(|| CartError::InvalidPrice { name: name.clone() })?;

    let quantity = numeric_value(&item.quantity)
        .filter(|q| q.is_positive() && q.is_integral())
        .and_then(|q| q.as_decimal().to_u32())
        .ok_or_else(|| CartError::InvalidQuantity { name: name.clone() })?;

    // A price too large to multiply by its quantity is not a usable price.
    let Some(line_total) = unit_price.checked_mul(quantity) else {
        return Err(CartError::InvalidPrice { name });
    };

    Ok(OrderLine {
        id,
        name,
        unit_price,
        quantity,
        line_total,
    })
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

/// Identifiers may be strings or numbers; anything else counts as missing.
fn text_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => non_blank(Some(s)).map(str::to_string),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn numeric_value(value: &Value) -> Option<Amount> {
    match value {
        Value::Number(n) => n.to_string().parse().ok(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;
    use serde_json::json;

    use super::*;

    fn customer() -> CustomerInput {
        CustomerInput {
            name: Some("Jane".to_string()),
            email: Some("jane@example.com".to_string()),
            ..Default::default()
        }
    }

    fn item(value: Value) -> CartItemInput {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_widget_scenario() {
        let items = vec![item(json!({"id": "A", "name": "Widget", "price": 100, "quantity": 2}))];
        let order = validate_checkout(Some(&customer()), Some(items.as_slice())).unwrap();

        assert_eq!(order.total, Amount::from_pesos(200));
        assert_eq!(
            order.lines,
            vec![OrderLine {
                id: "A".to_string(),
                name: "Widget".to_string(),
                unit_price: Amount::from_pesos(100),
                quantity: 2,
                line_total: Amount::from_pesos(200),
            }]
        );
        assert_eq!(order.customer.rut, "");
    }

    #[test]
    fn test_total_is_sum_of_lines() {
        let items = vec![
            item(json!({"id": "cemento-polpaico-25kg", "name": "Cemento Polpaico 25 kg", "price": 5990, "quantity": 3})),
            item(json!({"id": "zincalum", "name": "PL. ZINCALUM AC 0.35 X 3.66 MT", "price": "19990", "quantity": "2"})),
            item(json!({"id": 7, "name": "Clavos", "price": 0.5, "quantity": 7})),
        ];
        let order = validate_checkout(Some(&customer()), Some(items.as_slice())).unwrap();

        let expected: Amount = "57953.5".parse().unwrap();
        assert_eq!(order.total, expected);
        assert_eq!(order.lines[2].id, "7");
    }

    #[test]
    fn test_many_lines_sum_exactly() {
        let items: Vec<_> = (1..=50u32)
            .map(|n| {
                item(json!({
                    "id": format!("sku-{n}"),
                    "name": format!("Product {n}"),
                    "price": format!("{n}.25"),
                    "quantity": n,
                }))
            })
            .collect();
        let order = validate_checkout(Some(&customer()), Some(items.as_slice())).unwrap();

        // Σ (n + 0.25) * n = Σ n² + 0.25 Σ n, computed in integer quarters.
        let quarters: i64 = (1..=50i64).map(|n| (4 * n + 1) * n).sum();
        let expected = Decimal::from(quarters) / Decimal::from(4);
        assert_eq!(order.total.as_decimal(), expected);
        assert_eq!(order.lines.len(), 50);
    }

    #[test]
    fn test_exponent_form_price() {
        let items = vec![item(json!({"id": "A", "name": "Widget", "price": "5.99e3", "quantity": 2}))];
        let order = validate_checkout(Some(&customer()), Some(items.as_slice())).unwrap();
        assert_eq!(order.total, Amount::from_pesos(11_980));
    }

    #[test]
    fn test_price_at_decimal_max() {
        let max = Decimal::MAX.to_string();

        let single = vec![item(json!({"id": "A", "name": "Widget", "price": max.as_str(), "quantity": 1}))];
        let order = validate_checkout(Some(&customer()), Some(single.as_slice())).unwrap();
        assert_eq!(order.total.as_decimal(), Decimal::MAX);

        let doubled = vec![item(json!({"id": "A", "name": "Widget", "price": max.as_str(), "quantity": 2}))];
        assert_eq!(
            validate_checkout(Some(&customer()), Some(doubled.as_slice())),
            Err(CartError::InvalidPrice {
                name: "Widget".to_string()
            })
        );
    }

    #[test]
    fn test_total_overflow_is_rejected() {
        let items = vec![
            item(json!({"id": "A", "name": "Widget", "price": "5e28", "quantity": 1})),
            item(json!({"id": "B", "name": "Gadget", "price": 5e28, "quantity": 1})),
        ];
        assert_eq!(
            validate_checkout(Some(&customer()), Some(items.as_slice())),
            Err(CartError::TotalTooLarge)
        );
    }

    #[test]
    fn test_zero_price_names_the_product() {
        let items = vec![item(json!({"id": "A", "name": "Widget", "price": 0, "quantity": 1}))];
        let err = validate_checkout(Some(&customer()), Some(items.as_slice())).unwrap_err();

        assert_eq!(
            err,
            CartError::InvalidPrice {
                name: "Widget".to_string()
            }
        );
        assert!(err.to_string().contains("Widget"));
    }

    #[test]
    fn test_non_numeric_and_negative_prices() {
        for price in [
            json!("abc"),
            json!(-10),
            json!("-0.01"),
            json!("-1e3"),
            json!(0.0),
            json!(null),
            json!(true),
            json!(""),
            json!([100]),
            json!("1e999"),
        ] {
            let items = vec![item(json!({"id": "A", "name": "Widget", "price": price, "quantity": 1}))];
            let err = validate_checkout(Some(&customer()), Some(items.as_slice())).unwrap_err();
            assert!(
                matches!(err, CartError::InvalidPrice { ref name } if name == "Widget"),
                "price {price} should be rejected"
            );
        }
    }

    #[test]
    fn test_invalid_quantities() {
        let too_many = u64::from(u32::MAX) + 1;
        for quantity in [
            json!(0),
            json!(-1),
            json!(1.5),
            json!("two"),
            json!(null),
            json!(too_many),
            json!(too_many.to_string()),
        ] {
            let items = vec![item(json!({"id": "A", "name": "Widget", "price": 100, "quantity": quantity}))];
            let err = validate_checkout(Some(&customer()), Some(items.as_slice())).unwrap_err();
            assert!(matches!(err, CartError::InvalidQuantity { .. }));
        }
    }

    #[test]
    fn test_empty_cart_fails_regardless_of_customer() {
        assert_eq!(
            validate_checkout(Some(&customer()), Some([].as_slice())),
            Err(CartError::EmptyCart)
        );
        assert_eq!(
            validate_checkout(Some(&customer()), None),
            Err(CartError::EmptyCart)
        );
    }

    #[test]
    fn test_customer_checked_before_items() {
        assert_eq!(validate_checkout(None, None), Err(CartError::MissingCustomer));

        let nameless = CustomerInput {
            name: Some("   ".to_string()),
            ..customer()
        };
        assert_eq!(
            validate_checkout(Some(&nameless), Some([].as_slice())),
            Err(CartError::MissingCustomer)
        );

        let bad_email = CustomerInput {
            email: Some("jane".to_string()),
            ..customer()
        };
        assert_eq!(
            validate_checkout(Some(&bad_email), None),
            Err(CartError::InvalidEmail(EmailError::MissingAtSymbol))
        );
    }

    #[test]
    fn test_first_offending_item_wins() {
        let items = vec![
            item(json!({"id": "A", "name": "Widget", "price": 100, "quantity": 1})),
            item(json!({"name": "Sin id", "price": 100, "quantity": 1})),
            item(json!({"id": "C", "name": "Gadget", "price": 0, "quantity": 1})),
        ];
        assert_eq!(
            validate_checkout(Some(&customer()), Some(items.as_slice())),
            Err(CartError::MissingItemField { position: 2 })
        );
    }

    #[test]
    fn test_items_from_json() {
        assert!(CartItemInput::list_from_json(json!("nope")).is_none());
        assert!(CartItemInput::list_from_json(Value::Null).is_none());

        let items =
            CartItemInput::list_from_json(json!([{"id": "A", "name": "Widget", "price": 100, "quantity": 1}, 5]))
                .unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(
            validate_checkout(Some(&customer()), Some(items.as_slice())),
            Err(CartError::MissingItemField { position: 2 })
        );
    }

    #[test]
    fn test_line_serializes_camel_case() {
        let line = OrderLine {
            id: "A".to_string(),
            name: "Widget".to_string(),
            unit_price: Amount::from_pesos(100),
            quantity: 2,
            line_total: Amount::from_pesos(200),
        };
        assert_eq!(
            serde_json::to_value(&line).unwrap(),
            json!({"id": "A", "name": "Widget", "unitPrice": 100, "quantity": 2, "lineTotal": 200})
        );
    }
}
