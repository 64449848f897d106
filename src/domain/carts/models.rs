//! Cart Models

use jiff::Timestamp;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::{
    domain::{products::models::ProductId, users::models::UserId},
    ids::TypedId,
};

/// Cart id
pub type CartId = TypedId<Cart>;

/// Cart item id
pub type CartItemId = TypedId<CartItem>;

/// Cart Model
#[derive(Debug, Clone)]
pub struct Cart {
    pub id: CartId,
    pub user_id: UserId,
    pub items: Vec<CartItem>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// CartItem Model
///
/// `price` is the unit price snapshotted when the item was first added;
/// `product_*` fields reflect the live product row at load time.
#[derive(Debug, Clone)]
pub struct CartItem {
    pub id: CartItemId,
    pub product_id: ProductId,
    pub quantity: u64,
    pub price: u64,
    pub product_name: String,
    pub product_price: u64,
    pub product_stock: u64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// One guest-cart entry as the client hands it over.
///
/// Guest carts live entirely client-side, so the payload is untrusted: ids
/// and quantities may arrive as numbers or numeric strings. Anything that
/// cannot be coerced to an integer is treated as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestCartEntry {
    #[serde(default, deserialize_with = "lenient_int")]
    pub product_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient_int")]
    pub quantity: Option<i64>,
}

impl GuestCartEntry {
    #[must_use]
    pub fn new(product_id: i64, quantity: i64) -> Self {
        Self {
            product_id: Some(product_id),
            quantity: Some(quantity),
        }
    }
}

fn lenient_int<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;

    Ok(value.as_ref().and_then(coerce_int))
}

fn coerce_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|float| float as i64)),
        Value::String(text) => {
            let text = text.trim();

            text.parse::<i64>()
                .ok()
                .or_else(|| text.parse::<f64>().ok().map(|float| float as i64))
        }
        _ => None,
    }
}
