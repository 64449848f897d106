//! Product Models

use jiff::Timestamp;

use crate::ids::TypedId;

/// Product id
pub type ProductId = TypedId<Product>;

/// Product Model
///
/// `price` and `stock` are unsigned minor units / counts; the storage layer
/// rejects anything that would take them negative.
#[derive(Debug, Clone)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: u64,
    pub stock: u64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// New Product Model
#[derive(Debug, Clone, PartialEq)]
pub struct NewProduct {
    pub name: String,
    pub price: u64,
    pub stock: u64,
}

/// Product Update Model
///
/// Absent fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub price: Option<u64>,
    pub stock: Option<u64>,
}
