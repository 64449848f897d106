//! Order Models

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    str::FromStr,
};

use jiff::Timestamp;
use thiserror::Error;

use crate::{
    domain::{cards::models::CardId, products::models::ProductId, users::models::UserId},
    ids::TypedId,
};

/// Order id
pub type OrderId = TypedId<Order>;

/// Order item id
pub type OrderItemId = TypedId<OrderItem>;

/// Order lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    Pending,
    Paid,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("unknown order status")]
pub struct ParseOrderStatusError;

impl FromStr for OrderStatus {
    type Err = ParseOrderStatusError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "shipped" => Ok(Self::Shipped),
            "delivered" => Ok(Self::Delivered),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(ParseOrderStatusError),
        }
    }
}

/// How the order is paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentMethod {
    Card,
    Cod,
}

impl PaymentMethod {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Card => "card",
            Self::Cod => "cod",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("unknown payment method")]
pub struct ParsePaymentMethodError;

impl FromStr for PaymentMethod {
    type Err = ParsePaymentMethodError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "card" => Ok(Self::Card),
            "cod" => Ok(Self::Cod),
            _ => Err(ParsePaymentMethodError),
        }
    }
}

impl Display for PaymentMethod {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// Payment progress, separate from the order lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
}

impl PaymentStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("unknown payment status")]
pub struct ParsePaymentStatusError;

impl FromStr for PaymentStatus {
    type Err = ParsePaymentStatusError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "failed" => Ok(Self::Failed),
            _ => Err(ParsePaymentStatusError),
        }
    }
}

/// Order Model
#[derive(Debug, Clone)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub total: u64,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub card_id: Option<CardId>,
    pub items: Vec<OrderItem>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// OrderItem Model
///
/// The immutable record of what was sold: product id, quantity and unit
/// price as they stood at checkout.
#[derive(Debug, Clone)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub product_id: ProductId,
    pub quantity: u64,
    pub price: u64,
    pub product_name: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Checkout Request Model
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutRequest {
    pub payment_method: PaymentMethod,
    pub card_id: Option<CardId>,
    pub promo_code: Option<String>,
}

/// One cart line as seen inside the checkout transaction, with its product
/// row locked for the duration.
#[derive(Debug, Clone)]
pub struct CheckoutLine {
    pub product_id: ProductId,
    pub quantity: u64,
    pub price: u64,
    pub product_name: String,
    pub product_stock: u64,
}
