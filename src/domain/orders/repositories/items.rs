//! Order Items Repository

use jiff_sqlx::Timestamp as SqlxTimestamp;
use sqlx::{FromRow, Postgres, Row, Transaction, postgres::PgRow, query_as};

use crate::domain::{
    carts::models::CartId,
    orders::models::{CheckoutLine, OrderId, OrderItem, OrderItemId},
    products::models::ProductId,
};

use super::orders::{try_get_amount, try_i64_from_u64};

const LOCK_CART_LINES_SQL: &str = include_str!("../sql/lock_cart_lines.sql");
const CREATE_ORDER_ITEM_SQL: &str = include_str!("../sql/create_order_item.sql");
const GET_ORDER_ITEMS_SQL: &str = include_str!("../sql/get_order_items.sql");

#[derive(Debug, Clone, Default)]
pub(crate) struct PgOrderItemsRepository;

impl PgOrderItemsRepository {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self
    }

    /// Read the cart's lines with each product row locked.
    ///
    /// Rows are taken in product-id order so concurrent checkouts acquire
    /// locks in the same sequence and cannot deadlock each other.
    pub(crate) async fn lock_cart_lines(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        cart: CartId,
    ) -> Result<Vec<CheckoutLine>, sqlx::Error> {
        query_as::<Postgres, CheckoutLine>(LOCK_CART_LINES_SQL)
            .bind(cart.into_i64())
            .fetch_all(&mut **tx)
            .await
    }

    pub(crate) async fn create_order_item(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        order: OrderId,
        line: &CheckoutLine,
    ) -> Result<OrderItem, sqlx::Error> {
        let (id, created_at, updated_at): (i64, SqlxTimestamp, SqlxTimestamp) =
            query_as(CREATE_ORDER_ITEM_SQL)
                .bind(order.into_i64())
                .bind(line.product_id.into_i64())
                .bind(try_i64_from_u64(line.quantity, "quantity")?)
                .bind(try_i64_from_u64(line.price, "price")?)
                .fetch_one(&mut **tx)
                .await?;

        Ok(OrderItem {
            id: OrderItemId::from_i64(id),
            product_id: line.product_id,
            quantity: line.quantity,
            price: line.price,
            product_name: line.product_name.clone(),
            created_at: created_at.to_jiff(),
            updated_at: updated_at.to_jiff(),
        })
    }

    pub(crate) async fn get_order_items(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        order: OrderId,
    ) -> Result<Vec<OrderItem>, sqlx::Error> {
        query_as::<Postgres, OrderItem>(GET_ORDER_ITEMS_SQL)
            .bind(order.into_i64())
            .fetch_all(&mut **tx)
            .await
    }
}

impl<'r> FromRow<'r, PgRow> for CheckoutLine {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        Ok(Self {
            product_id: ProductId::from_i64(row.try_get("product_id")?),
            quantity: try_get_amount(row, "quantity")?,
            price: try_get_amount(row, "price")?,
            product_name: row.try_get("product_name")?,
            product_stock: try_get_amount(row, "product_stock")?,
        })
    }
}

impl<'r> FromRow<'r, PgRow> for OrderItem {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: OrderItemId::from_i64(row.try_get("id")?),
            product_id: ProductId::from_i64(row.try_get("product_id")?),
            quantity: try_get_amount(row, "quantity")?,
            price: try_get_amount(row, "price")?,
            product_name: row.try_get("product_name")?,
            created_at: row.try_get::<SqlxTimestamp, _>("created_at")?.to_jiff(),
            updated_at: row.try_get::<SqlxTimestamp, _>("updated_at")?.to_jiff(),
        })
    }
}
