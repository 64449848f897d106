//! Cart Items Repository

use jiff_sqlx::Timestamp as SqlxTimestamp;
use sqlx::{FromRow, Postgres, Row, Transaction, postgres::PgRow, query, query_as};

use crate::domain::{
    carts::models::{CartId, CartItem, CartItemId},
    products::models::ProductId,
};

use super::carts::{try_get_amount, try_i64_from_u64};

const GET_CART_ITEMS_SQL: &str = include_str!("../sql/get_cart_items.sql");
const GET_CART_ITEM_SQL: &str = include_str!("../sql/get_cart_item.sql");
const FIND_ITEM_BY_PRODUCT_SQL: &str = include_str!("../sql/find_item_by_product.sql");
const UPSERT_CART_ITEM_SQL: &str = include_str!("../sql/upsert_cart_item.sql");
const SET_CART_ITEM_QUANTITY_SQL: &str = include_str!("../sql/set_cart_item_quantity.sql");
const DELETE_CART_ITEM_SQL: &str = include_str!("../sql/delete_cart_item.sql");
const CLEAR_CART_ITEMS_SQL: &str = include_str!("../sql/clear_cart_items.sql");

#[derive(Debug, Clone, Default)]
pub(crate) struct PgCartItemsRepository;

impl PgCartItemsRepository {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self
    }

    pub(crate) async fn get_cart_items(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        cart: CartId,
    ) -> Result<Vec<CartItem>, sqlx::Error> {
        query_as::<Postgres, CartItem>(GET_CART_ITEMS_SQL)
            .bind(cart.into_i64())
            .fetch_all(&mut **tx)
            .await
    }

    /// Fetch a single item, scoped to the given cart.
    ///
    /// The cart id is part of the predicate so an item id belonging to a
    /// different user resolves to nothing rather than leaking existence.
    pub(crate) async fn get_cart_item(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        cart: CartId,
        item: CartItemId,
    ) -> Result<Option<CartItem>, sqlx::Error> {
        query_as::<Postgres, CartItem>(GET_CART_ITEM_SQL)
            .bind(item.into_i64())
            .bind(cart.into_i64())
            .fetch_optional(&mut **tx)
            .await
    }

    pub(crate) async fn find_item_by_product(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        cart: CartId,
        product: ProductId,
    ) -> Result<Option<CartItem>, sqlx::Error> {
        query_as::<Postgres, CartItem>(FIND_ITEM_BY_PRODUCT_SQL)
            .bind(cart.into_i64())
            .bind(product.into_i64())
            .fetch_optional(&mut **tx)
            .await
    }

    /// Insert an item, or add to the quantity of an existing one.
    ///
    /// The snapshot price only applies on insert; an existing item keeps the
    /// price it was first added at.
    pub(crate) async fn upsert_item(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        cart: CartId,
        product: ProductId,
        quantity: u64,
        price: u64,
    ) -> Result<(), sqlx::Error> {
        query(UPSERT_CART_ITEM_SQL)
            .bind(cart.into_i64())
            .bind(product.into_i64())
            .bind(try_i64_from_u64(quantity, "quantity")?)
            .bind(try_i64_from_u64(price, "price")?)
            .execute(&mut **tx)
            .await?;

        Ok(())
    }

    pub(crate) async fn set_item_quantity(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        cart: CartId,
        item: CartItemId,
        quantity: u64,
    ) -> Result<u64, sqlx::Error> {
        let rows_affected = query(SET_CART_ITEM_QUANTITY_SQL)
            .bind(item.into_i64())
            .bind(cart.into_i64())
            .bind(try_i64_from_u64(quantity, "quantity")?)
            .execute(&mut **tx)
            .await?
            .rows_affected();

        Ok(rows_affected)
    }

    pub(crate) async fn delete_item(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        cart: CartId,
        item: CartItemId,
    ) -> Result<u64, sqlx::Error> {
        let rows_affected = query(DELETE_CART_ITEM_SQL)
            .bind(item.into_i64())
            .bind(cart.into_i64())
            .execute(&mut **tx)
            .await?
            .rows_affected();

        Ok(rows_affected)
    }

    pub(crate) async fn clear_cart_items(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        cart: CartId,
    ) -> Result<u64, sqlx::Error> {
        let rows_affected = query(CLEAR_CART_ITEMS_SQL)
            .bind(cart.into_i64())
            .execute(&mut **tx)
            .await?
            .rows_affected();

        Ok(rows_affected)
    }
}

impl<'r> FromRow<'r, PgRow> for CartItem {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: CartItemId::from_i64(row.try_get("id")?),
            product_id: ProductId::from_i64(row.try_get("product_id")?),
            quantity: try_get_amount(row, "quantity")?,
            price: try_get_amount(row, "price")?,
            product_name: row.try_get("product_name")?,
            product_price: try_get_amount(row, "product_price")?,
            product_stock: try_get_amount(row, "product_stock")?,
            created_at: row.try_get::<SqlxTimestamp, _>("created_at")?.to_jiff(),
            updated_at: row.try_get::<SqlxTimestamp, _>("updated_at")?.to_jiff(),
        })
    }
}
