//! Orders Repository

use jiff_sqlx::Timestamp as SqlxTimestamp;
use sqlx::{FromRow, Postgres, Row, Transaction, postgres::PgRow, query, query_as};

use crate::domain::{
    cards::models::CardId,
    orders::models::{Order, OrderId, OrderStatus, PaymentMethod, PaymentStatus},
    users::models::UserId,
};

const CREATE_ORDER_SQL: &str = include_str!("../sql/create_order.sql");
const UPDATE_ORDER_TOTAL_SQL: &str = include_str!("../sql/update_order_total.sql");
const SET_PAYMENT_STATE_SQL: &str = include_str!("../sql/set_payment_state.sql");
const GET_ORDER_FOR_USER_SQL: &str = include_str!("../sql/get_order_for_user.sql");
const LIST_ORDERS_FOR_USER_SQL: &str = include_str!("../sql/list_orders_for_user.sql");

#[derive(Debug, Clone, Default)]
pub(crate) struct PgOrdersRepository;

impl PgOrdersRepository {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self
    }

    /// Insert an order in its initial `pending`/`pending` state.
    pub(crate) async fn create_order(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user: UserId,
        total: u64,
        payment_method: PaymentMethod,
        card: Option<CardId>,
    ) -> Result<Order, sqlx::Error> {
        query_as::<Postgres, Order>(CREATE_ORDER_SQL)
            .bind(user.into_i64())
            .bind(try_i64_from_u64(total, "total")?)
            .bind(payment_method.as_str())
            .bind(card.map(CardId::into_i64))
            .fetch_one(&mut **tx)
            .await
    }

    pub(crate) async fn update_order_total(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        order: OrderId,
        total: u64,
    ) -> Result<(), sqlx::Error> {
        query(UPDATE_ORDER_TOTAL_SQL)
            .bind(order.into_i64())
            .bind(try_i64_from_u64(total, "total")?)
            .execute(&mut **tx)
            .await?;

        Ok(())
    }

    pub(crate) async fn set_payment_state(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        order: OrderId,
        status: OrderStatus,
        payment_status: PaymentStatus,
    ) -> Result<(), sqlx::Error> {
        query(SET_PAYMENT_STATE_SQL)
            .bind(order.into_i64())
            .bind(status.as_str())
            .bind(payment_status.as_str())
            .execute(&mut **tx)
            .await?;

        Ok(())
    }

    /// Fetch an order, scoped to its owner. Foreign ids resolve to nothing.
    pub(crate) async fn get_order_for_user(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user: UserId,
        order: OrderId,
    ) -> Result<Option<Order>, sqlx::Error> {
        query_as::<Postgres, Order>(GET_ORDER_FOR_USER_SQL)
            .bind(order.into_i64())
            .bind(user.into_i64())
            .fetch_optional(&mut **tx)
            .await
    }

    pub(crate) async fn list_orders_for_user(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user: UserId,
    ) -> Result<Vec<Order>, sqlx::Error> {
        query_as::<Postgres, Order>(LIST_ORDERS_FOR_USER_SQL)
            .bind(user.into_i64())
            .fetch_all(&mut **tx)
            .await
    }
}

impl<'r> FromRow<'r, PgRow> for Order {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: OrderId::from_i64(row.try_get("id")?),
            user_id: UserId::from_i64(row.try_get("user_id")?),
            total: try_get_amount(row, "total")?,
            status: parse_state(row, "status")?,
            payment_method: parse_state(row, "payment_method")?,
            payment_status: parse_state(row, "payment_status")?,
            card_id: row
                .try_get::<Option<i64>, _>("card_id")?
                .map(CardId::from_i64),
            items: Vec::new(),
            created_at: row.try_get::<SqlxTimestamp, _>("created_at")?.to_jiff(),
            updated_at: row.try_get::<SqlxTimestamp, _>("updated_at")?.to_jiff(),
        })
    }
}

fn parse_state<T>(row: &PgRow, col: &str) -> Result<T, sqlx::Error>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.try_get(col)?;

    raw.parse::<T>().map_err(|e| sqlx::Error::ColumnDecode {
        index: col.to_string(),
        source: Box::new(e),
    })
}

pub(super) fn try_get_amount(row: &PgRow, col: &str) -> Result<u64, sqlx::Error> {
    let amount_i64: i64 = row.try_get(col)?;

    u64::try_from(amount_i64).map_err(|e| sqlx::Error::ColumnDecode {
        index: col.to_string(),
        source: Box::new(e),
    })
}

pub(super) fn try_i64_from_u64(value: u64, column: &'static str) -> Result<i64, sqlx::Error> {
    i64::try_from(value).map_err(|e| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(e),
    })
}
