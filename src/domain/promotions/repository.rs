//! Promotions Repository

use jiff_sqlx::Timestamp as SqlxTimestamp;
use sqlx::{FromRow, Postgres, Row, Transaction, postgres::PgRow, query, query_as};

use crate::domain::promotions::models::{NewPromotion, Promotion, PromotionId, PromotionKind};

const GET_PROMOTION_BY_CODE_SQL: &str = include_str!("sql/get_promotion_by_code.sql");
const CREATE_PROMOTION_SQL: &str = include_str!("sql/create_promotion.sql");
const LIST_PROMOTIONS_SQL: &str = include_str!("sql/list_promotions.sql");
const DELETE_PROMOTION_SQL: &str = include_str!("sql/delete_promotion.sql");

#[derive(Debug, Clone, Default)]
pub(crate) struct PgPromotionsRepository;

impl PgPromotionsRepository {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self
    }

    pub(crate) async fn get_promotion_by_code(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        code: &str,
    ) -> Result<Option<Promotion>, sqlx::Error> {
        query_as::<Postgres, Promotion>(GET_PROMOTION_BY_CODE_SQL)
            .bind(code)
            .fetch_optional(&mut **tx)
            .await
    }

    pub(crate) async fn create_promotion(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        promotion: NewPromotion,
    ) -> Result<Promotion, sqlx::Error> {
        query_as::<Postgres, Promotion>(CREATE_PROMOTION_SQL)
            .bind(promotion.code)
            .bind(promotion.kind.as_str())
            .bind(try_i64_from_u64(promotion.value, "value")?)
            .bind(promotion.starts_at.map(SqlxTimestamp::from))
            .bind(promotion.ends_at.map(SqlxTimestamp::from))
            .bind(promotion.active)
            .fetch_one(&mut **tx)
            .await
    }

    pub(crate) async fn list_promotions(
        &self,
        tx: &mut Transaction<'_, Postgres>,
    ) -> Result<Vec<Promotion>, sqlx::Error> {
        query_as::<Postgres, Promotion>(LIST_PROMOTIONS_SQL)
            .fetch_all(&mut **tx)
            .await
    }

    pub(crate) async fn delete_promotion(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        promotion: PromotionId,
    ) -> Result<u64, sqlx::Error> {
        let rows_affected = query(DELETE_PROMOTION_SQL)
            .bind(promotion.into_i64())
            .execute(&mut **tx)
            .await?
            .rows_affected();

        Ok(rows_affected)
    }
}

impl<'r> FromRow<'r, PgRow> for Promotion {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        let kind: String = row.try_get("kind")?;
        let kind = kind
            .parse::<PromotionKind>()
            .map_err(|e| sqlx::Error::ColumnDecode {
                index: "kind".to_string(),
                source: Box::new(e),
            })?;

        let value_i64: i64 = row.try_get("value")?;
        let value = u64::try_from(value_i64).map_err(|e| sqlx::Error::ColumnDecode {
            index: "value".to_string(),
            source: Box::new(e),
        })?;

        Ok(Self {
            id: PromotionId::from_i64(row.try_get("id")?),
            code: row.try_get("code")?,
            kind,
            value,
            starts_at: row
                .try_get::<Option<SqlxTimestamp>, _>("starts_at")?
                .map(SqlxTimestamp::to_jiff),
            ends_at: row
                .try_get::<Option<SqlxTimestamp>, _>("ends_at")?
                .map(SqlxTimestamp::to_jiff),
            active: row.try_get("active")?,
            created_at: row.try_get::<SqlxTimestamp, _>("created_at")?.to_jiff(),
            updated_at: row.try_get::<SqlxTimestamp, _>("updated_at")?.to_jiff(),
        })
    }
}

fn try_i64_from_u64(value: u64, column: &'static str) -> Result<i64, sqlx::Error> {
    i64::try_from(value).map_err(|e| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(e),
    })
}
