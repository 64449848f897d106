//! Cards Repository

use jiff_sqlx::Timestamp as SqlxTimestamp;
use sqlx::{FromRow, Postgres, Row, Transaction, postgres::PgRow, query, query_as};

use crate::domain::{
    cards::models::{Card, CardId},
    users::models::UserId,
};

const CREATE_CARD_SQL: &str = include_str!("sql/create_card.sql");
const LIST_CARDS_SQL: &str = include_str!("sql/list_cards.sql");
const GET_CARD_FOR_USER_SQL: &str = include_str!("sql/get_card_for_user.sql");
const DELETE_CARD_SQL: &str = include_str!("sql/delete_card.sql");
const CLEAR_DEFAULT_CARDS_SQL: &str = include_str!("sql/clear_default_cards.sql");
const SET_DEFAULT_CARD_SQL: &str = include_str!("sql/set_default_card.sql");

/// Tokenized card fields as written to storage.
pub(crate) struct CardRecord {
    pub brand: Option<String>,
    pub last4: String,
    pub exp_month: i16,
    pub exp_year: i16,
    pub token: String,
    pub is_default: bool,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct PgCardsRepository;

impl PgCardsRepository {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self
    }

    pub(crate) async fn create_card(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user: UserId,
        record: CardRecord,
    ) -> Result<Card, sqlx::Error> {
        query_as::<Postgres, Card>(CREATE_CARD_SQL)
            .bind(user.into_i64())
            .bind(record.brand)
            .bind(record.last4)
            .bind(record.exp_month)
            .bind(record.exp_year)
            .bind(record.token)
            .bind(record.is_default)
            .fetch_one(&mut **tx)
            .await
    }

    pub(crate) async fn list_cards(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user: UserId,
    ) -> Result<Vec<Card>, sqlx::Error> {
        query_as::<Postgres, Card>(LIST_CARDS_SQL)
            .bind(user.into_i64())
            .fetch_all(&mut **tx)
            .await
    }

    /// Fetch a card, scoped to its owner. Foreign ids resolve to nothing.
    pub(crate) async fn get_card_for_user(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user: UserId,
        card: CardId,
    ) -> Result<Option<Card>, sqlx::Error> {
        query_as::<Postgres, Card>(GET_CARD_FOR_USER_SQL)
            .bind(card.into_i64())
            .bind(user.into_i64())
            .fetch_optional(&mut **tx)
            .await
    }

    pub(crate) async fn delete_card(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user: UserId,
        card: CardId,
    ) -> Result<u64, sqlx::Error> {
        let rows_affected = query(DELETE_CARD_SQL)
            .bind(card.into_i64())
            .bind(user.into_i64())
            .execute(&mut **tx)
            .await?
            .rows_affected();

        Ok(rows_affected)
    }

    pub(crate) async fn clear_default_cards(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user: UserId,
    ) -> Result<(), sqlx::Error> {
        query(CLEAR_DEFAULT_CARDS_SQL)
            .bind(user.into_i64())
            .execute(&mut **tx)
            .await?;

        Ok(())
    }

    pub(crate) async fn set_default_card(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user: UserId,
        card: CardId,
    ) -> Result<u64, sqlx::Error> {
        let rows_affected = query(SET_DEFAULT_CARD_SQL)
            .bind(card.into_i64())
            .bind(user.into_i64())
            .execute(&mut **tx)
            .await?
            .rows_affected();

        Ok(rows_affected)
    }
}

impl<'r> FromRow<'r, PgRow> for Card {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: CardId::from_i64(row.try_get("id")?),
            user_id: UserId::from_i64(row.try_get("user_id")?),
            brand: row.try_get("brand")?,
            last4: row.try_get("last4")?,
            exp_month: row.try_get("exp_month")?,
            exp_year: row.try_get("exp_year")?,
            token: row.try_get("token")?,
            is_default: row.try_get("is_default")?,
            created_at: row.try_get::<SqlxTimestamp, _>("created_at")?.to_jiff(),
            updated_at: row.try_get::<SqlxTimestamp, _>("updated_at")?.to_jiff(),
        })
    }
}
