//! Cards service.
//!
//! Simulated tokenization: the PAN is validated, reduced to its last four
//! digits and an opaque token, and the buffer is zeroized. No real gateway
//! is involved.

use async_trait::async_trait;
use mockall::automock;
use rand::{RngCore, rngs::OsRng};
use zeroize::Zeroize;

use crate::{
    database::Db,
    domain::{
        cards::{
            errors::CardsServiceError,
            models::{Card, CardId, NewCard},
            repository::{CardRecord, PgCardsRepository},
        },
        users::models::UserId,
    },
};

/// Number of random bytes behind a card token.
const CARD_TOKEN_BYTES: usize = 16;

#[derive(Debug, Clone)]
pub struct PgCardsService {
    db: Db,
    repository: PgCardsRepository,
}

impl PgCardsService {
    #[must_use]
    pub fn new(db: Db) -> Self {
        Self {
            db,
            repository: PgCardsRepository::new(),
        }
    }
}

#[async_trait]
impl CardsService for PgCardsService {
    async fn add_card(&self, user: UserId, card: NewCard) -> Result<Card, CardsServiceError> {
        let NewCard {
            brand,
            mut number,
            exp_month,
            exp_year,
            is_default,
        } = card;

        let number_valid = (12..=19).contains(&number.len())
            && number.chars().all(|c| c.is_ascii_digit());

        if !number_valid {
            number.zeroize();
            return Err(CardsServiceError::InvalidCardNumber);
        }

        let last4 = number[number.len() - 4..].to_string();

        number.zeroize();

        let record = CardRecord {
            brand,
            last4,
            exp_month,
            exp_year,
            token: generate_token(),
            is_default,
        };

        let mut tx = self.db.begin().await?;

        if record.is_default {
            self.repository.clear_default_cards(&mut tx, user).await?;
        }

        let created = self.repository.create_card(&mut tx, user, record).await?;

        tx.commit().await?;

        Ok(created)
    }

    async fn list_cards(&self, user: UserId) -> Result<Vec<Card>, CardsServiceError> {
        let mut tx = self.db.begin().await?;

        let cards = self.repository.list_cards(&mut tx, user).await?;

        tx.commit().await?;

        Ok(cards)
    }

    async fn delete_card(&self, user: UserId, card: CardId) -> Result<(), CardsServiceError> {
        let mut tx = self.db.begin().await?;

        let rows_affected = self.repository.delete_card(&mut tx, user, card).await?;

        if rows_affected == 0 {
            return Err(CardsServiceError::NotFound);
        }

        tx.commit().await?;

        Ok(())
    }

    async fn set_default_card(&self, user: UserId, card: CardId) -> Result<Card, CardsServiceError> {
        let mut tx = self.db.begin().await?;

        self.repository
            .get_card_for_user(&mut tx, user, card)
            .await?
            .ok_or(CardsServiceError::NotFound)?;

        self.repository.clear_default_cards(&mut tx, user).await?;
        self.repository.set_default_card(&mut tx, user, card).await?;

        let card = self
            .repository
            .get_card_for_user(&mut tx, user, card)
            .await?
            .ok_or(CardsServiceError::NotFound)?;

        tx.commit().await?;

        Ok(card)
    }
}

fn generate_token() -> String {
    let mut bytes = [0u8; CARD_TOKEN_BYTES];

    OsRng.fill_bytes(&mut bytes);

    let hex: String = bytes.iter().map(|byte| format!("{byte:02x}")).collect();

    format!("tok_{hex}")
}

#[automock]
#[async_trait]
pub trait CardsService: Send + Sync {
    /// Tokenize and store a card for the user.
    async fn add_card(&self, user: UserId, card: NewCard) -> Result<Card, CardsServiceError>;

    /// Retrieve the user's stored cards.
    async fn list_cards(&self, user: UserId) -> Result<Vec<Card>, CardsServiceError>;

    /// Delete one of the user's cards.
    async fn delete_card(&self, user: UserId, card: CardId) -> Result<(), CardsServiceError>;

    /// Mark one of the user's cards as the default, clearing any other.
    async fn set_default_card(&self, user: UserId, card: CardId)
    -> Result<Card, CardsServiceError>;
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use crate::test::TestContext;

    use super::*;

    fn new_card(number: &str, is_default: bool) -> NewCard {
        NewCard {
            brand: Some("visa".to_string()),
            number: number.to_string(),
            exp_month: 12,
            exp_year: 2030,
            is_default,
        }
    }

    #[tokio::test]
    async fn add_card_stores_token_and_last4_only() -> TestResult {
        let ctx = TestContext::new().await;

        let card = ctx
            .cards
            .add_card(ctx.user_id, new_card("4242424242424242", false))
            .await?;

        assert_eq!(card.last4, "4242");
        assert!(card.token.starts_with("tok_"));
        assert!(
            !card.token.contains("4242424242424242"),
            "token must not embed the PAN"
        );

        Ok(())
    }

    #[tokio::test]
    async fn add_card_rejects_short_number() {
        let ctx = TestContext::new().await;

        let result = ctx.cards.add_card(ctx.user_id, new_card("42424", false)).await;

        assert!(
            matches!(result, Err(CardsServiceError::InvalidCardNumber)),
            "expected InvalidCardNumber, got {result:?}"
        );
    }

    #[tokio::test]
    async fn add_card_rejects_non_digits() {
        let ctx = TestContext::new().await;

        let result = ctx
            .cards
            .add_card(ctx.user_id, new_card("4242-4242-4242-42", false))
            .await;

        assert!(
            matches!(result, Err(CardsServiceError::InvalidCardNumber)),
            "expected InvalidCardNumber, got {result:?}"
        );
    }

    #[tokio::test]
    async fn add_default_card_clears_previous_default() -> TestResult {
        let ctx = TestContext::new().await;

        let first = ctx
            .cards
            .add_card(ctx.user_id, new_card("4242424242424242", true))
            .await?;

        let second = ctx
            .cards
            .add_card(ctx.user_id, new_card("5555555555554444", true))
            .await?;

        let cards = ctx.cards.list_cards(ctx.user_id).await?;

        let first = cards.iter().find(|c| c.id == first.id).expect("first card");
        let second = cards.iter().find(|c| c.id == second.id).expect("second card");

        assert!(!first.is_default, "older default must be cleared");
        assert!(second.is_default);

        Ok(())
    }

    #[tokio::test]
    async fn set_default_card_moves_flag() -> TestResult {
        let ctx = TestContext::new().await;

        let first = ctx
            .cards
            .add_card(ctx.user_id, new_card("4242424242424242", true))
            .await?;

        let second = ctx
            .cards
            .add_card(ctx.user_id, new_card("5555555555554444", false))
            .await?;

        let updated = ctx.cards.set_default_card(ctx.user_id, second.id).await?;

        assert!(updated.is_default);

        let cards = ctx.cards.list_cards(ctx.user_id).await?;
        let first = cards.iter().find(|c| c.id == first.id).expect("first card");

        assert!(!first.is_default);

        Ok(())
    }

    #[tokio::test]
    async fn delete_card_removes_it() -> TestResult {
        let ctx = TestContext::new().await;

        let card = ctx
            .cards
            .add_card(ctx.user_id, new_card("4242424242424242", false))
            .await?;

        ctx.cards.delete_card(ctx.user_id, card.id).await?;

        let cards = ctx.cards.list_cards(ctx.user_id).await?;

        assert!(cards.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn delete_other_users_card_returns_not_found() -> TestResult {
        let ctx = TestContext::new().await;

        let card = ctx
            .cards
            .add_card(ctx.user_id, new_card("4242424242424242", false))
            .await?;

        let other = ctx.create_user("other@example.com").await;

        let result = ctx.cards.delete_card(other, card.id).await;

        assert!(
            matches!(result, Err(CardsServiceError::NotFound)),
            "expected NotFound for cross-user deletion, got {result:?}"
        );

        let cards = ctx.cards.list_cards(ctx.user_id).await?;

        assert_eq!(cards.len(), 1, "owner's card must survive");

        Ok(())
    }
}
