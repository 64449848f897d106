//! Promotions Service

use async_trait::async_trait;
use mockall::automock;
use tracing::info;

use crate::{
    database::Db,
    domain::promotions::{
        errors::PromotionsServiceError,
        models::{NewPromotion, Promotion, PromotionId},
        repository::PgPromotionsRepository,
    },
};

#[derive(Debug, Clone)]
pub struct PgPromotionsService {
    db: Db,
    repository: PgPromotionsRepository,
}

impl PgPromotionsService {
    #[must_use]
    pub fn new(db: Db) -> Self {
        Self {
            db,
            repository: PgPromotionsRepository::new(),
        }
    }
}

#[async_trait]
impl PromotionsService for PgPromotionsService {
    #[tracing::instrument(
        name = "promotions.service.create_promotion",
        skip(self, promotion),
        fields(code = %promotion.code, kind = %promotion.kind),
        err
    )]
    async fn create_promotion(
        &self,
        promotion: NewPromotion,
    ) -> Result<Promotion, PromotionsServiceError> {
        let mut tx = self.db.begin().await?;

        let created = self.repository.create_promotion(&mut tx, promotion).await?;

        tx.commit().await?;

        info!(promotion_id = %created.id, "created promotion");

        Ok(created)
    }

    async fn get_promotion_by_code(
        &self,
        code: &str,
    ) -> Result<Promotion, PromotionsServiceError> {
        let mut tx = self.db.begin().await?;

        let promotion = self
            .repository
            .get_promotion_by_code(&mut tx, code)
            .await?
            .ok_or(PromotionsServiceError::NotFound)?;

        tx.commit().await?;

        Ok(promotion)
    }

    async fn list_promotions(&self) -> Result<Vec<Promotion>, PromotionsServiceError> {
        let mut tx = self.db.begin().await?;

        let promotions = self.repository.list_promotions(&mut tx).await?;

        tx.commit().await?;

        Ok(promotions)
    }

    #[tracing::instrument(name = "promotions.service.delete_promotion", skip(self), err)]
    async fn delete_promotion(
        &self,
        promotion: PromotionId,
    ) -> Result<(), PromotionsServiceError> {
        let mut tx = self.db.begin().await?;

        let rows_affected = self.repository.delete_promotion(&mut tx, promotion).await?;

        if rows_affected == 0 {
            return Err(PromotionsServiceError::NotFound);
        }

        tx.commit().await?;

        info!(promotion_id = %promotion, "deleted promotion");

        Ok(())
    }
}

#[automock]
#[async_trait]
pub trait PromotionsService: Send + Sync {
    /// Creates a new promotion code.
    async fn create_promotion(
        &self,
        promotion: NewPromotion,
    ) -> Result<Promotion, PromotionsServiceError>;

    /// Look up a promotion by its code.
    async fn get_promotion_by_code(&self, code: &str)
    -> Result<Promotion, PromotionsServiceError>;

    /// Retrieves all promotions, newest first.
    async fn list_promotions(&self) -> Result<Vec<Promotion>, PromotionsServiceError>;

    /// Deletes a promotion.
    async fn delete_promotion(&self, promotion: PromotionId)
    -> Result<(), PromotionsServiceError>;
}

#[cfg(test)]
mod tests {
    use jiff::Timestamp;
    use testresult::TestResult;

    use crate::{domain::promotions::models::PromotionKind, test::TestContext};

    use super::*;

    fn new_promotion(code: &str) -> NewPromotion {
        NewPromotion {
            code: code.to_string(),
            kind: PromotionKind::Percent,
            value: 10,
            starts_at: None,
            ends_at: None,
            active: true,
        }
    }

    #[tokio::test]
    async fn create_promotion_returns_row() -> TestResult {
        let ctx = TestContext::new().await;

        let promotion = ctx
            .promotions
            .create_promotion(new_promotion("SPRING10"))
            .await?;

        assert_eq!(promotion.code, "SPRING10");
        assert_eq!(promotion.kind, PromotionKind::Percent);
        assert_eq!(promotion.value, 10);
        assert!(promotion.active);

        Ok(())
    }

    #[tokio::test]
    async fn duplicate_code_returns_already_exists() -> TestResult {
        let ctx = TestContext::new().await;

        ctx.promotions
            .create_promotion(new_promotion("TWICE"))
            .await?;

        let result = ctx.promotions.create_promotion(new_promotion("TWICE")).await;

        assert!(
            matches!(result, Err(PromotionsServiceError::AlreadyExists)),
            "expected AlreadyExists, got {result:?}"
        );

        Ok(())
    }

    #[tokio::test]
    async fn get_promotion_by_code_round_trips_window() -> TestResult {
        let ctx = TestContext::new().await;

        let starts_at = Timestamp::now();
        let ends_at = starts_at + jiff::Span::new().hours(48);

        ctx.promotions
            .create_promotion(NewPromotion {
                code: "WINDOW".to_string(),
                kind: PromotionKind::Fixed,
                value: 5_00,
                starts_at: Some(starts_at),
                ends_at: Some(ends_at),
                active: true,
            })
            .await?;

        let promotion = ctx.promotions.get_promotion_by_code("WINDOW").await?;

        assert_eq!(promotion.kind, PromotionKind::Fixed);
        assert!(promotion.starts_at.is_some());
        assert!(promotion.ends_at.is_some());
        assert!(promotion.is_active(Timestamp::now()));

        Ok(())
    }

    #[tokio::test]
    async fn get_promotion_unknown_code_returns_not_found() {
        let ctx = TestContext::new().await;

        let result = ctx.promotions.get_promotion_by_code("MISSING").await;

        assert!(
            matches!(result, Err(PromotionsServiceError::NotFound)),
            "expected NotFound, got {result:?}"
        );
    }

    #[tokio::test]
    async fn list_promotions_returns_created_codes() -> TestResult {
        let ctx = TestContext::new().await;

        ctx.promotions
            .create_promotion(new_promotion("FIRST"))
            .await?;
        ctx.promotions
            .create_promotion(new_promotion("SECOND"))
            .await?;

        let promotions = ctx.promotions.list_promotions().await?;
        let codes: Vec<&str> = promotions.iter().map(|p| p.code.as_str()).collect();

        assert!(codes.contains(&"FIRST"));
        assert!(codes.contains(&"SECOND"));

        Ok(())
    }

    #[tokio::test]
    async fn delete_promotion_makes_it_not_found() -> TestResult {
        let ctx = TestContext::new().await;

        let promotion = ctx
            .promotions
            .create_promotion(new_promotion("GONE"))
            .await?;

        ctx.promotions.delete_promotion(promotion.id).await?;

        let result = ctx.promotions.get_promotion_by_code("GONE").await;

        assert!(
            matches!(result, Err(PromotionsServiceError::NotFound)),
            "expected NotFound after deletion, got {result:?}"
        );

        Ok(())
    }

    #[tokio::test]
    async fn delete_promotion_unknown_id_returns_not_found() {
        let ctx = TestContext::new().await;

        let result = ctx
            .promotions
            .delete_promotion(PromotionId::from_i64(9_999_999))
            .await;

        assert!(
            matches!(result, Err(PromotionsServiceError::NotFound)),
            "expected NotFound, got {result:?}"
        );
    }
}
