//! Orders service.
//!
//! Checkout converts a cart into an order inside a single transaction:
//! validate stock, price from snapshots, persist the order, apply an active
//! promotion, materialise line items while decrementing stock, simulate
//! payment, clear the cart. The transaction either commits all of it or none.

use async_trait::async_trait;
use jiff::Timestamp;
use mockall::automock;
use tracing::{Span, info};

use crate::{
    database::Db,
    domain::{
        cards::PgCardsRepository,
        carts::{PgCartItemsRepository, PgCartsRepository},
        orders::{
            errors::OrdersServiceError,
            models::{CheckoutRequest, Order, OrderId, OrderStatus, PaymentMethod, PaymentStatus},
            repositories::{PgOrderItemsRepository, PgOrdersRepository},
        },
        products::PgProductsRepository,
        promotions::{PgPromotionsRepository, models::Promotion},
        users::models::UserId,
    },
};

#[derive(Debug, Clone)]
pub struct PgOrdersService {
    db: Db,
    orders_repository: PgOrdersRepository,
    items_repository: PgOrderItemsRepository,
    carts_repository: PgCartsRepository,
    cart_items_repository: PgCartItemsRepository,
    products_repository: PgProductsRepository,
    promotions_repository: PgPromotionsRepository,
    cards_repository: PgCardsRepository,
}

impl PgOrdersService {
    #[must_use]
    pub fn new(db: Db) -> Self {
        Self {
            db,
            orders_repository: PgOrdersRepository::new(),
            items_repository: PgOrderItemsRepository::new(),
            carts_repository: PgCartsRepository::new(),
            cart_items_repository: PgCartItemsRepository::new(),
            products_repository: PgProductsRepository::new(),
            promotions_repository: PgPromotionsRepository::new(),
            cards_repository: PgCardsRepository::new(),
        }
    }

    /// Resolve the promotion code before the checkout transaction opens.
    ///
    /// Only existence is checked here; whether the promotion is currently
    /// active is decided again at apply time inside the transaction.
    async fn resolve_promotion(
        &self,
        code: Option<&str>,
    ) -> Result<Option<Promotion>, OrdersServiceError> {
        let Some(code) = code else {
            return Ok(None);
        };

        let mut tx = self.db.begin().await?;

        let promotion = self
            .promotions_repository
            .get_promotion_by_code(&mut tx, code)
            .await?
            .ok_or(OrdersServiceError::NotFound)?;

        tx.commit().await?;

        Ok(Some(promotion))
    }
}

#[async_trait]
impl OrdersService for PgOrdersService {
    #[tracing::instrument(
        name = "orders.service.checkout",
        skip(self, request),
        fields(
            user_id = %user,
            payment_method = %request.payment_method,
            has_promo = request.promo_code.is_some(),
            order_id = tracing::field::Empty
        ),
        err
    )]
    async fn checkout(
        &self,
        user: UserId,
        request: CheckoutRequest,
    ) -> Result<Order, OrdersServiceError> {
        let promotion = self.resolve_promotion(request.promo_code.as_deref()).await?;

        let mut tx = self.db.begin().await?;

        let cart = self
            .carts_repository
            .get_cart_by_user(&mut tx, user)
            .await?
            .ok_or(OrdersServiceError::EmptyCart)?;

        let lines = self
            .items_repository
            .lock_cart_lines(&mut tx, cart.id)
            .await?;

        if lines.is_empty() {
            return Err(OrdersServiceError::EmptyCart);
        }

        for line in &lines {
            if line.product_stock < line.quantity {
                return Err(OrdersServiceError::OutOfStock {
                    product: line.product_name.clone(),
                });
            }
        }

        let card = match (request.payment_method, request.card_id) {
            (PaymentMethod::Card, None) => return Err(OrdersServiceError::NotFound),
            (_, Some(card_id)) => Some(
                self.cards_repository
                    .get_card_for_user(&mut tx, user, card_id)
                    .await?
                    .ok_or(OrdersServiceError::NotFound)?,
            ),
            (PaymentMethod::Cod, None) => None,
        };

        // Totals come from the snapshotted unit prices, not the live
        // product rows.
        let total = lines
            .iter()
            .map(|line| line.price.saturating_mul(line.quantity))
            .fold(0u64, u64::saturating_add);

        // From here on any storage failure aborts the whole checkout.
        let mut order = self
            .orders_repository
            .create_order(
                &mut tx,
                user,
                total,
                request.payment_method,
                card.as_ref().map(|card| card.id),
            )
            .await
            .map_err(OrdersServiceError::CheckoutFailed)?;

        if let Some(promotion) = promotion {
            // Existence was proven before the transaction; the window may
            // have moved since, so activity is evaluated again here. An
            // inactive promotion simply leaves the total alone.
            if promotion.is_active(Timestamp::now()) {
                let discounted = promotion.discounted_total(order.total);

                self.orders_repository
                    .update_order_total(&mut tx, order.id, discounted)
                    .await
                    .map_err(OrdersServiceError::CheckoutFailed)?;

                order.total = discounted;
            }
        }

        for line in &lines {
            let item = self
                .items_repository
                .create_order_item(&mut tx, order.id, line)
                .await
                .map_err(OrdersServiceError::CheckoutFailed)?;

            let rows_affected = self
                .products_repository
                .decrement_stock(&mut tx, line.product_id, line.quantity)
                .await
                .map_err(OrdersServiceError::CheckoutFailed)?;

            // The rows were validated under lock above, so a miss here means
            // the conditional decrement itself would have oversold.
            if rows_affected == 0 {
                return Err(OrdersServiceError::OutOfStock {
                    product: line.product_name.clone(),
                });
            }

            order.items.push(item);
        }

        if order.payment_method == PaymentMethod::Card {
            // Simulated gateway: a card charge always succeeds.
            self.orders_repository
                .set_payment_state(&mut tx, order.id, OrderStatus::Paid, PaymentStatus::Paid)
                .await
                .map_err(OrdersServiceError::CheckoutFailed)?;

            order.status = OrderStatus::Paid;
            order.payment_status = PaymentStatus::Paid;
        }

        self.cart_items_repository
            .clear_cart_items(&mut tx, cart.id)
            .await
            .map_err(OrdersServiceError::CheckoutFailed)?;

        tx.commit().await.map_err(OrdersServiceError::CheckoutFailed)?;

        Span::current().record("order_id", tracing::field::display(order.id));

        info!(order_id = %order.id, total = order.total, "checkout committed");

        Ok(order)
    }

    async fn list_orders(&self, user: UserId) -> Result<Vec<Order>, OrdersServiceError> {
        let mut tx = self.db.begin().await?;

        let mut orders = self
            .orders_repository
            .list_orders_for_user(&mut tx, user)
            .await?;

        for order in &mut orders {
            order.items = self.items_repository.get_order_items(&mut tx, order.id).await?;
        }

        tx.commit().await?;

        Ok(orders)
    }

    async fn get_order(&self, user: UserId, order: OrderId) -> Result<Order, OrdersServiceError> {
        let mut tx = self.db.begin().await?;

        let mut order = self
            .orders_repository
            .get_order_for_user(&mut tx, user, order)
            .await?
            .ok_or(OrdersServiceError::NotFound)?;

        order.items = self.items_repository.get_order_items(&mut tx, order.id).await?;

        tx.commit().await?;

        Ok(order)
    }
}

#[automock]
#[async_trait]
pub trait OrdersService: Send + Sync {
    /// Convert the user's cart into an order, atomically.
    async fn checkout(
        &self,
        user: UserId,
        request: CheckoutRequest,
    ) -> Result<Order, OrdersServiceError>;

    /// Retrieve the user's orders with items, newest first.
    async fn list_orders(&self, user: UserId) -> Result<Vec<Order>, OrdersServiceError>;

    /// Retrieve a single order with items.
    async fn get_order(&self, user: UserId, order: OrderId) -> Result<Order, OrdersServiceError>;
}

#[cfg(test)]
mod tests {
    use jiff::Timestamp;
    use testresult::TestResult;

    use crate::{
        domain::{
            cards::{CardsService, models::NewCard},
            carts::CartsService,
            products::{ProductsService, models::ProductUpdate},
            promotions::{
                PromotionsService,
                models::{NewPromotion, PromotionKind},
            },
        },
        test::{TestContext, helpers},
    };

    use super::*;

    fn cod() -> CheckoutRequest {
        CheckoutRequest {
            payment_method: PaymentMethod::Cod,
            card_id: None,
            promo_code: None,
        }
    }

    fn cod_with_promo(code: &str) -> CheckoutRequest {
        CheckoutRequest {
            promo_code: Some(code.to_string()),
            ..cod()
        }
    }

    #[tokio::test]
    async fn checkout_cod_creates_pending_order() -> TestResult {
        let ctx = TestContext::new().await;
        let mug = helpers::create_product(&ctx, "Mug", 10_00, 5).await?;
        let pot = helpers::create_product(&ctx, "Pot", 25_00, 5).await?;

        ctx.carts.add_item(ctx.user_id, mug.id, 2).await?;
        ctx.carts.add_item(ctx.user_id, pot.id, 1).await?;

        let order = ctx.orders.checkout(ctx.user_id, cod()).await?;

        assert_eq!(order.total, 45_00);
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.payment_status, PaymentStatus::Pending);
        assert_eq!(order.payment_method, PaymentMethod::Cod);
        assert_eq!(order.items.len(), 2);

        let mug_line = order
            .items
            .iter()
            .find(|item| item.product_id == mug.id)
            .expect("mug line should exist");

        assert_eq!(mug_line.quantity, 2);
        assert_eq!(mug_line.price, 10_00);

        let mug = ctx.products.get_product(mug.id).await?;
        let pot = ctx.products.get_product(pot.id).await?;

        assert_eq!(mug.stock, 3, "stock must drop by the ordered quantity");
        assert_eq!(pot.stock, 4);

        let cart = ctx
            .carts
            .get_cart(ctx.user_id)
            .await?
            .expect("cart row should persist");

        assert!(cart.items.is_empty(), "checkout must clear the cart");

        Ok(())
    }

    #[tokio::test]
    async fn checkout_card_marks_order_paid() -> TestResult {
        let ctx = TestContext::new().await;
        let product = helpers::create_product(&ctx, "Mug", 10_00, 5).await?;

        ctx.carts.add_item(ctx.user_id, product.id, 1).await?;

        let card = ctx
            .cards
            .add_card(
                ctx.user_id,
                NewCard {
                    brand: Some("visa".to_string()),
                    number: "4242424242424242".to_string(),
                    exp_month: 12,
                    exp_year: 2030,
                    is_default: true,
                },
            )
            .await?;

        let order = ctx
            .orders
            .checkout(
                ctx.user_id,
                CheckoutRequest {
                    payment_method: PaymentMethod::Card,
                    card_id: Some(card.id),
                    promo_code: None,
                },
            )
            .await?;

        assert_eq!(order.status, OrderStatus::Paid);
        assert_eq!(order.payment_status, PaymentStatus::Paid);
        assert_eq!(order.card_id, Some(card.id));

        Ok(())
    }

    #[tokio::test]
    async fn checkout_card_without_card_id_returns_not_found() -> TestResult {
        let ctx = TestContext::new().await;
        let product = helpers::create_product(&ctx, "Mug", 10_00, 5).await?;

        ctx.carts.add_item(ctx.user_id, product.id, 1).await?;

        let result = ctx
            .orders
            .checkout(
                ctx.user_id,
                CheckoutRequest {
                    payment_method: PaymentMethod::Card,
                    card_id: None,
                    promo_code: None,
                },
            )
            .await;

        assert!(
            matches!(result, Err(OrdersServiceError::NotFound)),
            "expected NotFound, got {result:?}"
        );

        Ok(())
    }

    #[tokio::test]
    async fn checkout_with_other_users_card_returns_not_found() -> TestResult {
        let ctx = TestContext::new().await;
        let product = helpers::create_product(&ctx, "Mug", 10_00, 5).await?;

        ctx.carts.add_item(ctx.user_id, product.id, 1).await?;

        let other = ctx.create_user("other@example.com").await;
        let foreign_card = ctx
            .cards
            .add_card(
                other,
                NewCard {
                    brand: None,
                    number: "4242424242424242".to_string(),
                    exp_month: 12,
                    exp_year: 2030,
                    is_default: false,
                },
            )
            .await?;

        let result = ctx
            .orders
            .checkout(
                ctx.user_id,
                CheckoutRequest {
                    payment_method: PaymentMethod::Card,
                    card_id: Some(foreign_card.id),
                    promo_code: None,
                },
            )
            .await;

        assert!(
            matches!(result, Err(OrdersServiceError::NotFound)),
            "expected NotFound for a foreign card, got {result:?}"
        );

        Ok(())
    }

    #[tokio::test]
    async fn checkout_empty_cart_errors() -> TestResult {
        let ctx = TestContext::new().await;

        // No cart at all.
        let result = ctx.orders.checkout(ctx.user_id, cod()).await;

        assert!(
            matches!(result, Err(OrdersServiceError::EmptyCart)),
            "expected EmptyCart, got {result:?}"
        );

        // A cart row with no items behaves the same.
        let product = helpers::create_product(&ctx, "Mug", 10_00, 5).await?;
        let cart = ctx.carts.add_item(ctx.user_id, product.id, 1).await?;
        ctx.carts.remove_item(ctx.user_id, cart.items[0].id).await?;

        let result = ctx.orders.checkout(ctx.user_id, cod()).await;

        assert!(
            matches!(result, Err(OrdersServiceError::EmptyCart)),
            "expected EmptyCart for an emptied cart, got {result:?}"
        );

        Ok(())
    }

    #[tokio::test]
    async fn checkout_out_of_stock_leaves_everything_untouched() -> TestResult {
        let ctx = TestContext::new().await;
        let product = helpers::create_product(&ctx, "Mug", 10_00, 2).await?;

        ctx.carts.add_item(ctx.user_id, product.id, 2).await?;

        // Stock shrinks between add and checkout.
        ctx.products
            .update_product(
                product.id,
                ProductUpdate {
                    stock: Some(1),
                    ..ProductUpdate::default()
                },
            )
            .await?;

        let result = ctx.orders.checkout(ctx.user_id, cod()).await;

        assert!(
            matches!(result, Err(OrdersServiceError::OutOfStock { ref product }) if product == "Mug"),
            "expected OutOfStock, got {result:?}"
        );

        let orders = ctx.orders.list_orders(ctx.user_id).await?;
        assert!(orders.is_empty(), "no order may exist after the failure");

        let cart = ctx
            .carts
            .get_cart(ctx.user_id)
            .await?
            .expect("cart should exist");
        assert_eq!(cart.items.len(), 1, "cart must be untouched");

        Ok(())
    }

    #[tokio::test]
    async fn checkout_applies_percent_promotion() -> TestResult {
        let ctx = TestContext::new().await;
        let product = helpers::create_product(&ctx, "Mug", 100_00, 5).await?;

        ctx.carts.add_item(ctx.user_id, product.id, 2).await?;

        ctx.promotions
            .create_promotion(NewPromotion {
                code: "TEN".to_string(),
                kind: PromotionKind::Percent,
                value: 10,
                starts_at: None,
                ends_at: None,
                active: true,
            })
            .await?;

        let order = ctx
            .orders
            .checkout(ctx.user_id, cod_with_promo("TEN"))
            .await?;

        assert_eq!(order.total, 180_00, "10% off 200.00 is 180.00");

        Ok(())
    }

    #[tokio::test]
    async fn checkout_fixed_promotion_clamps_total_to_zero() -> TestResult {
        let ctx = TestContext::new().await;
        let product = helpers::create_product(&ctx, "Mug", 30_00, 5).await?;

        ctx.carts.add_item(ctx.user_id, product.id, 1).await?;

        ctx.promotions
            .create_promotion(NewPromotion {
                code: "FIFTY".to_string(),
                kind: PromotionKind::Fixed,
                value: 50_00,
                starts_at: None,
                ends_at: None,
                active: true,
            })
            .await?;

        let order = ctx
            .orders
            .checkout(ctx.user_id, cod_with_promo("FIFTY"))
            .await?;

        assert_eq!(order.total, 0, "fixed 50.00 off 30.00 clamps to zero");

        Ok(())
    }

    #[tokio::test]
    async fn checkout_ignores_disabled_promotion() -> TestResult {
        let ctx = TestContext::new().await;
        let product = helpers::create_product(&ctx, "Mug", 100_00, 5).await?;

        ctx.carts.add_item(ctx.user_id, product.id, 1).await?;

        ctx.promotions
            .create_promotion(NewPromotion {
                code: "OFF".to_string(),
                kind: PromotionKind::Percent,
                value: 50,
                starts_at: None,
                ends_at: None,
                active: false,
            })
            .await?;

        let order = ctx
            .orders
            .checkout(ctx.user_id, cod_with_promo("OFF"))
            .await?;

        assert_eq!(order.total, 100_00, "disabled promotion applies nothing");

        Ok(())
    }

    #[tokio::test]
    async fn checkout_ignores_promotion_outside_window() -> TestResult {
        let ctx = TestContext::new().await;
        let product = helpers::create_product(&ctx, "Mug", 100_00, 5).await?;

        ctx.carts.add_item(ctx.user_id, product.id, 1).await?;

        let now = Timestamp::now();

        ctx.promotions
            .create_promotion(NewPromotion {
                code: "EXPIRED".to_string(),
                kind: PromotionKind::Percent,
                value: 50,
                starts_at: Some(now - jiff::Span::new().hours(48)),
                ends_at: Some(now - jiff::Span::new().hours(24)),
                active: true,
            })
            .await?;

        let order = ctx
            .orders
            .checkout(ctx.user_id, cod_with_promo("EXPIRED"))
            .await?;

        assert_eq!(order.total, 100_00, "expired promotion applies nothing");

        Ok(())
    }

    #[tokio::test]
    async fn checkout_unknown_promo_code_returns_not_found() -> TestResult {
        let ctx = TestContext::new().await;
        let product = helpers::create_product(&ctx, "Mug", 10_00, 5).await?;

        ctx.carts.add_item(ctx.user_id, product.id, 1).await?;

        let result = ctx
            .orders
            .checkout(ctx.user_id, cod_with_promo("NOPE"))
            .await;

        assert!(
            matches!(result, Err(OrdersServiceError::NotFound)),
            "expected NotFound for unknown promo code, got {result:?}"
        );

        Ok(())
    }

    #[tokio::test]
    async fn checkout_totals_use_price_snapshots() -> TestResult {
        let ctx = TestContext::new().await;
        let product = helpers::create_product(&ctx, "Mug", 10_00, 5).await?;

        ctx.carts.add_item(ctx.user_id, product.id, 2).await?;

        // The live price moves after the item was added.
        ctx.products
            .update_product(
                product.id,
                ProductUpdate {
                    price: Some(99_00),
                    ..ProductUpdate::default()
                },
            )
            .await?;

        let order = ctx.orders.checkout(ctx.user_id, cod()).await?;

        assert_eq!(order.total, 20_00, "total must use the snapshot price");
        assert_eq!(order.items[0].price, 10_00);

        Ok(())
    }

    #[tokio::test]
    async fn checkout_failure_rolls_back_all_writes() -> TestResult {
        let ctx = TestContext::new().await;
        let product = helpers::create_product(&ctx, "Mug", 10_00, 5).await?;

        ctx.carts.add_item(ctx.user_id, product.id, 2).await?;

        // Inject a storage failure between order creation and line-item
        // materialisation.
        sqlx::query(
            "CREATE FUNCTION order_items_boom() RETURNS trigger AS $$ \
             BEGIN RAISE EXCEPTION 'injected storage failure'; END $$ \
             LANGUAGE plpgsql",
        )
        .execute(ctx.db.pool())
        .await?;

        sqlx::query(
            "CREATE TRIGGER order_items_boom BEFORE INSERT ON order_items \
             FOR EACH ROW EXECUTE FUNCTION order_items_boom()",
        )
        .execute(ctx.db.pool())
        .await?;

        let result = ctx.orders.checkout(ctx.user_id, cod()).await;

        assert!(
            matches!(result, Err(OrdersServiceError::CheckoutFailed(_))),
            "expected CheckoutFailed, got {result:?}"
        );

        sqlx::query("DROP TRIGGER order_items_boom ON order_items")
            .execute(ctx.db.pool())
            .await?;

        let product = ctx.products.get_product(product.id).await?;
        assert_eq!(product.stock, 5, "no stock decrement may survive the abort");

        let orders = ctx.orders.list_orders(ctx.user_id).await?;
        assert!(orders.is_empty(), "no order row may survive the abort");

        let cart = ctx
            .carts
            .get_cart(ctx.user_id)
            .await?
            .expect("cart should exist");
        assert_eq!(cart.items.len(), 1, "cart must be untouched");

        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_checkouts_do_not_oversell() -> TestResult {
        let ctx = TestContext::new().await;
        let product = helpers::create_product(&ctx, "Limited", 10_00, 5).await?;

        let mut users = Vec::new();

        for i in 0..5 {
            let user = ctx.create_user(&format!("buyer{i}@example.com")).await;

            ctx.carts.add_item(user, product.id, 2).await?;
            users.push(user);
        }

        let mut handles = Vec::new();

        for user in users {
            let orders = ctx.orders.clone();

            handles.push(tokio::spawn(async move { orders.checkout(user, cod()).await }));
        }

        let mut succeeded = 0;
        let mut out_of_stock = 0;

        for handle in handles {
            match handle.await? {
                Ok(_) => succeeded += 1,
                Err(OrdersServiceError::OutOfStock { .. }) => out_of_stock += 1,
                Err(error) => return Err(error.into()),
            }
        }

        assert_eq!(succeeded, 2, "stock 5 admits exactly two checkouts of 2");
        assert_eq!(out_of_stock, 3);

        let product = ctx.products.get_product(product.id).await?;

        assert_eq!(product.stock, 1, "5 - 2*2 units must remain, never less");

        Ok(())
    }

    #[tokio::test]
    async fn list_orders_returns_newest_first_with_items() -> TestResult {
        let ctx = TestContext::new().await;
        let product = helpers::create_product(&ctx, "Mug", 10_00, 10).await?;

        ctx.carts.add_item(ctx.user_id, product.id, 1).await?;
        let first = ctx.orders.checkout(ctx.user_id, cod()).await?;

        ctx.carts.add_item(ctx.user_id, product.id, 2).await?;
        let second = ctx.orders.checkout(ctx.user_id, cod()).await?;

        let orders = ctx.orders.list_orders(ctx.user_id).await?;

        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0].id, second.id, "newest order comes first");
        assert_eq!(orders[1].id, first.id);
        assert_eq!(orders[0].items.len(), 1);
        assert_eq!(orders[0].items[0].quantity, 2);

        Ok(())
    }

    #[tokio::test]
    async fn get_order_returns_items() -> TestResult {
        let ctx = TestContext::new().await;
        let product = helpers::create_product(&ctx, "Mug", 10_00, 5).await?;

        ctx.carts.add_item(ctx.user_id, product.id, 2).await?;
        let order = ctx.orders.checkout(ctx.user_id, cod()).await?;

        let fetched = ctx.orders.get_order(ctx.user_id, order.id).await?;

        assert_eq!(fetched.id, order.id);
        assert_eq!(fetched.items.len(), 1);
        assert_eq!(fetched.items[0].product_name, "Mug");

        Ok(())
    }

    #[tokio::test]
    async fn get_order_for_other_user_returns_not_found() -> TestResult {
        let ctx = TestContext::new().await;
        let product = helpers::create_product(&ctx, "Mug", 10_00, 5).await?;

        ctx.carts.add_item(ctx.user_id, product.id, 1).await?;
        let order = ctx.orders.checkout(ctx.user_id, cod()).await?;

        let other = ctx.create_user("other@example.com").await;

        let result = ctx.orders.get_order(other, order.id).await;

        assert!(
            matches!(result, Err(OrdersServiceError::NotFound)),
            "expected NotFound for cross-user access, got {result:?}"
        );

        Ok(())
    }
}
