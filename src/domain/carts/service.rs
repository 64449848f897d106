//! Carts service.

use async_trait::async_trait;
use mockall::automock;
use sqlx::{Postgres, Transaction};

use crate::{
    database::Db,
    domain::{
        carts::{
            errors::CartsServiceError,
            models::{Cart, CartItemId, GuestCartEntry},
            repositories::{PgCartItemsRepository, PgCartsRepository},
        },
        products::{PgProductsRepository, models::ProductId},
        users::models::UserId,
    },
};

#[derive(Debug, Clone)]
pub struct PgCartsService {
    db: Db,
    carts_repository: PgCartsRepository,
    items_repository: PgCartItemsRepository,
    products_repository: PgProductsRepository,
}

impl PgCartsService {
    #[must_use]
    pub fn new(db: Db) -> Self {
        Self {
            db,
            carts_repository: PgCartsRepository::new(),
            items_repository: PgCartItemsRepository::new(),
            products_repository: PgProductsRepository::new(),
        }
    }

    async fn load_items(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        mut cart: Cart,
    ) -> Result<Cart, CartsServiceError> {
        let items = self.items_repository.get_cart_items(tx, cart.id).await?;

        cart.items = items;

        Ok(cart)
    }
}

#[async_trait]
impl CartsService for PgCartsService {
    async fn get_cart(&self, user: UserId) -> Result<Option<Cart>, CartsServiceError> {
        let mut tx = self.db.begin().await?;

        let Some(cart) = self.carts_repository.get_cart_by_user(&mut tx, user).await? else {
            return Ok(None);
        };

        let cart = self.load_items(&mut tx, cart).await?;

        tx.commit().await?;

        Ok(Some(cart))
    }

    async fn add_item(
        &self,
        user: UserId,
        product: ProductId,
        quantity: u64,
    ) -> Result<Cart, CartsServiceError> {
        let mut tx = self.db.begin().await?;

        let product = self
            .products_repository
            .get_product_for_update(&mut tx, product)
            .await?
            .ok_or(CartsServiceError::NotFound)?;

        let cart = self.carts_repository.get_or_create_cart(&mut tx, user).await?;

        let existing = self
            .items_repository
            .find_item_by_product(&mut tx, cart.id, product.id)
            .await?;

        // The whole requested line, not just the increment, must fit the
        // current stock.
        let combined = existing
            .as_ref()
            .map_or(quantity, |item| item.quantity.saturating_add(quantity));

        if product.stock < combined {
            return Err(CartsServiceError::OutOfStock {
                product: product.name,
            });
        }

        self.items_repository
            .upsert_item(&mut tx, cart.id, product.id, quantity, product.price)
            .await?;

        let cart = self.load_items(&mut tx, cart).await?;

        tx.commit().await?;

        Ok(cart)
    }

    async fn set_item_quantity(
        &self,
        user: UserId,
        item: CartItemId,
        quantity: u64,
    ) -> Result<Cart, CartsServiceError> {
        let mut tx = self.db.begin().await?;

        let cart = self
            .carts_repository
            .get_cart_by_user(&mut tx, user)
            .await?
            .ok_or(CartsServiceError::NotFound)?;

        let item = self
            .items_repository
            .get_cart_item(&mut tx, cart.id, item)
            .await?
            .ok_or(CartsServiceError::NotFound)?;

        if quantity == 0 {
            self.items_repository
                .delete_item(&mut tx, cart.id, item.id)
                .await?;
        } else {
            let product = self
                .products_repository
                .get_product_for_update(&mut tx, item.product_id)
                .await?
                .ok_or(CartsServiceError::NotFound)?;

            if product.stock < quantity {
                return Err(CartsServiceError::OutOfStock {
                    product: product.name,
                });
            }

            self.items_repository
                .set_item_quantity(&mut tx, cart.id, item.id, quantity)
                .await?;
        }

        let cart = self.load_items(&mut tx, cart).await?;

        tx.commit().await?;

        Ok(cart)
    }

    async fn remove_item(&self, user: UserId, item: CartItemId) -> Result<(), CartsServiceError> {
        let mut tx = self.db.begin().await?;

        let cart = self
            .carts_repository
            .get_cart_by_user(&mut tx, user)
            .await?
            .ok_or(CartsServiceError::NotFound)?;

        let rows_affected = self.items_repository.delete_item(&mut tx, cart.id, item).await?;

        if rows_affected == 0 {
            return Err(CartsServiceError::NotFound);
        }

        tx.commit().await?;

        Ok(())
    }

    async fn clear_cart(&self, user: UserId) -> Result<(), CartsServiceError> {
        let mut tx = self.db.begin().await?;

        if let Some(cart) = self.carts_repository.get_cart_by_user(&mut tx, user).await? {
            self.items_repository
                .clear_cart_items(&mut tx, cart.id)
                .await?;
        }

        tx.commit().await?;

        Ok(())
    }

    async fn merge_guest_items(
        &self,
        user: UserId,
        entries: Vec<GuestCartEntry>,
    ) -> Result<Cart, CartsServiceError> {
        let mut tx = self.db.begin().await?;

        let cart = self.carts_repository.get_or_create_cart(&mut tx, user).await?;

        for entry in entries {
            let Some(product_id) = entry.product_id.filter(|id| *id > 0) else {
                continue;
            };

            // Absent or uncoercible quantities default to a single unit;
            // explicit non-positive quantities drop the entry.
            let quantity = entry.quantity.map_or(1, |quantity| quantity.max(0));

            let Ok(quantity) = u64::try_from(quantity) else {
                continue;
            };

            if quantity == 0 {
                continue;
            }

            // Entries referencing deleted products are dropped silently.
            let Some(product) = self
                .products_repository
                .get_product_for_update(&mut tx, ProductId::from_i64(product_id))
                .await?
            else {
                continue;
            };

            let clamped = quantity.min(product.stock);

            if clamped == 0 {
                continue;
            }

            match self
                .items_repository
                .find_item_by_product(&mut tx, cart.id, product.id)
                .await?
            {
                Some(item) => {
                    // Combining never exceeds the stock observed under lock.
                    let combined = item.quantity.saturating_add(clamped).min(product.stock);

                    self.items_repository
                        .set_item_quantity(&mut tx, cart.id, item.id, combined)
                        .await?;
                }
                None => {
                    self.items_repository
                        .upsert_item(&mut tx, cart.id, product.id, clamped, product.price)
                        .await?;
                }
            }
        }

        let cart = self.load_items(&mut tx, cart).await?;

        tx.commit().await?;

        Ok(cart)
    }
}

#[automock]
#[async_trait]
pub trait CartsService: Send + Sync {
    /// Retrieve the user's cart with items, or `None` when no cart exists yet.
    async fn get_cart(&self, user: UserId) -> Result<Option<Cart>, CartsServiceError>;

    /// Add a quantity of a product, creating the cart on first use.
    ///
    /// The unit price is snapshotted from the product on first insert and
    /// kept on later adds.
    async fn add_item(
        &self,
        user: UserId,
        product: ProductId,
        quantity: u64,
    ) -> Result<Cart, CartsServiceError>;

    /// Set an item's quantity; 0 deletes the item.
    async fn set_item_quantity(
        &self,
        user: UserId,
        item: CartItemId,
        quantity: u64,
    ) -> Result<Cart, CartsServiceError>;

    /// Remove a single item from the user's cart.
    async fn remove_item(&self, user: UserId, item: CartItemId) -> Result<(), CartsServiceError>;

    /// Remove every item from the user's cart. Succeeds when the cart is
    /// already empty or absent.
    async fn clear_cart(&self, user: UserId) -> Result<(), CartsServiceError>;

    /// Fold a client-held guest cart into the user's persistent cart.
    ///
    /// Invalid entries and unknown products are skipped; quantities are
    /// clamped to the stock observed inside the merge transaction.
    async fn merge_guest_items(
        &self,
        user: UserId,
        entries: Vec<GuestCartEntry>,
    ) -> Result<Cart, CartsServiceError>;
}
