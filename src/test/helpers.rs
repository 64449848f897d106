//! Test Helpers

use crate::{
    domain::products::{
        ProductsService, ProductsServiceError,
        models::{NewProduct, Product},
    },
    test::TestContext,
};

pub(crate) async fn create_product(
    ctx: &TestContext,
    name: &str,
    price: u64,
    stock: u64,
) -> Result<Product, ProductsServiceError> {
    ctx.products
        .create_product(NewProduct {
            name: name.to_string(),
            price,
            stock,
        })
        .await
}
