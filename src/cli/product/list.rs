use bodega::{
    database::{self, Db},
    domain::products::{PgProductsService, ProductsService},
};
use clap::Args;

#[derive(Debug, Args)]
pub(crate) struct ListProductsArgs {
    /// PostgreSQL connection string
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    database_url: String,
}

pub(crate) async fn run(args: ListProductsArgs) -> Result<(), String> {
    let pool = database::connect(&args.database_url)
        .await
        .map_err(|error| format!("failed to connect to database: {error}"))?;

    let service = PgProductsService::new(Db::new(pool));

    let products = service
        .list_products()
        .await
        .map_err(|error| format!("failed to list products: {error}"))?;

    for product in products {
        println!(
            "{}\t{}\tprice: {}\tstock: {}",
            product.id, product.name, product.price, product.stock
        );
    }

    Ok(())
}
