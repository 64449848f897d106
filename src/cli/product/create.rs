use bodega::{
    database::{self, Db},
    domain::products::{PgProductsService, ProductsService, models::NewProduct},
};
use clap::Args;

#[derive(Debug, Args)]
pub(crate) struct CreateProductArgs {
    /// Product display name
    #[arg(long)]
    name: String,

    /// Unit price in minor units
    #[arg(long)]
    price: u64,

    /// Initial stock count
    #[arg(long, default_value_t = 0)]
    stock: u64,

    /// PostgreSQL connection string
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    database_url: String,
}

pub(crate) async fn run(args: CreateProductArgs) -> Result<(), String> {
    let pool = database::connect(&args.database_url)
        .await
        .map_err(|error| format!("failed to connect to database: {error}"))?;

    let service = PgProductsService::new(Db::new(pool));

    let product = service
        .create_product(NewProduct {
            name: args.name,
            price: args.price,
            stock: args.stock,
        })
        .await
        .map_err(|error| format!("failed to create product: {error}"))?;

    println!("product_id: {}", product.id);
    println!("product_name: {}", product.name);
    println!("price_minor: {}", product.price);
    println!("stock: {}", product.stock);

    Ok(())
}
