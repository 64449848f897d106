use bodega::{
    database::{self, Db},
    domain::promotions::{PgPromotionsService, PromotionsService, models::PromotionId},
};
use clap::Args;

#[derive(Debug, Args)]
pub(crate) struct DeletePromotionArgs {
    /// Promotion id
    #[arg(long)]
    promotion_id: i64,

    /// PostgreSQL connection string
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    database_url: String,
}

pub(crate) async fn run(args: DeletePromotionArgs) -> Result<(), String> {
    let pool = database::connect(&args.database_url)
        .await
        .map_err(|error| format!("failed to connect to database: {error}"))?;

    let service = PgPromotionsService::new(Db::new(pool));

    service
        .delete_promotion(PromotionId::from_i64(args.promotion_id))
        .await
        .map_err(|error| format!("failed to delete promotion: {error}"))?;

    println!("deleted promotion {}", args.promotion_id);

    Ok(())
}
