use bodega::{
    database::{self, Db},
    domain::promotions::{PgPromotionsService, PromotionsService},
};
use clap::Args;
use jiff::Timestamp;

#[derive(Debug, Args)]
pub(crate) struct ListPromotionsArgs {
    /// PostgreSQL connection string
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    database_url: String,
}

pub(crate) async fn run(args: ListPromotionsArgs) -> Result<(), String> {
    let pool = database::connect(&args.database_url)
        .await
        .map_err(|error| format!("failed to connect to database: {error}"))?;

    let service = PgPromotionsService::new(Db::new(pool));

    let promotions = service
        .list_promotions()
        .await
        .map_err(|error| format!("failed to list promotions: {error}"))?;

    let now = Timestamp::now();

    for promotion in promotions {
        println!(
            "{}\t{}\t{} {}\t{}",
            promotion.id,
            promotion.code,
            promotion.kind,
            promotion.value,
            if promotion.is_active(now) {
                "active"
            } else {
                "inactive"
            }
        );
    }

    Ok(())
}
