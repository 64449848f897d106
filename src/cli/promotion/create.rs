use bodega::{
    database::{self, Db},
    domain::promotions::{
        PgPromotionsService, PromotionsService,
        models::{NewPromotion, PromotionKind},
    },
};
use clap::Args;
use jiff::Timestamp;

#[derive(Debug, Args)]
pub(crate) struct CreatePromotionArgs {
    /// Unique promotion code
    #[arg(long)]
    code: String,

    /// Discount kind: percent or fixed
    #[arg(long)]
    kind: PromotionKind,

    /// Percent points, or an amount in minor units for fixed discounts
    #[arg(long)]
    value: u64,

    /// Window start (RFC 3339); defaults to now
    #[arg(long)]
    starts_at: Option<Timestamp>,

    /// Window end (RFC 3339)
    #[arg(long, conflicts_with = "duration_days")]
    ends_at: Option<Timestamp>,

    /// Window length in days from the start, as an alternative to --ends-at
    #[arg(long)]
    duration_days: Option<i64>,

    /// PostgreSQL connection string
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    database_url: String,
}

pub(crate) async fn run(args: CreatePromotionArgs) -> Result<(), String> {
    let starts_at = args.starts_at.unwrap_or_else(Timestamp::now);

    let ends_at = match args.duration_days {
        Some(days) => Some(
            starts_at
                .checked_add(jiff::Span::new().hours(24 * days))
                .map_err(|error| format!("invalid duration: {error}"))?,
        ),
        None => args.ends_at,
    };

    let pool = database::connect(&args.database_url)
        .await
        .map_err(|error| format!("failed to connect to database: {error}"))?;

    let service = PgPromotionsService::new(Db::new(pool));

    let promotion = service
        .create_promotion(NewPromotion {
            code: args.code,
            kind: args.kind,
            value: args.value,
            starts_at: Some(starts_at),
            ends_at,
            active: true,
        })
        .await
        .map_err(|error| format!("failed to create promotion: {error}"))?;

    println!("promotion_id: {}", promotion.id);
    println!("code: {}", promotion.code);
    println!("kind: {}", promotion.kind);
    println!("value: {}", promotion.value);

    Ok(())
}
