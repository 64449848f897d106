use bodega::{
    database,
    domain::users::{PgUsersService, UsersService, models::NewUser},
};
use clap::Args;

#[derive(Debug, Args)]
pub(crate) struct CreateUserArgs {
    /// User email, unique
    #[arg(long)]
    email: String,

    /// User display name
    #[arg(long)]
    name: String,

    /// PostgreSQL connection string
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    database_url: String,
}

pub(crate) async fn run(args: CreateUserArgs) -> Result<(), String> {
    let pool = database::connect(&args.database_url)
        .await
        .map_err(|error| format!("failed to connect to database: {error}"))?;

    let service = PgUsersService::new(pool);

    let user = service
        .create_user(NewUser {
            email: args.email,
            name: args.name,
        })
        .await
        .map_err(|error| format!("failed to create user: {error}"))?;

    println!("user_id: {}", user.id);
    println!("email: {}", user.email);

    Ok(())
}
