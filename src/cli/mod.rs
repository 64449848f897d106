use clap::{Parser, Subcommand};

mod db;
mod product;
mod promotion;
mod user;

#[derive(Debug, Parser)]
#[command(name = "bodega", about = "Bodega CLI", long_about = None)]
pub(crate) struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    Product(product::ProductCommand),
    Promotion(promotion::PromotionCommand),
    User(user::UserCommand),
    Db(db::DbCommand),
}

impl Cli {
    pub(crate) async fn run(self) -> Result<(), String> {
        match self.command {
            Commands::Product(command) => product::run(command).await,
            Commands::Promotion(command) => promotion::run(command).await,
            Commands::User(command) => user::run(command).await,
            Commands::Db(command) => db::run(command).await,
        }
    }
}
