use clap::{Args, Subcommand};

mod create;
mod delete;
mod list;

#[derive(Debug, Args)]
pub(crate) struct PromotionCommand {
    #[command(subcommand)]
    command: PromotionSubcommand,
}

#[derive(Debug, Subcommand)]
enum PromotionSubcommand {
    Create(create::CreatePromotionArgs),
    List(list::ListPromotionsArgs),
    Delete(delete::DeletePromotionArgs),
}

pub(crate) async fn run(command: PromotionCommand) -> Result<(), String> {
    match command.command {
        PromotionSubcommand::Create(args) => create::run(args).await,
        PromotionSubcommand::List(args) => list::run(args).await,
        PromotionSubcommand::Delete(args) => delete::run(args).await,
    }
}
