use super::eval::{cmd_eval, cmd_wait_for};
use super::env::CliArgs;
use super::input::{cmd_click, cmd_move, cmd_press, cmd_tap, cmd_type};
use crate::cli::commands::Commands;
use crate::cli::context::CliContext;
use anyhow::Result;

pub async fn dispatch(cli: &CliArgs, ctx: &CliContext) -> Result<()> {
    match cli.command.clone() {
        Commands::Eval(args) => cmd_eval(args, ctx).await,
        Commands::Click(args) => cmd_click(args, ctx).await,
        Commands::Tap(args) => cmd_tap(args, ctx).await,
        Commands::Type(args) => cmd_type(args, ctx).await,
        Commands::Press(args) => cmd_press(args, ctx).await,
        Commands::WaitFor(args) => cmd_wait_for(args, ctx).await,
        Commands::Move(args) => cmd_move(args, ctx).await,
    }
}
