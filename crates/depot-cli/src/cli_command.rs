use crate::cli_args::*;
use crate::modules::api::{handle_cert, handle_check, handle_reconcile, handle_request, handle_watch};
use crate::modules::auth::{handle_login, handle_logout, handle_status};
use crate::modules::system::CommandContext;

pub(crate) async fn handle_command(command: Command, ctx: &CommandContext<'_>) -> anyhow::Result<()> {
    match command {
        Command::Login(args) => handle_login(args, ctx).await?,
        Command::Logout => handle_logout(ctx)?,
        Command::Status(args) => handle_status(args, ctx)?,
        Command::Request(args) => handle_request(args, ctx).await?,
        Command::Reconcile => handle_reconcile(ctx).await?,
        Command::Watch => handle_watch(ctx).await?,
        Command::Cert => handle_cert(ctx).await?,
        Command::Check(args) => handle_check(args, ctx).await?,
        Command::Config(_) => {
            unreachable!()
        }
    }

    Ok(())
}
