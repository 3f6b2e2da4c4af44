use serde_json::json;

use crate::cli_args::{LoginArgs, StatusArgs};
use crate::modules::system::CommandContext;
use crate::{prompt_line, prompt_password};

pub(crate) async fn handle_login(args: LoginArgs, ctx: &CommandContext<'_>) -> anyhow::Result<()> {
    let username = match args.username {
        Some(username) => username,
        None => prompt_line("Username: ")?,
    };
    if username.trim().is_empty() {
        anyhow::bail!("username is required");
    }
    let password = match args.password {
        Some(password) => password,
        None => prompt_password("Password: ")?,
    };

    let session = ctx.manager.login(username.trim(), password).await?;
    let name = session.username().unwrap_or_default();
    println!("Signed in as {name} (context {})", ctx.target.context_name);
    Ok(())
}

pub(crate) fn handle_logout(ctx: &CommandContext<'_>) -> anyhow::Result<()> {
    ctx.manager.logout()?;
    println!("Signed out (context {})", ctx.target.context_name);
    Ok(())
}

pub(crate) fn handle_status(args: StatusArgs, ctx: &CommandContext<'_>) -> anyhow::Result<()> {
    let session = ctx.manager.session();
    let phase = ctx.manager.phase();
    if args.json {
        let body = json!({
            "context": ctx.target.context_name,
            "addr": ctx.target.addr,
            "phase": phase.as_str(),
            "isAuthenticated": session.is_authenticated,
            "source": session.source,
            "user": session.user,
            "hasAccessToken": session.bearer().is_some(),
            "hasRefreshToken": session.refresh_credential().is_some(),
        });
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    println!("context: {}", ctx.target.context_name);
    println!("addr: {}", ctx.target.addr);
    println!("phase: {phase}");
    match session.user.as_ref().filter(|_| session.is_authenticated) {
        Some(user) => {
            println!("user: {} (id {})", user.username, user.id);
            println!("role: {}", user.role);
            if !user.permissions.is_empty() {
                let permissions: Vec<&str> = user.permissions.iter().map(String::as_str).collect();
                println!("permissions: {}", permissions.join(", "));
            }
        }
        None => println!("user: -"),
    }
    Ok(())
}
