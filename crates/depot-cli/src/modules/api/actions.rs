use anyhow::Context;
use chrono::Utc;
use depot_session::credential::{format_remaining, CREDENTIAL_TRADITIONAL};
use depot_session::{ApiRequest, GuardDecision, ReconcileOutcome, RouteGuard, SessionNotice};
use reqwest::Method;
use tokio::sync::broadcast::error::RecvError;
use tracing::info;

use crate::cli_args::{CheckArgs, RequestArgs};
use crate::modules::system::CommandContext;

pub(crate) async fn handle_request(
    args: RequestArgs,
    ctx: &CommandContext<'_>,
) -> anyhow::Result<()> {
    let method = Method::from_bytes(args.method.to_ascii_uppercase().as_bytes())
        .map_err(|_| anyhow::anyhow!("invalid method: {}", args.method))?;
    let mut request = ApiRequest::new(method, args.path);
    if let Some(data) = args.data {
        let body: serde_json::Value =
            serde_json::from_str(&data).context("--data must be valid JSON")?;
        request = request.with_body(body);
    }
    if let Some(context) = args.policy_context {
        let context: serde_json::Value =
            serde_json::from_str(&context).context("--policy-context must be valid JSON")?;
        request = request.with_policy_context(context);
    }

    if ctx.manager.resume().await? {
        info!(context = %ctx.target.context_name, "resumed session from stored refresh token");
    }
    let response = ctx.manager.send(request).await?;
    print_response(response).await
}

async fn print_response(response: reqwest::Response) -> anyhow::Result<()> {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    if !status.is_success() {
        anyhow::bail!("Request failed: {status} {body}");
    }
    if body.trim().is_empty() {
        println!("{status}");
        return Ok(());
    }
    match serde_json::from_str::<serde_json::Value>(&body) {
        Ok(value) => println!("{}", serde_json::to_string_pretty(&value)?),
        Err(_) => println!("{body}"),
    }
    Ok(())
}

pub(crate) async fn handle_reconcile(ctx: &CommandContext<'_>) -> anyhow::Result<()> {
    let outcome = ctx.manager.reconcile().await;
    match outcome {
        ReconcileOutcome::Disabled => println!(
            "Identity proxy not configured for context {}",
            ctx.target.context_name
        ),
        ReconcileOutcome::Merged => {
            let session = ctx.manager.session();
            println!(
                "Session updated: signed in as {}",
                session.username().unwrap_or_default()
            );
        }
        ReconcileOutcome::Unchanged => println!("Session already matches the identity proxy"),
        ReconcileOutcome::Deferred => {
            println!("Identity proxy reports no session; local session kept")
        }
        ReconcileOutcome::Superseded => println!("Session changed during reconcile; nothing merged"),
        ReconcileOutcome::Busy => println!("Session busy; try again"),
    }
    Ok(())
}

pub(crate) async fn handle_watch(ctx: &CommandContext<'_>) -> anyhow::Result<()> {
    let mut notices = ctx.manager.subscribe();
    let Some(task) = ctx.manager.spawn_identity_watch() else {
        anyhow::bail!(
            "context {} needs an identity proxy marker and a reconcile interval",
            ctx.target.context_name
        );
    };
    println!("Watching identity for context {} (Ctrl-C to stop)", ctx.target.context_name);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            notice = notices.recv() => match notice {
                Ok(SessionNotice::SignedIn { username }) => println!("signed in as {username}"),
                Ok(SessionNotice::SignedOut) => println!("signed out"),
                Ok(SessionNotice::LoginRequired { reason }) => println!("sign in required: {reason}"),
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            },
        }
    }
    task.abort();
    Ok(())
}

pub(crate) async fn handle_cert(ctx: &CommandContext<'_>) -> anyhow::Result<()> {
    let info = ctx.manager.certificate_info().await;
    let credential = info
        .credential_type
        .as_deref()
        .unwrap_or(CREDENTIAL_TRADITIONAL);
    println!("credential: {credential}");
    if !info.has_certificate {
        if let Some(message) = info.message.as_deref() {
            println!("note: {message}");
        }
        return Ok(());
    }

    if let Some(kind) = info.kind.as_deref() {
        println!("type: {kind}");
    }
    if let Some(subject) = info.subject.as_deref() {
        println!("subject: {subject}");
    }
    if let Some(issuer) = info.issuer.as_deref() {
        println!("issuer: {issuer}");
    }
    if !info.roles.is_empty() {
        println!("roles: {}", info.roles.join(", "));
    }
    let now = Utc::now();
    if let Some(remaining) = info.remaining_seconds(now) {
        println!(
            "remaining: {} ({:.0}% of lifetime)",
            format_remaining(remaining),
            info.lifetime_percent(now)
        );
    }
    println!(
        "zero trust: {}",
        if info.zero_trust_enabled { "enabled" } else { "disabled" }
    );
    Ok(())
}

pub(crate) async fn handle_check(args: CheckArgs, ctx: &CommandContext<'_>) -> anyhow::Result<()> {
    let mut guard = RouteGuard::new();
    if let Some(role) = args.role {
        guard = guard.with_role(role);
    }
    if let Some(permission) = args.permission {
        guard = guard.with_permission(permission);
    }
    match ctx.manager.enter_protected_route(&guard).await {
        GuardDecision::Allow => {
            println!("allow");
            Ok(())
        }
        GuardDecision::RedirectToLogin => anyhow::bail!("access denied: sign in required"),
        GuardDecision::RedirectToHome => {
            anyhow::bail!("access denied: missing required role or permission")
        }
    }
}
