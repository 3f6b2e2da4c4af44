use clap::{Args, Subcommand};

use super::types::StorageKind;

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    #[command(about = "Create or update a context")]
    SetContext(SetContextArgs),
    #[command(about = "Set the active context")]
    UseContext(UseContextArgs),
    #[command(about = "Print the active context name")]
    CurrentContext,
    #[command(about = "List known context names")]
    GetContexts,
    #[command(about = "Remove a context")]
    DeleteContext(UseContextArgs),
}

#[derive(Args)]
pub struct SetContextArgs {
    #[arg(help = "Context name")]
    pub name: String,
    #[arg(long, help = "API base URL")]
    pub addr: Option<String>,
    #[arg(long, help = "Host fragment that marks the identity proxy (e.g. warehouse-frontend)")]
    pub identity_proxy_marker: Option<String>,
    #[arg(long, help = "Seconds between identity checks for `depot watch`")]
    pub reconcile_interval_secs: Option<u64>,
    #[arg(long, value_enum, help = "Where the session record is kept")]
    pub storage: Option<StorageKind>,
}

#[derive(Args)]
pub struct UseContextArgs {
    #[arg(help = "Context name")]
    pub name: String,
}
