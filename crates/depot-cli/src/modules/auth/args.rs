use clap::Args;

#[derive(Args)]
pub struct LoginArgs {
    #[arg(long)]
    pub username: Option<String>,
    #[arg(long, env = "DEPOT_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

#[derive(Args)]
pub struct StatusArgs {
    #[arg(long, help = "Print the session as JSON (tokens redacted)")]
    pub json: bool,
}
