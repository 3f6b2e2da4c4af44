use clap::{ArgAction, Parser, Subcommand};

pub use crate::modules::api::args::*;
pub use crate::modules::auth::args::*;
pub use crate::modules::system::args::*;

#[derive(Parser)]
#[command(name = "depot")]
#[command(about = "Depot session client")]
pub struct Cli {
    #[arg(long, env = "DEPOT_ADDR")]
    pub addr: Option<String>,
    #[arg(long, env = "DEPOT_CONTEXT")]
    pub context: Option<String>,
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    #[command(about = "Sign in with username and password")]
    Login(LoginArgs),
    #[command(about = "End the session and clear stored credentials")]
    Logout,
    #[command(about = "Show the current session")]
    Status(StatusArgs),
    #[command(about = "Send an authorized API request")]
    Request(RequestArgs),
    #[command(about = "Merge the identity asserted by the identity proxy")]
    Reconcile,
    #[command(about = "Keep the session in step with the identity proxy")]
    Watch,
    #[command(about = "Show the proxy-issued credential status")]
    Cert,
    #[command(about = "Check route access for the current session")]
    Check(CheckArgs),
    Config(ConfigArgs),
}
