use clap::Args;

#[derive(Args)]
pub struct RequestArgs {
    #[arg(help = "HTTP method (GET, POST, PUT, DELETE, ...)")]
    pub method: String,
    #[arg(help = "API path, e.g. /api/products")]
    pub path: String,
    #[arg(long, help = "JSON request body")]
    pub data: Option<String>,
    #[arg(long, help = "JSON policy context sent under the body's `context` key")]
    pub policy_context: Option<String>,
}

#[derive(Args)]
pub struct CheckArgs {
    #[arg(long, help = "Role the route requires")]
    pub role: Option<String>,
    #[arg(long, help = "Permission the route requires")]
    pub permission: Option<String>,
}
