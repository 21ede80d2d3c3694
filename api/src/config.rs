use std::net::IpAddr;

use clap::Args;

pub const DEFAULT_PORT: u16 = 3001;

/// Listener and access settings for the HTTP surfaces.
#[derive(Args, Clone, Debug)]
pub struct ServerArgs {
    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Address to bind
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,

    /// Shared secret required on /tools, /call and /mcp
    #[arg(long, env = "MCP_AUTH_TOKEN", hide_env_values = true)]
    pub auth_token: Option<String>,

    /// Serve without a shared secret (only behind an authenticating proxy)
    #[arg(long, env = "MCP_AUTH_DISABLED")]
    pub no_auth: bool,

    /// Comma-separated browser origins allowed by CORS (default: any)
    #[arg(long, env = "WRENCH_CORS_ORIGINS")]
    pub cors_origins: Option<String>,
}

impl Default for ServerArgs {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            host: IpAddr::from([0, 0, 0, 0]),
            auth_token: None,
            no_auth: false,
            cors_origins: None,
        }
    }
}
