use std::sync::Arc;

use clap::Parser;
use wrench_api::{ServerArgs, serve, telemetry};
use wrench_core::{Dispatcher, GatewayConfig, HttpFetch};

#[derive(Parser)]
#[command(
    name = "wrench-api",
    version,
    about = "Flyin' Wrench tool gateway, HTTP surfaces only"
)]
struct Cli {
    #[command(flatten)]
    server: ServerArgs,
}

#[tokio::main]
async fn main() {
    // Load .env if present (dev only)
    let _ = dotenvy::dotenv();
    telemetry::init_json();

    let cli = Cli::parse();

    let config = match GatewayConfig::from_env() {
        Ok(config) => Arc::new(config),
        Err(err) => {
            tracing::error!(error = %err, "refusing to start");
            std::process::exit(1);
        }
    };
    let dispatcher = Arc::new(Dispatcher::new(config, Arc::new(HttpFetch::default())));

    if let Err(err) = serve(cli.server, dispatcher).await {
        tracing::error!(error = %err, "server stopped");
        std::process::exit(1);
    }
}
