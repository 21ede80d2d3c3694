use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::json;
use wrench_api::{ServerArgs, telemetry};
use wrench_core::{Dispatcher, GatewayConfig, HttpFetch};
use wrench_mcp_runtime::McpServer;

/// Any of these being set means we run on the hosting platform.
const CLOUD_ENV_VARS: &[&str] = &["RAILWAY_ENVIRONMENT", "RAILWAY_PROJECT_ID"];

#[derive(Parser)]
#[command(
    name = "wrench-mcp",
    version,
    about = "Flyin' Wrench MCP server: stdio by default, HTTP with --http or on the cloud"
)]
struct Cli {
    /// Serve REST and JSON-RPC over HTTP instead of stdio
    #[arg(long, global = true)]
    http: bool,

    #[command(flatten)]
    server: ServerArgs,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the server (default)
    Serve,
    /// Print the tools enabled by the current configuration as JSON
    ListTools,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Transport {
    Stdio,
    Http,
}

fn select_transport<F>(http_flag: bool, lookup: F) -> Transport
where
    F: Fn(&str) -> Option<String>,
{
    let on_cloud = CLOUD_ENV_VARS
        .iter()
        .any(|var| lookup(var).is_some_and(|value| !value.is_empty()));
    if http_flag || on_cloud {
        Transport::Http
    } else {
        Transport::Stdio
    }
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Command::Serve);

    let transport = select_transport(cli.http, |var| std::env::var(var).ok());
    match transport {
        Transport::Http => telemetry::init_json(),
        Transport::Stdio => telemetry::init_stderr(),
    }

    let config = match GatewayConfig::from_env() {
        Ok(config) => Arc::new(config),
        Err(err) => {
            tracing::error!(error = %err, "refusing to start");
            std::process::exit(1);
        }
    };
    let dispatcher = Arc::new(Dispatcher::new(config, Arc::new(HttpFetch::default())));

    let code = match command {
        Command::ListTools => list_tools(&dispatcher),
        Command::Serve => run(transport, cli.server, dispatcher).await,
    };
    std::process::exit(code);
}

fn list_tools(dispatcher: &Dispatcher) -> i32 {
    match serde_json::to_string_pretty(&dispatcher.tools_list_payload()) {
        Ok(text) => {
            println!("{text}");
            0
        }
        Err(err) => {
            eprintln!("{}", json!({ "error": "serialize_failed", "message": err.to_string() }));
            1
        }
    }
}

async fn run(transport: Transport, server: ServerArgs, dispatcher: Arc<Dispatcher>) -> i32 {
    match transport {
        Transport::Http => match wrench_api::serve(server, dispatcher).await {
            Ok(()) => 0,
            Err(err) => {
                tracing::error!(error = %err, "HTTP server stopped");
                1
            }
        },
        Transport::Stdio => match McpServer::new(dispatcher).serve_stdio().await {
            Ok(()) => 0,
            Err(err) => {
                tracing::error!(error = %err, "MCP stdio server stopped");
                1
            }
        },
    }
}
