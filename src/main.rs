use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_bridge_mcp::config::Config;
use api_bridge_mcp::fetch::FetcherSet;
use api_bridge_mcp::invoke::InvokerRouter;
use api_bridge_mcp::mcp::{McpServer, ToolRegistry};
use api_bridge_mcp::sync::SyncOrchestrator;
use api_bridge_mcp::utils::HttpClient;
use api_bridge_mcp::{admin, VERSION};

#[derive(Parser, Debug)]
#[command(name = "api-bridge-mcp")]
#[command(version = VERSION)]
#[command(about = "Expose REST and RPC services as MCP tools", long_about = None)]
struct Args {
    /// Run in stdio mode (for MCP clients like Claude Desktop)
    #[arg(long, default_value_t = false)]
    stdio: bool,

    /// Path to the configuration file
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long, short)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logs always go to stderr so stdio transport framing stays clean.
    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| format!("api_bridge_mcp={}", default_level)),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("Starting api-bridge-mcp v{}", VERSION);

    let config = Config::load(args.config.as_deref())?;
    if config.schema_sources.is_empty() {
        tracing::warn!("No schema sources configured; the server will expose no tools");
    }

    // Shared clients: one HTTP client for fetches and HTTP/Connect
    // invocations, short-lived gRPC channels per call.
    let call_timeout = Duration::from_secs(config.http_client_timeout_secs);
    let http = HttpClient::with_rate_limit(call_timeout, config.rate_limit_rps)?;

    let server = Arc::new(McpServer::new());
    let registry = Arc::new(ToolRegistry::new());
    let router = Arc::new(InvokerRouter::with_client(http.clone(), call_timeout));
    let orchestrator = Arc::new(SyncOrchestrator::new(
        config.schema_sources.clone(),
        FetcherSet::new(http),
        server.clone(),
        router,
        registry,
    ));

    // Initial sync runs before serving; a failed source leaves its tools
    // out but never blocks startup.
    if let Err(err) = orchestrator.sync_all().await {
        tracing::error!(error = %err, "Initial schema sync completed with errors");
    }

    // Admin trigger runs alongside either transport.
    let admin_addr = config.admin_listen_addr.clone();
    let admin_orchestrator = orchestrator.clone();
    tokio::spawn(async move {
        if let Err(err) = admin::serve(&admin_addr, admin_orchestrator).await {
            tracing::error!(error = %err, "Admin HTTP server failed");
        }
    });

    if args.stdio {
        tracing::info!("Running in stdio mode");
        server.run_stdio().await?;
    } else {
        // Without a stdio client the process serves the admin endpoint and
        // waits for shutdown.
        tracing::info!(tools = server.tool_count(), "Running until interrupted (admin endpoint active)");
        tokio::signal::ctrl_c().await?;
        tracing::info!("Received interrupt, shutting down");
    }

    Ok(())
}
