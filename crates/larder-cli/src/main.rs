// larder-cli/src/main.rs
// ============================================================================
// Module: Larder CLI Entry Point
// Description: Command dispatcher for the Larder MCP server.
// Purpose: Load configuration and run the server or inspect the catalogue.
// Dependencies: clap, larder-config, larder-mcp, tokio
// ============================================================================

//! ## Overview
//! The Larder CLI loads `larder.toml`, validates it, and either serves the
//! configured transport (`larder serve`) or prints the effective tool
//! catalogue (`larder tools`). Configuration and enablement errors print
//! to stderr and exit non-zero; a typo in `tools.enabled` never produces a
//! running server.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use clap::Subcommand;
use larder_client::UpstreamClient;
use larder_config::LarderConfig;
use larder_mcp::EnablementPolicy;
use larder_mcp::McpServer;
use larder_mcp::ToolRegistry;
use larder_mcp::tools;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "larder", version, about = "MCP server for a household management API")]
struct Cli {
    /// Path to the configuration file (default: larder.toml, or
    /// the LARDER_CONFIG environment variable).
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the MCP server on the configured transport.
    Serve,
    /// Print the effective (enabled) tool names, one per line.
    Tools,
}

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point.
#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = match LarderConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("larder: {err}");
            return ExitCode::FAILURE;
        }
    };
    match cli.command {
        Commands::Serve => serve(config).await,
        Commands::Tools => list_tools(&config),
    }
}

/// Runs the MCP server until the transport ends.
async fn serve(config: LarderConfig) -> ExitCode {
    let server = match McpServer::from_config(config) {
        Ok(server) => server,
        Err(err) => {
            eprintln!("larder: {err}");
            return ExitCode::FAILURE;
        }
    };
    match server.serve().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("larder: {err}");
            ExitCode::FAILURE
        }
    }
}

/// Prints the enabled tool names in catalogue order.
fn list_tools(config: &LarderConfig) -> ExitCode {
    let client = match UpstreamClient::from_config(&config.upstream) {
        Ok(client) => Arc::new(client),
        Err(err) => {
            eprintln!("larder: {err}");
            return ExitCode::FAILURE;
        }
    };
    let registry = ToolRegistry::register(tools::modules(&client, &config.tools));
    let policy = match EnablementPolicy::from_config(&config.tools, &registry) {
        Ok(policy) => policy,
        Err(err) => {
            eprintln!("larder: {err}");
            return ExitCode::FAILURE;
        }
    };
    let mut stdout = std::io::stdout();
    for name in registry.tool_names() {
        if policy.is_allowed(&name) && writeln!(stdout, "{name}").is_err() {
            return ExitCode::FAILURE;
        }
    }
    ExitCode::SUCCESS
}
