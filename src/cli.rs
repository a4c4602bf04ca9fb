//! Command-line entry point shared by the server binaries.
//!
//! Each binary is a one-line `main` that calls [`run`] with its [`ToolSet`].

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

use crate::config::{self, Config, ResponseMode};
use crate::error::StartupError;
use crate::mcp::dispatcher::{Dispatcher, ServerInfo};
use crate::mcp::server::McpHttpServer;
use crate::mcp::transport::{build_router, AppState};
use crate::tools::ToolSet;

/// MCP tool server over streamable HTTP.
///
/// Serves `POST /mcp` (JSON-RPC, optionally as an event stream) and
/// `GET /health`.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(value_name = "CONFIG_FILE")]
    pub config: Option<PathBuf>,

    /// Listening port (overrides the port environment variable and the config file)
    #[arg(short, long, value_parser = clap::value_parser!(u16).range(1..))]
    pub port: Option<u16>,

    /// Enable or disable cross-origin headers
    #[arg(long, value_name = "BOOL")]
    pub cors: Option<bool>,

    /// Always reply with a single JSON document, never an event stream
    #[arg(long)]
    pub json_response: bool,

    /// Increase logging verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Decrease logging verbosity (only show errors)
    #[arg(short, long)]
    pub quiet: bool,
}

/// Determines the log level from CLI arguments.
#[allow(clippy::match_same_arms)] // Explicit "warn" arm for clarity
fn get_log_level(verbose: u8, quiet: bool, config_level: &str) -> Level {
    if quiet {
        return Level::ERROR;
    }

    match verbose {
        0 => match config_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::WARN, // Default to warn for unknown levels
        },
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Initialises the tracing subscriber for logging.
fn init_tracing(level: Level) {
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Parses the process arguments and serves `tool_set` until shutdown.
#[must_use]
pub fn run(tool_set: ToolSet) -> ExitCode {
    let args = Args::parse();
    let server_name = tool_set.server_name();

    // Load configuration
    let config_path = args.config.as_deref();
    let cfg = match config::load_config(config_path, server_name) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            if config_path.is_none() {
                if let Some(default_path) = config::default_config_path(server_name) {
                    eprintln!("\nConfig read from: {}", default_path.display());
                    eprintln!("Compare it with config/example-config.json");
                }
            }
            return ExitCode::FAILURE;
        }
    };

    // Initialise logging
    let log_level = get_log_level(args.verbose, args.quiet, &cfg.logging.level);
    init_tracing(log_level);

    info!(
        server = server_name,
        version = env!("CARGO_PKG_VERSION"),
        "Starting MCP server"
    );

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %StartupError::Runtime(e), "Startup failed");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(serve(tool_set, &args, cfg)) {
        Ok(()) => {
            info!("Server shut down gracefully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Server error");
            ExitCode::FAILURE
        }
    }
}

/// Builds the router for `tool_set` from CLI and file settings.
///
/// Command-line flags win over the configuration file.
///
/// # Errors
///
/// Returns an error if the tool registry cannot be built.
pub fn router_for(
    tool_set: ToolSet,
    args: &Args,
    cfg: &Config,
) -> Result<axum::Router, StartupError> {
    let registry = tool_set.build_registry(&cfg.upstream)?;
    let dispatcher = Dispatcher::new(registry, ServerInfo::new(tool_set.server_name()));

    let response_mode = if args.json_response {
        ResponseMode::Json
    } else {
        cfg.server.response_mode
    };
    let cors = args.cors.unwrap_or(cfg.server.cors);

    info!(cors, response_mode = ?response_mode, "Transport configured");

    let state = AppState::new(dispatcher).with_response_mode(response_mode);
    Ok(build_router(state, cors))
}

async fn serve(tool_set: ToolSet, args: &Args, cfg: Config) -> Result<(), StartupError> {
    let port = config::resolve_port(
        args.port,
        tool_set.port_env_var(),
        cfg.server.port,
        tool_set.default_port(),
    )?;
    let router = router_for(tool_set, args, &cfg)?;
    let addr = SocketAddr::new(cfg.server.host, port);

    info!(addr = %addr, "MCP server ready, listening");

    McpHttpServer::new(addr, router).run().await?;
    Ok(())
}
