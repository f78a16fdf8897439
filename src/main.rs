use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gtools_config::{Config, ConfigLoader};
use gtools_mcp::{McpServer, OAuthCredentials};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// gtools - Google Workspace tools for MCP clients
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (TOML or JSON)
    #[clap(short, long, env = "MCP_CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[clap(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[clap(short, long)]
    quiet: bool,

    /// Subcommand to execute (default: serve)
    #[clap(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve MCP requests on stdin/stdout
    Serve,
    /// Run the OAuth authorization flow and store the token file
    Auth,
    /// Print the effective configuration
    Config,
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let loader = match path {
        Some(path) => ConfigLoader::new(path),
        None => ConfigLoader::from_env(),
    };

    loader.load().context("Failed to load configuration")
}

fn init_logging(cli: &Cli, log_file: Option<&Path>) -> Result<()> {
    let level = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // stdout carries the protocol
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    let file_layer = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;

            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    Ok(())
}

async fn serve(config: Config) -> Result<()> {
    if !config.auth_configured() {
        info!("MCP_AUTH_TOKEN is not set; tool calls will be rejected");
    }

    let server = McpServer::from_config(config).context("Failed to initialize server")?;
    server.serve_stdio().await?;

    Ok(())
}

async fn authorize(config: Config) -> Result<()> {
    let credentials = OAuthCredentials::new(&config);
    credentials.authorize().await?;

    eprintln!(
        "Authorization complete. Token stored in {}",
        credentials.token_file().display()
    );
    Ok(())
}

fn show_config(config: &Config) -> Result<()> {
    let rendered = serde_json::to_string_pretty(&config.redacted())?;
    println!("{}", rendered);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;
    init_logging(&cli, config.log_file.as_deref())?;

    info!(version = env!("CARGO_PKG_VERSION"), "gtools starting");

    let result = match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::Auth => authorize(config).await,
        Commands::Config => show_config(&config),
    };

    if let Err(e) = &result {
        error!(error = %e, "gtools failed");
    }
    result
}
