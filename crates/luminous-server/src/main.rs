// ============================================
// File: crates/luminous-server/src/main.rs
// ============================================
//! # Luminous Mesh Control Plane Entry Point
//!
//! ## Creation Reason
//! Binary entry point: CLI parsing, logging setup and server start.
//!
//! ## Usage
//! ```bash
//! luminous-server start -c /etc/luminous-mesh/config.toml
//! luminous-server validate -c ./config.toml
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - `RUST_LOG` overrides `logging.level`
//! - The file log writer flushes on drop; keep the guard alive in `main`
//!
//! ## Last Modified
//! v0.1.0 - Initial CLI implementation

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use luminous_server::config::LoggingConfig;
use luminous_server::{Server, ServerConfig};

const DEFAULT_CONFIG: &str = "/etc/luminous-mesh/config.toml";
const DEFAULT_LOG_FILE: &str = "luminous-server.log";

// ============================================
// CLI Definition
// ============================================

/// Luminous Mesh control plane
#[derive(Parser, Debug)]
#[command(name = "luminous-server")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the control plane
    Start {
        /// Path to configuration file
        #[arg(short, long, default_value = DEFAULT_CONFIG)]
        config: PathBuf,
    },

    /// Validate configuration file
    Validate {
        /// Path to configuration file
        #[arg(short, long, default_value = DEFAULT_CONFIG)]
        config: PathBuf,
    },
}

// ============================================
// Main
// ============================================

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Start { config } => cmd_start(config).await,
        Commands::Validate { config } => cmd_validate(config).await,
    };

    if let Err(e) = result {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

// ============================================
// Commands
// ============================================

async fn cmd_start(config_path: PathBuf) -> anyhow::Result<()> {
    let config = match ServerConfig::load(&config_path).await {
        Ok(config) => config,
        Err(e) => {
            init_logging(&LoggingConfig::default());
            return Err(e).context("cannot start without a valid configuration");
        }
    };

    let _guard = init_logging(&config.logging);

    info!("════════════════════════════════════════");
    info!("Config:     {}", config_path.display());
    info!("Listen:     {}", config.listen_addr);
    info!("Endpoint:   {}", config.api_endpoint);
    info!("Plugins:    {}", config.plugins.load.join(", "));
    info!("════════════════════════════════════════");

    let server = Server::new(config);
    server.run().await?;

    Ok(())
}

async fn cmd_validate(config_path: PathBuf) -> anyhow::Result<()> {
    init_logging(&LoggingConfig::default());

    let config = ServerConfig::load(&config_path).await?;

    println!("✅ Configuration is valid");
    println!();
    println!("Network:");
    println!("   Listen:     {}", config.listen_addr);
    println!("   Endpoint:   {}", config.api_endpoint);
    println!();
    println!("TLS:");
    println!("   Cert:       {}", config.tls.cert_file.display());
    println!("   CA:         {}", config.tls.ca_cert.display());
    println!();
    println!("Auth:");
    println!("   Token TTL:  {}s", config.auth.token_duration_secs);
    println!("   CA Cert:    {}", config.auth.ca_cert_path.display());
    println!("   Revoke on rotate: {}", config.auth.revoke_on_rotate);
    println!();
    println!("Limits:");
    println!("   Session TTL:      {}s", config.limits.session_ttl_secs);
    println!("   Command Queue:    {}", config.limits.command_queue_capacity);
    println!("   Send Timeout:     {}ms", config.limits.command_send_timeout_ms);
    println!();
    println!("Plugins:    {}", config.plugins.load.join(", "));
    if let Some(addr) = config.metrics.listen_addr {
        println!("Metrics:    http://{addr}/metrics");
    }
    println!();

    Ok(())
}

// ============================================
// Helper Functions
// ============================================

/// Initializes the tracing subscriber, plus a file layer if configured.
fn init_logging(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.level));

    let (file_layer, guard) = match &config.file {
        Some(path) => {
            let directory = path
                .parent()
                .filter(|dir| !dir.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let file_name = path
                .file_name()
                .map_or_else(|| PathBuf::from(DEFAULT_LOG_FILE), PathBuf::from);

            let appender = tracing_appender::rolling::never(directory, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_ansi(false)
                .with_target(true)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(file_layer)
        .with(filter)
        .try_init()
        .ok();

    guard
}
