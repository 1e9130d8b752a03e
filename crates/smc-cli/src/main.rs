//! Minecraft server MCP bridge
//!
//! Serves MCP over stdio. Servers are normally attached at runtime with the
//! `connect` tool; `--plugin-url` together with `--api-key` attaches one at
//! startup.

mod logging;

use anyhow::Result;
use clap::Parser;
use smc_core::{BridgeConfig, DEFAULT_TIMEOUT_SECS, SmcError, timeout_from_secs};
use smc_server::SmcServer;
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(name = "smc-server", version, about = "MCP server for Minecraft server plugin APIs")]
struct Cli {
    /// Plugin API base URL to connect at startup
    #[arg(long, env = "MINECRAFT_PLUGIN_URL")]
    plugin_url: Option<String>,

    /// API key for the startup connection
    #[arg(long, env = "MINECRAFT_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Upstream request timeout in seconds
    #[arg(long, env = "MINECRAFT_REQUEST_TIMEOUT", default_value_t = DEFAULT_TIMEOUT_SECS)]
    request_timeout: u64,

    /// DEBUG, INFO, WARNING, ERROR or CRITICAL
    #[arg(long, env = "MINECRAFT_LOG_LEVEL", default_value = "ERROR")]
    log_level: String,

    /// Log file, appended to; empty for stderr
    #[arg(long, env = "MINECRAFT_LOG_FILE", default_value = "smc-server.log")]
    log_file: PathBuf,
}

impl Cli {
    /// Startup connection settings, if any
    fn startup_config(&self) -> smc_core::Result<Option<BridgeConfig>> {
        timeout_from_secs(self.request_timeout)?;
        match (self.plugin_url.as_deref(), self.api_key.as_deref()) {
            (Some(url), Some(key)) => BridgeConfig::new(url, key, self.request_timeout).map(Some),
            (None, None) => Ok(None),
            _ => Err(SmcError::Config(
                "MINECRAFT_PLUGIN_URL and MINECRAFT_API_KEY must be set together".into(),
            )),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init(logging::parse_level(&cli.log_level), &cli.log_file)?;

    let startup = match cli.startup_config() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            eprintln!("smc-server: {}", e);
            std::process::exit(1);
        }
    };

    let server = SmcServer::new();

    if let Some(config) = startup {
        match server
            .registry()
            .connect(&config.plugin_url, &config.api_key, config.request_timeout)
            .await
        {
            Ok(connected) => info!(
                url = %connected.session.base_url(),
                "Startup connection established"
            ),
            Err(e) => error!(url = %config.plugin_url, "Startup connection failed: {}", e),
        }
    }

    info!("Minecraft MCP server v{} starting", env!("CARGO_PKG_VERSION"));
    server.run_stdio().await?;
    info!("Server stopped");

    Ok(())
}
