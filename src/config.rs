//! Runtime configuration.
//!
//! Every setting can come from a command-line flag or an environment
//! variable; flags win. Data defaults to `creditcards.json` and HTTP to
//! port 8080.

use clap::Args;
use std::path::PathBuf;

/// Settings shared by the CLI and the server.
#[derive(Debug, Clone, Args)]
pub struct AppConfig {
    /// JSON document holding every card and redemption
    #[arg(long, env = "REDEMPTION_DATA_FILE", default_value = "creditcards.json")]
    pub data_file: PathBuf,

    /// Log level filter (overridden by RUST_LOG)
    #[arg(long, env = "REDEMPTION_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log output format: "pretty" or "json"
    #[arg(long, env = "REDEMPTION_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,
}

/// HTTP listener settings.
#[derive(Debug, Clone, Args)]
pub struct ServerConfig {
    /// Address to bind
    #[arg(long, env = "REDEMPTION_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "REDEMPTION_PORT", default_value_t = 8080)]
    pub port: u16,
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn init_logging(config: &AppConfig) -> anyhow::Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))?;

    let subscriber = tracing_subscriber::registry().with(env_filter);

    match config.log_format.as_str() {
        "json" => subscriber
            .with(fmt::layer().json().with_target(true))
            .try_init()?,
        _ => subscriber.with(fmt::layer().with_target(true)).try_init()?,
    }

    Ok(())
}
