//! OSCAR server binary.
//!
//! # Usage
//!
//! ```bash
//! # Start with built-in defaults
//! oscar-server
//!
//! # Start from a config file, overriding the auth port
//! oscar-server --config oscar.toml --bind 0.0.0.0:5190
//! ```

use clap::Parser;
use oscar_server::{run_server, ServerConfig};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// OSCAR (AIM/ICQ) protocol server
#[derive(Parser, Debug)]
#[command(name = "oscar-server")]
#[command(about = "OSCAR instant-messaging protocol server")]
#[command(version)]
struct Args {
    /// Path to a TOML config file; built-in defaults are used if omitted.
    #[arg(short, long)]
    config: Option<String>,

    /// Override the auth service bind address.
    #[arg(short, long)]
    bind: Option<String>,

    /// Log level (trace, debug, info, warn, error), overrides the config file.
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)?;
            ServerConfig::from_toml(&text)?
        }
        None => ServerConfig::default(),
    };

    if let Some(bind) = args.bind {
        config.auth_addr.bind = bind;
    }
    if let Some(log_level) = args.log_level {
        config.log_level = log_level;
    }

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("oscar-server starting");

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("shutdown signal received");
        shutdown.cancel();
    });

    run_server(config, cancel).await?;

    Ok(())
}
