//! Chat Relay - Entry Point
//!
//! Loads configuration, binds the listener and runs the relay until Ctrl-C.

use std::env;
use std::path::Path;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use chat_relay::{ChatServer, ServerConfig};

/// Environment variable naming an optional TOML config file
const CONFIG_ENV: &str = "CHAT_RELAY_CONFIG";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging with environment filter
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=chat_relay=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("chat_relay=info")),
        )
        .init();

    let mut config = match env::var(CONFIG_ENV) {
        Ok(path) => ServerConfig::load(Path::new(&path))?,
        Err(_) => ServerConfig::default(),
    };

    // Bind address from command line overrides the config file
    if let Some(addr) = env::args().nth(1) {
        config.bind_addr = addr;
    }

    let server = ChatServer::new(config);
    let listener = server.bind().await?;

    let shutdown = server.shutdown_token();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl-C");
                shutdown.cancel();
            }
            Err(e) => error!("Failed to listen for Ctrl-C: {}", e),
        }
    });

    server.run(listener).await?;
    Ok(())
}
