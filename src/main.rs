// dbforge: database lifecycle and schema translation REPL
//
// This is the main entry point for the dbforge application.

use anyhow::{Context, Result};
use dbforge::cli::Repl;
use dbforge::config::{create_shared_state, AppState, ForgeConfig};
use tracing_subscriber::EnvFilter;

/// Environment variable overriding the configured log filter
const LOG_ENV: &str = "DBFORGE_LOG";

fn setup_logging(default_level: &str) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let config = ForgeConfig::load().context("Failed to load configuration")?;
    setup_logging(&config.log_level);

    let state = AppState::from_config(config).context("Failed to initialize engines")?;
    let mut repl = Repl::new(create_shared_state(state))?;
    repl.run().await?;

    Ok(())
}
