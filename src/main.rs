use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};

use er_sql::config::{AppConfig, CliArgs};
use er_sql::llm::SqlSynthesizer;
use er_sql::util::logging::init_tracing;
use er_sql::web::{self, state::AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    init_tracing();

    // Parse command line arguments
    let args = CliArgs::parse();

    // Load configuration
    let config = match AppConfig::new(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    // Provider when a credential is present, mock generation otherwise
    let synthesizer = SqlSynthesizer::new(&config.llm)?;

    let app_state = Arc::new(AppState::new(config.clone(), synthesizer));

    // Start the web server
    info!("Starting er-sql server on {}:{}", config.web.host, config.web.port);
    match web::run_server(config.web, app_state).await {
        Ok(_) => info!("Server stopped gracefully"),
        Err(e) => {
            error!("Server error: {}", e);
            return Err(e.into());
        }
    }

    Ok(())
}
