// Nimbus Weather Assistant
// Main entry point for the nimbus binary

use clap::Parser;
use nimbus_engine::cli::{Cli, Command};
use nimbus_engine::config::Config;
use nimbus_engine::handlers::{
    handle_chat, handle_doctor, handle_serve, handle_weather_server, OutputFormat,
};
use nimbus_engine::telemetry::init_telemetry_with_level;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration (or use custom path if provided)
    let config = if let Some(config_path) = &cli.config {
        Config::load_from_path(config_path)?
    } else {
        Config::load_or_create()?
    };

    // --log wins over the config file; RUST_LOG wins over both
    let log_level = cli.log.as_deref().unwrap_or(&config.core.log_level);
    init_telemetry_with_level(log_level);

    tracing::info!("Nimbus v{}", env!("CARGO_PKG_VERSION"));

    // Determine output format
    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };

    match cli.command {
        Command::Serve {
            with_weather_server,
        } => {
            tracing::info!("Starting chat API...");
            handle_serve(&config, with_weather_server).await
        }

        Command::WeatherServer => {
            tracing::info!("Starting weather service...");
            handle_weather_server(&config).await
        }

        Command::Chat {
            session,
            no_context,
        } => handle_chat(&config, &session, no_context).await,

        Command::Doctor => {
            tracing::info!("Running diagnostics...");
            handle_doctor(&config, format).await
        }
    }
}
