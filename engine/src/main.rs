// Uchronia
// Main entry point for the uchronia binary

use clap::Parser;
use uchronia_engine::cli::{Cli, Command};
use uchronia_engine::config::Config;
use uchronia_engine::handlers::{
    handle_deconstruct, handle_doctor, handle_export, handle_serve, handle_simulate, OutputFormat,
};
use uchronia_engine::service::SimulateRequest;
use uchronia_engine::telemetry::init_telemetry_with_level;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Provider keys may live in a local .env file
    let dotenv = dotenvy::dotenv();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    let level = cli.log.as_deref().unwrap_or(&config.core.log_level);
    init_telemetry_with_level(level);

    tracing::info!(
        "Uchronia v{} ({} - {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_COMMIT_HASH"),
        env!("BUILD_TIMESTAMP")
    );
    if let Ok(path) = dotenv {
        tracing::debug!("Loaded environment from {}", path.display());
    }

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };

    match cli.command {
        Command::Serve { host, port } => handle_serve(config, host, port).await,

        Command::Doctor => {
            tracing::info!("Running diagnostics...");
            handle_doctor(&config, cli.config.as_deref(), format).await
        }

        Command::Deconstruct { invention } => {
            tracing::info!("Deconstructing: {}", invention);
            handle_deconstruct(invention, &config, format).await
        }

        Command::Simulate {
            invention,
            era,
            depth,
            creativity,
        } => {
            tracing::info!("Simulating {} in {}", invention, era);
            let request = SimulateRequest {
                invention,
                era,
                depth,
                creativity,
                decomposition: None,
            };
            handle_simulate(request, &config, format).await
        }

        Command::Export { input, out } => handle_export(&input, out, format).await,
    }
}
