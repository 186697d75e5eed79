//! BLE chat CLI entry point

use clap::Parser;
use tracing::{error, info};

use blechat_cli::{app::BlechatApp, cli::Cli, commands::CommandDispatcher, config::AppConfig};

#[tokio::main]
async fn main() {
    // Parse command line arguments
    let cli = Cli::parse();

    // Load configuration before logging so the file can enable verbosity
    let config = match AppConfig::load(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    };

    setup_logging(config.logging.verbose);

    let app = match BlechatApp::new(config) {
        Ok(app) => app,
        Err(e) => {
            error!("Failed to start: {}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = app.install_global() {
        error!("Failed to install session: {}", e);
        std::process::exit(1);
    }

    // Execute the command
    if let Err(e) = CommandDispatcher::execute(cli.command, &app).await {
        error!("Command execution failed: {}", e);
        std::process::exit(1);
    }

    info!("blechat exited successfully");
}

/// Setup logging based on verbosity level
///
/// Logs go to stderr so chat output on stdout stays clean.
fn setup_logging(verbose: bool) {
    let log_level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
