use anyhow::Result;
use chainvol::core::config::AppConfig;
use chainvol::core::log::init_logging;
use clap::{CommandFactory, Parser, Subcommand};
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Aggregate the configured batch into daily USD volumes
    Run,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => setup(cli.config_path.as_deref()),
        Some(Commands::Run) => run(cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}

async fn run(config_path: Option<&str>) -> Result<()> {
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling batch");
            on_interrupt.cancel();
        }
    });

    chainvol::run_command(chainvol::AppCommand::Run, config_path, cancel).await
}

fn setup(config_path: Option<&str>) -> Result<()> {
    match config_path {
        Some(path) => chainvol::cli::setup::setup_at_path(path),
        None => chainvol::cli::setup::setup_at_path(AppConfig::default_config_path()?),
    }
}
