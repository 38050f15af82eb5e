use clap::Parser;
use niftygear::cli::{self, Cli, Commands};
use niftygear::config::AppConfig;
use niftygear::coordinator::{run_once, run_until_shutdown};
use tracing::{error, info};

mod main_runtime;

use main_runtime::{init_logging, init_logging_simple};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match AppConfig::load_from(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("\x1b[31m✗ failed to load config from {}: {e}\x1b[0m", cli.config.display());
            return Err(e.into());
        }
    };

    match cli.command {
        Commands::Run => {
            init_logging(&config.logging);
            info!(state_dir = %config.storage.state_dir.display(), "starting niftygear");
            if let Err(e) = run_until_shutdown(config).await {
                error!(code = e.code(), "fatal: {e}");
                return Err(e.into());
            }
        }
        Commands::Once => {
            init_logging(&config.logging);
            let outcome = run_once(config).await?;
            println!("{outcome:?}");
        }
        Commands::Status => {
            init_logging_simple();
            cli::show_status(&config).await?;
        }
        Commands::Gear { vix, capital } => {
            init_logging_simple();
            cli::show_gear(&config, vix, capital);
        }
    }

    Ok(())
}
