mod cli;
mod commands;
mod error;
mod output;

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use gponctl_config::Config;
use gponctl_core::{Controller, MemoryStore};

use crate::cli::{Cli, Command, GlobalOpts, LogFormat};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Setup tracing based on verbosity
    init_tracing(cli.global.verbose, cli.global.log_format);

    // Dispatch and handle errors with proper exit codes
    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8, format: LogFormat) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        // Config commands never open the inventory
        Command::Config(args) => commands::config_cmd::handle(args, &cli.global),

        // Shell completions generation
        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "gponctl", &mut std::io::stdout());
            Ok(())
        }

        // Everything else works against the inventory
        cmd => {
            let mut config = load_config(&cli.global)?;
            if let Command::Run(args) = &cmd {
                if let Some(secs) = args.interval {
                    config.engine.poll_interval_secs = secs;
                }
            }
            let controller = build_controller(&config, &cli.global).await?;

            tracing::debug!(command = ?cmd, "dispatching command");
            commands::dispatch(cmd, &controller, &cli.global).await
        }
    }
}

/// Load the config file named by `--config`, or the canonical one.
fn load_config(global: &GlobalOpts) -> Result<Config, CliError> {
    let config = match &global.config {
        Some(path) => gponctl_config::load_config_from(path)?,
        None => gponctl_config::load_config()?,
    };
    Ok(config)
}

/// Open the inventory file and wire a controller over the real transports.
async fn build_controller(config: &Config, global: &GlobalOpts) -> Result<Controller, CliError> {
    let controller_config = gponctl_config::to_controller_config(config)?;
    let path = global
        .inventory
        .clone()
        .unwrap_or_else(|| config.inventory_path());

    tracing::debug!(path = %path.display(), "opening inventory");
    let store = MemoryStore::open(path).await?;
    Ok(Controller::from_config(controller_config, Arc::new(store))?)
}
