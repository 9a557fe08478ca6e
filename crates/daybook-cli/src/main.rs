mod cli;
mod config;
mod storage;
mod tasks;
mod tui;

use std::io;

use crate::cli::ConfigCommand;
use clap::Parser;
use color_eyre::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Entry point wiring the CLI to the planner and the TUI.
#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    init_tracing();

    let cli = cli::Cli::parse();
    let config = config::load()?;
    match cli.command.unwrap_or(cli::Command::Tui { date: None }) {
        cli::Command::Tui { date } => {
            let tracker = storage::tracker_from_config(&config)?;
            tui::launch(&tracker, date, config.view.default).await?
        }
        cli::Command::Version => print_version(),
        cli::Command::Config(ConfigCommand::Init) => init_config(&config)?,
        cmd => {
            let tracker = storage::tracker_from_config(&config)?;
            tasks::run(&tracker, cmd, config.view.default, &mut io::stdout()).await?
        }
    }

    Ok(())
}

fn init_tracing() {
    // Respect user-provided filters; default to info and log to stderr so
    // command output stays clean.
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(io::stderr);
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

fn print_version() {
    println!("daybook {}", env!("CARGO_PKG_VERSION"));
}

fn init_config(config: &config::Config) -> Result<()> {
    let path = config::write_default_if_missing(config)?;
    println!("Config initialized at {}", path.display());
    Ok(())
}
