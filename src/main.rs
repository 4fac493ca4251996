use anyhow::{Context, Result};
use clap::Parser;
use std::io::IsTerminal;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

mod app;
mod config;
mod input;
mod navbar;
mod registry;
mod screen;
mod session;

use app::App;
use config::Config;

/// opsdeck - incident-response terminal with an embedded tab multiplexer
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Shell command for new shell tabs (overrides config)
    #[arg(short, long)]
    shell: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Log to stderr so log lines never end up inside the UI
    let log_level = if args.debug {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set global default subscriber")?;

    let mut config = if let Some(config_path) = args.config {
        Config::load_from_file(&config_path)?
    } else {
        Config::load_default()?
    };

    if let Some(shell) = args.shell {
        config.shell.program = shell;
    }

    if !std::io::stdout().is_terminal() {
        eprintln!("Error: opsdeck must be run in an interactive terminal.");
        eprintln!("It cannot be run with redirected output or in non-TTY environments.");
        std::process::exit(1);
    }

    let mut app = App::new(config);
    if let Err(e) = app.run().await {
        eprintln!("\nopsdeck encountered an error: {e}");
        eprintln!("\nIf the terminal display is corrupted, try running:");
        eprintln!("  reset");
        return Err(e);
    }

    Ok(())
}
