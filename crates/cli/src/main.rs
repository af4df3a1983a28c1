use clap::{Parser, Subcommand};

mod commands;
mod live_paper;

use commands::{ParseArgs, RunArgs};

#[derive(Parser)]
#[command(name = "signal-trade")]
#[command(about = "Executes chat trading signals on Bybit linear perpetuals", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read signals from stdin and execute them
    Run(RunArgs),
    /// Validate a signal message against the configured symbols, offline
    Parse(ParseArgs),
}

fn init_logging(log_file: Option<&str>) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => {
            init_logging(args.log_file.as_deref())?;
            commands::run_signals(args).await?;
        }
        Commands::Parse(args) => {
            init_logging(None)?;
            commands::run_parse(&args)?;
        }
    }

    Ok(())
}
