//! `run` command: executes signals read from stdin.
//!
//! Each line is one chat message. Valid signals are executed concurrently,
//! one task per signal; invalid lines are logged and skipped. A line of the
//! form `/cancel <SYMBOL> <BUY|SELL>` cancels the newest tracked order.

use crate::live_paper::LivePricedPaperGateway;
use anyhow::{anyhow, Result};
use clap::Args;
use secrecy::SecretString;
use signal_trade_bybit::{BybitClient, BybitClientConfig, BybitCredentials, BybitGateway};
use signal_trade_core::{
    parse_signal, ConfigLoader, ConfigWatcher, ExchangeGateway, ExecutionEngine, ParseError, Side,
    Signal, SnapshotHolder, SymbolSnapshot,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinSet;

/// Arguments for the run command.
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Symbols config file (YAML, or TOML by extension)
    #[arg(short, long, default_value = "config/symbols.yaml")]
    pub config: PathBuf,

    /// Simulate orders locally against live Bybit market data
    #[arg(long)]
    pub paper: bool,

    /// Optional log file path (logs to file instead of stderr)
    #[arg(long)]
    pub log_file: Option<String>,

    /// Bybit API key (required unless --paper)
    #[arg(long, env = "BYBIT_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Bybit API secret (required unless --paper)
    #[arg(long, env = "BYBIT_API_SECRET", hide_env_values = true)]
    pub api_secret: Option<String>,
}

/// One actionable stdin line.
#[derive(Debug, Clone, PartialEq, Eq)]
enum LineCommand {
    Execute(Signal),
    CancelLast { symbol: String, side: Side },
}

/// Runs the signal loop until stdin closes or Ctrl+C.
///
/// # Errors
/// Returns an error if the config, the gateway or the first snapshot cannot
/// be set up. Per-signal failures never end the loop.
pub async fn run_signals(args: RunArgs) -> Result<()> {
    tracing::info!(config = %args.config.display(), paper = args.paper, "starting signal runner");

    let config = ConfigLoader::load(&args.config)?;
    let gateway = connect(&args, &config).await?;

    let snapshot = SymbolSnapshot::activate(&config, gateway.as_ref()).await?;
    let mut symbols: Vec<&String> = snapshot.symbols().keys().collect();
    symbols.sort();
    tracing::info!(?symbols, dropped = ?snapshot.dropped(), "symbols activated");

    let holder = SnapshotHolder::new(snapshot);
    let engine = Arc::new(
        ExecutionEngine::new(Arc::clone(&gateway), holder.clone())
            .with_gateway_timeout(config.engine.gateway_timeout()),
    );

    let watcher = ConfigWatcher::new(args.config.clone(), holder, gateway);
    let watcher_handle = tokio::spawn(async move {
        if let Err(e) = watcher.watch().await {
            tracing::error!("config watcher stopped: {}", e);
        }
    });

    let mut tasks = JoinSet::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    tracing::info!("input closed");
                    break;
                };
                dispatch(&engine, &mut tasks, &line);
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("received Ctrl+C, shutting down");
                break;
            }
            Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                if let Err(e) = joined {
                    tracing::error!("execution task failed: {}", e);
                }
            }
        }
    }

    tracing::info!(in_flight = tasks.len(), "waiting for in-flight executions");
    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            tracing::error!("execution task failed: {}", e);
        }
    }
    watcher_handle.abort();

    tracing::info!("signal runner stopped");
    Ok(())
}

async fn connect(
    args: &RunArgs,
    config: &signal_trade_core::AppConfig,
) -> Result<Arc<dyn ExchangeGateway>> {
    let client_config = BybitClientConfig::from_exchange_config(&config.exchange);

    if args.paper {
        let market = BybitGateway::new(BybitClient::new(client_config, None)?);
        let gateway = LivePricedPaperGateway::connect(market, config.exchange.hedge_mode).await?;
        return Ok(Arc::new(gateway));
    }

    let api_key = args
        .api_key
        .clone()
        .ok_or_else(|| anyhow!("BYBIT_API_KEY must be set via --api-key or env var"))?;
    let api_secret = args
        .api_secret
        .clone()
        .ok_or_else(|| anyhow!("BYBIT_API_SECRET must be set via --api-secret or env var"))?;
    let credentials = BybitCredentials::new(api_key, SecretString::from(api_secret))?;

    let client = BybitClient::new(client_config, Some(credentials))?;
    Ok(Arc::new(
        BybitGateway::new(client).with_hedge_mode(config.exchange.hedge_mode),
    ))
}

fn dispatch(engine: &Arc<ExecutionEngine>, tasks: &mut JoinSet<()>, line: &str) {
    let snapshot = engine.snapshots().current();
    let command = match parse_line(line, &snapshot) {
        Ok(Some(command)) => command,
        Ok(None) => return,
        Err(e) => {
            tracing::warn!("ignoring message: {}", e);
            return;
        }
    };

    let engine = Arc::clone(engine);
    match command {
        LineCommand::Execute(signal) => {
            tracing::info!(symbol = %signal.symbol, side = %signal.side, "signal received");
            tasks.spawn(async move {
                engine.submit_signal(&signal.symbol, signal.side).await;
            });
        }
        LineCommand::CancelLast { symbol, side } => {
            tasks.spawn(async move {
                // Outcome is logged by the engine.
                let _ = engine.cancel_last(&symbol, side).await;
            });
        }
    }
}

fn parse_line(line: &str, snapshot: &SymbolSnapshot) -> Result<Option<LineCommand>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    if let Some(rest) = line.strip_prefix("/cancel") {
        let mut parts = rest.split_whitespace();
        let (Some(symbol), Some(side), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(anyhow!("usage: /cancel <SYMBOL> <BUY|SELL>"));
        };
        let side = match side.to_ascii_uppercase().as_str() {
            "BUY" => Side::Buy,
            "SELL" => Side::Sell,
            other => return Err(anyhow!("unknown side {other}")),
        };
        let symbol = symbol.to_uppercase();
        if snapshot.get(&symbol).is_none() {
            return Err(ParseError::UnknownSymbol(symbol).into());
        }
        return Ok(Some(LineCommand::CancelLast { symbol, side }));
    }

    let signal = parse_signal(line, snapshot.symbols())?;
    Ok(Some(LineCommand::Execute(signal)))
}
