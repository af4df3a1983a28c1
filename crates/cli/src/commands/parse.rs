//! `parse` command: checks a message against the configured symbols without
//! touching the exchange.

use anyhow::Result;
use clap::Args;
use signal_trade_core::{parse_signal, ConfigLoader};
use std::collections::HashMap;
use std::path::PathBuf;

/// Arguments for the parse command.
#[derive(Args, Debug, Clone)]
pub struct ParseArgs {
    /// Symbols config file (YAML, or TOML by extension)
    #[arg(short, long, default_value = "config/symbols.yaml")]
    pub config: PathBuf,

    /// Message text, e.g. "BTCUSDT: [0.485 0.514] BUY"
    pub message: String,
}

/// Prints the parsed signal as JSON.
///
/// # Errors
/// Returns an error if the config cannot be loaded or the message is rejected.
pub fn run_parse(args: &ParseArgs) -> Result<()> {
    let config = ConfigLoader::load(&args.config)?;
    let allowed: HashMap<String, ()> = config
        .symbols
        .keys()
        .map(|symbol| (symbol.to_uppercase(), ()))
        .collect();

    let signal = parse_signal(&args.message, &allowed)?;
    println!("{}", serde_json::to_string(&signal)?);
    Ok(())
}
