//! Free-text signal parsing.
//!
//! Messages look like `"BTCUSDT: [0.48500952 0.51499045] BUY"`: the leading
//! word is the symbol, the trailing `BUY`/`SELL` token (any case) is the side,
//! and everything in between is ignored.

use crate::events::Side;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::LazyLock;
use thiserror::Error;

static SIGNAL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(\w+).*(BUY|SELL)\s*$").expect("valid signal pattern"));

/// A validated `(symbol, side)` instruction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Signal {
    pub symbol: String,
    pub side: Side,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("signal {0:?} has wrong pattern, expected something like 'BTCUSDT: [0.485 0.514] BUY'")]
    MalformedSignal(String),

    #[error("symbol {0} is not in the list of approved symbols")]
    UnknownSymbol(String),
}

/// Parses `raw` against the live allow-list (the keys of `allowed`).
///
/// # Errors
/// `MalformedSignal` if the text does not match, `UnknownSymbol` if the
/// uppercased symbol is not allow-listed.
pub fn parse_signal<V>(raw: &str, allowed: &HashMap<String, V>) -> Result<Signal, ParseError> {
    let captures = SIGNAL_PATTERN
        .captures(raw)
        .ok_or_else(|| ParseError::MalformedSignal(raw.to_string()))?;

    let symbol = captures[1].to_uppercase();
    let side = match captures[2].to_ascii_uppercase().as_str() {
        "BUY" => Side::Buy,
        "SELL" => Side::Sell,
        _ => return Err(ParseError::MalformedSignal(raw.to_string())),
    };

    if !allowed.contains_key(&symbol) {
        return Err(ParseError::UnknownSymbol(symbol));
    }

    Ok(Signal { symbol, side })
}
