//! CLI commands for the signal-trade runner.

pub mod parse;
pub mod run;

pub use parse::{run_parse, ParseArgs};
pub use run::{run_signals, RunArgs};
