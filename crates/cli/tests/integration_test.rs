use std::io::Write;
use std::process::Command;

const CONFIG: &str = r"
global_reference:
  buy_leverage: 10
  size: 100
symbols:
  btcusdt: {}
  ETHUSDT:
    order_type: Limit
";

fn config_file() -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".yaml")
        .tempfile()
        .expect("Failed to create temp config");
    file.write_all(CONFIG.as_bytes()).unwrap();
    file
}

fn parse(config: &tempfile::NamedTempFile, message: &str) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_signal-trade"))
        .arg("parse")
        .arg("--config")
        .arg(config.path())
        .arg(message)
        .env("RUST_LOG", "off")
        .output()
        .expect("Failed to run signal-trade")
}

#[test]
fn test_parse_valid_signal() {
    let config = config_file();
    let output = parse(&config, "btcusdt: [0.485 0.514] SELL");

    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["symbol"], "BTCUSDT");
    assert_eq!(json["side"], "Sell");
}

#[test]
fn test_parse_unknown_symbol_fails() {
    let config = config_file();
    let output = parse(&config, "DOGEUSDT: [0.1 0.2] BUY");

    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
}

#[test]
fn test_parse_malformed_message_fails() {
    let config = config_file();
    let output = parse(&config, "ETHUSDT to the moon");

    assert!(!output.status.success());
}

#[test]
fn test_parse_missing_config_fails() {
    let output = Command::new(env!("CARGO_BIN_EXE_signal-trade"))
        .args(["parse", "--config", "/nonexistent/symbols.yaml"])
        .arg("BTCUSDT: [1 2] BUY")
        .output()
        .expect("Failed to run signal-trade");

    assert!(!output.status.success());
}
