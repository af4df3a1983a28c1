//! Wire types for the Bybit v5 REST API.
//!
//! Bybit encodes every number as a string; `Decimal` deserializes from
//! either form.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use signal_trade_core::{BestPrices, Position, Side, SymbolMetadata};
use std::str::FromStr;

pub const CATEGORY_LINEAR: &str = "linear";

/// Common response envelope.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<T> {
    pub ret_code: i64,
    #[serde(default)]
    pub ret_msg: String,
    pub result: Option<T>,
}

/// Cursor-paginated list.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PagedList<T> {
    #[serde(default = "Vec::new")]
    pub list: Vec<T>,
    #[serde(default)]
    pub next_page_cursor: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawInstrument {
    pub symbol: String,
    #[serde(default)]
    pub status: String,
    pub price_filter: RawPriceFilter,
    pub lot_size_filter: RawLotSizeFilter,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPriceFilter {
    pub tick_size: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLotSizeFilter {
    pub qty_step: Decimal,
}

impl RawInstrument {
    #[must_use]
    pub fn is_trading(&self) -> bool {
        self.status == "Trading"
    }
}

impl From<RawInstrument> for SymbolMetadata {
    fn from(raw: RawInstrument) -> Self {
        Self {
            name: raw.symbol,
            tick_size: raw.price_filter.tick_size,
            qty_step: raw.lot_size_filter.qty_step,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPosition {
    pub symbol: String,
    /// `Buy`, `Sell`, or empty when flat.
    #[serde(default)]
    pub side: String,
    pub size: Decimal,
    /// Empty string when flat.
    #[serde(default)]
    pub unrealised_pnl: String,
    /// 0 one-way, 1 hedge buy side, 2 hedge sell side.
    #[serde(default)]
    pub position_idx: u8,
}

impl RawPosition {
    /// Converts an open position; flat or unrecognized entries yield `None`.
    #[must_use]
    pub fn into_position(self) -> Option<Position> {
        let side = parse_side(&self.side)?;
        if self.size <= Decimal::ZERO {
            return None;
        }
        Some(Position {
            symbol: self.symbol,
            side,
            size: self.size,
            unrealized_pnl: Decimal::from_str(&self.unrealised_pnl).unwrap_or_default(),
        })
    }
}

/// Top-of-book levels, `[price, size]` pairs best first.
#[derive(Debug, Clone, Deserialize)]
pub struct RawOrderbook {
    #[serde(rename = "s")]
    pub symbol: String,
    #[serde(rename = "b", default)]
    pub bids: Vec<[String; 2]>,
    #[serde(rename = "a", default)]
    pub asks: Vec<[String; 2]>,
}

impl RawOrderbook {
    /// Best bid and ask; an empty side reads as zero.
    #[must_use]
    pub fn best_prices(&self) -> BestPrices {
        BestPrices {
            best_bid: top_price(&self.bids),
            best_ask: top_price(&self.asks),
        }
    }
}

fn top_price(levels: &[[String; 2]]) -> Decimal {
    levels
        .first()
        .and_then(|[price, _]| Decimal::from_str(price).ok())
        .unwrap_or_default()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResult {
    pub order_id: String,
}

/// `POST /v5/order/create` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderBody {
    pub category: &'static str,
    pub symbol: String,
    pub side: &'static str,
    pub order_type: &'static str,
    pub qty: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    pub time_in_force: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub take_profit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_loss: Option<String>,
    pub reduce_only: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position_idx: Option<u8>,
}

/// `POST /v5/order/cancel` body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelOrderBody {
    pub category: &'static str,
    pub symbol: String,
    pub order_id: String,
}

/// `POST /v5/position/set-leverage` body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetLeverageBody {
    pub category: &'static str,
    pub symbol: String,
    pub buy_leverage: String,
    pub sell_leverage: String,
}

/// Empty `result` object returned by write endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Empty {}

pub fn parse_side(raw: &str) -> Option<Side> {
    match raw {
        "Buy" => Some(Side::Buy),
        "Sell" => Some(Side::Sell),
        _ => None,
    }
}

/// Plain decimal text without trailing zeros, as Bybit expects.
#[must_use]
pub fn wire_decimal(value: Decimal) -> String {
    value.normalize().to_string()
}

/// Hedge-mode position index for a position on `side`.
#[must_use]
pub const fn hedge_position_idx(side: Side) -> u8 {
    match side {
        Side::Buy => 1,
        Side::Sell => 2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_instrument_parsing() {
        let raw: RawInstrument = serde_json::from_value(serde_json::json!({
            "symbol": "BTCUSDT",
            "status": "Trading",
            "priceFilter": { "minPrice": "0.50", "maxPrice": "999999.00", "tickSize": "0.50" },
            "lotSizeFilter": { "maxOrderQty": "100.000", "minOrderQty": "0.001", "qtyStep": "0.001" }
        }))
        .unwrap();

        assert!(raw.is_trading());
        let meta = SymbolMetadata::from(raw);
        assert_eq!(meta.tick_size, dec!(0.5));
        assert_eq!(meta.qty_step, dec!(0.001));
    }

    #[test]
    fn test_flat_position_is_skipped() {
        let raw: RawPosition = serde_json::from_value(serde_json::json!({
            "symbol": "ETHUSDT", "side": "", "size": "0", "unrealisedPnl": "", "positionIdx": 0
        }))
        .unwrap();
        assert!(raw.into_position().is_none());
    }

    #[test]
    fn test_open_position_parsing() {
        let raw: RawPosition = serde_json::from_value(serde_json::json!({
            "symbol": "ETHUSDT", "side": "Sell", "size": "1.25", "unrealisedPnl": "-3.5", "positionIdx": 2
        }))
        .unwrap();
        let position = raw.into_position().unwrap();
        assert_eq!(position.side, Side::Sell);
        assert_eq!(position.size, dec!(1.25));
        assert_eq!(position.unrealized_pnl, dec!(-3.5));
    }

    #[test]
    fn test_orderbook_best_prices() {
        let raw: RawOrderbook = serde_json::from_value(serde_json::json!({
            "s": "BTCUSDT",
            "b": [["49999.5", "1.2"]],
            "a": [["50000", "0.4"]],
            "ts": 1_700_000_000_000_i64,
            "u": 1
        }))
        .unwrap();
        let best = raw.best_prices();
        assert_eq!(best.best_bid, dec!(49999.5));
        assert_eq!(best.best_ask, dec!(50000));

        let empty: RawOrderbook =
            serde_json::from_value(serde_json::json!({ "s": "BTCUSDT", "b": [], "a": [] })).unwrap();
        assert_eq!(empty.best_prices().best_ask, Decimal::ZERO);
    }

    #[test]
    fn test_create_order_body_omits_unset_fields() {
        let body = CreateOrderBody {
            category: CATEGORY_LINEAR,
            symbol: "BTCUSDT".to_string(),
            side: "Buy",
            order_type: "Market",
            qty: wire_decimal(dec!(0.0020)),
            price: None,
            time_in_force: "GTC",
            take_profit: None,
            stop_loss: Some(wire_decimal(dec!(47999.50))),
            reduce_only: false,
            position_idx: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["qty"], "0.002");
        assert_eq!(json["stopLoss"], "47999.5");
        assert_eq!(json["orderType"], "Market");
        assert!(json.get("price").is_none());
        assert!(json.get("takeProfit").is_none());
        assert!(json.get("positionIdx").is_none());
    }

    #[test]
    fn test_envelope_error_parsing() {
        let env: Envelope<Empty> = serde_json::from_value(serde_json::json!({
            "retCode": 10001, "retMsg": "params error", "result": {}, "time": 1
        }))
        .unwrap();
        assert_eq!(env.ret_code, 10001);
        assert_eq!(env.ret_msg, "params error");
    }
}
