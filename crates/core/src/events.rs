use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical order/position side used throughout the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Returns the opposite side.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Buy => "Buy",
            Self::Sell => "Sell",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    Market,
    Limit,
}

impl OrderType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Market => "Market",
            Self::Limit => "Limit",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeInForce {
    GoodTillCancel,
    ImmediateOrCancel,
}

impl TimeInForce {
    /// Venue wire code.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::GoodTillCancel => "GTC",
            Self::ImmediateOrCancel => "IOC",
        }
    }
}

/// Exchange trading filters for one symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolMetadata {
    pub name: String,
    /// Minimum price increment.
    pub tick_size: Decimal,
    /// Minimum quantity increment.
    pub qty_step: Decimal,
}

/// A live position as reported by the venue. Only `size > 0` is open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub side: Side,
    pub size: Decimal,
    pub unrealized_pnl: Decimal,
}

impl Position {
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.size > Decimal::ZERO
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BestPrices {
    pub best_bid: Decimal,
    pub best_ask: Decimal,
}

impl BestPrices {
    /// The price an order on `side` would cross at.
    #[must_use]
    pub const fn crossing_price(&self, side: Side) -> Decimal {
        match side {
            Side::Buy => self.best_ask,
            Side::Sell => self.best_bid,
        }
    }
}

/// A fully determined order handed to the gateway in one call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub symbol: String,
    pub side: Side,
    pub order_type: OrderType,
    pub price: Decimal,
    pub quantity: Decimal,
    pub stop_loss: Option<Decimal>,
    pub take_profit: Option<Decimal>,
    pub time_in_force: TimeInForce,
    pub reduce_only: bool,
}

/// Acknowledgement of an accepted order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAck {
    pub order_id: String,
}

/// What the engine reports back after a successful submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacedOrder {
    pub order_id: String,
    pub request: OrderRequest,
    pub submitted_at: DateTime<Utc>,
}
