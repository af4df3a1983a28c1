use crate::error::GatewayError;
use crate::events::{BestPrices, OrderAck, OrderRequest, Position, SymbolMetadata};
use async_trait::async_trait;
use rust_decimal::Decimal;

/// The trading venue as seen by the execution core.
///
/// The venue is authoritative for positions; the core never caches them.
#[async_trait]
pub trait ExchangeGateway: Send + Sync {
    /// Tradable-symbol universe with price/quantity increments.
    async fn query_symbol_metadata(&self) -> Result<Vec<SymbolMetadata>, GatewayError>;

    /// Open positions (`size > 0`) across all symbols.
    async fn get_positions(&self) -> Result<Vec<Position>, GatewayError>;

    async fn get_best_prices(&self, symbol: &str) -> Result<BestPrices, GatewayError>;

    /// Submits one order; the returned id is what gets tracked.
    async fn place_order(&self, order: &OrderRequest) -> Result<OrderAck, GatewayError>;

    /// Flattens every open position on `symbol`.
    async fn close_position(&self, symbol: &str) -> Result<(), GatewayError>;

    async fn cancel_order(&self, symbol: &str, order_id: &str) -> Result<(), GatewayError>;

    async fn set_leverage(
        &self,
        symbol: &str,
        buy_leverage: Decimal,
        sell_leverage: Decimal,
    ) -> Result<(), GatewayError>;

    /// Whether both sides of one symbol may be open at the same time.
    fn supports_hedge_mode(&self) -> bool {
        false
    }

    fn name(&self) -> &str;
}
