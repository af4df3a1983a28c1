//! Paper trading against live Bybit market data.
//!
//! Instrument filters and top of book come from Bybit's public endpoints;
//! positions, orders and leverage stay in a local `PaperGateway`.
//! No authenticated call is ever made.

use async_trait::async_trait;
use rust_decimal::Decimal;
use signal_trade_bybit::BybitGateway;
use signal_trade_core::{
    BestPrices, ExchangeGateway, GatewayError, OrderAck, OrderRequest, PaperGateway, Position,
    SymbolMetadata,
};

pub struct LivePricedPaperGateway {
    market: BybitGateway,
    book: PaperGateway,
}

impl LivePricedPaperGateway {
    /// Seeds the local book with the venue's instrument list.
    ///
    /// # Errors
    /// Returns error if the instrument list cannot be fetched.
    pub async fn connect(market: BybitGateway, hedge_mode: bool) -> Result<Self, GatewayError> {
        let metadata = market.query_symbol_metadata().await?;
        tracing::info!(instruments = metadata.len(), "paper book seeded from live instruments");
        Ok(Self {
            market,
            book: PaperGateway::new(metadata).with_hedge_mode(hedge_mode),
        })
    }
}

#[async_trait]
impl ExchangeGateway for LivePricedPaperGateway {
    async fn query_symbol_metadata(&self) -> Result<Vec<SymbolMetadata>, GatewayError> {
        self.market.query_symbol_metadata().await
    }

    async fn get_positions(&self) -> Result<Vec<Position>, GatewayError> {
        self.book.get_positions().await
    }

    async fn get_best_prices(&self, symbol: &str) -> Result<BestPrices, GatewayError> {
        self.market.get_best_prices(symbol).await
    }

    async fn place_order(&self, order: &OrderRequest) -> Result<OrderAck, GatewayError> {
        self.book.place_order(order).await
    }

    async fn close_position(&self, symbol: &str) -> Result<(), GatewayError> {
        self.book.close_position(symbol).await
    }

    async fn cancel_order(&self, symbol: &str, order_id: &str) -> Result<(), GatewayError> {
        self.book.cancel_order(symbol, order_id).await
    }

    async fn set_leverage(
        &self,
        symbol: &str,
        buy_leverage: Decimal,
        sell_leverage: Decimal,
    ) -> Result<(), GatewayError> {
        self.book.set_leverage(symbol, buy_leverage, sell_leverage).await
    }

    fn supports_hedge_mode(&self) -> bool {
        self.book.supports_hedge_mode()
    }

    fn name(&self) -> &str {
        "bybit-paper"
    }
}
