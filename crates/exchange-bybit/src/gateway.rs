//! `ExchangeGateway` over the Bybit linear perpetual API.

use crate::client::BybitClient;
use crate::error::{codes, BybitError};
use crate::types::{
    hedge_position_idx, wire_decimal, CreateOrderBody, RawPosition, SetLeverageBody,
    CATEGORY_LINEAR,
};
use async_trait::async_trait;
use rust_decimal::Decimal;
use signal_trade_core::{
    BestPrices, ExchangeGateway, GatewayError, OrderAck, OrderRequest, OrderType, Position,
    SymbolMetadata, TimeInForce,
};

const DEFAULT_SETTLE_COIN: &str = "USDT";

pub struct BybitGateway {
    client: BybitClient,
    hedge_mode: bool,
    settle_coin: String,
}

impl BybitGateway {
    #[must_use]
    pub fn new(client: BybitClient) -> Self {
        Self {
            client,
            hedge_mode: false,
            settle_coin: DEFAULT_SETTLE_COIN.to_string(),
        }
    }

    /// The account runs in hedge (two-way) position mode.
    #[must_use]
    pub const fn with_hedge_mode(mut self, hedge_mode: bool) -> Self {
        self.hedge_mode = hedge_mode;
        self
    }

    #[must_use]
    pub fn with_settle_coin(mut self, coin: impl Into<String>) -> Self {
        self.settle_coin = coin.into();
        self
    }

    /// Builds the create-order body; market orders carry no limit price.
    #[must_use]
    pub fn order_body(&self, order: &OrderRequest) -> CreateOrderBody {
        let price = match order.order_type {
            OrderType::Limit => Some(wire_decimal(order.price)),
            OrderType::Market => None,
        };
        // A reduce-only order works against the position on the other side.
        let position_side = if order.reduce_only {
            order.side.opposite()
        } else {
            order.side
        };

        CreateOrderBody {
            category: CATEGORY_LINEAR,
            symbol: order.symbol.clone(),
            side: order.side.as_str(),
            order_type: order.order_type.as_str(),
            qty: wire_decimal(order.quantity),
            price,
            time_in_force: order.time_in_force.code(),
            take_profit: order.take_profit.map(wire_decimal),
            stop_loss: order.stop_loss.map(wire_decimal),
            reduce_only: order.reduce_only,
            position_idx: self.hedge_mode.then(|| hedge_position_idx(position_side)),
        }
    }

    fn closing_order(position: &Position) -> OrderRequest {
        OrderRequest {
            symbol: position.symbol.clone(),
            side: position.side.opposite(),
            order_type: OrderType::Market,
            price: Decimal::ZERO,
            quantity: position.size,
            stop_loss: None,
            take_profit: None,
            time_in_force: TimeInForce::ImmediateOrCancel,
            reduce_only: true,
        }
    }
}

#[async_trait]
impl ExchangeGateway for BybitGateway {
    async fn query_symbol_metadata(&self) -> Result<Vec<SymbolMetadata>, GatewayError> {
        let instruments = self.client.get_instruments().await?;
        Ok(instruments
            .into_iter()
            .filter(|i| i.is_trading())
            .map(SymbolMetadata::from)
            .collect())
    }

    async fn get_positions(&self) -> Result<Vec<Position>, GatewayError> {
        let raw = self.client.get_positions(None, &self.settle_coin).await?;
        Ok(raw.into_iter().filter_map(RawPosition::into_position).collect())
    }

    async fn get_best_prices(&self, symbol: &str) -> Result<BestPrices, GatewayError> {
        let book = self.client.get_orderbook(symbol).await?;
        Ok(book.best_prices())
    }

    async fn place_order(&self, order: &OrderRequest) -> Result<OrderAck, GatewayError> {
        let body = self.order_body(order);
        let result = self.client.create_order(&body).await?;
        tracing::debug!(symbol = %order.symbol, order_id = %result.order_id, "bybit order created");
        Ok(OrderAck {
            order_id: result.order_id,
        })
    }

    async fn close_position(&self, symbol: &str) -> Result<(), GatewayError> {
        let raw = self.client.get_positions(Some(symbol), &self.settle_coin).await?;
        for position in raw.into_iter().filter_map(RawPosition::into_position) {
            let body = self.order_body(&Self::closing_order(&position));
            let result = self.client.create_order(&body).await?;
            tracing::info!(
                %symbol,
                side = %position.side,
                size = %position.size,
                order_id = %result.order_id,
                "closing order created"
            );
        }
        Ok(())
    }

    async fn cancel_order(&self, symbol: &str, order_id: &str) -> Result<(), GatewayError> {
        self.client.cancel_order(symbol, order_id).await?;
        Ok(())
    }

    async fn set_leverage(
        &self,
        symbol: &str,
        buy_leverage: Decimal,
        sell_leverage: Decimal,
    ) -> Result<(), GatewayError> {
        let body = SetLeverageBody {
            category: CATEGORY_LINEAR,
            symbol: symbol.to_string(),
            buy_leverage: wire_decimal(buy_leverage),
            sell_leverage: wire_decimal(sell_leverage),
        };
        match self.client.set_leverage(&body).await {
            Ok(()) => Ok(()),
            Err(BybitError::Api { ret_code, .. }) if ret_code == codes::LEVERAGE_NOT_MODIFIED => {
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn supports_hedge_mode(&self) -> bool {
        self.hedge_mode
    }

    fn name(&self) -> &str {
        "bybit"
    }
}
