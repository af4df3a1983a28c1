//! In-memory exchange gateway for paper trading and tests.
//!
//! Makes **zero network calls**. Market orders fill immediately at the
//! order price, limit orders rest until cancelled. Every call is journaled.

use crate::error::GatewayError;
use crate::events::{BestPrices, OrderAck, OrderRequest, OrderType, Position, Side, SymbolMetadata};
use crate::traits::ExchangeGateway;
use async_trait::async_trait;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Gateway operations, used to inject failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    QueryMetadata,
    GetPositions,
    GetBestPrices,
    PlaceOrder,
    ClosePosition,
    CancelOrder,
    SetLeverage,
}

/// One journaled gateway call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
    QueryMetadata,
    GetPositions,
    GetBestPrices { symbol: String },
    PlaceOrder(OrderRequest),
    ClosePosition { symbol: String },
    CancelOrder { symbol: String, order_id: String },
    SetLeverage { symbol: String, buy: Decimal, sell: Decimal },
}

impl GatewayCall {
    #[must_use]
    pub const fn kind(&self) -> CallKind {
        match self {
            Self::QueryMetadata => CallKind::QueryMetadata,
            Self::GetPositions => CallKind::GetPositions,
            Self::GetBestPrices { .. } => CallKind::GetBestPrices,
            Self::PlaceOrder(_) => CallKind::PlaceOrder,
            Self::ClosePosition { .. } => CallKind::ClosePosition,
            Self::CancelOrder { .. } => CallKind::CancelOrder,
            Self::SetLeverage { .. } => CallKind::SetLeverage,
        }
    }
}

#[derive(Debug, Default)]
struct PaperState {
    prices: HashMap<String, BestPrices>,
    positions: Vec<Position>,
    resting: Vec<(String, OrderRequest)>,
    leverage: HashMap<String, (Decimal, Decimal)>,
    journal: Vec<GatewayCall>,
    failures: HashMap<CallKind, GatewayError>,
}

pub struct PaperGateway {
    metadata: Vec<SymbolMetadata>,
    hedge_mode: bool,
    latency: Option<Duration>,
    next_order_id: AtomicU64,
    state: Mutex<PaperState>,
}

impl PaperGateway {
    #[must_use]
    pub fn new(metadata: Vec<SymbolMetadata>) -> Self {
        Self {
            metadata,
            hedge_mode: false,
            latency: None,
            next_order_id: AtomicU64::new(1),
            state: Mutex::new(PaperState::default()),
        }
    }

    #[must_use]
    pub const fn with_hedge_mode(mut self, hedge_mode: bool) -> Self {
        self.hedge_mode = hedge_mode;
        self
    }

    /// Delays every call, to exercise caller timeouts.
    #[must_use]
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    #[must_use]
    pub fn with_prices(self, symbol: &str, best_bid: Decimal, best_ask: Decimal) -> Self {
        self.set_prices(symbol, best_bid, best_ask);
        self
    }

    #[must_use]
    pub fn with_position(self, position: Position) -> Self {
        self.state.lock().positions.push(position);
        self
    }

    pub fn set_prices(&self, symbol: &str, best_bid: Decimal, best_ask: Decimal) {
        self.state.lock().prices.insert(
            symbol.to_string(),
            BestPrices {
                best_bid,
                best_ask,
            },
        );
    }

    /// Makes every later call of `kind` fail with `error`.
    pub fn fail_on(&self, kind: CallKind, error: GatewayError) {
        self.state.lock().failures.insert(kind, error);
    }

    pub fn clear_failures(&self) {
        self.state.lock().failures.clear();
    }

    #[must_use]
    pub fn calls(&self) -> Vec<GatewayCall> {
        self.state.lock().journal.clone()
    }

    /// Number of journaled calls of `kind`.
    #[must_use]
    pub fn count(&self, kind: CallKind) -> usize {
        self.state
            .lock()
            .journal
            .iter()
            .filter(|c| c.kind() == kind)
            .count()
    }

    /// Orders accepted by `place_order`, oldest first.
    #[must_use]
    pub fn placed_orders(&self) -> Vec<OrderRequest> {
        self.state
            .lock()
            .journal
            .iter()
            .filter_map(|c| match c {
                GatewayCall::PlaceOrder(order) => Some(order.clone()),
                _ => None,
            })
            .collect()
    }

    #[must_use]
    pub fn open_positions(&self) -> Vec<Position> {
        self.state.lock().positions.clone()
    }

    /// Ids of limit orders still resting.
    #[must_use]
    pub fn resting_order_ids(&self) -> Vec<String> {
        self.state
            .lock()
            .resting
            .iter()
            .map(|(id, _)| id.clone())
            .collect()
    }

    #[must_use]
    pub fn leverage(&self, symbol: &str) -> Option<(Decimal, Decimal)> {
        self.state.lock().leverage.get(symbol).copied()
    }

    /// Journals the call, then applies latency and injected failures.
    async fn enter(&self, call: GatewayCall) -> Result<(), GatewayError> {
        let kind = call.kind();
        let failure = {
            let mut state = self.state.lock();
            state.journal.push(call);
            state.failures.get(&kind).cloned()
        };
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        failure.map_or(Ok(()), Err)
    }

    fn is_listed(&self, symbol: &str) -> bool {
        self.metadata.iter().any(|m| m.name == symbol)
    }

    fn fill(&self, state: &mut PaperState, order: &OrderRequest) {
        if self.hedge_mode {
            if order.reduce_only {
                reduce(&mut state.positions, &order.symbol, order.side.opposite(), order.quantity);
            } else {
                extend(&mut state.positions, &order.symbol, order.side, order.quantity);
            }
            return;
        }

        // One-way mode nets against the opposite side first.
        let remaining = reduce(
            &mut state.positions,
            &order.symbol,
            order.side.opposite(),
            order.quantity,
        );
        if remaining > Decimal::ZERO && !order.reduce_only {
            extend(&mut state.positions, &order.symbol, order.side, remaining);
        }
    }
}

/// Shrinks the `side` position by up to `quantity`; returns the unused part.
fn reduce(positions: &mut Vec<Position>, symbol: &str, side: Side, quantity: Decimal) -> Decimal {
    let Some(idx) = positions
        .iter()
        .position(|p| p.symbol == symbol && p.side == side)
    else {
        return quantity;
    };
    let position = &mut positions[idx];
    if quantity < position.size {
        position.size -= quantity;
        return Decimal::ZERO;
    }
    let remaining = quantity - position.size;
    positions.remove(idx);
    remaining
}

fn extend(positions: &mut Vec<Position>, symbol: &str, side: Side, quantity: Decimal) {
    if let Some(position) = positions
        .iter_mut()
        .find(|p| p.symbol == symbol && p.side == side)
    {
        position.size += quantity;
        return;
    }
    positions.push(Position {
        symbol: symbol.to_string(),
        side,
        size: quantity,
        unrealized_pnl: Decimal::ZERO,
    });
}

#[async_trait]
impl ExchangeGateway for PaperGateway {
    async fn query_symbol_metadata(&self) -> Result<Vec<SymbolMetadata>, GatewayError> {
        self.enter(GatewayCall::QueryMetadata).await?;
        Ok(self.metadata.clone())
    }

    async fn get_positions(&self) -> Result<Vec<Position>, GatewayError> {
        self.enter(GatewayCall::GetPositions).await?;
        Ok(self
            .state
            .lock()
            .positions
            .iter()
            .filter(|p| p.is_open())
            .cloned()
            .collect())
    }

    async fn get_best_prices(&self, symbol: &str) -> Result<BestPrices, GatewayError> {
        self.enter(GatewayCall::GetBestPrices {
            symbol: symbol.to_string(),
        })
        .await?;
        self.state
            .lock()
            .prices
            .get(symbol)
            .copied()
            .ok_or_else(|| GatewayError::NotFound(format!("no order book for {symbol}")))
    }

    async fn place_order(&self, order: &OrderRequest) -> Result<OrderAck, GatewayError> {
        self.enter(GatewayCall::PlaceOrder(order.clone())).await?;
        if !self.is_listed(&order.symbol) {
            return Err(GatewayError::NotFound(format!("symbol {}", order.symbol)));
        }
        if order.quantity <= Decimal::ZERO {
            return Err(GatewayError::Rejected(format!(
                "quantity must be positive, got {}",
                order.quantity
            )));
        }

        let order_id = format!("paper-{}", self.next_order_id.fetch_add(1, Ordering::Relaxed));
        let mut state = self.state.lock();
        match order.order_type {
            OrderType::Market => self.fill(&mut state, order),
            OrderType::Limit => state.resting.push((order_id.clone(), order.clone())),
        }
        tracing::debug!(%order_id, symbol = %order.symbol, side = %order.side, "paper order accepted");

        Ok(OrderAck { order_id })
    }

    async fn close_position(&self, symbol: &str) -> Result<(), GatewayError> {
        self.enter(GatewayCall::ClosePosition {
            symbol: symbol.to_string(),
        })
        .await?;
        self.state.lock().positions.retain(|p| p.symbol != symbol);
        Ok(())
    }

    async fn cancel_order(&self, symbol: &str, order_id: &str) -> Result<(), GatewayError> {
        self.enter(GatewayCall::CancelOrder {
            symbol: symbol.to_string(),
            order_id: order_id.to_string(),
        })
        .await?;
        let mut state = self.state.lock();
        let before = state.resting.len();
        state
            .resting
            .retain(|(id, order)| !(id == order_id && order.symbol == symbol));
        if state.resting.len() == before {
            return Err(GatewayError::NotFound(format!("order {order_id} on {symbol}")));
        }
        Ok(())
    }

    async fn set_leverage(
        &self,
        symbol: &str,
        buy_leverage: Decimal,
        sell_leverage: Decimal,
    ) -> Result<(), GatewayError> {
        self.enter(GatewayCall::SetLeverage {
            symbol: symbol.to_string(),
            buy: buy_leverage,
            sell: sell_leverage,
        })
        .await?;
        self.state
            .lock()
            .leverage
            .insert(symbol.to_string(), (buy_leverage, sell_leverage));
        Ok(())
    }

    fn supports_hedge_mode(&self) -> bool {
        self.hedge_mode
    }

    fn name(&self) -> &str {
        "paper"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::TimeInForce;
    use rust_decimal_macros::dec;

    fn gateway() -> PaperGateway {
        PaperGateway::new(vec![SymbolMetadata {
            name: "BTCUSDT".to_string(),
            tick_size: dec!(0.5),
            qty_step: dec!(0.001),
        }])
        .with_prices("BTCUSDT", dec!(49999.5), dec!(50000))
    }

    fn order(side: Side, order_type: OrderType, quantity: Decimal) -> OrderRequest {
        OrderRequest {
            symbol: "BTCUSDT".to_string(),
            side,
            order_type,
            price: dec!(50000),
            quantity,
            stop_loss: None,
            take_profit: None,
            time_in_force: TimeInForce::GoodTillCancel,
            reduce_only: false,
        }
    }

    #[tokio::test]
    async fn test_market_order_opens_position() {
        let gw = gateway();
        let ack = gw.place_order(&order(Side::Buy, OrderType::Market, dec!(0.002))).await.unwrap();
        assert_eq!(ack.order_id, "paper-1");

        let positions = gw.get_positions().await.unwrap();
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].side, Side::Buy);
        assert_eq!(positions[0].size, dec!(0.002));
    }

    #[tokio::test]
    async fn test_one_way_mode_nets_opposite_orders() {
        let gw = gateway();
        gw.place_order(&order(Side::Buy, OrderType::Market, dec!(0.003))).await.unwrap();
        gw.place_order(&order(Side::Sell, OrderType::Market, dec!(0.005))).await.unwrap();

        let positions = gw.open_positions();
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].side, Side::Sell);
        assert_eq!(positions[0].size, dec!(0.002));
    }

    #[tokio::test]
    async fn test_hedge_mode_keeps_both_sides() {
        let gw = gateway().with_hedge_mode(true);
        gw.place_order(&order(Side::Buy, OrderType::Market, dec!(0.003))).await.unwrap();
        gw.place_order(&order(Side::Sell, OrderType::Market, dec!(0.001))).await.unwrap();
        assert_eq!(gw.open_positions().len(), 2);
    }

    #[tokio::test]
    async fn test_limit_order_rests_until_cancelled() {
        let gw = gateway();
        let ack = gw.place_order(&order(Side::Buy, OrderType::Limit, dec!(0.001))).await.unwrap();
        assert!(gw.open_positions().is_empty());
        assert_eq!(gw.resting_order_ids(), vec![ack.order_id.clone()]);

        gw.cancel_order("BTCUSDT", &ack.order_id).await.unwrap();
        assert!(gw.resting_order_ids().is_empty());

        let err = gw.cancel_order("BTCUSDT", &ack.order_id).await.unwrap_err();
        assert!(matches!(err, GatewayError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_close_position_flattens_symbol() {
        let gw = gateway();
        gw.place_order(&order(Side::Buy, OrderType::Market, dec!(0.002))).await.unwrap();
        gw.close_position("BTCUSDT").await.unwrap();
        assert!(gw.get_positions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_injected_failure_is_journaled() {
        let gw = gateway();
        gw.fail_on(CallKind::PlaceOrder, GatewayError::Rejected("insufficient margin".into()));

        let err = gw
            .place_order(&order(Side::Buy, OrderType::Market, dec!(0.002)))
            .await
            .unwrap_err();
        assert_eq!(err, GatewayError::Rejected("insufficient margin".into()));
        assert_eq!(gw.count(CallKind::PlaceOrder), 1);
        assert!(gw.open_positions().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_order_book() {
        let gw = gateway();
        assert!(matches!(
            gw.get_best_prices("ETHUSDT").await,
            Err(GatewayError::NotFound(_))
        ));
    }
}
