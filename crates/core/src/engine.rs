use crate::error::{ExecutionError, GatewayError};
use crate::events::{OrderRequest, PlacedOrder, Side, TimeInForce};
use crate::order_tracker::OrderTracker;
use crate::policy::{decide, relevant_position, PolicyDecision};
use crate::signal::Signal;
use crate::snapshot::{SnapshotHolder, SymbolParams};
use crate::traits::ExchangeGateway;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

const DEFAULT_GATEWAY_TIMEOUT: Duration = Duration::from_secs(10);

/// One execution request: a signal plus optional caller overrides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalRequest {
    pub symbol: String,
    pub side: Side,
    /// Limit/entry price to use instead of the top of book.
    pub target_price: Option<Decimal>,
    /// Notional amount to use instead of the symbol's configured size.
    pub notional: Option<Decimal>,
}

impl SignalRequest {
    pub fn new(symbol: impl Into<String>, side: Side) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            target_price: None,
            notional: None,
        }
    }

    #[must_use]
    pub const fn with_target_price(mut self, price: Decimal) -> Self {
        self.target_price = Some(price);
        self
    }

    #[must_use]
    pub const fn with_notional(mut self, notional: Decimal) -> Self {
        self.notional = Some(notional);
        self
    }
}

impl From<Signal> for SignalRequest {
    fn from(signal: Signal) -> Self {
        Self::new(signal.symbol, signal.side)
    }
}

/// Result of one execution.
#[derive(Debug, Clone)]
pub enum OrderOutcome {
    /// An order was accepted and recorded.
    Submitted(PlacedOrder),
    /// The existing position was closed and nothing was opened.
    Closed(PolicyDecision),
    /// Deliberate no-op.
    Skipped(PolicyDecision),
    /// Execution stopped; the signal is dropped.
    Failed(ExecutionError),
}

impl OrderOutcome {
    #[must_use]
    pub const fn is_submitted(&self) -> bool {
        matches!(self, Self::Submitted(_))
    }

    #[must_use]
    pub fn order_id(&self) -> Option<&str> {
        match self {
            Self::Submitted(placed) => Some(&placed.order_id),
            _ => None,
        }
    }
}

/// Turns signals into orders against the active snapshot.
///
/// Executions for the same symbol are serialized; distinct symbols run in
/// parallel. Nothing is retried.
pub struct ExecutionEngine {
    gateway: Arc<dyn ExchangeGateway>,
    snapshots: SnapshotHolder,
    tracker: OrderTracker,
    symbol_locks: parking_lot::Mutex<HashMap<String, Arc<Mutex<()>>>>,
    gateway_timeout: Duration,
}

impl ExecutionEngine {
    #[must_use]
    pub fn new(gateway: Arc<dyn ExchangeGateway>, snapshots: SnapshotHolder) -> Self {
        Self {
            gateway,
            snapshots,
            tracker: OrderTracker::new(),
            symbol_locks: parking_lot::Mutex::new(HashMap::new()),
            gateway_timeout: DEFAULT_GATEWAY_TIMEOUT,
        }
    }

    /// Upper bound for every single gateway call.
    #[must_use]
    pub const fn with_gateway_timeout(mut self, timeout: Duration) -> Self {
        self.gateway_timeout = timeout;
        self
    }

    #[must_use]
    pub const fn snapshots(&self) -> &SnapshotHolder {
        &self.snapshots
    }

    #[must_use]
    pub const fn tracker(&self) -> &OrderTracker {
        &self.tracker
    }

    /// Executes a signal with the symbol's configured parameters.
    pub async fn submit_signal(&self, symbol: &str, side: Side) -> OrderOutcome {
        self.submit_request(&SignalRequest::new(symbol, side)).await
    }

    pub async fn submit_request(&self, request: &SignalRequest) -> OrderOutcome {
        let outcome = match self.execute(request).await {
            Ok(outcome) => outcome,
            Err(e) => OrderOutcome::Failed(e),
        };

        match &outcome {
            OrderOutcome::Submitted(placed) => tracing::info!(
                symbol = %request.symbol,
                side = %request.side,
                order_id = %placed.order_id,
                price = %placed.request.price,
                qty = %placed.request.quantity,
                "order submitted"
            ),
            OrderOutcome::Closed(decision) | OrderOutcome::Skipped(decision) => tracing::info!(
                symbol = %request.symbol,
                side = %request.side,
                %decision,
                "no order placed"
            ),
            OrderOutcome::Failed(e) => tracing::error!(
                symbol = %request.symbol,
                side = %request.side,
                error = %e,
                "execution failed"
            ),
        }

        outcome
    }

    /// Executes each request independently, returning outcomes in input order.
    pub async fn submit_batch(&self, requests: &[SignalRequest]) -> Vec<OrderOutcome> {
        let mut outcomes = Vec::with_capacity(requests.len());
        for request in requests {
            outcomes.push(self.submit_request(request).await);
        }
        outcomes
    }

    /// Cancels the newest tracked order for the key and returns its id.
    ///
    /// # Errors
    /// `NoOutstandingOrder` if nothing is tracked (non-fatal), or the gateway
    /// error; the id is popped either way.
    pub async fn cancel_last(&self, symbol: &str, side: Side) -> Result<String, ExecutionError> {
        let order_id = match self.tracker.pop_last(side, symbol) {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!(%symbol, %side, "{}", e);
                return Err(e.into());
            }
        };

        if let Err(e) = self
            .call("cancel_order", self.gateway.cancel_order(symbol, &order_id))
            .await
        {
            tracing::error!(%symbol, %side, %order_id, error = %e, "cancel failed");
            return Err(e.into());
        }

        tracing::info!(%symbol, %side, %order_id, "order cancelled");
        Ok(order_id)
    }

    async fn execute(&self, request: &SignalRequest) -> Result<OrderOutcome, ExecutionError> {
        let snapshot = self.snapshots.current();
        let params = snapshot
            .get(&request.symbol)
            .ok_or_else(|| ExecutionError::UnknownSymbol(request.symbol.clone()))?;

        let lock = self.symbol_lock(&request.symbol);
        let _guard = lock.lock().await;

        let positions = self.call("get_positions", self.gateway.get_positions()).await?;
        let position = relevant_position(&positions, &request.symbol, request.side);
        let decision = decide(position, request.side, &params.policy());
        tracing::debug!(
            symbol = %request.symbol,
            side = %request.side,
            position = ?position.map(|p| (p.side, p.size, p.unrealized_pnl)),
            ?decision,
            "policy evaluated"
        );

        if decision == PolicyDecision::ProceedOppositeWithoutClosing
            && !self.gateway.supports_hedge_mode()
        {
            return Err(ExecutionError::HedgeUnsupported {
                symbol: request.symbol.clone(),
                side: request.side,
            });
        }

        if decision.is_skip() {
            return Ok(OrderOutcome::Skipped(decision));
        }

        if decision.closes_existing() {
            self.call(
                "close_position",
                self.gateway.close_position(&request.symbol),
            )
            .await?;
            tracing::info!(symbol = %request.symbol, "position closed");
        }

        if !decision.opens_new() {
            return Ok(OrderOutcome::Closed(decision));
        }

        let order = self.build_order(params, request).await?;
        let ack = self.call("place_order", self.gateway.place_order(&order)).await?;
        self.tracker
            .record(request.side, &request.symbol, ack.order_id.clone());

        Ok(OrderOutcome::Submitted(PlacedOrder {
            order_id: ack.order_id,
            request: order,
            submitted_at: Utc::now(),
        }))
    }

    async fn build_order(
        &self,
        params: &SymbolParams,
        request: &SignalRequest,
    ) -> Result<OrderRequest, ExecutionError> {
        let raw_price = match request.target_price {
            Some(price) => price,
            None => self
                .call("get_best_prices", self.gateway.get_best_prices(&request.symbol))
                .await?
                .crossing_price(request.side),
        };
        if raw_price <= Decimal::ZERO {
            return Err(ExecutionError::NoPrice {
                symbol: request.symbol.clone(),
                reason: format!("resolved price {raw_price} is not positive"),
            });
        }

        let q = params.quantizer;
        let price = q.quantize_price(raw_price)?;
        let notional = request.notional.unwrap_or(params.notional_size);
        let quantity = q.quantity_for_notional(notional, params.size_multiplier, price)?;

        Ok(OrderRequest {
            symbol: request.symbol.clone(),
            side: request.side,
            order_type: params.order_type,
            price,
            quantity,
            stop_loss: q.stop_loss(price, request.side, Some(params.stop_loss_pct))?,
            take_profit: q.take_profit(price, request.side, Some(params.take_profit_pct))?,
            time_in_force: TimeInForce::GoodTillCancel,
            reduce_only: false,
        })
    }

    async fn call<T>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = Result<T, GatewayError>>,
    ) -> Result<T, GatewayError> {
        tokio::time::timeout(self.gateway_timeout, fut)
            .await
            .map_err(|_| {
                GatewayError::Timeout(format!(
                    "{operation} on {} exceeded {:?}",
                    self.gateway.name(),
                    self.gateway_timeout
                ))
            })?
    }

    fn symbol_lock(&self, symbol: &str) -> Arc<Mutex<()>> {
        Arc::clone(
            self.symbol_locks
                .lock()
                .entry(symbol.to_string())
                .or_default(),
        )
    }
}
