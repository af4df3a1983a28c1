//! Immutable per-symbol trading parameters and the process-wide holder that
//! swaps them wholesale on reload.

use crate::config::{AppConfig, SymbolOverrides};
use crate::error::ConfigError;
use crate::events::{OrderType, SymbolMetadata};
use crate::policy::{ClosePolicy, PolicyParams};
use crate::quantize::Quantizer;
use crate::traits::ExchangeGateway;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;

const DEFAULT_SIZE: i64 = 100;
const DEFAULT_TARGET_PROFIT_TENTHS: i64 = 2;

/// Trading parameters of one symbol, fixed for the lifetime of a snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolParams {
    pub name: String,
    pub order_type: OrderType,
    pub buy_leverage: Option<Decimal>,
    pub sell_leverage: Option<Decimal>,
    pub size_multiplier: Decimal,
    pub take_profit_pct: Decimal,
    pub stop_loss_pct: Decimal,
    pub open_policy: bool,
    pub close_policy: ClosePolicy,
    pub notional_size: Decimal,
    pub target_profit_threshold: Decimal,
    pub quantizer: Quantizer,
}

impl SymbolParams {
    /// Resolves raw fields (already merged with the template) against the
    /// built-in defaults.
    #[must_use]
    pub fn resolve(name: &str, raw: &SymbolOverrides, quantizer: Quantizer) -> Self {
        Self {
            name: name.to_string(),
            order_type: raw.order_type.unwrap_or(OrderType::Market),
            buy_leverage: raw.buy_leverage,
            sell_leverage: raw.sell_leverage,
            size_multiplier: raw.multiplier.unwrap_or(Decimal::ONE),
            take_profit_pct: raw.take_profit.unwrap_or(Decimal::ZERO),
            stop_loss_pct: raw.stop_loss.unwrap_or(Decimal::ZERO),
            open_policy: raw.open_policy.unwrap_or(false),
            close_policy: raw.close_policy.unwrap_or_default(),
            notional_size: raw.size.unwrap_or(Decimal::from(DEFAULT_SIZE)),
            target_profit_threshold: raw
                .target_profit
                .unwrap_or(Decimal::new(DEFAULT_TARGET_PROFIT_TENTHS, 1)),
            quantizer,
        }
    }

    #[must_use]
    pub const fn policy(&self) -> PolicyParams {
        PolicyParams {
            close_policy: self.close_policy,
            open_policy: self.open_policy,
            target_profit_threshold: self.target_profit_threshold,
        }
    }

    /// `(buy, sell)` leverage to apply; a single configured side is used for both.
    #[must_use]
    pub fn leverage(&self) -> Option<(Decimal, Decimal)> {
        match (self.buy_leverage, self.sell_leverage) {
            (Some(buy), Some(sell)) => Some((buy, sell)),
            (Some(one), None) | (None, Some(one)) => Some((one, one)),
            (None, None) => None,
        }
    }
}

/// The active symbol table. Never mutated after construction.
#[derive(Debug, Clone)]
pub struct SymbolSnapshot {
    symbols: HashMap<String, SymbolParams>,
    dropped: Vec<String>,
    built_at: DateTime<Utc>,
}

impl SymbolSnapshot {
    /// An empty snapshot: every signal is rejected as unknown.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            symbols: HashMap::new(),
            dropped: Vec::new(),
            built_at: Utc::now(),
        }
    }

    /// Builds a snapshot from parsed config and venue metadata.
    ///
    /// Symbols the venue does not list (or lists with unusable increments)
    /// are dropped with a warning.
    ///
    /// # Errors
    /// Returns `InvalidConfiguration` if no symbol survives.
    pub fn build(config: &AppConfig, metadata: &[SymbolMetadata]) -> Result<Self, ConfigError> {
        let universe: HashMap<&str, &SymbolMetadata> =
            metadata.iter().map(|m| (m.name.as_str(), m)).collect();
        let reference = config.global_reference.clone().unwrap_or_default();

        let mut symbols = HashMap::new();
        let mut dropped = Vec::new();

        for (raw_name, raw) in &config.symbols {
            let name = raw_name.to_uppercase();
            let Some(meta) = universe.get(name.as_str()) else {
                tracing::warn!(symbol = %name, "symbol not tradable on the exchange, dropping");
                dropped.push(name);
                continue;
            };
            let quantizer = match Quantizer::from_metadata(meta) {
                Ok(q) => q,
                Err(e) => {
                    tracing::warn!(symbol = %name, error = %e, "unusable exchange filters, dropping");
                    dropped.push(name);
                    continue;
                }
            };
            let params = SymbolParams::resolve(&name, &raw.inherit(&reference), quantizer);
            if symbols.insert(name.clone(), params).is_some() {
                tracing::warn!(
                    symbol = %name,
                    key = %raw_name,
                    "symbol configured more than once, later entry wins"
                );
            }
        }

        if symbols.is_empty() {
            return Err(ConfigError::InvalidConfiguration(format!(
                "no configured symbol is tradable (dropped: {})",
                dropped.join(", ")
            )));
        }

        Ok(Self {
            symbols,
            dropped,
            built_at: Utc::now(),
        })
    }

    /// Fetches metadata, builds the snapshot and applies leverage.
    ///
    /// Leverage failures are logged and ignored.
    ///
    /// # Errors
    /// Returns error if metadata cannot be fetched or the build fails.
    pub async fn activate(
        config: &AppConfig,
        gateway: &dyn ExchangeGateway,
    ) -> Result<Self, ConfigError> {
        let metadata = gateway.query_symbol_metadata().await?;
        let snapshot = Self::build(config, &metadata)?;

        for params in snapshot.symbols.values() {
            let Some((buy, sell)) = params.leverage() else {
                continue;
            };
            match gateway.set_leverage(&params.name, buy, sell).await {
                Ok(()) => tracing::debug!(symbol = %params.name, %buy, %sell, "leverage applied"),
                Err(e) => tracing::warn!(
                    symbol = %params.name,
                    error = %e,
                    "failed to set leverage, continuing"
                ),
            }
        }

        Ok(snapshot)
    }

    #[must_use]
    pub fn get(&self, symbol: &str) -> Option<&SymbolParams> {
        self.symbols.get(symbol)
    }

    /// The live allow-list.
    #[must_use]
    pub const fn symbols(&self) -> &HashMap<String, SymbolParams> {
        &self.symbols
    }

    /// Configured symbols dropped during the build.
    #[must_use]
    pub fn dropped(&self) -> &[String] {
        &self.dropped
    }

    #[must_use]
    pub const fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }
}

/// Process-wide holder of the active snapshot.
///
/// Readers get an `Arc` to a complete snapshot and never block each other;
/// a reload replaces the whole snapshot at once.
#[derive(Debug, Clone)]
pub struct SnapshotHolder {
    tx: Arc<watch::Sender<Arc<SymbolSnapshot>>>,
}

impl SnapshotHolder {
    #[must_use]
    pub fn new(initial: SymbolSnapshot) -> Self {
        let (tx, _rx) = watch::channel(Arc::new(initial));
        Self { tx: Arc::new(tx) }
    }

    #[must_use]
    pub fn current(&self) -> Arc<SymbolSnapshot> {
        Arc::clone(&self.tx.borrow())
    }

    /// Receiver notified on every swap.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Arc<SymbolSnapshot>> {
        self.tx.subscribe()
    }

    /// Swaps in `snapshot`, returning the one it replaced.
    pub fn replace(&self, snapshot: SymbolSnapshot) -> Arc<SymbolSnapshot> {
        self.tx.send_replace(Arc::new(snapshot))
    }

    /// Activates `config` and swaps it in. On failure the previous snapshot
    /// stays active.
    ///
    /// # Errors
    /// Returns the activation error after logging it.
    pub async fn reload(
        &self,
        config: &AppConfig,
        gateway: &dyn ExchangeGateway,
    ) -> Result<Arc<SymbolSnapshot>, ConfigError> {
        match SymbolSnapshot::activate(config, gateway).await {
            Ok(snapshot) => {
                let symbols: Vec<&String> = snapshot.symbols.keys().collect();
                tracing::info!(?symbols, dropped = ?snapshot.dropped, "applying new symbols config");
                self.replace(snapshot);
                Ok(self.current())
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to apply new config, keeping previous snapshot");
                Err(e)
            }
        }
    }
}
