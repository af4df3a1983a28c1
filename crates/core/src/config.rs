use crate::events::OrderType;
use crate::policy::ClosePolicy;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub exchange: ExchangeConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub global_reference: Option<SymbolOverrides>,
    #[serde(default)]
    pub symbols: BTreeMap<String, SymbolOverrides>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeConfig {
    pub base_url: String,
    pub recv_window_ms: u64,
    pub timeout_secs: u64,
    pub requests_per_second: u32,
    pub hedge_mode: bool,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.bybit.com".to_string(),
            recv_window_ms: 5000,
            timeout_secs: 10,
            requests_per_second: 10,
            hedge_mode: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Upper bound for every single gateway call made by the engine.
    pub gateway_timeout_secs: u64,
}

impl EngineConfig {
    #[must_use]
    pub const fn gateway_timeout(&self) -> Duration {
        Duration::from_secs(self.gateway_timeout_secs)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            gateway_timeout_secs: 10,
        }
    }
}

/// Raw per-symbol fields as written in the config file. Absent fields are
/// inherited from `global_reference`, then from the built-in defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SymbolOverrides {
    pub order_type: Option<OrderType>,
    pub buy_leverage: Option<Decimal>,
    pub sell_leverage: Option<Decimal>,
    pub multiplier: Option<Decimal>,
    pub take_profit: Option<Decimal>,
    pub stop_loss: Option<Decimal>,
    pub open_policy: Option<bool>,
    pub close_policy: Option<ClosePolicy>,
    pub size: Option<Decimal>,
    pub target_profit: Option<Decimal>,
}

impl SymbolOverrides {
    /// Fills every unset field from `reference`.
    #[must_use]
    pub fn inherit(&self, reference: &Self) -> Self {
        Self {
            order_type: self.order_type.or(reference.order_type),
            buy_leverage: self.buy_leverage.or(reference.buy_leverage),
            sell_leverage: self.sell_leverage.or(reference.sell_leverage),
            multiplier: self.multiplier.or(reference.multiplier),
            take_profit: self.take_profit.or(reference.take_profit),
            stop_loss: self.stop_loss.or(reference.stop_loss),
            open_policy: self.open_policy.or(reference.open_policy),
            close_policy: self.close_policy.or(reference.close_policy),
            size: self.size.or(reference.size),
            target_profit: self.target_profit.or(reference.target_profit),
        }
    }
}
