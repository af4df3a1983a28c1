pub mod config;
pub mod config_loader;
pub mod config_watcher;
pub mod engine;
pub mod error;
pub mod events;
pub mod order_tracker;
pub mod paper;
pub mod policy;
pub mod quantize;
pub mod signal;
pub mod snapshot;
pub mod traits;

pub use config::{AppConfig, EngineConfig, ExchangeConfig, SymbolOverrides};
pub use config_loader::ConfigLoader;
pub use config_watcher::ConfigWatcher;
pub use engine::{ExecutionEngine, OrderOutcome, SignalRequest};
pub use error::{ConfigError, ExecutionError, GatewayError, TrackerError};
pub use events::{
    BestPrices, OrderAck, OrderRequest, OrderType, PlacedOrder, Position, Side, SymbolMetadata,
    TimeInForce,
};
pub use order_tracker::OrderTracker;
pub use paper::{CallKind, GatewayCall, PaperGateway};
pub use policy::{decide, relevant_position, ClosePolicy, PolicyDecision, PolicyParams};
pub use quantize::{Lots, QuantizeError, Quantizer, Ticks};
pub use signal::{parse_signal, ParseError, Signal};
pub use snapshot::{SnapshotHolder, SymbolParams, SymbolSnapshot};
pub use traits::ExchangeGateway;
