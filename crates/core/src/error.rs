//! Error types for the execution core.
//!
//! Every failure is local to one signal's execution. Nothing here is retried
//! automatically; `GatewayError::is_transient` only classifies for logging.

use crate::events::Side;
use crate::quantize::QuantizeError;
use thiserror::Error;

/// Failures reported by an exchange gateway, including timeouts.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    /// The venue answered with a non-success code.
    #[error("API error: {code} - {message}")]
    Api {
        /// Venue or HTTP status code.
        code: i64,
        /// Message returned by the venue.
        message: String,
    },

    /// Transport failure before a response was received.
    #[error("network error: {0}")]
    Network(String),

    /// The call did not complete within the allowed time.
    #[error("request timeout: {0}")]
    Timeout(String),

    /// The venue is throttling requests.
    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimit {
        /// Seconds suggested by the venue.
        retry_after_secs: u64,
    },

    /// The order was refused.
    #[error("order rejected: {0}")]
    Rejected(String),

    /// The response could not be decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Credentials missing or refused.
    #[error("authentication error: {0}")]
    Authentication(String),

    /// The requested market or order does not exist at the venue.
    #[error("not found: {0}")]
    NotFound(String),
}

impl GatewayError {
    /// Creates an API error from a code and message.
    pub fn api(code: i64, message: impl Into<String>) -> Self {
        Self::Api {
            code,
            message: message.into(),
        }
    }

    /// Returns true if the failure is likely to clear on its own.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout(_) | Self::RateLimit { .. } => true,
            Self::Api { code, .. } => (500..600).contains(code),
            _ => false,
        }
    }
}

/// Order tracker failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TrackerError {
    #[error("no outstanding {side} order for {symbol}")]
    NoOutstandingOrder { side: Side, symbol: String },
}

/// Failures of one `submit_signal` / `cancel_last` call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExecutionError {
    /// The symbol is not part of the active snapshot.
    #[error("unknown symbol: {0}")]
    UnknownSymbol(String),

    /// A gateway call failed; execution stopped at that step.
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// Opening the opposite side requires a hedge-mode venue.
    #[error("hedge mode not supported: cannot open {side} on {symbol} while the opposite side is open")]
    HedgeUnsupported { symbol: String, side: Side },

    /// No usable price could be resolved.
    #[error("no usable price for {symbol}: {reason}")]
    NoPrice { symbol: String, reason: String },

    /// The order fields could not be discretized.
    #[error("cannot build order: {0}")]
    Quantize(#[from] QuantizeError),

    /// Nothing to cancel for the key.
    #[error(transparent)]
    NoOutstandingOrder(#[from] TrackerError),
}

/// Snapshot construction and config loading failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The snapshot could not be built; the previous one stays active.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The config source could not be read or parsed.
    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    /// Exchange metadata needed for activation could not be fetched.
    #[error("failed to fetch exchange metadata: {0}")]
    Gateway(#[from] GatewayError),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Load(Box::new(err))
    }
}
