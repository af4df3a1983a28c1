//! Error types for the Bybit integration.

use signal_trade_core::GatewayError;
use thiserror::Error;

/// Bybit return codes with a specific meaning for the gateway.
pub mod codes {
    pub const INVALID_API_KEY: i64 = 10003;
    pub const INVALID_SIGNATURE: i64 = 10004;
    pub const PERMISSION_DENIED: i64 = 10005;
    pub const TOO_MANY_VISITS: i64 = 10006;
    pub const ORDER_NOT_FOUND: i64 = 110_001;
    pub const LEVERAGE_NOT_MODIFIED: i64 = 110_043;
}

/// Errors that can occur when talking to Bybit.
#[derive(Debug, Error)]
pub enum BybitError {
    /// Credentials missing or refused.
    #[error("authentication error: {0}")]
    Authentication(String),

    /// Request signing failed.
    #[error("signing error: {0}")]
    Signing(String),

    /// The envelope carried a non-zero `retCode`.
    #[error("API error: {ret_code} - {message}")]
    Api {
        /// Bybit `retCode`.
        ret_code: i64,
        /// Bybit `retMsg`.
        message: String,
    },

    /// Non-success HTTP status.
    #[error("HTTP error: {status_code} - {message}")]
    Http { status_code: u16, message: String },

    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimit { retry_after_secs: u64 },

    #[error("network error: {0}")]
    Network(String),

    #[error("request timeout: {0}")]
    Timeout(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    /// Symbol rejected before any request was made.
    #[error("invalid symbol: {0}")]
    InvalidSymbol(String),
}

impl BybitError {
    pub fn api(ret_code: i64, message: impl Into<String>) -> Self {
        Self::Api {
            ret_code,
            message: message.into(),
        }
    }

    pub fn rate_limit(retry_after_secs: u64) -> Self {
        Self::RateLimit { retry_after_secs }
    }

    /// Returns the Bybit `retCode`, if this is an envelope error.
    #[must_use]
    pub const fn ret_code(&self) -> Option<i64> {
        match self {
            Self::Api { ret_code, .. } => Some(*ret_code),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout(_) | Self::RateLimit { .. } => true,
            Self::Http { status_code, .. } => *status_code >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for BybitError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_connect() {
            Self::Network(format!("connection failed: {err}"))
        } else if err.is_decode() {
            Self::Serialization(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for BybitError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<BybitError> for GatewayError {
    fn from(err: BybitError) -> Self {
        match err {
            BybitError::Authentication(msg) | BybitError::Signing(msg) => Self::Authentication(msg),
            BybitError::Api { ret_code, message } => match ret_code {
                codes::INVALID_API_KEY
                | codes::INVALID_SIGNATURE
                | codes::PERMISSION_DENIED => Self::Authentication(message),
                codes::TOO_MANY_VISITS => Self::RateLimit {
                    retry_after_secs: 1,
                },
                codes::ORDER_NOT_FOUND => Self::NotFound(message),
                // 110xxx: order and position rule violations.
                110_000..=110_999 => Self::Rejected(format!("{ret_code}: {message}")),
                _ => Self::api(ret_code, message),
            },
            BybitError::Http {
                status_code,
                message,
            } => Self::api(i64::from(status_code), message),
            BybitError::RateLimit { retry_after_secs } => Self::RateLimit { retry_after_secs },
            BybitError::Network(msg) => Self::Network(msg),
            BybitError::Timeout(msg) => Self::Timeout(msg),
            BybitError::Serialization(msg) => Self::Serialization(msg),
            BybitError::InvalidSymbol(symbol) => Self::NotFound(format!("symbol {symbol}")),
        }
    }
}

/// Result type alias for Bybit operations.
pub type Result<T> = std::result::Result<T, BybitError>;
