//! Bybit v5 integration for the signal-trade execution engine.
//!
//! This crate provides:
//! - REST client with rate limiting for the linear (USDT perpetual) category
//! - HMAC-SHA256 request signing
//! - `BybitGateway`, the `ExchangeGateway` implementation used in live mode
//!
//! # Authentication
//!
//! Set the following environment variables:
//!
//! - `BYBIT_API_KEY`: API key
//! - `BYBIT_API_SECRET`: API secret
//!
//! # API Endpoints
//!
//! - `GET /v5/market/instruments-info` - Tick size and quantity step per symbol
//! - `GET /v5/market/orderbook` - Top of book
//! - `GET /v5/position/list` - Open positions
//! - `POST /v5/position/set-leverage` - Leverage per side
//! - `POST /v5/order/create` - Submit order (also used to close positions)
//! - `POST /v5/order/cancel` - Cancel order

pub mod auth;
pub mod client;
pub mod error;
pub mod gateway;
pub mod types;

pub use auth::{BybitCredentials, SignedHeaders};
pub use client::{BybitClient, BybitClientConfig, BYBIT_MAINNET_URL, BYBIT_TESTNET_URL};
pub use error::{BybitError, Result};
pub use gateway::BybitGateway;

pub const API_KEY_ENV: &str = "BYBIT_API_KEY";
pub const API_SECRET_ENV: &str = "BYBIT_API_SECRET";
