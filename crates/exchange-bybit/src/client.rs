//! Bybit v5 REST client with rate limiting.
//!
//! Every request waits on a governor limiter, private requests carry
//! HMAC-SHA256 headers, and every response is unwrapped from the
//! `{retCode, retMsg, result}` envelope.

use crate::auth::BybitCredentials;
use crate::error::{BybitError, Result};
use crate::types::{
    CancelOrderBody, CreateOrderBody, Empty, Envelope, OrderResult, PagedList, RawInstrument,
    RawOrderbook, RawPosition, SetLeverageBody, CATEGORY_LINEAR,
};
use governor::{Quota, RateLimiter};
use nonzero_ext::nonzero;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use signal_trade_core::ExchangeConfig;
use std::num::NonZeroU32;
use std::sync::Arc;

pub const BYBIT_MAINNET_URL: &str = "https://api.bybit.com";
pub const BYBIT_TESTNET_URL: &str = "https://api-testnet.bybit.com";

const INSTRUMENTS_PAGE_LIMIT: u32 = 1000;
const POSITIONS_PAGE_LIMIT: u32 = 200;

// =============================================================================
// Configuration
// =============================================================================

#[derive(Debug, Clone)]
pub struct BybitClientConfig {
    pub base_url: String,
    pub requests_per_second: NonZeroU32,
    pub timeout_secs: u64,
    pub recv_window_ms: u64,
}

impl Default for BybitClientConfig {
    fn default() -> Self {
        Self {
            base_url: BYBIT_MAINNET_URL.to_string(),
            requests_per_second: nonzero!(10u32),
            timeout_secs: 10,
            recv_window_ms: 5000,
        }
    }
}

impl BybitClientConfig {
    #[must_use]
    pub fn testnet() -> Self {
        Self {
            base_url: BYBIT_TESTNET_URL.to_string(),
            ..Default::default()
        }
    }

    /// Client settings from the `exchange` config section.
    #[must_use]
    pub fn from_exchange_config(config: &ExchangeConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            requests_per_second: NonZeroU32::new(config.requests_per_second)
                .unwrap_or(nonzero!(1u32)),
            timeout_secs: config.timeout_secs,
            recv_window_ms: config.recv_window_ms,
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    #[must_use]
    pub fn with_rate_limit(mut self, requests_per_second: NonZeroU32) -> Self {
        self.requests_per_second = requests_per_second;
        self
    }

    #[must_use]
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

// =============================================================================
// BybitClient
// =============================================================================

type DirectRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Bybit REST client for the linear (USDT perpetual) category.
pub struct BybitClient {
    config: BybitClientConfig,
    http: Client,
    rate_limiter: Arc<DirectRateLimiter>,
    credentials: Option<BybitCredentials>,
}

impl std::fmt::Debug for BybitClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BybitClient")
            .field("base_url", &self.config.base_url)
            .field("requests_per_second", &self.config.requests_per_second)
            .field("authenticated", &self.credentials.is_some())
            .finish_non_exhaustive()
    }
}

impl BybitClient {
    /// Creates a client. Without credentials only public endpoints work.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be built.
    pub fn new(config: BybitClientConfig, credentials: Option<BybitCredentials>) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| BybitError::Network(format!("failed to build HTTP client: {e}")))?;

        let rate_limiter = Arc::new(RateLimiter::direct(Quota::per_second(
            config.requests_per_second,
        )));
        let credentials =
            credentials.map(|c| c.with_recv_window_ms(config.recv_window_ms));

        Ok(Self {
            config,
            http,
            rate_limiter,
            credentials,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// Symbols are interpolated into query strings, so only plain tickers pass.
    fn validate_symbol(symbol: &str) -> Result<&str> {
        if symbol.is_empty() || symbol.len() > 32 {
            return Err(BybitError::InvalidSymbol(symbol.to_string()));
        }
        if !symbol.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(BybitError::InvalidSymbol(symbol.to_string()));
        }
        Ok(symbol)
    }

    fn credentials(&self) -> Result<&BybitCredentials> {
        self.credentials.as_ref().ok_or_else(|| {
            BybitError::Authentication("API credentials required for private endpoint".to_string())
        })
    }

    /// Public GET, unsigned.
    async fn get_public<T: DeserializeOwned>(&self, path: &str, query: &str) -> Result<T> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}{}?{}", self.config.base_url, path, query);
        tracing::debug!("GET {}", url);

        let response = self
            .http
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Signed GET; the raw query string is the signed payload.
    async fn get_private<T: DeserializeOwned>(&self, path: &str, query: &str) -> Result<T> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}{}?{}", self.config.base_url, path, query);
        let headers = self.credentials()?.sign_request(query)?;
        tracing::debug!("GET {}", url);

        let mut request = self.http.get(&url).header("Accept", "application/json");
        for (name, value) in headers.as_tuples() {
            request = request.header(name, value);
        }
        let response = request.send().await?;

        self.handle_response(response).await
    }

    /// Signed POST; the exact JSON body is the signed payload.
    async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}{}", self.config.base_url, path);
        let body_json = serde_json::to_string(body)?;
        let headers = self.credentials()?.sign_request(&body_json)?;
        tracing::debug!("POST {} body_len={}", url, body_json.len());

        let mut request = self
            .http
            .post(&url)
            .header("Accept", "application/json")
            .header("Content-Type", "application/json");
        for (name, value) in headers.as_tuples() {
            request = request.header(name, value);
        }
        let response = request.body(body_json).send().await?;

        self.handle_response(response).await
    }

    /// Checks the HTTP status, then unwraps the envelope.
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();

        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(1);
            return Err(BybitError::rate_limit(retry_after));
        }

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(BybitError::Http {
                status_code: status.as_u16(),
                message: text,
            });
        }

        let envelope = response.json::<Envelope<T>>().await?;
        if envelope.ret_code != 0 {
            return Err(BybitError::api(envelope.ret_code, envelope.ret_msg));
        }
        envelope
            .result
            .ok_or_else(|| BybitError::Serialization("response has no result".to_string()))
    }

    // =========================================================================
    // Market Endpoints
    // =========================================================================

    /// Every linear instrument, following the cursor to the last page.
    ///
    /// # Errors
    /// Returns error if any page fails.
    pub async fn get_instruments(&self) -> Result<Vec<RawInstrument>> {
        let mut instruments = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut query = format!("category={CATEGORY_LINEAR}&limit={INSTRUMENTS_PAGE_LIMIT}");
            if let Some(c) = cursor.as_deref() {
                query.push_str("&cursor=");
                query.push_str(c);
            }
            let page: PagedList<RawInstrument> =
                self.get_public("/v5/market/instruments-info", &query).await?;
            instruments.extend(page.list);

            match page.next_page_cursor.filter(|c| !c.is_empty()) {
                Some(next) if cursor.as_deref() != Some(next.as_str()) => cursor = Some(next),
                _ => break,
            }
        }

        Ok(instruments)
    }

    /// Top of book for one symbol.
    ///
    /// # Errors
    /// Returns error if the symbol is invalid or the request fails.
    pub async fn get_orderbook(&self, symbol: &str) -> Result<RawOrderbook> {
        let symbol = Self::validate_symbol(symbol)?;
        let query = format!("category={CATEGORY_LINEAR}&symbol={symbol}&limit=1");
        self.get_public("/v5/market/orderbook", &query).await
    }

    // =========================================================================
    // Position Endpoints
    // =========================================================================

    /// Positions settled in `settle_coin`, or of one `symbol` when given.
    ///
    /// # Errors
    /// Returns error if unauthenticated or the request fails.
    pub async fn get_positions(
        &self,
        symbol: Option<&str>,
        settle_coin: &str,
    ) -> Result<Vec<RawPosition>> {
        let filter = match symbol {
            Some(symbol) => format!("symbol={}", Self::validate_symbol(symbol)?),
            None => format!("settleCoin={settle_coin}"),
        };

        let mut positions = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let mut query =
                format!("category={CATEGORY_LINEAR}&limit={POSITIONS_PAGE_LIMIT}&{filter}");
            if let Some(c) = cursor.as_deref() {
                query.push_str("&cursor=");
                query.push_str(c);
            }
            let page: PagedList<RawPosition> = self.get_private("/v5/position/list", &query).await?;
            positions.extend(page.list);

            match page.next_page_cursor.filter(|c| !c.is_empty()) {
                Some(next) if cursor.as_deref() != Some(next.as_str()) => cursor = Some(next),
                _ => break,
            }
        }

        Ok(positions)
    }

    /// # Errors
    /// Returns error if unauthenticated or Bybit refuses the change.
    pub async fn set_leverage(&self, body: &SetLeverageBody) -> Result<()> {
        Self::validate_symbol(&body.symbol)?;
        let _: Empty = self.post("/v5/position/set-leverage", body).await?;
        Ok(())
    }

    // =========================================================================
    // Order Endpoints
    // =========================================================================

    /// # Errors
    /// Returns error if unauthenticated or the order is refused.
    pub async fn create_order(&self, body: &CreateOrderBody) -> Result<OrderResult> {
        Self::validate_symbol(&body.symbol)?;
        self.post("/v5/order/create", body).await
    }

    /// # Errors
    /// Returns error if unauthenticated or the order cannot be cancelled.
    pub async fn cancel_order(&self, symbol: &str, order_id: &str) -> Result<OrderResult> {
        let body = CancelOrderBody {
            category: CATEGORY_LINEAR,
            symbol: Self::validate_symbol(symbol)?.to_string(),
            order_id: order_id.to_string(),
        };
        self.post("/v5/order/cancel", &body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{API_KEY_HEADER, SIGN_HEADER, TIMESTAMP_HEADER};
    use secrecy::SecretString;
    use wiremock::matchers::{body_partial_json, header, header_exists, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer, authenticated: bool) -> BybitClient {
        let credentials = authenticated.then(|| {
            BybitCredentials::new("test-key", SecretString::from("test-secret".to_string()))
                .unwrap()
        });
        BybitClient::new(
            BybitClientConfig::default()
                .with_base_url(server.uri())
                .with_rate_limit(nonzero!(100u32)),
            credentials,
        )
        .unwrap()
    }

    fn ok(result: serde_json::Value) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "retCode": 0,
            "retMsg": "OK",
            "result": result,
            "time": 1_700_000_000_000_i64
        }))
    }

    fn instrument(symbol: &str) -> serde_json::Value {
        serde_json::json!({
            "symbol": symbol,
            "status": "Trading",
            "priceFilter": { "tickSize": "0.50" },
            "lotSizeFilter": { "qtyStep": "0.001" }
        })
    }

    // ==================== Config Tests ====================

    #[test]
    fn test_client_config_builder() {
        let config = BybitClientConfig::default()
            .with_base_url("https://custom.url")
            .with_rate_limit(nonzero!(20u32))
            .with_timeout_secs(3);

        assert_eq!(config.base_url, "https://custom.url");
        assert_eq!(config.requests_per_second.get(), 20);
        assert_eq!(config.timeout_secs, 3);
        assert_eq!(BybitClientConfig::testnet().base_url, BYBIT_TESTNET_URL);
    }

    #[test]
    fn test_config_from_exchange_section() {
        let exchange = ExchangeConfig {
            requests_per_second: 0,
            recv_window_ms: 20000,
            ..Default::default()
        };
        let config = BybitClientConfig::from_exchange_config(&exchange);
        assert_eq!(config.requests_per_second.get(), 1);
        assert_eq!(config.recv_window_ms, 20000);
    }

    // ==================== Input Validation Tests ====================

    #[test]
    fn test_validate_symbol() {
        assert!(BybitClient::validate_symbol("BTCUSDT").is_ok());
        assert!(BybitClient::validate_symbol("1000PEPEUSDT").is_ok());
        assert!(BybitClient::validate_symbol("").is_err());
        assert!(BybitClient::validate_symbol("BTC&category=spot").is_err());
        assert!(BybitClient::validate_symbol("../x").is_err());
    }

    // ==================== Endpoint Tests ====================

    #[tokio::test]
    async fn test_instruments_follow_cursor() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v5/market/instruments-info"))
            .and(query_param("cursor", "page2"))
            .respond_with(ok(serde_json::json!({
                "category": "linear",
                "list": [instrument("ETHUSDT")],
                "nextPageCursor": ""
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v5/market/instruments-info"))
            .and(query_param("category", "linear"))
            .respond_with(ok(serde_json::json!({
                "category": "linear",
                "list": [instrument("BTCUSDT")],
                "nextPageCursor": "page2"
            })))
            .mount(&server)
            .await;

        let instruments = client(&server, false).get_instruments().await.unwrap();
        let symbols: Vec<&str> = instruments.iter().map(|i| i.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["BTCUSDT", "ETHUSDT"]);
    }

    #[tokio::test]
    async fn test_private_get_is_signed() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v5/position/list"))
            .and(query_param("settleCoin", "USDT"))
            .and(header(API_KEY_HEADER, "test-key"))
            .and(header_exists(SIGN_HEADER))
            .and(header_exists(TIMESTAMP_HEADER))
            .respond_with(ok(serde_json::json!({
                "list": [{
                    "symbol": "BTCUSDT", "side": "Buy", "size": "0.002",
                    "unrealisedPnl": "1.5", "positionIdx": 0
                }],
                "nextPageCursor": ""
            })))
            .expect(1)
            .mount(&server)
            .await;

        let positions = client(&server, true).get_positions(None, "USDT").await.unwrap();
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].side, "Buy");
    }

    #[tokio::test]
    async fn test_private_endpoint_requires_credentials() {
        let server = MockServer::start().await;
        let err = client(&server, false)
            .get_positions(None, "USDT")
            .await
            .unwrap_err();
        assert!(matches!(err, BybitError::Authentication(_)));
    }

    #[tokio::test]
    async fn test_create_order_posts_body() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v5/order/create"))
            .and(header_exists(SIGN_HEADER))
            .and(body_partial_json(serde_json::json!({
                "category": "linear",
                "symbol": "BTCUSDT",
                "side": "Buy",
                "orderType": "Limit",
                "qty": "0.002",
                "price": "50000",
                "timeInForce": "GTC"
            })))
            .respond_with(ok(serde_json::json!({ "orderId": "abc-123", "orderLinkId": "" })))
            .expect(1)
            .mount(&server)
            .await;

        let body = CreateOrderBody {
            category: CATEGORY_LINEAR,
            symbol: "BTCUSDT".to_string(),
            side: "Buy",
            order_type: "Limit",
            qty: "0.002".to_string(),
            price: Some("50000".to_string()),
            time_in_force: "GTC",
            take_profit: None,
            stop_loss: None,
            reduce_only: false,
            position_idx: None,
        };
        let result = client(&server, true).create_order(&body).await.unwrap();
        assert_eq!(result.order_id, "abc-123");
    }

    #[tokio::test]
    async fn test_nonzero_ret_code_is_api_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v5/order/cancel"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "retCode": 110001,
                "retMsg": "order not exists or too late to cancel",
                "result": {},
            })))
            .mount(&server)
            .await;

        let err = client(&server, true)
            .cancel_order("BTCUSDT", "abc-123")
            .await
            .unwrap_err();
        assert_eq!(err.ret_code(), Some(110_001));
    }

    #[tokio::test]
    async fn test_http_429_is_rate_limit() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v5/market/orderbook"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "7"))
            .mount(&server)
            .await;

        let err = client(&server, false).get_orderbook("BTCUSDT").await.unwrap_err();
        assert!(matches!(err, BybitError::RateLimit { retry_after_secs: 7 }));
    }

    #[tokio::test]
    async fn test_http_error_status() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v5/market/orderbook"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let err = client(&server, false).get_orderbook("BTCUSDT").await.unwrap_err();
        assert!(matches!(err, BybitError::Http { status_code: 503, .. }));
        assert!(err.is_transient());
    }
}
