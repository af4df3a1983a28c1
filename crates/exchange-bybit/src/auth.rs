//! HMAC-SHA256 request signing for the Bybit v5 API.
//!
//! The signature is computed over: `timestamp + api_key + recv_window + payload`,
//! where the payload is the raw query string for GET and the JSON body for POST.
//! The secret is never logged.

use crate::error::{BybitError, Result};
use chrono::Utc;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const API_KEY_HEADER: &str = "X-BAPI-API-KEY";
pub const TIMESTAMP_HEADER: &str = "X-BAPI-TIMESTAMP";
pub const SIGN_HEADER: &str = "X-BAPI-SIGN";
pub const RECV_WINDOW_HEADER: &str = "X-BAPI-RECV-WINDOW";

/// Headers required for authenticated Bybit requests.
#[derive(Debug, Clone)]
pub struct SignedHeaders {
    pub api_key: String,
    /// Unix timestamp in milliseconds.
    pub timestamp: String,
    /// Lowercase hex HMAC.
    pub signature: String,
    pub recv_window: String,
}

impl SignedHeaders {
    /// Returns headers as tuples for reqwest.
    #[must_use]
    pub fn as_tuples(&self) -> [(&'static str, &str); 4] {
        [
            (API_KEY_HEADER, &self.api_key),
            (TIMESTAMP_HEADER, &self.timestamp),
            (SIGN_HEADER, &self.signature),
            (RECV_WINDOW_HEADER, &self.recv_window),
        ]
    }
}

/// API key pair plus the receive window sent with every request.
pub struct BybitCredentials {
    api_key: String,
    api_secret: SecretString,
    recv_window_ms: u64,
}

impl std::fmt::Debug for BybitCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BybitCredentials")
            .field("api_key", &self.api_key)
            .field("api_secret", &"[REDACTED]")
            .field("recv_window_ms", &self.recv_window_ms)
            .finish()
    }
}

impl BybitCredentials {
    /// # Errors
    /// Returns error if either part of the key pair is empty.
    pub fn new(api_key: impl Into<String>, api_secret: SecretString) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(BybitError::Authentication("API key is empty".to_string()));
        }
        if api_secret.expose_secret().trim().is_empty() {
            return Err(BybitError::Authentication("API secret is empty".to_string()));
        }
        Ok(Self {
            api_key,
            api_secret,
            recv_window_ms: 5000,
        })
    }

    /// Reads the key pair from the named environment variables.
    ///
    /// # Errors
    /// Returns error if a variable is unset or empty.
    pub fn from_env(api_key_env: &str, api_secret_env: &str) -> Result<Self> {
        let api_key = std::env::var(api_key_env).map_err(|_| {
            BybitError::Authentication(format!("environment variable {api_key_env} not set"))
        })?;
        let api_secret = std::env::var(api_secret_env).map_err(|_| {
            BybitError::Authentication(format!("environment variable {api_secret_env} not set"))
        })?;
        Self::new(api_key, SecretString::from(api_secret))
    }

    #[must_use]
    pub const fn with_recv_window_ms(mut self, recv_window_ms: u64) -> Self {
        self.recv_window_ms = recv_window_ms;
        self
    }

    #[must_use]
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Signs `payload` with the current time.
    ///
    /// # Errors
    /// Returns error if the HMAC cannot be initialised.
    pub fn sign_request(&self, payload: &str) -> Result<SignedHeaders> {
        self.sign_at(Utc::now().timestamp_millis(), payload)
    }

    /// Signs `payload` for a fixed timestamp.
    ///
    /// # Errors
    /// Returns error if the HMAC cannot be initialised.
    pub fn sign_at(&self, timestamp_ms: i64, payload: &str) -> Result<SignedHeaders> {
        let timestamp = timestamp_ms.to_string();
        let recv_window = self.recv_window_ms.to_string();

        let mut mac = HmacSha256::new_from_slice(self.api_secret.expose_secret().as_bytes())
            .map_err(|e| BybitError::Signing(format!("invalid key length: {e}")))?;
        mac.update(timestamp.as_bytes());
        mac.update(self.api_key.as_bytes());
        mac.update(recv_window.as_bytes());
        mac.update(payload.as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());

        Ok(SignedHeaders {
            api_key: self.api_key.clone(),
            timestamp,
            signature,
            recv_window,
        })
    }
}
