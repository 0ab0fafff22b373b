//! Client Configuration
//!
//! Endpoint, timeouts, retry policy and protocol bounds for the backend
//! client. `validate()` must pass before a client is constructed.

use std::collections::HashSet;
use std::time::Duration;

use url::Url;

use crate::error::{CustodyError, CustodyResult};

/// Production endpoint of the wallet public-key service
pub const DEFAULT_BASE_URL: &str = "https://api.blockchain.info/wallet-pubkey/";

/// Highest pre-image verification scheme this client understands
pub const DEFAULT_MAX_VERIFICATION_VERSION: u32 = 1;

/// Exponential backoff applied to retryable failures
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_secs(5),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no retries
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Backoff before attempt `attempt + 1`, without jitter
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let scaled = self.initial_backoff.as_nanos() as f64 * self.multiplier.powi(exponent);
        let capped = scaled.min(self.max_backoff.as_nanos() as f64);
        Duration::from_nanos(capped.max(0.0) as u64)
    }

    fn validate(&self) -> CustodyResult<()> {
        if self.max_attempts == 0 {
            return Err(CustodyError::invalid_config("retry.max_attempts must be at least 1"));
        }
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(CustodyError::invalid_config("retry.multiplier must be >= 1.0"));
        }
        if self.initial_backoff > self.max_backoff {
            return Err(CustodyError::invalid_config(
                "retry.initial_backoff exceeds retry.max_backoff",
            ));
        }
        Ok(())
    }
}

/// Backend client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    pub user_agent: String,
    pub retry: RetryPolicy,
    pub max_verification_version: u32,
    /// Currencies accepted by local validation; empty accepts any ticker
    pub supported_currencies: HashSet<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            user_agent: format!("selfcustody-core/{}", env!("CARGO_PKG_VERSION")),
            retry: RetryPolicy::default(),
            max_verification_version: DEFAULT_MAX_VERIFICATION_VERSION,
            supported_currencies: HashSet::new(),
        }
    }
}

impl ClientConfig {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_supported_currencies<I, S>(mut self, currencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.supported_currencies = currencies
            .into_iter()
            .map(|c| c.into().to_ascii_uppercase())
            .collect();
        self
    }

    pub fn supports(&self, currency: &str) -> bool {
        self.supported_currencies.is_empty()
            || self.supported_currencies.contains(&currency.to_ascii_uppercase())
    }

    /// Parsed base URL, normalized to end with `/` so endpoint names join under it
    pub fn base(&self) -> CustodyResult<Url> {
        let mut raw = self.base_url.trim().to_string();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        Url::parse(&raw).map_err(|e| CustodyError::invalid_config(format!("Invalid base URL: {}", e)))
    }

    pub fn validate(&self) -> CustodyResult<()> {
        let url = self.base()?;

        match url.scheme() {
            "https" => {}
            "http" => {
                if !is_loopback(&url) {
                    return Err(CustodyError::invalid_config(
                        "HTTPS required for remote endpoints",
                    ));
                }
            }
            other => {
                return Err(CustodyError::invalid_config(format!(
                    "Unsupported URL scheme: {}",
                    other
                )));
            }
        }

        if !url.username().is_empty() || url.password().is_some() {
            return Err(CustodyError::invalid_config("Credentials are not allowed in the base URL"));
        }
        if self.request_timeout.is_zero() || self.connect_timeout.is_zero() {
            return Err(CustodyError::invalid_config("Timeouts must be non-zero"));
        }
        if self.max_verification_version == 0 {
            return Err(CustodyError::invalid_config(
                "max_verification_version must be at least 1",
            ));
        }
        self.retry.validate()
    }
}

fn is_loopback(url: &Url) -> bool {
    match url.host() {
        Some(url::Host::Domain(host)) => host == "localhost",
        Some(url::Host::Ipv4(ip)) => ip.is_loopback(),
        Some(url::Host::Ipv6(ip)) => ip.is_loopback(),
        None => false,
    }
}
