//! HTTPS transport over a pooled reqwest client

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use url::Url;

use super::{Endpoint, HttpResponse, Transport};
use crate::config::ClientConfig;
use crate::error::{CustodyError, CustodyResult};
use crate::log_debug;

pub struct HttpTransport {
    client: Client,
    base: Url,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> CustodyResult<Self> {
        config.validate()?;

        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(std::time::Duration::from_secs(90))
            .pool_max_idle_per_host(5)
            .tcp_nodelay(true)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| CustodyError::invalid_config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base: config.base()?,
        })
    }

    pub fn endpoint_url(&self, endpoint: Endpoint) -> CustodyResult<Url> {
        self.base
            .join(endpoint.path())
            .map_err(|e| CustodyError::invalid_config(format!("Cannot resolve {}: {}", endpoint, e)))
    }
}

impl Transport for HttpTransport {
    async fn post(&self, endpoint: Endpoint, body: String) -> CustodyResult<HttpResponse> {
        let url = self.endpoint_url(endpoint)?;
        log_debug!("transport", "POST", endpoint = endpoint, bytes = body.len());

        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .body(body)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(HttpResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_urls_resolve_under_base() {
        let config = ClientConfig::default().with_base_url("https://wallet.example.com/v1/wallet-pubkey");
        let transport = HttpTransport::new(&config).unwrap();

        assert_eq!(
            transport.endpoint_url(Endpoint::BuildTx).unwrap().as_str(),
            "https://wallet.example.com/v1/wallet-pubkey/buildTx"
        );
        assert_eq!(
            transport.endpoint_url(Endpoint::TxHistory).unwrap().as_str(),
            "https://wallet.example.com/v1/wallet-pubkey/tx-history"
        );
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = ClientConfig::default().with_base_url("http://wallet.example.com");
        assert!(HttpTransport::new(&config).is_err());
    }
}
