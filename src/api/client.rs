//! Typed backend client
//!
//! Serializes requests, drives the transport under the retry policy and
//! decodes the outcome envelope into `CustodyResult`.

use serde::de::{DeserializeOwned, IgnoredAny};
use serde::Serialize;

use super::{Endpoint, HttpResponse, HttpTransport, Transport};
use crate::config::ClientConfig;
use crate::error::{CustodyError, CustodyResult};
use crate::types::*;
use crate::utils::retry::retry_async;
use crate::log_debug;

pub struct ApiClient<T> {
    transport: T,
    config: ClientConfig,
}

impl ApiClient<HttpTransport> {
    /// Client over HTTPS for the configured base URL
    pub fn http(config: ClientConfig) -> CustodyResult<Self> {
        let transport = HttpTransport::new(&config)?;
        Ok(Self { transport, config })
    }
}

impl<T: Transport> ApiClient<T> {
    pub fn new(transport: T, config: ClientConfig) -> CustodyResult<Self> {
        config.validate()?;
        Ok(Self { transport, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// POST `request` and decode the envelope, retrying network failures
    pub async fn call<Req, Resp>(&self, endpoint: Endpoint, request: &Req) -> CustodyResult<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let body = serde_json::to_string(request)
            .map_err(|e| CustodyError::internal(format!("Failed to encode {} request: {}", endpoint, e)))?;

        retry_async(&self.config.retry, endpoint.path(), |attempt| {
            let body = body.clone();
            async move {
                log_debug!("api", "Sending request", endpoint = endpoint, attempt = attempt);
                let response = self.transport.post(endpoint, body).await?;
                decode_response(endpoint, response)
            }
        })
        .await
    }

    pub async fn authenticate(&self, auth: &AuthInfo) -> CustodyResult<()> {
        let _: Ack = self.call(Endpoint::Auth, &AuthRequest { auth }).await?;
        Ok(())
    }

    pub async fn subscribe(&self, auth: &AuthInfo, data: &[SubscriptionInfo]) -> CustodyResult<()> {
        let _: Ack = self.call(Endpoint::Subscribe, &SubscribeRequest { auth, data }).await?;
        Ok(())
    }

    pub async fn unsubscribe(&self, auth: &AuthInfo, currency: &str) -> CustodyResult<()> {
        let _: Ack = self
            .call(Endpoint::Unsubscribe, &UnsubscribeRequest { auth, currency })
            .await?;
        Ok(())
    }

    pub async fn subscriptions(&self, auth: &AuthInfo) -> CustodyResult<Vec<CurrencyInfo>> {
        let response: SubscriptionsResponse = self.call(Endpoint::Subscriptions, &AuthRequest { auth }).await?;
        Ok(response.currencies)
    }

    pub async fn balance(&self, auth: &AuthInfo, currencies: &[CurrencyRef]) -> CustodyResult<Vec<BalanceEntry>> {
        let response: BalanceResponse = self
            .call(Endpoint::Balance, &CurrenciesRequest { auth, currencies })
            .await?;
        Ok(response.currencies)
    }

    pub async fn addresses(&self, auth: &AuthInfo, currencies: &[CurrencyRef]) -> CustodyResult<Vec<AddressEntry>> {
        let response: AddressesResponse = self
            .call(Endpoint::Addresses, &CurrenciesRequest { auth, currencies })
            .await?;
        Ok(response.results)
    }

    pub async fn tx_history(
        &self,
        auth: &AuthInfo,
        currency: &str,
        identifier: Option<&str>,
    ) -> CustodyResult<Vec<HistoryEntry>> {
        let request = HistoryRequest {
            auth,
            currency,
            identifier,
        };
        let response: HistoryResponse = self.call(Endpoint::TxHistory, &request).await?;
        Ok(response.history)
    }

    pub async fn activity(&self, auth: &AuthInfo, currency: &str, cursor: Option<&str>) -> CustodyResult<ActivityPage> {
        let request = ActivityRequest { auth, currency, cursor };
        self.call(Endpoint::Activity, &request).await
    }

    pub async fn build_tx(&self, request: &BuildTxRequest<'_>) -> CustodyResult<BuildTxResponse> {
        self.call(Endpoint::BuildTx, request).await
    }

    pub async fn push_tx(&self, request: &PushTxRequest<'_>) -> CustodyResult<PushTxResponse> {
        self.call(Endpoint::PushTx, request).await
    }
}

/// Map an HTTP outcome onto the error taxonomy and unwrap the envelope
///
/// - 5xx: `NetworkFailure` (retryable)
/// - 401/403: `AuthenticationFailed`
/// - other non-2xx: the envelope's error if the body carries one, else `InvalidResponse`
pub fn decode_response<T: DeserializeOwned>(endpoint: Endpoint, response: HttpResponse) -> CustodyResult<T> {
    let status = response.status;

    if (500..600).contains(&status) {
        return Err(CustodyError::network(format!("{} unavailable", endpoint))
            .with_details(format!("HTTP {}", status)));
    }
    if status == 401 || status == 403 {
        return Err(CustodyError::authentication_failed(format!("{} rejected credentials", endpoint))
            .with_details(format!("HTTP {}", status)));
    }
    if (200..300).contains(&status) {
        let envelope: ApiResponse<T> = serde_json::from_str(&response.body).map_err(|e| {
            CustodyError::invalid_response(format!("Malformed {} response", endpoint)).with_details(e.to_string())
        })?;
        return envelope.into_result();
    }

    match serde_json::from_str::<ApiResponse<IgnoredAny>>(&response.body) {
        Ok(ApiResponse {
            success: false,
            error: Some(error),
            ..
        }) => Err(error.into()),
        _ => Err(CustodyError::invalid_response(format!("Unexpected {} response", endpoint))
            .with_details(format!("HTTP {}", status))),
    }
}
