//! Read Services
//!
//! Balances, derived addresses, transaction history and activity for
//! subscribed currencies. Stateless request/response queries; callers cache
//! as they see fit.

use std::future::Future;

use crate::api::{ApiClient, Transport};
use crate::auth::{auth_from, CredentialsProvider};
use crate::error::CustodyResult;
use crate::types::*;

pub trait ReadService: Send + Sync {
    fn balance(&self, currencies: &[CurrencyRef]) -> impl Future<Output = CustodyResult<Vec<BalanceEntry>>> + Send;

    fn addresses(&self, currencies: &[CurrencyRef]) -> impl Future<Output = CustodyResult<Vec<AddressEntry>>> + Send;

    fn tx_history(
        &self,
        currency: &str,
        identifier: Option<&str>,
    ) -> impl Future<Output = CustodyResult<Vec<HistoryEntry>>> + Send;

    fn activity(&self, currency: &str, cursor: Option<&str>) -> impl Future<Output = CustodyResult<ActivityPage>> + Send;
}

/// `ReadService` backed by the wallet backend
pub struct BackendReadService<'a, T> {
    client: &'a ApiClient<T>,
    credentials: &'a dyn CredentialsProvider,
}

impl<'a, T: Transport> BackendReadService<'a, T> {
    pub fn new(client: &'a ApiClient<T>, credentials: &'a dyn CredentialsProvider) -> Self {
        Self { client, credentials }
    }

    /// Follow `nextCursor` until exhausted or `max_pages` pages were read
    pub async fn activity_pages(&self, currency: &str, max_pages: usize) -> CustodyResult<Vec<ActivityItem>> {
        let mut items = Vec::new();
        let mut cursor: Option<String> = None;
        for _ in 0..max_pages {
            let page = self.activity(currency, cursor.as_deref()).await?;
            items.extend(page.activity);
            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }
        Ok(items)
    }
}

impl<'a, T: Transport> ReadService for BackendReadService<'a, T> {
    async fn balance(&self, currencies: &[CurrencyRef]) -> CustodyResult<Vec<BalanceEntry>> {
        let auth = auth_from(self.credentials)?;
        self.client.balance(&auth, currencies).await
    }

    async fn addresses(&self, currencies: &[CurrencyRef]) -> CustodyResult<Vec<AddressEntry>> {
        let auth = auth_from(self.credentials)?;
        self.client.addresses(&auth, currencies).await
    }

    async fn tx_history(&self, currency: &str, identifier: Option<&str>) -> CustodyResult<Vec<HistoryEntry>> {
        let auth = auth_from(self.credentials)?;
        self.client.tx_history(&auth, currency, identifier).await
    }

    async fn activity(&self, currency: &str, cursor: Option<&str>) -> CustodyResult<ActivityPage> {
        let auth = auth_from(self.credentials)?;
        self.client.activity(&auth, currency, cursor).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{Endpoint, HttpResponse};
    use crate::auth::{LockedWallet, StaticCredentials};
    use crate::config::ClientConfig;
    use crate::error::ErrorCode;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct Canned(Mutex<VecDeque<(Endpoint, &'static str)>>);

    impl Transport for Canned {
        async fn post(&self, endpoint: Endpoint, _body: String) -> CustodyResult<HttpResponse> {
            let (expected, body) = self.0.lock().unwrap().pop_front().unwrap();
            assert_eq!(endpoint, expected);
            Ok(HttpResponse::ok(body))
        }
    }

    fn client(replies: Vec<(Endpoint, &'static str)>) -> ApiClient<Canned> {
        ApiClient::new(Canned(Mutex::new(replies.into())), ClientConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_balance_decodes_decimal_strings() {
        let client = client(vec![(
            Endpoint::Balance,
            r#"{"success":true,"data":{"currencies":[{"ticker":"ETH","account":{"index":0,"name":"Main"},"amount":"1000000000000000000000"}]}}"#,
        )]);
        let creds = StaticCredentials::new("guid", "key");
        let reads = BackendReadService::new(&client, &creds);

        let balances = reads
            .balance(&[CurrencyRef {
                ticker: "ETH".into(),
                account: Some(0),
            }])
            .await
            .unwrap();
        assert_eq!(balances[0].amount, "1000000000000000000000".parse::<MinorAmount>().unwrap());
        assert_eq!(balances[0].pending, None);
    }

    #[tokio::test]
    async fn test_activity_pagination() {
        let client = client(vec![
            (
                Endpoint::Activity,
                r#"{"success":true,"data":{"activity":[{"txId":"a","status":"CONFIRMED","direction":"SENT","amount":"5"}],"nextCursor":"c1"}}"#,
            ),
            (
                Endpoint::Activity,
                r#"{"success":true,"data":{"activity":[{"txId":"b","status":"PENDING","direction":"RECEIVED","amount":"7"}]}}"#,
            ),
        ]);
        let creds = StaticCredentials::new("guid", "key");
        let reads = BackendReadService::new(&client, &creds);

        let items = reads.activity_pages("BTC", 10).await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].direction, MovementDirection::Received);
    }

    #[tokio::test]
    async fn test_locked_wallet_makes_no_request() {
        let client = client(vec![]);
        let reads = BackendReadService::new(&client, &LockedWallet);

        let err = reads.tx_history("BTC", None).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::CredentialsUnavailable);
    }
}
