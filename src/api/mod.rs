//! Backend API
//!
//! One JSON-over-HTTPS POST endpoint per operation, every response wrapped
//! in the `{success, data | error}` envelope. The wire is reached through
//! the `Transport` trait so the pipeline can run against a mock backend.

mod client;
mod transport;

pub use client::*;
pub use transport::*;

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::error::CustodyResult;

/// Backend operations, each with its own path under the base URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Auth,
    Subscribe,
    Unsubscribe,
    Subscriptions,
    Balance,
    Addresses,
    TxHistory,
    Activity,
    BuildTx,
    PushTx,
}

impl Endpoint {
    pub const ALL: [Endpoint; 10] = [
        Endpoint::Auth,
        Endpoint::Subscribe,
        Endpoint::Unsubscribe,
        Endpoint::Subscriptions,
        Endpoint::Balance,
        Endpoint::Addresses,
        Endpoint::TxHistory,
        Endpoint::Activity,
        Endpoint::BuildTx,
        Endpoint::PushTx,
    ];

    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::Auth => "auth",
            Endpoint::Subscribe => "subscribe",
            Endpoint::Unsubscribe => "unsubscribe",
            Endpoint::Subscriptions => "subscriptions",
            Endpoint::Balance => "balance",
            Endpoint::Addresses => "addresses",
            Endpoint::TxHistory => "tx-history",
            Endpoint::Activity => "activity",
            Endpoint::BuildTx => "buildTx",
            Endpoint::PushTx => "pushTx",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Raw HTTP outcome before envelope decoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub fn with_status(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Delivers a serialized request body to an endpoint
///
/// Implementations report transport-level failures (timeouts, refused
/// connections) as `NetworkFailure`; HTTP statuses are returned as-is.
pub trait Transport: Send + Sync {
    fn post(&self, endpoint: Endpoint, body: String) -> impl Future<Output = CustodyResult<HttpResponse>> + Send;
}

impl<T: Transport> Transport for Arc<T> {
    fn post(&self, endpoint: Endpoint, body: String) -> impl Future<Output = CustodyResult<HttpResponse>> + Send {
        (**self).post(endpoint, body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_paths() {
        assert_eq!(Endpoint::TxHistory.path(), "tx-history");
        assert_eq!(Endpoint::BuildTx.to_string(), "buildTx");
        assert_eq!(Endpoint::PushTx.path(), "pushTx");

        let mut paths: Vec<_> = Endpoint::ALL.iter().map(|e| e.path()).collect();
        paths.sort();
        paths.dedup();
        assert_eq!(paths.len(), Endpoint::ALL.len());
    }
}
