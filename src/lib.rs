//! Self-Custody Core Library
//!
//! Client side of the non-custodial transaction pipeline: the backend builds
//! an unsigned transaction and the exact pre-images to sign, the wallet
//! signs them locally with keys that never leave the device, and the
//! backend broadcasts the result.
//!
//! # Architecture
//!
//! - **auth**: hashed wallet credentials sent with every request
//! - **subscriptions**: register public keys per currency and account
//! - **read**: balances, addresses, history and activity
//! - **tx**: build, sign, push and the flow that ties them together
//! - **keystore**: the signing capability and an HD implementation
//! - **api**: endpoints, transport and the response envelope
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use selfcustody_core::{ApiClient, ClientConfig, HdKeyStore, StaticCredentials, TransactionFlow, TransferIntent};
//!
//! let client = ApiClient::http(ClientConfig::default())?;
//! let keys = Arc::new(HdKeyStore::from_xprv(&account_xprv)?);
//! let flow = TransactionFlow::new(client, StaticCredentials::new(guid, shared_key), keys);
//!
//! let intent = TransferIntent::payment("BTC", "bc1q...", None);
//! let pushed = flow.execute_with_rebuild(&intent, 3).await?;
//! println!("txid: {}", pushed.tx_id);
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod keystore;
pub mod read;
pub mod subscriptions;
pub mod tx;
pub mod types;
pub mod utils;

pub use api::{ApiClient, Endpoint, HttpResponse, HttpTransport, Transport};
pub use auth::{auth_info, CredentialsProvider, LockedWallet, StaticCredentials, WalletCredentials};
pub use config::{ClientConfig, RetryPolicy};
pub use error::{CustodyError, CustodyResult, ErrorCode};
pub use keystore::{HdKeyStore, KeyStore};
pub use read::{BackendReadService, ReadService};
pub use subscriptions::{subscription_for, SubscriptionManager};
pub use tx::{
    BuiltTransaction, CancellationFlag, SignedTransaction, SigningCoordinator, TransactionFlow, TransferIntent,
    TxResult,
};
pub use types::*;
