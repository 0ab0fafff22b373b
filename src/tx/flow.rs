//! Transaction Flow
//!
//! Drives one transfer through build, sign and push. Each run owns its
//! `BuiltTransaction` and its cancellation flag; cancelling one run leaves
//! the flow usable for the next.

use std::sync::Arc;

use serde::Serialize;

use super::broadcaster::push_transaction;
use super::builder::{build_transaction, TransferIntent};
use super::cancellation::CancellationFlag;
use super::signer::SigningCoordinator;
use crate::api::{ApiClient, Transport};
use crate::auth::{auth_from, CredentialsProvider};
use crate::error::{CustodyError, CustodyResult, ErrorCode};
use crate::keystore::KeyStore;
use crate::types::{PushResult, PushStatus};
use crate::{log_error, log_warn};

pub struct TransactionFlow<T, C, K> {
    client: ApiClient<T>,
    credentials: C,
    key_store: Arc<K>,
    concurrent_signing: bool,
}

impl<T, C, K> TransactionFlow<T, C, K>
where
    T: Transport,
    C: CredentialsProvider,
    K: KeyStore + 'static,
{
    pub fn new(client: ApiClient<T>, credentials: C, key_store: Arc<K>) -> Self {
        Self {
            client,
            credentials,
            key_store,
            concurrent_signing: false,
        }
    }

    /// Sign pre-images on the blocking pool instead of inline
    pub fn with_concurrent_signing(mut self, enabled: bool) -> Self {
        self.concurrent_signing = enabled;
        self
    }

    pub fn client(&self) -> &ApiClient<T> {
        &self.client
    }

    /// Build, sign and push once
    pub async fn execute(&self, intent: &TransferIntent) -> CustodyResult<PushResult> {
        self.execute_cancellable(intent, &CancellationFlag::new()).await
    }

    /// `execute` bound to a caller-held flag. Once the flag is set, the run
    /// stops at the next stage boundary and its pre-images are dropped.
    pub async fn execute_cancellable(&self, intent: &TransferIntent, cancel: &CancellationFlag) -> CustodyResult<PushResult> {
        cancel.check()?;
        let auth = auth_from(&self.credentials)?;

        let built = build_transaction(&self.client, &auth, intent).await?;
        cancel.check()?;

        let coordinator = SigningCoordinator::new(Arc::clone(&self.key_store)).with_cancellation(cancel.clone());
        let signed = if self.concurrent_signing {
            coordinator.sign_concurrent(built).await?
        } else {
            coordinator.sign_all(built)?
        };
        cancel.check()?;

        push_transaction(&self.client, &auth, signed).await
    }

    /// Like `execute`, restarting from build when the backend reports the
    /// pre-images as stale. `max_builds` counts every build, the first included.
    pub async fn execute_with_rebuild(&self, intent: &TransferIntent, max_builds: u32) -> CustodyResult<PushResult> {
        self.execute_with_rebuild_cancellable(intent, max_builds, &CancellationFlag::new())
            .await
    }

    pub async fn execute_with_rebuild_cancellable(
        &self,
        intent: &TransferIntent,
        max_builds: u32,
        cancel: &CancellationFlag,
    ) -> CustodyResult<PushResult> {
        let max_builds = max_builds.max(1);
        let mut build = 1;
        loop {
            match self.execute_cancellable(intent, cancel).await {
                Err(e) if e.code == ErrorCode::StaleTransaction && build < max_builds => {
                    log_warn!("flow", "Stale transaction, rebuilding", build = build, currency = intent.currency);
                    build += 1;
                }
                Err(e) => {
                    log_error!("flow", "Transaction failed", currency = intent.currency, error = e);
                    return Err(e);
                }
                ok => return ok,
            }
        }
    }
}

/// Outcome reported to the UI layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum TxResult {
    Success { tx_id: String, already_broadcast: bool },
    Error { kind: ErrorCode, message: String },
}

impl From<CustodyResult<PushResult>> for TxResult {
    fn from(result: CustodyResult<PushResult>) -> Self {
        match result {
            Ok(push) => TxResult::Success {
                already_broadcast: push.status == PushStatus::AlreadyBroadcast,
                tx_id: push.tx_id,
            },
            Err(e) => e.into(),
        }
    }
}

impl From<CustodyError> for TxResult {
    fn from(e: CustodyError) -> Self {
        TxResult::Error {
            kind: e.code,
            message: e.message,
        }
    }
}
