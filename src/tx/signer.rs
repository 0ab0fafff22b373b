//! Signing Coordinator
//!
//! Turns a `BuiltTransaction` into a `SignedTransaction`: one signature per
//! pre-image, in pre-image order, each produced by the key the pre-image
//! names. Any failure aborts the whole transaction; a partial signature
//! list never leaves this module.

use std::sync::Arc;

use serde_json::value::RawValue;
use tokio::task::JoinSet;

use super::builder::BuiltTransaction;
use super::cancellation::CancellationFlag;
use crate::error::{CustodyError, CustodyResult};
use crate::keystore::{same_public_key, KeyStore};
use crate::types::{PreImage, Signature};
use crate::{log_debug, log_info, log_warn};

/// Transaction with its complete, ordered signature list
#[derive(Debug)]
pub struct SignedTransaction {
    currency: String,
    raw_tx: Box<RawValue>,
    pre_image_count: usize,
    signatures: Vec<Signature>,
}

impl SignedTransaction {
    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn raw_tx(&self) -> &RawValue {
        &self.raw_tx
    }

    pub fn signatures(&self) -> &[Signature] {
        &self.signatures
    }

    /// Number of pre-images the transaction was built with
    pub fn pre_image_count(&self) -> usize {
        self.pre_image_count
    }
}

/// Resolve the key for one pre-image and sign its exact bytes
pub fn sign_pre_image<K: KeyStore + ?Sized>(key_store: &K, index: usize, pre_image: &PreImage) -> CustodyResult<Signature> {
    if !pre_image.signature_algorithm.is_supported() {
        return Err(CustodyError::signing_failed(format!(
            "Pre-image {} uses unsupported algorithm {}",
            index, pre_image.signature_algorithm
        )));
    }

    let descriptor = pre_image.descriptor()?;
    let key = key_store.resolve_key(descriptor, &pre_image.signing_key)?;

    if !pre_image.signing_key.is_empty() && !same_public_key(&key_store.public_key_hex(&key), &pre_image.signing_key) {
        return Err(CustodyError::key_resolution_failed(format!(
            "Key for pre-image {} does not match its signing key",
            index
        )));
    }

    let bytes = pre_image.bytes().map_err(|e| {
        CustodyError::signing_failed(format!("Pre-image {} is not valid hex", index)).with_details(e.to_string())
    })?;
    let signature = key_store.sign(&bytes, &key, &pre_image.signature_algorithm)?;

    log_debug!(
        "signer",
        "Signed pre-image",
        index = index,
        pre_image = pre_image.raw_pre_image,
        signing_key = pre_image.signing_key,
    );

    Ok(Signature {
        pre_image: pre_image.raw_pre_image.clone(),
        signing_key: pre_image.signing_key.clone(),
        signature_algorithm: pre_image.signature_algorithm.clone(),
        signature: hex::encode(signature),
    })
}

pub struct SigningCoordinator<K> {
    key_store: Arc<K>,
    cancel: CancellationFlag,
}

impl<K: KeyStore> SigningCoordinator<K> {
    pub fn new(key_store: Arc<K>) -> Self {
        Self {
            key_store,
            cancel: CancellationFlag::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation(&self) -> CancellationFlag {
        self.cancel.clone()
    }

    pub fn key_store(&self) -> &K {
        &self.key_store
    }

    /// Sign every pre-image in order on the current thread
    pub fn sign_all(&self, built: BuiltTransaction) -> CustodyResult<SignedTransaction> {
        let (currency, raw_tx, pre_images) = built.into_parts();

        let mut signatures = Vec::with_capacity(pre_images.len());
        for (index, pre_image) in pre_images.iter().enumerate() {
            self.cancel.check()?;
            let signature = sign_pre_image(self.key_store.as_ref(), index, pre_image)
                .inspect_err(|e| log_warn!("signer", "Signing aborted", index = index, error = e))?;
            signatures.push(signature);
        }

        log_info!("signer", "Signed transaction", currency = currency, signatures = signatures.len());
        Ok(SignedTransaction {
            currency,
            raw_tx,
            pre_image_count: pre_images.len(),
            signatures,
        })
    }
}

impl<K: KeyStore + 'static> SigningCoordinator<K> {
    /// Sign pre-images on the blocking pool, failing fast on the first error
    ///
    /// Queued workers skip signing once a sibling has failed or the caller
    /// cancelled; outstanding handles are aborted.
    pub async fn sign_concurrent(&self, built: BuiltTransaction) -> CustodyResult<SignedTransaction> {
        let (currency, raw_tx, pre_images) = built.into_parts();
        let count = pre_images.len();
        let failed = CancellationFlag::new();

        let mut workers = JoinSet::new();
        for (index, pre_image) in pre_images.into_iter().enumerate() {
            let key_store = Arc::clone(&self.key_store);
            let cancel = self.cancel.clone();
            let failed = failed.clone();
            workers.spawn_blocking(move || {
                cancel.check()?;
                if failed.is_cancelled() {
                    return Err(CustodyError::cancelled("Sibling pre-image failed"));
                }
                sign_pre_image(key_store.as_ref(), index, &pre_image).map(|signature| (index, signature))
            });
        }

        let mut slots: Vec<Option<Signature>> = vec![None; count];
        while let Some(joined) = workers.join_next().await {
            match joined.map_err(CustodyError::from).and_then(|result| result) {
                Ok((index, signature)) => slots[index] = Some(signature),
                Err(e) => {
                    failed.cancel();
                    workers.abort_all();
                    log_warn!("signer", "Concurrent signing aborted", error = e);
                    return Err(e);
                }
            }
        }
        self.cancel.check()?;

        let signatures = slots
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| CustodyError::internal("Signing worker produced no result"))?;

        log_info!("signer", "Signed transaction", currency = currency, signatures = signatures.len());
        Ok(SignedTransaction {
            currency,
            raw_tx,
            pre_image_count: count,
            signatures,
        })
    }
}
