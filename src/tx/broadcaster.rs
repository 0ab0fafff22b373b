//! Transaction Broadcaster
//!
//! Submits the raw transaction, byte-identical to what the backend built,
//! together with the signature list. Network failures are retried by the
//! client; a duplicate push of an already-broadcast transaction comes back
//! as `AlreadyBroadcast` and counts as success.

use super::signer::SignedTransaction;
use crate::api::{ApiClient, Transport};
use crate::error::{CustodyError, CustodyResult};
use crate::types::{AuthInfo, PushResult, PushStatus, PushTxRequest};
use crate::{log_info, log_warn};

/// Push a signed transaction; consumes it whatever the outcome
pub async fn push_transaction<T: Transport>(
    client: &ApiClient<T>,
    auth: &AuthInfo,
    signed: SignedTransaction,
) -> CustodyResult<PushResult> {
    let expected = signed.pre_image_count();
    let actual = signed.signatures().len();
    if expected == 0 || actual != expected {
        return Err(CustodyError::signing_failed(format!(
            "Expected {} signatures, have {}",
            expected, actual
        )));
    }

    let request = PushTxRequest {
        auth,
        currency: signed.currency(),
        raw_tx: signed.raw_tx(),
        signatures: signed.signatures(),
    };

    let response = client
        .push_tx(&request)
        .await
        .inspect_err(|e| log_warn!("broadcaster", "Push failed", currency = signed.currency(), error = e))?;

    if response.tx_id.trim().is_empty() {
        return Err(CustodyError::invalid_response("Push succeeded without a transaction id"));
    }

    let result = PushResult::from(response);
    let status = match result.status {
        PushStatus::Accepted => "accepted",
        PushStatus::AlreadyBroadcast => "already_broadcast",
    };
    log_info!(
        "broadcaster",
        "Transaction pushed",
        currency = signed.currency(),
        tx_id = result.tx_id,
        status = status,
    );
    Ok(result)
}
