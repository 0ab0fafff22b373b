//! Subscription Manager
//!
//! Registers which `(currency, account, pubkeys)` tuples the backend should
//! index for this wallet. Subscribing is idempotent server-side, so a
//! repeated call with the same data is harmless.

use std::collections::HashSet;

use crate::api::{ApiClient, Transport};
use crate::auth::{auth_from, CredentialsProvider};
use crate::error::{CustodyError, CustodyResult, ErrorCode};
use crate::keystore::HdKeyStore;
use crate::types::{AccountInfo, CurrencyInfo, PubKeyInfo, SubscriptionInfo};
use crate::log_info;

pub struct SubscriptionManager<'a, T> {
    client: &'a ApiClient<T>,
    credentials: &'a dyn CredentialsProvider,
}

impl<'a, T: Transport> SubscriptionManager<'a, T> {
    pub fn new(client: &'a ApiClient<T>, credentials: &'a dyn CredentialsProvider) -> Self {
        Self { client, credentials }
    }

    pub async fn subscribe(&self, subscriptions: Vec<SubscriptionInfo>) -> CustodyResult<()> {
        if subscriptions.is_empty() {
            return Err(CustodyError::subscription_failed("Nothing to subscribe"));
        }
        for subscription in &subscriptions {
            validate_subscription(subscription)?;
        }

        let auth = auth_from(self.credentials)?;
        self.client
            .subscribe(&auth, &subscriptions)
            .await
            .map_err(as_subscription_error)?;

        log_info!("subscriptions", "Subscribed", count = subscriptions.len());
        Ok(())
    }

    pub async fn unsubscribe(&self, currency: &str) -> CustodyResult<()> {
        if currency.trim().is_empty() {
            return Err(CustodyError::subscription_failed("Currency is required"));
        }
        let auth = auth_from(self.credentials)?;
        self.client
            .unsubscribe(&auth, currency)
            .await
            .map_err(as_subscription_error)?;

        log_info!("subscriptions", "Unsubscribed", currency = currency);
        Ok(())
    }

    pub async fn subscriptions(&self) -> CustodyResult<Vec<CurrencyInfo>> {
        let auth = auth_from(self.credentials)?;
        self.client
            .subscriptions(&auth)
            .await
            .map_err(as_subscription_error)
    }
}

/// Subscription for the key store's descriptors `0..lookahead`
///
/// Uses the same numbering the signer resolves descriptors with.
pub fn subscription_for(currency: &str, account: AccountInfo, key_store: &HdKeyStore) -> CustodyResult<SubscriptionInfo> {
    let subscription = SubscriptionInfo {
        currency: currency.to_string(),
        account,
        pubkeys: key_store.pub_key_infos(0..key_store.lookahead())?,
    };
    validate_subscription(&subscription)?;
    Ok(subscription)
}

pub fn validate_subscription(subscription: &SubscriptionInfo) -> CustodyResult<()> {
    if subscription.currency.trim().is_empty() {
        return Err(CustodyError::subscription_failed("Subscription currency is empty"));
    }
    if subscription.pubkeys.is_empty() {
        return Err(CustodyError::subscription_failed(format!(
            "{} subscription has no public keys",
            subscription.currency
        )));
    }

    let mut seen = HashSet::new();
    for info in &subscription.pubkeys {
        if !seen.insert(info.descriptor) {
            return Err(CustodyError::subscription_failed(format!(
                "Descriptor {} appears twice in the {} subscription",
                info.descriptor, subscription.currency
            )));
        }
        validate_pub_key(info)?;
    }
    Ok(())
}

fn validate_pub_key(info: &PubKeyInfo) -> CustodyResult<()> {
    let key = info.pub_key.trim();
    let is_hex = !key.is_empty() && key.len() % 2 == 0 && hex::decode(key).is_ok();
    let is_base58 = !key.is_empty() && bs58::decode(key).into_vec().is_ok();
    if is_hex || is_base58 {
        Ok(())
    } else {
        Err(CustodyError::subscription_failed(format!(
            "Public key for descriptor {} is neither hex nor base58",
            info.descriptor
        )))
    }
}

/// Backend rejections become `SubscriptionFailed`; transport and auth errors pass through
fn as_subscription_error(e: CustodyError) -> CustodyError {
    match e.code {
        ErrorCode::NetworkFailure
        | ErrorCode::AuthenticationFailed
        | ErrorCode::CredentialsUnavailable
        | ErrorCode::InvalidConfig => e,
        _ => CustodyError::subscription_failed(e.message).with_details(format!("{:?}", e.code)),
    }
}
