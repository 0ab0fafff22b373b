//! Wallet authentication tokens
//!
//! Every backend request carries the SHA-256 of the wallet GUID and of the
//! shared key. The raw values never leave the device; the hashes are
//! recomputed per request and never stored.

use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};

use crate::error::{CustodyError, CustodyResult};
use crate::types::AuthInfo;

/// Credentials of an unlocked wallet
pub struct WalletCredentials {
    pub guid: String,
    pub shared_key: SecretString,
}

impl WalletCredentials {
    pub fn new(guid: impl Into<String>, shared_key: impl Into<String>) -> Self {
        Self {
            guid: guid.into(),
            shared_key: SecretString::from(shared_key.into()),
        }
    }

    pub fn auth_info(&self) -> CustodyResult<AuthInfo> {
        auth_info(&self.guid, self.shared_key.expose_secret())
    }
}

impl std::fmt::Debug for WalletCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletCredentials")
            .field("guid", &"[REDACTED]")
            .field("shared_key", &"[REDACTED]")
            .finish()
    }
}

/// Source of the current wallet's credentials
///
/// Returns `None` while the wallet is locked.
pub trait CredentialsProvider: Send + Sync {
    fn credentials(&self) -> Option<WalletCredentials>;
}

/// Fixed credentials, mostly for tests and the CLI
pub struct StaticCredentials {
    guid: String,
    shared_key: SecretString,
}

impl StaticCredentials {
    pub fn new(guid: impl Into<String>, shared_key: impl Into<String>) -> Self {
        Self {
            guid: guid.into(),
            shared_key: SecretString::from(shared_key.into()),
        }
    }
}

impl CredentialsProvider for StaticCredentials {
    fn credentials(&self) -> Option<WalletCredentials> {
        Some(WalletCredentials::new(
            self.guid.clone(),
            self.shared_key.expose_secret().to_string(),
        ))
    }
}

/// Provider for a wallet that is never unlocked
pub struct LockedWallet;

impl CredentialsProvider for LockedWallet {
    fn credentials(&self) -> Option<WalletCredentials> {
        None
    }
}

/// Derive the request auth block from raw credentials
pub fn auth_info(guid: &str, shared_key: &str) -> CustodyResult<AuthInfo> {
    if guid.is_empty() || shared_key.is_empty() {
        return Err(CustodyError::credentials_unavailable(
            "Wallet GUID and shared key are required",
        ));
    }
    Ok(AuthInfo {
        guid_hash: sha256_hex(guid),
        shared_key_hash: sha256_hex(shared_key),
    })
}

/// Resolve the auth block from a provider, failing fast for a locked wallet
pub fn auth_from(provider: &dyn CredentialsProvider) -> CustodyResult<AuthInfo> {
    provider
        .credentials()
        .ok_or_else(|| CustodyError::credentials_unavailable("Wallet is locked"))?
        .auth_info()
}

fn sha256_hex(value: &str) -> String {
    hex::encode(Sha256::digest(value.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn test_auth_info_is_sha256_hex() {
        let auth = auth_info("abc", "password").unwrap();
        assert_eq!(
            auth.guid_hash,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(
            auth.shared_key_hash,
            "5e884898da28047151d0e56f8dc6292773603d0d6aabbdd62a11ef721d1542d8"
        );
    }

    #[test]
    fn test_auth_info_is_deterministic() {
        let a = auth_info("guid-1", "key-1").unwrap();
        let b = auth_info("guid-1", "key-1").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, auth_info("guid-2", "key-1").unwrap());
    }

    #[test]
    fn test_empty_credentials_rejected() {
        assert_eq!(
            auth_info("", "key").unwrap_err().code,
            ErrorCode::CredentialsUnavailable
        );
        assert_eq!(
            auth_info("guid", "").unwrap_err().code,
            ErrorCode::CredentialsUnavailable
        );
    }

    #[test]
    fn test_locked_wallet_fails_fast() {
        let err = auth_from(&LockedWallet).unwrap_err();
        assert_eq!(err.code, ErrorCode::CredentialsUnavailable);

        let unlocked = StaticCredentials::new("guid", "key");
        assert!(auth_from(&unlocked).is_ok());
    }

    #[test]
    fn test_debug_hides_credentials() {
        let creds = WalletCredentials::new("my-guid", "my-shared-key");
        let rendered = format!("{:?}", creds);
        assert!(!rendered.contains("my-guid"));
        assert!(!rendered.contains("my-shared-key"));
    }
}
