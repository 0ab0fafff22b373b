//! Key Store
//!
//! Signing is a capability the wallet lends to the pipeline: resolve a key
//! for a pre-image, then sign bytes with it. Keys never leave the store.

mod hd;
mod secp256k1;

pub use hd::*;
pub use self::secp256k1::*;

use crate::error::CustodyResult;
use crate::types::{Descriptor, SignatureAlgorithm};

/// Local signing capability
pub trait KeyStore: Send + Sync {
    /// Handle to a resolved private key
    type Key: Send;

    /// Find the key for a pre-image.
    ///
    /// With a descriptor the key is looked up by index; without one the
    /// store searches for a key whose public key equals `signing_key`.
    fn resolve_key(&self, descriptor: Option<Descriptor>, signing_key: &str) -> CustodyResult<Self::Key>;

    /// Hex public key of a resolved key, compared against `signingKey`
    fn public_key_hex(&self, key: &Self::Key) -> String;

    /// Sign `pre_image` exactly as given
    fn sign(&self, pre_image: &[u8], key: &Self::Key, algorithm: &SignatureAlgorithm) -> CustodyResult<Vec<u8>>;
}

impl<K: KeyStore + ?Sized> KeyStore for std::sync::Arc<K> {
    type Key = K::Key;

    fn resolve_key(&self, descriptor: Option<Descriptor>, signing_key: &str) -> CustodyResult<Self::Key> {
        (**self).resolve_key(descriptor, signing_key)
    }

    fn public_key_hex(&self, key: &Self::Key) -> String {
        (**self).public_key_hex(key)
    }

    fn sign(&self, pre_image: &[u8], key: &Self::Key, algorithm: &SignatureAlgorithm) -> CustodyResult<Vec<u8>> {
        (**self).sign(pre_image, key, algorithm)
    }
}

/// Case- and prefix-insensitive comparison of hex public keys
pub fn same_public_key(a: &str, b: &str) -> bool {
    let a = a.trim();
    let b = b.trim();
    let a = a.strip_prefix("0x").unwrap_or(a);
    let b = b.strip_prefix("0x").unwrap_or(b);
    !a.is_empty() && a.eq_ignore_ascii_case(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_public_key() {
        assert!(same_public_key("02AB", "0x02ab"));
        assert!(!same_public_key("02ab", "03ab"));
        assert!(!same_public_key("", ""));
        assert!(!same_public_key("0x0x02ab", "02ab"));
    }
}
