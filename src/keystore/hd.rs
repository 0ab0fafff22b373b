//! HD key store over an account-level extended private key
//!
//! Descriptor `n` is the non-hardened child `n` of the account key. The
//! same numbering produces the public keys handed to the subscription
//! service, so every descriptor a pre-image carries maps back to a key
//! this store can derive.

use std::ops::Range;
use std::str::FromStr;

use bitcoin::bip32::{ChildNumber, Xpriv};
use bitcoin::secp256k1::{All, PublicKey, Secp256k1, SecretKey};
use zeroize::Zeroizing;

use super::{same_public_key, sign_recoverable, KeyStore};
use crate::error::{CustodyError, CustodyResult};
use crate::types::{Descriptor, PubKeyInfo, PubKeyStyle, SignatureAlgorithm};

/// How many children are searched when a pre-image has no descriptor
pub const DEFAULT_LOOKAHEAD: u32 = 20;

pub struct HdKeyStore {
    account: Xpriv,
    secp: Secp256k1<All>,
    lookahead: u32,
}

/// A derived child key; the secret is wiped on drop
pub struct HdKey {
    pub descriptor: Descriptor,
    secret: SecretKey,
    public: PublicKey,
}

impl HdKey {
    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }
}

impl Drop for HdKey {
    fn drop(&mut self) {
        self.secret.non_secure_erase();
    }
}

impl std::fmt::Debug for HdKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HdKey")
            .field("descriptor", &self.descriptor)
            .field("public", &self.public)
            .finish_non_exhaustive()
    }
}

impl HdKeyStore {
    pub fn new(account: Xpriv) -> Self {
        Self {
            account,
            secp: Secp256k1::new(),
            lookahead: DEFAULT_LOOKAHEAD,
        }
    }

    /// Parse a base58 `xprv`/`tprv` string
    pub fn from_xprv(xprv: &str) -> CustodyResult<Self> {
        let encoded = Zeroizing::new(xprv.trim().to_string());
        let account = Xpriv::from_str(&encoded)
            .map_err(|e| CustodyError::key_resolution_failed(format!("Invalid extended private key: {}", e)))?;
        Ok(Self::new(account))
    }

    pub fn with_lookahead(mut self, lookahead: u32) -> Self {
        self.lookahead = lookahead;
        self
    }

    pub fn lookahead(&self) -> u32 {
        self.lookahead
    }

    pub fn derive(&self, descriptor: Descriptor) -> CustodyResult<HdKey> {
        let child = ChildNumber::from_normal_idx(descriptor.0)?;
        let derived = self.account.derive_priv(&self.secp, &[child])?;
        let secret = derived.private_key;
        Ok(HdKey {
            descriptor,
            public: PublicKey::from_secret_key(&self.secp, &secret),
            secret,
        })
    }

    /// Compressed hex public key for a descriptor
    pub fn public_key_for(&self, descriptor: Descriptor) -> CustodyResult<String> {
        Ok(hex::encode(self.derive(descriptor)?.public.serialize()))
    }

    /// Public keys to register with the subscription service
    pub fn pub_key_infos(&self, descriptors: Range<u32>) -> CustodyResult<Vec<PubKeyInfo>> {
        descriptors
            .map(|index| {
                Ok(PubKeyInfo {
                    pub_key: self.public_key_for(Descriptor(index))?,
                    style: PubKeyStyle::Single,
                    descriptor: Descriptor(index),
                })
            })
            .collect()
    }

    fn find_by_public_key(&self, signing_key: &str) -> CustodyResult<HdKey> {
        for index in 0..self.lookahead {
            let key = self.derive(Descriptor(index))?;
            if same_public_key(&hex::encode(key.public.serialize()), signing_key) {
                return Ok(key);
            }
        }
        Err(CustodyError::key_resolution_failed(format!(
            "No key within the first {} descriptors matches the signing key",
            self.lookahead
        )))
    }
}

impl Drop for HdKeyStore {
    fn drop(&mut self) {
        self.account.private_key.non_secure_erase();
    }
}

impl KeyStore for HdKeyStore {
    type Key = HdKey;

    fn resolve_key(&self, descriptor: Option<Descriptor>, signing_key: &str) -> CustodyResult<HdKey> {
        match descriptor {
            Some(descriptor) => self.derive(descriptor),
            None if signing_key.trim().is_empty() => Err(CustodyError::key_resolution_failed(
                "Pre-image has neither a descriptor nor a signing key",
            )),
            None => self.find_by_public_key(signing_key),
        }
    }

    fn public_key_hex(&self, key: &HdKey) -> String {
        hex::encode(key.public.serialize())
    }

    fn sign(&self, pre_image: &[u8], key: &HdKey, algorithm: &SignatureAlgorithm) -> CustodyResult<Vec<u8>> {
        match algorithm {
            SignatureAlgorithm::Secp256k1 => Ok(sign_recoverable(&self.secp, &key.secret, pre_image)?.to_vec()),
            SignatureAlgorithm::Unrecognized(raw) => Err(CustodyError::signing_failed(format!(
                "Unsupported signature algorithm: {}",
                raw
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::keystore::verify_signature;
    use bitcoin::NetworkKind;

    fn store() -> HdKeyStore {
        let account = Xpriv::new_master(NetworkKind::Test, &[7u8; 32]).unwrap();
        HdKeyStore::new(account)
    }

    #[test]
    fn test_descriptors_map_to_distinct_children() {
        let store = store();
        let infos = store.pub_key_infos(0..3).unwrap();
        assert_eq!(infos.len(), 3);
        assert_eq!(infos[1].descriptor, Descriptor(1));
        assert_eq!(infos[0].style, PubKeyStyle::Single);
        assert_ne!(infos[0].pub_key, infos[1].pub_key);
        assert_eq!(infos[0].pub_key.len(), 66);
    }

    #[test]
    fn test_resolve_by_descriptor_and_by_public_key() {
        let store = store();
        let pk2 = store.public_key_for(Descriptor(2)).unwrap();

        let by_descriptor = store.resolve_key(Some(Descriptor(2)), &pk2).unwrap();
        let by_key = store.resolve_key(None, &pk2.to_uppercase()).unwrap();
        assert_eq!(by_descriptor.descriptor, by_key.descriptor);

        let err = store.resolve_key(None, "02deadbeef").unwrap_err();
        assert_eq!(err.code, ErrorCode::KeyResolutionFailed);
        assert!(store.resolve_key(None, "").is_err());
    }

    #[test]
    fn test_hardened_descriptor_rejected() {
        let err = store().resolve_key(Some(Descriptor(0x8000_0000)), "").unwrap_err();
        assert_eq!(err.code, ErrorCode::KeyResolutionFailed);
    }

    #[test]
    fn test_sign_produces_verifiable_signature() {
        let store = store();
        let key = store.resolve_key(Some(Descriptor(0)), "").unwrap();
        let pre_image = [0xabu8; 32];

        let sig = store.sign(&pre_image, &key, &SignatureAlgorithm::Secp256k1).unwrap();
        assert_eq!(sig.len(), 65);
        assert!(verify_signature(&store.public_key_hex(&key), &pre_image, &sig).unwrap());
    }

    #[test]
    fn test_unrecognized_algorithm_rejected() {
        let store = store();
        let key = store.resolve_key(Some(Descriptor(0)), "").unwrap();
        let err = store
            .sign(&[0u8; 32], &key, &SignatureAlgorithm::Unrecognized("ED25519".into()))
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::SigningFailed);
    }

    #[test]
    fn test_parse_xprv_round_trip() {
        let original = store();
        let encoded = original.account.to_string();
        let parsed = HdKeyStore::from_xprv(&encoded).unwrap();
        assert_eq!(
            parsed.public_key_for(Descriptor(5)).unwrap(),
            original.public_key_for(Descriptor(5)).unwrap()
        );
        assert!(HdKeyStore::from_xprv("xprv-not-really").is_err());
    }
}
