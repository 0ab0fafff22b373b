//! secp256k1 signing helpers
//!
//! Pre-images are 32-byte digests computed by the backend and are signed
//! as-is. Signatures are 65 bytes: `r || s || recovery_id`.

use bitcoin::secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use bitcoin::secp256k1::{Message, PublicKey, Secp256k1, SecretKey, Signing};

use crate::error::{CustodyError, CustodyResult};

pub const DIGEST_LEN: usize = 32;
pub const SIGNATURE_LEN: usize = 65;

/// Interpret a pre-image as a message digest
pub fn digest(pre_image: &[u8]) -> CustodyResult<[u8; DIGEST_LEN]> {
    pre_image.try_into().map_err(|_| {
        CustodyError::signing_failed(format!(
            "secp256k1 pre-image must be {} bytes, got {}",
            DIGEST_LEN,
            pre_image.len()
        ))
    })
}

pub fn sign_recoverable<C: Signing>(
    secp: &Secp256k1<C>,
    secret: &SecretKey,
    pre_image: &[u8],
) -> CustodyResult<[u8; SIGNATURE_LEN]> {
    let msg = Message::from_digest(digest(pre_image)?);
    let sig = secp.sign_ecdsa_recoverable(&msg, secret);
    let (recovery_id, compact) = sig.serialize_compact();

    let mut out = [0u8; SIGNATURE_LEN];
    out[..64].copy_from_slice(&compact);
    out[64] = recovery_id.to_i32() as u8;
    Ok(out)
}

/// Recover the signer of a 65-byte signature over `pre_image`
pub fn recover_public_key(pre_image: &[u8], signature: &[u8]) -> CustodyResult<PublicKey> {
    if signature.len() != SIGNATURE_LEN {
        return Err(CustodyError::signing_failed(format!(
            "Signature must be {} bytes, got {}",
            SIGNATURE_LEN,
            signature.len()
        )));
    }
    let recovery_id = RecoveryId::from_i32(signature[64] as i32)?;
    let sig = RecoverableSignature::from_compact(&signature[..64], recovery_id)?;
    let msg = Message::from_digest(digest(pre_image)?);

    let secp = Secp256k1::verification_only();
    Ok(secp.recover_ecdsa(&msg, &sig)?)
}

/// Check a 65-byte signature against a hex public key
pub fn verify_signature(public_key_hex: &str, pre_image: &[u8], signature: &[u8]) -> CustodyResult<bool> {
    let expected: PublicKey = public_key_hex
        .strip_prefix("0x")
        .unwrap_or(public_key_hex)
        .parse()
        .map_err(|e| CustodyError::key_resolution_failed(format!("Invalid public key: {}", e)))?;

    let recovered = match recover_public_key(pre_image, signature) {
        Ok(pk) => pk,
        Err(_) => return Ok(false),
    };
    if recovered != expected {
        return Ok(false);
    }

    let msg = Message::from_digest(digest(pre_image)?);
    let sig = RecoverableSignature::from_compact(&signature[..64], RecoveryId::from_i32(signature[64] as i32)?)?
        .to_standard();
    Ok(Secp256k1::verification_only().verify_ecdsa(&msg, &sig, &expected).is_ok())
}
