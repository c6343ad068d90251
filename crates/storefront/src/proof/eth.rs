//! Ethereum-style hashing and signature recovery.
//!
//! Both proof services sign with secp256k1 keys and identify signers by
//! their 20-byte address, so verification always means: hash the message,
//! recover the public key from `r ‖ s ‖ v`, and compare addresses.

use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use sha3::{Digest, Keccak256};
use zkcart_core::EvmAddress;

use super::ProofError;

/// Prefix used by `personal_sign` (EIP-191 version `0x45`).
const EIP191_PREFIX: &str = "\x19Ethereum Signed Message:\n";

/// Keccak-256 digest.
#[must_use]
pub fn keccak256(data: impl AsRef<[u8]>) -> [u8; 32] {
    Keccak256::digest(data.as_ref()).into()
}

/// Hash a message the way `personal_sign` does before signing.
#[must_use]
pub fn eip191_hash(message: impl AsRef<[u8]>) -> [u8; 32] {
    let message = message.as_ref();
    let mut hasher = Keccak256::new();
    hasher.update(format!("{EIP191_PREFIX}{}", message.len()).as_bytes());
    hasher.update(message);
    hasher.finalize().into()
}

/// Decode a `0x`-prefixed (or bare) hex string.
///
/// # Errors
///
/// Returns `ProofError::Malformed` if the string is not valid hex.
pub fn decode_hex(value: &str) -> Result<Vec<u8>, ProofError> {
    let trimmed = value.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    hex::decode(digits).map_err(|e| ProofError::Malformed(format!("invalid hex: {e}")))
}

/// Address of a public key: last 20 bytes of keccak over the uncompressed
/// point without its `0x04` tag.
#[must_use]
pub fn address_of(key: &VerifyingKey) -> EvmAddress {
    let point = key.to_encoded_point(false);
    let coordinates = point
        .as_bytes()
        .split_first()
        .map_or(&[][..], |(_, rest)| rest);
    let hash = keccak256(coordinates);

    let mut address = [0u8; 20];
    address.copy_from_slice(hash.split_at(12).1);
    EvmAddress::from_bytes(address)
}

/// Recover the signer of a 32-byte prehash from a 65-byte `r ‖ s ‖ v` signature.
///
/// `v` may be `0`/`1` or `27`/`28`. High-s signatures are normalised and the
/// recovery id parity flipped to match.
///
/// # Errors
///
/// Returns `ProofError::Malformed` for a badly shaped signature and
/// `ProofError::Signature` if no public key can be recovered.
pub fn recover_address(prehash: &[u8; 32], signature: &[u8]) -> Result<EvmAddress, ProofError> {
    let Some((&v, rs)) = signature.split_last() else {
        return Err(ProofError::Malformed("empty signature".to_string()));
    };
    if rs.len() != 64 {
        return Err(ProofError::Malformed(format!(
            "signature must be 65 bytes (got {})",
            signature.len()
        )));
    }

    let v = match v {
        0 | 1 => v,
        27 | 28 => v - 27,
        other => {
            return Err(ProofError::Malformed(format!(
                "unsupported recovery byte {other}"
            )));
        }
    };

    let mut signature =
        Signature::from_slice(rs).map_err(|e| ProofError::Signature(e.to_string()))?;
    let mut recovery_id = RecoveryId::from_byte(v)
        .ok_or_else(|| ProofError::Malformed(format!("invalid recovery id {v}")))?;

    if let Some(normalized) = signature.normalize_s() {
        signature = normalized;
        recovery_id = RecoveryId::new(!recovery_id.is_y_odd(), recovery_id.is_x_reduced());
    }

    let key = VerifyingKey::recover_from_prehash(prehash, &signature, recovery_id)
        .map_err(|e| ProofError::Signature(e.to_string()))?;

    Ok(address_of(&key))
}

/// Recover the signer of an EIP-191 message from a hex signature.
///
/// # Errors
///
/// See [`recover_address`] and [`decode_hex`].
pub fn recover_personal_signer(
    message: impl AsRef<[u8]>,
    signature_hex: &str,
) -> Result<EvmAddress, ProofError> {
    let signature = decode_hex(signature_hex)?;
    recover_address(&eip191_hash(message), &signature)
}

/// Sign a message with the EIP-191 prefix, returning `r ‖ s ‖ v` with `v` in `{27, 28}`.
///
/// # Errors
///
/// Returns `ProofError::Signature` if signing fails.
pub fn sign_eip191(key: &SigningKey, message: impl AsRef<[u8]>) -> Result<Vec<u8>, ProofError> {
    let prehash = eip191_hash(message);
    let (signature, recovery_id) = key
        .sign_prehash_recoverable(&prehash)
        .map_err(|e| ProofError::Signature(e.to_string()))?;

    let mut bytes = signature.to_bytes().to_vec();
    bytes.push(27 + recovery_id.to_byte());
    Ok(bytes)
}

/// Parse a hex encoded secp256k1 private key.
///
/// # Errors
///
/// Returns `ProofError::Malformed` if the key is not a valid scalar.
pub fn signing_key_from_hex(value: &str) -> Result<SigningKey, ProofError> {
    let bytes = decode_hex(value)?;
    SigningKey::from_slice(&bytes)
        .map_err(|_| ProofError::Malformed("invalid secp256k1 private key".to_string()))
}

/// A static ABI word.
#[derive(Debug, Clone, Copy)]
pub enum AbiWord<'a> {
    /// `bytes32`: right-padded with zeros, at most 32 bytes.
    Bytes32(&'a [u8]),
    /// `address`: left-padded to 32 bytes.
    Address(&'a EvmAddress),
}

/// ABI-encode a tuple of static words (`abi.encode`).
///
/// # Errors
///
/// Returns `ProofError::Malformed` if a `bytes32` value is longer than 32 bytes.
pub fn abi_encode_words(words: &[AbiWord<'_>]) -> Result<Vec<u8>, ProofError> {
    let mut out = Vec::with_capacity(words.len() * 32);

    for word in words {
        let mut slot = [0u8; 32];
        match *word {
            AbiWord::Bytes32(bytes) => {
                if bytes.len() > 32 {
                    return Err(ProofError::Malformed(format!(
                        "bytes32 value is {} bytes",
                        bytes.len()
                    )));
                }
                slot.split_at_mut(bytes.len()).0.copy_from_slice(bytes);
            }
            AbiWord::Address(address) => {
                slot.split_at_mut(12).1.copy_from_slice(address.as_bytes());
            }
        }
        out.extend_from_slice(&slot);
    }

    Ok(out)
}
