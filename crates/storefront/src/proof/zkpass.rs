//! zkPass `TransGate` proof gate.
//!
//! The extension runs entirely in the browser. The server hands the page the
//! application and schema IDs, then checks the two signatures on the result
//! the page posts back: the allocator's assignment of the task to a
//! validator, and the validator's attestation of the proof.

use serde::{Deserialize, Serialize};
use zkcart_core::EvmAddress;

use super::ProofError;
use super::eth::{AbiWord, abi_encode_words, decode_hex, keccak256, recover_personal_signer};

/// Parameters the page needs to launch `TransGate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ZkPassLaunch {
    pub app_id: String,
    pub schema_id: String,
}

/// The result object `TransGate` hands back to the page.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransGateResult {
    pub task_id: String,
    pub allocator_address: EvmAddress,
    pub allocator_signature: String,
    pub validator_address: EvmAddress,
    pub validator_signature: String,
    pub u_hash: String,
    pub public_fields_hash: String,
    #[serde(default)]
    pub recipient: Option<EvmAddress>,
    #[serde(default)]
    pub public_fields: Vec<serde_json::Value>,
}

/// Hash signed by the allocator: `keccak256(abi.encode(bytes32 taskId,
/// bytes32 schemaId, address validator))`.
///
/// # Errors
///
/// Returns `ProofError::Malformed` if an ID does not fit in 32 bytes.
pub fn allocator_hash(result: &TransGateResult, schema_id: &str) -> Result<[u8; 32], ProofError> {
    let encoded = abi_encode_words(&[
        AbiWord::Bytes32(result.task_id.as_bytes()),
        AbiWord::Bytes32(schema_id.as_bytes()),
        AbiWord::Address(&result.validator_address),
    ])?;
    Ok(keccak256(encoded))
}

/// Hash signed by the validator: `keccak256(abi.encode(bytes32 taskId,
/// bytes32 schemaId, bytes32 uHash, bytes32 publicFieldsHash[, address recipient]))`.
///
/// # Errors
///
/// Returns `ProofError::Malformed` if a field is not valid `bytes32`.
pub fn validator_hash(result: &TransGateResult, schema_id: &str) -> Result<[u8; 32], ProofError> {
    let u_hash = decode_hex(&result.u_hash)?;
    let public_fields_hash = decode_hex(&result.public_fields_hash)?;

    let mut words = vec![
        AbiWord::Bytes32(result.task_id.as_bytes()),
        AbiWord::Bytes32(schema_id.as_bytes()),
        AbiWord::Bytes32(&u_hash),
        AbiWord::Bytes32(&public_fields_hash),
    ];
    if let Some(recipient) = &result.recipient {
        words.push(AbiWord::Address(recipient));
    }

    Ok(keccak256(abi_encode_words(&words)?))
}

/// Verify a `TransGate` result for a schema.
///
/// # Errors
///
/// Returns `ProofError::AllocatorMismatch` if the allocator signature was not
/// made by `allocator`, `ProofError::ValidatorMismatch` if the validator
/// signature was not made by the named validator, and
/// `ProofError::Malformed` for undecodable fields.
pub fn verify_result(
    result: &TransGateResult,
    schema_id: &str,
    allocator: &EvmAddress,
) -> Result<(), ProofError> {
    let recovered = recover_personal_signer(
        allocator_hash(result, schema_id)?,
        &result.allocator_signature,
    )?;
    if recovered != *allocator || result.allocator_address != *allocator {
        return Err(ProofError::AllocatorMismatch {
            expected: *allocator,
            recovered,
        });
    }

    let recovered = recover_personal_signer(
        validator_hash(result, schema_id)?,
        &result.validator_signature,
    )?;
    if recovered != result.validator_address {
        return Err(ProofError::ValidatorMismatch {
            expected: result.validator_address,
            recovered,
        });
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::proof::eth::{address_of, sign_eip191};
    use k256::ecdsa::SigningKey;

    const SCHEMA: &str = "c7eab8b7d7e44b05b41b613fe548edf5";
    const TASK: &str = "0f4b2a1c9d8e4f7a8b6c5d4e3f2a1b0c";

    fn key(byte: u8) -> SigningKey {
        let mut bytes = [0u8; 32];
        bytes[31] = byte;
        SigningKey::from_slice(&bytes).unwrap()
    }

    fn signed_result(allocator: &SigningKey, validator: &SigningKey) -> TransGateResult {
        let mut result = TransGateResult {
            task_id: TASK.to_string(),
            allocator_address: address_of(allocator.verifying_key()),
            allocator_signature: String::new(),
            validator_address: address_of(validator.verifying_key()),
            validator_signature: String::new(),
            u_hash: format!("0x{}", hex::encode([0x11; 32])),
            public_fields_hash: format!("0x{}", hex::encode([0x22; 32])),
            recipient: None,
            public_fields: vec![],
        };

        let allocator_sig =
            sign_eip191(allocator, allocator_hash(&result, SCHEMA).unwrap()).unwrap();
        let validator_sig =
            sign_eip191(validator, validator_hash(&result, SCHEMA).unwrap()).unwrap();
        result.allocator_signature = format!("0x{}", hex::encode(allocator_sig));
        result.validator_signature = format!("0x{}", hex::encode(validator_sig));
        result
    }

    #[test]
    fn test_verify_valid_result() {
        let allocator = key(1);
        let result = signed_result(&allocator, &key(2));
        verify_result(&result, SCHEMA, &address_of(allocator.verifying_key())).unwrap();
    }

    #[test]
    fn test_verify_wrong_allocator() {
        let result = signed_result(&key(3), &key(2));
        let expected = address_of(key(1).verifying_key());
        assert!(matches!(
            verify_result(&result, SCHEMA, &expected),
            Err(ProofError::AllocatorMismatch { .. })
        ));
    }

    #[test]
    fn test_verify_other_schema_fails() {
        let allocator = key(1);
        let result = signed_result(&allocator, &key(2));
        assert!(
            verify_result(
                &result,
                "another-schema",
                &address_of(allocator.verifying_key())
            )
            .is_err()
        );
    }

    #[test]
    fn test_verify_tampered_uhash() {
        let allocator = key(1);
        let mut result = signed_result(&allocator, &key(2));
        result.u_hash = format!("0x{}", hex::encode([0x33; 32]));
        assert!(matches!(
            verify_result(&result, SCHEMA, &address_of(allocator.verifying_key())),
            Err(ProofError::ValidatorMismatch { .. })
        ));
    }

    #[test]
    fn test_recipient_changes_validator_hash() {
        let result = signed_result(&key(1), &key(2));
        let mut with_recipient = result.clone();
        with_recipient.recipient = Some(EvmAddress::from_bytes([0x44; 20]));
        assert_ne!(
            validator_hash(&result, SCHEMA).unwrap(),
            validator_hash(&with_recipient, SCHEMA).unwrap()
        );
    }

    #[test]
    fn test_long_task_id_is_malformed() {
        let mut result = signed_result(&key(1), &key(2));
        result.task_id = "x".repeat(33);
        assert!(matches!(
            allocator_hash(&result, SCHEMA),
            Err(ProofError::Malformed(_))
        ));
    }

    #[test]
    fn test_result_deserializes_from_extension_json() {
        let json = serde_json::json!({
            "taskId": TASK,
            "allocatorAddress": "0x19a567b3b212a5b35bA0E3B600FbEd5c2eE9083d",
            "allocatorSignature": "0x00",
            "validatorAddress": "0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf",
            "validatorSignature": "0x00",
            "uHash": "0x11",
            "publicFieldsHash": "0x22"
        });
        let result: TransGateResult = serde_json::from_value(json).unwrap();
        assert!(result.recipient.is_none());
        assert_eq!(
            result.allocator_address.to_string(),
            "0x19a567b3b212a5b35ba0e3b600fbed5c2ee9083d"
        );
    }
}
