//! Proof gates: purchase unlocks backed by third-party attestations.
//!
//! # Architecture
//!
//! - [`reclaim`]: zkTLS proofs from the Reclaim protocol. The server opens a
//!   session, hands the user a QR code, receives the proof on a callback and
//!   checks the attestor signatures.
//! - [`zkpass`]: `TransGate` results from the zkPass browser extension. The
//!   page runs the extension and posts the result; the server checks the
//!   allocator and validator signatures.
//! - [`eth`]: the keccak/secp256k1 primitives both share.
//!
//! A product's handle only enters the session's unlocked set after one of
//! these verifications succeeds.

pub mod eth;
pub mod reclaim;
pub mod sessions;
pub mod zkpass;

pub use reclaim::{ProofRequest, ReclaimClient, ReclaimProof};
pub use sessions::{ProofSessions, SessionStatus};
pub use zkpass::{TransGateResult, ZkPassLaunch};

use thiserror::Error;
use zkcart_core::EvmAddress;

/// Errors raised while requesting or verifying a proof.
#[derive(Debug, Error)]
pub enum ProofError {
    /// HTTP request to the proof service failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The proof service answered with an error.
    #[error("Proof service error: {0}")]
    Service(String),

    /// Input could not be decoded.
    #[error("Malformed proof: {0}")]
    Malformed(String),

    /// Signature recovery failed.
    #[error("Invalid signature: {0}")]
    Signature(String),

    /// The proof carries no signatures.
    #[error("Proof has no signatures")]
    NoSignatures,

    /// The claim identifier does not match the claim contents.
    #[error("Claim identifier mismatch (expected {expected}, got {actual})")]
    IdentifierMismatch { expected: String, actual: String },

    /// A witness listed on the proof is not a trusted attestor.
    #[error("Untrusted witness {0}")]
    UntrustedWitness(EvmAddress),

    /// A witness listed on the proof did not sign it.
    #[error("Missing signature from witness {0}")]
    MissingWitnessSignature(EvmAddress),

    /// A signer is not a trusted attestor.
    #[error("Untrusted signer {0}")]
    UntrustedSigner(EvmAddress),

    /// The proof was produced for another product or request.
    #[error("Proof does not belong to this request: {0}")]
    ForeignProof(String),

    /// The proof is valid but does not prove what the gate asks for.
    #[error("Claim not satisfied: {0}")]
    ClaimNotSatisfied(String),

    /// The allocator signature was not made by the expected allocator.
    #[error("Allocator mismatch (expected {expected}, recovered {recovered})")]
    AllocatorMismatch {
        expected: EvmAddress,
        recovered: EvmAddress,
    },

    /// The validator signature was not made by the named validator.
    #[error("Validator mismatch (expected {expected}, recovered {recovered})")]
    ValidatorMismatch {
        expected: EvmAddress,
        recovered: EvmAddress,
    },

    /// No pending proof session with this ID.
    #[error("Unknown proof session: {0}")]
    UnknownSession(String),

    /// QR code rendering failed.
    #[error("QR code error: {0}")]
    Qr(String),
}

impl ProofError {
    /// Whether the error is a verdict on the submitted proof rather than an
    /// infrastructure failure.
    #[must_use]
    pub const fn is_rejection(&self) -> bool {
        !matches!(self, Self::Http(_) | Self::Service(_) | Self::Qr(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proof_error_display() {
        let err = ProofError::ClaimNotSatisfied("following".to_string());
        assert_eq!(err.to_string(), "Claim not satisfied: following");

        let err = ProofError::UntrustedWitness(EvmAddress::from_bytes([0x11; 20]));
        assert_eq!(
            err.to_string(),
            "Untrusted witness 0x1111111111111111111111111111111111111111"
        );
    }

    #[test]
    fn test_is_rejection() {
        assert!(ProofError::NoSignatures.is_rejection());
        assert!(ProofError::ForeignProof("x".to_string()).is_rejection());
        assert!(ProofError::Malformed("x".to_string()).is_rejection());
        assert!(!ProofError::Service("down".to_string()).is_rejection());
    }
}
