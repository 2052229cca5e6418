// Copyright (c) 2026 Joseph Verdicchio and EvidenceOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Stateless claim signature verification.

use crate::address::{LegacyAddress, LegacyPublicKey, SIGNATURE_LEN};
use crate::claim::{multisig_address, Claim, ClaimMessage};
use ed25519_dalek::{Signature, Verifier};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("signature must be {expected} bytes, got {actual}")]
    WrongLength { expected: usize, actual: usize },
    #[error("public key {index} is not a valid ed25519 key")]
    InvalidPublicKey { index: usize },
    #[error("signature {index} failed verification")]
    Verification { index: usize },
    #[error("public key(s) derive {derived}, claim names {claimed}")]
    AddressMismatch {
        claimed: LegacyAddress,
        derived: LegacyAddress,
    },
    #[error("multisig claim carries no public keys")]
    EmptyKeySet,
    #[error("destination address is empty")]
    MissingDestination,
    #[error("could not encode signing bytes: {0}")]
    Encoding(String),
}

/// Addresses established by a successful verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifiedClaim {
    pub src_address: LegacyAddress,
    /// Address of the key(s) that signed; differs from `src_address` only for
    /// supplier claims signed by the output key.
    pub signer_address: LegacyAddress,
}

/// Checks a claim's signature(s) against its own content. Does not consult
/// ledger state; supplier signer authorization happens at claim processing.
pub fn verify(message: &ClaimMessage) -> Result<VerifiedClaim, SignatureError> {
    if message.dest_address().is_empty() {
        return Err(SignatureError::MissingDestination);
    }
    let bytes = message
        .signing_bytes()
        .map_err(|e| SignatureError::Encoding(e.to_string()))?;
    let claimed = message.src_address();

    match message {
        ClaimMessage::Account(m) => {
            verify_single(&m.legacy_public_key, &m.legacy_signature, &bytes)?;
            check_derived(claimed, m.legacy_public_key.address())?;
            Ok(VerifiedClaim {
                src_address: claimed,
                signer_address: claimed,
            })
        }
        ClaimMessage::Application(m) => {
            verify_single(&m.legacy_public_key, &m.legacy_signature, &bytes)?;
            check_derived(claimed, m.legacy_public_key.address())?;
            Ok(VerifiedClaim {
                src_address: claimed,
                signer_address: claimed,
            })
        }
        ClaimMessage::Supplier(m) => {
            if let Some(op) = &m.operator_dest_address {
                if op.is_empty() {
                    return Err(SignatureError::MissingDestination);
                }
            }
            verify_single(&m.legacy_signer_public_key, &m.legacy_signature, &bytes)?;
            Ok(VerifiedClaim {
                src_address: claimed,
                signer_address: m.signer_address(),
            })
        }
        ClaimMessage::MultiSig(m) => {
            verify_multi(&m.legacy_public_keys, &m.legacy_signature, &bytes)?;
            let derived =
                multisig_address(&m.legacy_public_keys).map_err(|_| SignatureError::EmptyKeySet)?;
            check_derived(claimed, derived)?;
            Ok(VerifiedClaim {
                src_address: claimed,
                signer_address: derived,
            })
        }
    }
}

fn check_derived(claimed: LegacyAddress, derived: LegacyAddress) -> Result<(), SignatureError> {
    if claimed != derived {
        return Err(SignatureError::AddressMismatch { claimed, derived });
    }
    Ok(())
}

fn verify_single(
    key: &LegacyPublicKey,
    signature: &[u8],
    bytes: &[u8],
) -> Result<(), SignatureError> {
    if signature.len() != SIGNATURE_LEN {
        return Err(SignatureError::WrongLength {
            expected: SIGNATURE_LEN,
            actual: signature.len(),
        });
    }
    verify_slice(0, key, signature, bytes)
}

fn verify_multi(
    keys: &[LegacyPublicKey],
    signature: &[u8],
    bytes: &[u8],
) -> Result<(), SignatureError> {
    if keys.is_empty() {
        return Err(SignatureError::EmptyKeySet);
    }
    let expected = SIGNATURE_LEN * keys.len();
    if signature.len() != expected {
        return Err(SignatureError::WrongLength {
            expected,
            actual: signature.len(),
        });
    }
    for (index, (key, chunk)) in keys
        .iter()
        .zip(signature.chunks_exact(SIGNATURE_LEN))
        .enumerate()
    {
        verify_slice(index, key, chunk, bytes)?;
    }
    Ok(())
}

fn verify_slice(
    index: usize,
    key: &LegacyPublicKey,
    chunk: &[u8],
    bytes: &[u8],
) -> Result<(), SignatureError> {
    let vk = key
        .verifying_key()
        .map_err(|_| SignatureError::InvalidPublicKey { index })?;
    let raw: [u8; SIGNATURE_LEN] = chunk.try_into().map_err(|_| SignatureError::WrongLength {
        expected: SIGNATURE_LEN,
        actual: chunk.len(),
    })?;
    let sig = Signature::from_bytes(&raw);
    vk.verify(bytes, &sig)
        .map_err(|_| SignatureError::Verification { index })
}
