// Copyright (c) 2026 Joseph Verdicchio and EvidenceOS Contributors
// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;

pub type StateBridgeResult<T> = Result<T, StateBridgeError>;

#[derive(Debug, Error)]
pub enum StateBridgeError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid legacy address {address:?}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("invalid destination address {0:?}")]
    InvalidDestAddress(String),

    #[error("failed to parse {kind} amount {value:?} for address {address}")]
    InvalidAmount {
        kind: &'static str,
        address: String,
        value: String,
    },

    #[error("unsupported denomination {denom:?} for address {address}")]
    UnsupportedDenom { address: String, denom: String },

    #[error("account {address} has {count} token denominations, expected exactly one")]
    MultipleDenoms { address: String, count: usize },

    #[error("public key does not derive address {address}")]
    PublicKeyMismatch { address: String },

    #[error("malformed export: {0}")]
    MalformedExport(String),

    #[error("{count} duplicate address(es) within a single export section")]
    SameSectionDuplicates { count: u64 },

    #[error("state hash mismatch: expected {expected}, computed {computed}")]
    StateHashMismatch { expected: String, computed: String },

    #[error("bundle records must be strictly ascending by address: {next} follows {previous}")]
    UnorderedBundle { previous: String, next: String },

    #[error("repository already holds {0} record(s); import runs once")]
    AlreadyImported(usize),

    #[error("record {0} is already claimed and cannot be imported")]
    ClaimedRecordImport(String),

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),
}
