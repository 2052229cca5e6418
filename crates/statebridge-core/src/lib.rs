// Copyright (c) 2026 Joseph Verdicchio and EvidenceOS Contributors
// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

pub mod address;
pub mod amount;
pub mod claim;
pub mod collect;
pub mod error;
pub mod export;
pub mod fees;
pub mod import;
pub mod ledger;
pub mod params;
pub mod repository;
pub mod state;
pub mod verify;

pub use address::{DestAddress, LegacyAddress, LegacyPublicKey};
pub use amount::{Amount, Coin, LEGACY_DENOM};
pub use claim::{sign, sign_multi, Claim, ClaimKind, ClaimMessage};
pub use collect::{consolidate, consolidate_all, CollectionStats, CollectorOptions};
pub use error::{StateBridgeError, StateBridgeResult};
pub use export::StateExport;
pub use fees::{process_claim_tx, ClaimTx, GasMeter, TxMessage, TxOutcome};
pub use import::{export_state, import_bundle};
pub use ledger::{ClaimEvent, ClaimLedger, ClaimRejection, ClaimSignerType};
pub use params::MigrationParams;
pub use repository::{JsonFileRepository, MemoryRepository, Repository, StagedRepository};
pub use state::{ClaimableAccount, ConsolidatedState, ImportBundle};
pub use verify::{verify, SignatureError};
