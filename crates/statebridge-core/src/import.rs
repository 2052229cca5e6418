// Copyright (c) 2026 Joseph Verdicchio and EvidenceOS Contributors
// SPDX-License-Identifier: Apache-2.0

use crate::error::{StateBridgeError, StateBridgeResult};
use crate::repository::Repository;
use crate::state::{ConsolidatedState, ImportBundle};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSummary {
    pub num_accounts: usize,
    pub state_hash_hex: String,
}

/// Loads a collector bundle into an empty repository after re-deriving its
/// integrity hash. Records are written in one batch, and only after every
/// check passes.
pub fn import_bundle<R: Repository>(
    repo: &mut R,
    bundle: &ImportBundle,
) -> StateBridgeResult<ImportSummary> {
    let check = bundle.check_hash()?;
    if !check.matches() {
        tracing::error!(
            expected = %check.expected_hex,
            computed = %check.computed_hex,
            "refusing import: state hash mismatch"
        );
        return Err(StateBridgeError::StateHashMismatch {
            expected: check.expected_hex,
            computed: check.computed_hex,
        });
    }

    if let Some(pair) = bundle
        .account_state
        .accounts
        .windows(2)
        .find(|pair| pair[0].legacy_address >= pair[1].legacy_address)
    {
        return Err(StateBridgeError::UnorderedBundle {
            previous: pair[0].legacy_address.to_hex(),
            next: pair[1].legacy_address.to_hex(),
        });
    }

    let existing = repo.len()?;
    if existing > 0 {
        return Err(StateBridgeError::AlreadyImported(existing));
    }
    if let Some(claimed) = bundle
        .account_state
        .accounts
        .iter()
        .find(|a| !a.dest_address.is_empty() || a.claimed_at_height > 0)
    {
        return Err(StateBridgeError::ClaimedRecordImport(
            claimed.legacy_address.to_hex(),
        ));
    }

    repo.set_all(bundle.account_state.accounts.clone())?;
    tracing::info!(
        num_accounts = bundle.account_state.accounts.len(),
        state_hash = %check.computed_hex,
        "imported claimable accounts"
    );
    Ok(ImportSummary {
        num_accounts: bundle.account_state.accounts.len(),
        state_hash_hex: check.computed_hex,
    })
}

/// Rebuilds the account table from the repository, in address order.
pub fn export_state<R: Repository>(repo: &R) -> StateBridgeResult<ConsolidatedState> {
    Ok(ConsolidatedState {
        accounts: repo.iterate_all()?,
    })
}
