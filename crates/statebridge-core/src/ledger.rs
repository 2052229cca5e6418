// Copyright (c) 2026 Joseph Verdicchio and EvidenceOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Claim processing against imported records.
//!
//! A record moves from unclaimed to claimed exactly once. Every check runs
//! before the single write of the claimed record, and the replay guard runs
//! before anything else that looks at the message.

use crate::address::{DestAddress, LegacyAddress};
use crate::amount::Amount;
use crate::claim::{Claim, ClaimKind, ClaimMessage};
use crate::error::StateBridgeResult;
use crate::params::MigrationParams;
use crate::repository::Repository;
use crate::state::ClaimableAccount;
use crate::verify::{verify, SignatureError};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClaimRejection {
    #[error("no claimable account exists for legacy address {address}")]
    NotFound { address: LegacyAddress },

    #[error("legacy address {address} was claimed at height {claimed_at_height} by {dest_address}")]
    AlreadyClaimed {
        address: LegacyAddress,
        claimed_at_height: u64,
        dest_address: DestAddress,
    },

    #[error("{}", wrong_actor_message(.address, .attempted, .required))]
    WrongActorType {
        address: LegacyAddress,
        attempted: ClaimKind,
        required: ClaimKind,
    },

    #[error("invalid claim signature: {0}")]
    InvalidSignature(#[from] SignatureError),

    #[error("signer {signer} is neither node {node} nor its output address")]
    UnauthorizedSigner {
        node: LegacyAddress,
        signer: LegacyAddress,
    },

    #[error("requested stake {requested} exceeds the {available} tokens held by {address}")]
    InvalidStake {
        address: LegacyAddress,
        requested: Amount,
        available: Amount,
    },

    #[error("claims require a positive block height")]
    InvalidHeight,

    #[error("claim storage failure: {0}")]
    Storage(String),
}

fn wrong_actor_message(
    address: &LegacyAddress,
    attempted: &ClaimKind,
    required: &ClaimKind,
) -> String {
    match attempted {
        ClaimKind::MultiSig => format!(
            "multisig legacy address {address} holds {required} stake; multisig claims only \
             redeem unstaked balances, so the stake must leave the imported state first"
        ),
        _ => format!(
            "legacy address {address} cannot be redeemed by the {attempted} claim; \
             use `{}` instead",
            required.command()
        ),
    }
}

impl ClaimRejection {
    /// Rejections that cost the submitter the waived signature gas.
    pub fn revokes_fee_waiver(&self) -> bool {
        matches!(
            self,
            ClaimRejection::NotFound { .. }
                | ClaimRejection::AlreadyClaimed { .. }
                | ClaimRejection::InvalidSignature(_)
        )
    }
}

/// Which key authorized a supplier claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimSignerType {
    /// Node key, no output address on record.
    Operator,
    /// Node key, output address on record.
    OperatorNonCustodial,
    /// Output address key.
    OwnerNonCustodial,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Payout {
    /// Minted to the destination as spendable balance.
    pub liquid: Amount,
    /// Minted and immediately restaked as the claim variant's actor.
    pub staked: Amount,
    pub total: Amount,
}

/// Audit record of a successful claim; also the handler's response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClaimEvent {
    pub kind: ClaimKind,
    pub legacy_src_address: LegacyAddress,
    pub dest_address: DestAddress,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_dest_address: Option<DestAddress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub legacy_output_address: Option<LegacyAddress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signer_type: Option<ClaimSignerType>,
    pub payout: Payout,
    pub claimed_at_height: u64,
    /// Last block of the session in which the new stake was created.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_end_height: Option<u64>,
}

/// Claim handler over a record repository.
#[derive(Debug)]
pub struct ClaimLedger<R: Repository> {
    pub(crate) repo: R,
    pub(crate) params: MigrationParams,
    pub(crate) events: Vec<ClaimEvent>,
}

impl<R: Repository> ClaimLedger<R> {
    pub fn new(repo: R, params: MigrationParams) -> StateBridgeResult<Self> {
        params.validate()?;
        Ok(Self {
            repo,
            params,
            events: Vec::new(),
        })
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    pub fn events(&self) -> &[ClaimEvent] {
        &self.events
    }

    pub fn get(&self, address: &LegacyAddress) -> StateBridgeResult<Option<ClaimableAccount>> {
        self.repo.get(address)
    }

    pub fn process_claim(
        &mut self,
        message: &ClaimMessage,
        height: u64,
    ) -> Result<ClaimEvent, ClaimRejection> {
        let event = apply_claim(&mut self.repo, &self.params, message, height)?;
        self.events.push(event.clone());
        Ok(event)
    }
}

pub(crate) fn apply_claim<R: Repository>(
    repo: &mut R,
    params: &MigrationParams,
    message: &ClaimMessage,
    height: u64,
) -> Result<ClaimEvent, ClaimRejection> {
    let address = message.src_address();
    let mut record = repo
        .get(&address)
        .map_err(|e| ClaimRejection::Storage(e.to_string()))?
        .ok_or(ClaimRejection::NotFound { address })?;

    if record.is_claimed() {
        return Err(ClaimRejection::AlreadyClaimed {
            address,
            claimed_at_height: record.claimed_at_height,
            dest_address: record.dest_address.clone(),
        });
    }

    let verified = verify(message)?;
    check_actor_type(&record, message.kind())?;
    if height == 0 {
        return Err(ClaimRejection::InvalidHeight);
    }

    let total = record.total_tokens();
    let mut signer_type = None;
    let mut owner_dest_address = None;
    let (dest, staked) = match message {
        ClaimMessage::Account(m) => (m.dest_address.clone(), Amount::zero()),
        ClaimMessage::MultiSig(m) => (m.dest_address.clone(), Amount::zero()),
        ClaimMessage::Application(m) => {
            let staked = m.stake.clone().unwrap_or_else(|| record.app_stake.clone());
            (m.dest_address.clone(), staked)
        }
        ClaimMessage::Supplier(m) => {
            signer_type = Some(check_supplier_signer(&record, verified.signer_address)?);
            owner_dest_address = Some(m.owner_dest_address.clone());
            (m.operator_dest().clone(), record.node_stake.clone())
        }
    };
    let liquid = total
        .checked_sub(&staked)
        .ok_or_else(|| ClaimRejection::InvalidStake {
            address,
            requested: staked.clone(),
            available: total.clone(),
        })?;

    let session_end_height = match message.kind() {
        ClaimKind::Application | ClaimKind::Supplier => Some(params.session_end_height(height)),
        ClaimKind::Account | ClaimKind::MultiSig => None,
    };

    record
        .mark_claimed(dest.clone(), height)
        .map_err(|e| ClaimRejection::Storage(e.to_string()))?;
    let legacy_output_address = record.output_address;
    repo.set(record)
        .map_err(|e| ClaimRejection::Storage(e.to_string()))?;

    tracing::info!(
        kind = %message.kind(),
        legacy_address = %address,
        dest_address = %dest,
        total = %total,
        staked = %staked,
        height,
        "legacy account claimed"
    );

    Ok(ClaimEvent {
        kind: message.kind(),
        legacy_src_address: address,
        dest_address: dest,
        owner_dest_address,
        legacy_output_address,
        signer_type,
        payout: Payout {
            liquid,
            staked,
            total,
        },
        claimed_at_height: height,
        session_end_height,
    })
}

/// Staked tokens are only released through the claim of their own actor
/// type, so stake cannot skip the destination ledger's unbonding rules.
fn check_actor_type(record: &ClaimableAccount, kind: ClaimKind) -> Result<(), ClaimRejection> {
    let has_app = record.app_stake.is_positive();
    let has_node = record.node_stake.is_positive();
    let required = match kind {
        ClaimKind::Account | ClaimKind::MultiSig if has_app => Some(ClaimKind::Application),
        ClaimKind::Account | ClaimKind::MultiSig if has_node => Some(ClaimKind::Supplier),
        ClaimKind::Account | ClaimKind::MultiSig => None,
        ClaimKind::Application if has_app => None,
        ClaimKind::Application if has_node => Some(ClaimKind::Supplier),
        ClaimKind::Application => Some(ClaimKind::Account),
        ClaimKind::Supplier if has_app => Some(ClaimKind::Application),
        ClaimKind::Supplier if has_node => None,
        ClaimKind::Supplier => Some(ClaimKind::Account),
    };
    match required {
        Some(required) => Err(ClaimRejection::WrongActorType {
            address: record.legacy_address,
            attempted: kind,
            required,
        }),
        None => Ok(()),
    }
}

fn check_supplier_signer(
    record: &ClaimableAccount,
    signer: LegacyAddress,
) -> Result<ClaimSignerType, ClaimRejection> {
    if record.output_address == Some(signer) {
        return Ok(ClaimSignerType::OwnerNonCustodial);
    }
    if signer == record.legacy_address {
        return Ok(match record.output_address {
            None => ClaimSignerType::Operator,
            Some(_) => ClaimSignerType::OperatorNonCustodial,
        });
    }
    Err(ClaimRejection::UnauthorizedSigner {
        node: record.legacy_address,
        signer,
    })
}
