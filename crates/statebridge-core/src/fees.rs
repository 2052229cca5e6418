// Copyright (c) 2026 Joseph Verdicchio and EvidenceOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Transaction-level claim handling and the claim fee waiver.
//!
//! Transactions made only of claims pay no fee, since a legacy key may hold
//! no destination-chain gas tokens. The waiver is revoked after processing
//! when a claim turned out to target a missing or already claimed record, or
//! carried a bad signature: the signature verification cost is then charged
//! once for the whole transaction.

use crate::claim::ClaimMessage;
use crate::ledger::{apply_claim, ClaimEvent, ClaimLedger, ClaimRejection};
use crate::params::MigrationParams;
use crate::repository::{Repository, StagedRepository};
use serde::{Deserialize, Serialize};

pub const SIG_VERIFY_GAS_DESCRIPTOR: &str = "ante verify: ed25519";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GasCharge {
    pub amount: u64,
    pub descriptor: &'static str,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GasMeter {
    consumed: u64,
    charges: Vec<GasCharge>,
}

impl GasMeter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn consume(&mut self, amount: u64, descriptor: &'static str) {
        self.consumed = self.consumed.saturating_add(amount);
        self.charges.push(GasCharge { amount, descriptor });
    }

    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    pub fn charges(&self) -> &[GasCharge] {
        &self.charges
    }
}

/// One message of a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TxMessage {
    Claim(ClaimMessage),
    /// Any non-claim message; routed by the host ledger, not here.
    Other { type_url: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimTx {
    pub messages: Vec<TxMessage>,
}

impl ClaimTx {
    pub fn single(message: ClaimMessage) -> Self {
        Self {
            messages: vec![TxMessage::Claim(message)],
        }
    }
}

/// The waiver applies to non-empty transactions made only of claims.
pub fn is_fee_waivable(tx: &ClaimTx, params: &MigrationParams) -> bool {
    params.waive_claim_gas_fees
        && !tx.messages.is_empty()
        && tx
            .messages
            .iter()
            .all(|m| matches!(m, TxMessage::Claim(_)))
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("claim message {index} rejected: {rejection}")]
pub struct TxRejection {
    pub index: usize,
    pub rejection: ClaimRejection,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOutcome {
    pub fee_waived: bool,
    /// True when the waived signature gas was charged after the fact.
    pub waiver_revoked: bool,
    pub result: Result<Vec<ClaimEvent>, TxRejection>,
}

/// Processes every claim of `tx` against a staged view of the ledger. Either
/// all claims commit or none do. Afterwards, applies the fee-waiver
/// revocation to `gas`.
pub fn process_claim_tx<R: Repository>(
    ledger: &mut ClaimLedger<R>,
    tx: &ClaimTx,
    height: u64,
    gas: &mut GasMeter,
) -> TxOutcome {
    let params = ledger.params;
    let fee_waived = is_fee_waivable(tx, &params);
    let mut spam = false;

    let result = {
        let mut staged = StagedRepository::new(&mut ledger.repo);
        let mut events = Vec::new();
        let mut failure = None;
        for (index, message) in tx.messages.iter().enumerate() {
            let TxMessage::Claim(claim) = message else {
                tracing::debug!(index, "skipping non-claim message");
                continue;
            };
            match apply_claim(&mut staged, &params, claim, height) {
                Ok(event) => events.push(event),
                Err(rejection) => {
                    spam = rejection.revokes_fee_waiver();
                    failure = Some(TxRejection { index, rejection });
                    break;
                }
            }
        }
        match failure {
            Some(rejection) => {
                tracing::warn!(%rejection, "claim transaction rejected; nothing committed");
                Err(rejection)
            }
            None => match staged.commit() {
                Ok(()) => Ok(events),
                Err(err) => Err(TxRejection {
                    index: tx.messages.len(),
                    rejection: ClaimRejection::Storage(err.to_string()),
                }),
            },
        }
    };

    if let Ok(events) = &result {
        ledger.events.extend(events.iter().cloned());
    }

    let waiver_revoked = fee_waived && spam;
    if waiver_revoked {
        gas.consume(params.sig_verify_cost, SIG_VERIFY_GAS_DESCRIPTOR);
        tracing::info!(
            gas = params.sig_verify_cost,
            "claim fee waiver revoked for invalid or replayed claim"
        );
    }

    TxOutcome {
        fee_waived,
        waiver_revoked,
        result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::{DestAddress, LegacyPublicKey};
    use crate::amount::Amount;
    use crate::claim::{sign, ClaimAccount};
    use crate::repository::{JsonFileRepository, MemoryRepository};
    use crate::state::ClaimableAccount;
    use ed25519_dalek::SigningKey;

    fn key(seed: u8) -> SigningKey {
        SigningKey::from_bytes(&[seed; 32])
    }

    fn claim(seed: u8) -> ClaimMessage {
        let public = LegacyPublicKey::from(key(seed).verifying_key());
        let dest = DestAddress::parse("dest1qqqqqqqq").expect("dest");
        sign(ClaimAccount::new(dest, public).into(), &key(seed)).expect("sign")
    }

    fn ledger(seeds: &[u8], params: MigrationParams) -> ClaimLedger<MemoryRepository> {
        let mut repo = MemoryRepository::new();
        for seed in seeds {
            let public = LegacyPublicKey::from(key(*seed).verifying_key());
            let mut r = ClaimableAccount::new(public.address());
            r.unstaked_balance = Amount::from(10);
            repo.set(r).expect("seed");
        }
        ClaimLedger::new(repo, params).expect("ledger")
    }

    #[test]
    fn waiver_requires_only_claims() {
        let params = MigrationParams::default();
        assert!(!is_fee_waivable(&ClaimTx::default(), &params));
        assert!(is_fee_waivable(&ClaimTx::single(claim(1)), &params));
        let mixed = ClaimTx {
            messages: vec![
                TxMessage::Claim(claim(1)),
                TxMessage::Other {
                    type_url: "/bank.MsgSend".into(),
                },
            ],
        };
        assert!(!is_fee_waivable(&mixed, &params));
        let off = MigrationParams {
            waive_claim_gas_fees: false,
            ..params
        };
        assert!(!is_fee_waivable(&ClaimTx::single(claim(1)), &off));
    }

    #[test]
    fn valid_claim_costs_nothing() {
        let mut ledger = ledger(&[1], MigrationParams::default());
        let mut gas = GasMeter::new();
        let outcome = process_claim_tx(&mut ledger, &ClaimTx::single(claim(1)), 5, &mut gas);
        assert!(outcome.fee_waived);
        assert!(!outcome.waiver_revoked);
        assert_eq!(outcome.result.expect("ok").len(), 1);
        assert_eq!(gas.consumed(), 0);
    }

    #[test]
    fn unknown_address_is_charged_once() {
        let mut ledger = ledger(&[], MigrationParams::default());
        let mut gas = GasMeter::new();
        let outcome = process_claim_tx(&mut ledger, &ClaimTx::single(claim(9)), 5, &mut gas);
        assert!(outcome.waiver_revoked);
        assert_eq!(gas.consumed(), MigrationParams::default().sig_verify_cost);
        assert_eq!(gas.charges().len(), 1);
    }

    #[test]
    fn rejection_rolls_back_earlier_claims_in_the_tx() {
        let mut ledger = ledger(&[1], MigrationParams::default());
        let tx = ClaimTx {
            messages: vec![TxMessage::Claim(claim(1)), TxMessage::Claim(claim(1))],
        };
        let mut gas = GasMeter::new();
        let outcome = process_claim_tx(&mut ledger, &tx, 5, &mut gas);
        let err = outcome.result.expect_err("duplicate in tx");
        assert_eq!(err.index, 1);
        assert!(matches!(err.rejection, ClaimRejection::AlreadyClaimed { .. }));
        assert_eq!(gas.consumed(), 1_000);
        let public = LegacyPublicKey::from(key(1).verifying_key());
        let record = ledger.get(&public.address()).expect("get").expect("record");
        assert!(!record.is_claimed());
        assert!(ledger.events().is_empty());
    }

    #[test]
    fn failed_commit_claims_nothing() {
        let tmp = tempfile::TempDir::new().expect("tmp");
        let mut repo = JsonFileRepository::open(tmp.path()).expect("open");
        let records = [1u8, 2]
            .iter()
            .map(|seed| {
                let public = LegacyPublicKey::from(key(*seed).verifying_key());
                let mut r = ClaimableAccount::new(public.address());
                r.unstaked_balance = Amount::from(10);
                r
            })
            .collect();
        repo.set_all(records).expect("seed");
        std::fs::create_dir(repo.path().with_extension("tmp")).expect("block temp file creation");
        let mut ledger = ClaimLedger::new(repo, MigrationParams::default()).expect("ledger");

        let tx = ClaimTx {
            messages: vec![TxMessage::Claim(claim(1)), TxMessage::Claim(claim(2))],
        };
        let mut gas = GasMeter::new();
        let outcome = process_claim_tx(&mut ledger, &tx, 5, &mut gas);
        let err = outcome.result.expect_err("storage failure");
        assert!(matches!(err.rejection, ClaimRejection::Storage(_)));
        assert!(!outcome.waiver_revoked);
        assert!(ledger.events().is_empty());
        for seed in [1u8, 2] {
            let public = LegacyPublicKey::from(key(seed).verifying_key());
            let record = ledger.get(&public.address()).expect("get").expect("record");
            assert!(!record.is_claimed());
        }

        let reopened = JsonFileRepository::open(tmp.path()).expect("reopen");
        assert!(reopened
            .iterate_all()
            .expect("iterate")
            .iter()
            .all(|r| !r.is_claimed()));
    }

    #[test]
    fn no_charge_without_waiver() {
        let params = MigrationParams {
            waive_claim_gas_fees: false,
            ..MigrationParams::default()
        };
        let mut ledger = ledger(&[], params);
        let mut gas = GasMeter::new();
        let outcome = process_claim_tx(&mut ledger, &ClaimTx::single(claim(2)), 5, &mut gas);
        assert!(outcome.result.is_err());
        assert!(!outcome.waiver_revoked);
        assert_eq!(gas.consumed(), 0);
    }
}
