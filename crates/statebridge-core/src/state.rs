// Copyright (c) 2026 Joseph Verdicchio and EvidenceOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Consolidated claimable-account records and the state integrity hash.

use crate::address::{DestAddress, LegacyAddress, LegacyPublicKey};
use crate::amount::Amount;
use crate::error::{StateBridgeError, StateBridgeResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::path::Path;

pub type Hash32 = [u8; 32];

const DOMAIN_ACCOUNT_STATE_V1: &[u8] = b"statebridge:account-state:v1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimableAccount {
    pub legacy_address: LegacyAddress,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_name: Option<String>,
    #[serde(default)]
    pub legacy_public_key: Option<LegacyPublicKey>,
    pub unstaked_balance: Amount,
    pub node_stake: Amount,
    pub app_stake: Amount,
    #[serde(default)]
    pub output_address: Option<LegacyAddress>,
    #[serde(default)]
    pub unbonding_end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub dest_address: DestAddress,
    #[serde(default)]
    pub claimed_at_height: u64,
}

impl ClaimableAccount {
    pub fn new(legacy_address: LegacyAddress) -> Self {
        Self {
            legacy_address,
            module_name: None,
            legacy_public_key: None,
            unstaked_balance: Amount::zero(),
            node_stake: Amount::zero(),
            app_stake: Amount::zero(),
            output_address: None,
            unbonding_end_time: None,
            dest_address: DestAddress::default(),
            claimed_at_height: 0,
        }
    }

    pub fn is_claimed(&self) -> bool {
        !self.dest_address.is_empty() && self.claimed_at_height > 0
    }

    pub fn total_tokens(&self) -> Amount {
        &(&self.unstaked_balance + &self.node_stake) + &self.app_stake
    }

    /// Sets both claim fields together. Refuses a second claim and any
    /// half-populated claim.
    pub fn mark_claimed(&mut self, dest: DestAddress, height: u64) -> StateBridgeResult<()> {
        if self.is_claimed() {
            return Err(StateBridgeError::InvalidArgument(format!(
                "{} already claimed at height {}",
                self.legacy_address, self.claimed_at_height
            )));
        }
        if dest.is_empty() || height == 0 {
            return Err(StateBridgeError::InvalidArgument(
                "claim requires a destination and a positive height".into(),
            ));
        }
        self.dest_address = dest;
        self.claimed_at_height = height;
        Ok(())
    }
}

/// Ordered account table produced by the collector.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConsolidatedState {
    pub accounts: Vec<ClaimableAccount>,
}

impl ConsolidatedState {
    /// SHA-256 over the domain tag and the canonical JSON of the account list.
    /// Sensitive to account order.
    pub fn integrity_hash(&self) -> StateBridgeResult<Hash32> {
        let payload = canonical_json(&self.accounts)?;
        let mut hasher = Sha256::new();
        hasher.update(DOMAIN_ACCOUNT_STATE_V1);
        hasher.update(&payload);
        Ok(hasher.finalize().into())
    }

    pub fn integrity_hash_hex(&self) -> StateBridgeResult<String> {
        Ok(hex::encode(self.integrity_hash()?))
    }

    pub fn total_unstaked(&self) -> Amount {
        self.accounts.iter().map(|a| &a.unstaked_balance).sum()
    }

    pub fn total_node_stake(&self) -> Amount {
        self.accounts.iter().map(|a| &a.node_stake).sum()
    }

    pub fn total_app_stake(&self) -> Amount {
        self.accounts.iter().map(|a| &a.app_stake).sum()
    }

    pub fn grand_total(&self) -> Amount {
        &(&self.total_unstaked() + &self.total_node_stake()) + &self.total_app_stake()
    }
}

/// File handed to the ledger import: the table plus its published hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportBundle {
    pub account_state: ConsolidatedState,
    pub state_hash_hex: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashCheck {
    pub expected_hex: String,
    pub computed_hex: String,
}

impl HashCheck {
    pub fn matches(&self) -> bool {
        self.expected_hex.eq_ignore_ascii_case(&self.computed_hex)
    }
}

impl ImportBundle {
    pub fn new(account_state: ConsolidatedState) -> StateBridgeResult<Self> {
        let state_hash_hex = account_state.integrity_hash_hex()?;
        Ok(Self {
            account_state,
            state_hash_hex,
        })
    }

    pub fn check_hash(&self) -> StateBridgeResult<HashCheck> {
        Ok(HashCheck {
            expected_hex: self.state_hash_hex.clone(),
            computed_hex: self.account_state.integrity_hash_hex()?,
        })
    }

    pub fn load(path: &Path) -> StateBridgeResult<Self> {
        let bytes = std::fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub fn write(&self, path: &Path) -> StateBridgeResult<()> {
        let bytes = serde_json::to_vec_pretty(self)?;
        std::fs::write(path, bytes)?;
        Ok(())
    }
}

fn sort_json(v: Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let mut sorted = Map::new();
            for (k, val) in entries {
                sorted.insert(k, sort_json(val));
            }
            Value::Object(sorted)
        }
        Value::Array(arr) => Value::Array(arr.into_iter().map(sort_json).collect()),
        other => other,
    }
}

/// Compact JSON with object keys sorted at every depth.
pub fn canonical_json(v: &impl Serialize) -> serde_json::Result<Vec<u8>> {
    let value = serde_json::to_value(v)?;
    serde_json::to_vec(&sort_json(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn addr(byte: u8) -> LegacyAddress {
        LegacyAddress::from_bytes([byte; 20])
    }

    fn account(byte: u8, balance: u64) -> ClaimableAccount {
        let mut a = ClaimableAccount::new(addr(byte));
        a.unstaked_balance = Amount::from(balance);
        a
    }

    #[test]
    fn claimed_requires_both_fields() {
        let mut a = account(1, 10);
        assert!(!a.is_claimed());
        assert!(a.mark_claimed(DestAddress::default(), 5).is_err());
        let dest = DestAddress::parse("dest1qqqqqqqq").expect("dest");
        assert!(a.mark_claimed(dest.clone(), 0).is_err());
        assert!(!a.is_claimed());
        a.mark_claimed(dest.clone(), 7).expect("claim");
        assert!(a.is_claimed());
        assert!(a.mark_claimed(dest, 8).is_err());
        assert_eq!(a.claimed_at_height, 7);
    }

    #[test]
    fn hash_is_order_sensitive() {
        let forward = ConsolidatedState {
            accounts: vec![account(1, 10), account(2, 20)],
        };
        let reversed = ConsolidatedState {
            accounts: vec![account(2, 20), account(1, 10)],
        };
        assert_ne!(
            forward.integrity_hash().expect("hash"),
            reversed.integrity_hash().expect("hash")
        );
    }

    #[test]
    fn hash_changes_with_any_amount() {
        let base = ConsolidatedState {
            accounts: vec![account(1, 10)],
        };
        let mut bumped = base.clone();
        bumped.accounts[0].app_stake = Amount::from(1);
        assert_ne!(
            base.integrity_hash().expect("hash"),
            bumped.integrity_hash().expect("hash")
        );
    }

    #[test]
    fn bundle_detects_tampering() {
        let mut bundle = ImportBundle::new(ConsolidatedState {
            accounts: vec![account(1, 10)],
        })
        .expect("bundle");
        assert!(bundle.check_hash().expect("check").matches());
        bundle.account_state.accounts[0].unstaked_balance = Amount::from(11);
        assert!(!bundle.check_hash().expect("check").matches());
    }

    #[test]
    fn canonical_json_ignores_key_order() {
        let a = json!({"b": 1, "a": {"d": 2, "c": 3}});
        let b = json!({"a": {"c": 3, "d": 2}, "b": 1});
        assert_eq!(
            canonical_json(&a).expect("a"),
            canonical_json(&b).expect("b")
        );
        assert_eq!(
            canonical_json(&a).expect("a"),
            br#"{"a":{"c":3,"d":2},"b":1}"#.to_vec()
        );
    }

    #[test]
    fn unclaimed_record_roundtrips_with_empty_destination() {
        let a = account(3, 1);
        let json = serde_json::to_value(&a).expect("to value");
        assert_eq!(json["dest_address"], json!(""));
        let back: ClaimableAccount = serde_json::from_value(json).expect("from value");
        assert_eq!(back, a);
    }
}
