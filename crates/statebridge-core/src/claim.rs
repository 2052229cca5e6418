// Copyright (c) 2026 Joseph Verdicchio and EvidenceOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Claim messages, their canonical signing bytes, and the signers.
//!
//! The signing bytes of a claim are a per-variant domain tag followed by the
//! canonical JSON of the message with its signature emptied. Every field other
//! than the signature is therefore covered.

use crate::address::{hex_bytes, DestAddress, LegacyAddress, LegacyPublicKey, SIGNATURE_LEN};
use crate::amount::Amount;
use crate::error::{StateBridgeError, StateBridgeResult};
use crate::state::canonical_json;
use ed25519_dalek::{Signer, SigningKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;

const DOMAIN_CLAIM_ACCOUNT_V1: &[u8] = b"statebridge:claim-account:v1";
const DOMAIN_CLAIM_APPLICATION_V1: &[u8] = b"statebridge:claim-application:v1";
const DOMAIN_CLAIM_SUPPLIER_V1: &[u8] = b"statebridge:claim-supplier:v1";
const DOMAIN_CLAIM_MULTISIG_V1: &[u8] = b"statebridge:claim-multisig:v1";
const DOMAIN_MULTISIG_ADDRESS_V1: &[u8] = b"statebridge:multisig-address:v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimKind {
    Account,
    Application,
    Supplier,
    MultiSig,
}

impl ClaimKind {
    /// CLI subcommand that builds this claim variant.
    pub fn command(self) -> &'static str {
        match self {
            ClaimKind::Account => "claim-account",
            ClaimKind::Application => "claim-application",
            ClaimKind::Supplier => "claim-supplier",
            ClaimKind::MultiSig => "claim-multisig",
        }
    }

    fn domain(self) -> &'static [u8] {
        match self {
            ClaimKind::Account => DOMAIN_CLAIM_ACCOUNT_V1,
            ClaimKind::Application => DOMAIN_CLAIM_APPLICATION_V1,
            ClaimKind::Supplier => DOMAIN_CLAIM_SUPPLIER_V1,
            ClaimKind::MultiSig => DOMAIN_CLAIM_MULTISIG_V1,
        }
    }
}

impl fmt::Display for ClaimKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ClaimKind::Account => "account",
            ClaimKind::Application => "application",
            ClaimKind::Supplier => "supplier",
            ClaimKind::MultiSig => "multisig account",
        };
        f.write_str(name)
    }
}

/// Accessors shared by every claim variant.
pub trait Claim {
    fn kind(&self) -> ClaimKind;
    fn dest_address(&self) -> &DestAddress;
    fn src_address(&self) -> LegacyAddress;
    fn signature(&self) -> &[u8];
    fn signing_bytes(&self) -> StateBridgeResult<Vec<u8>>;
}

/// Redeems an unstaked legacy account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimAccount {
    pub dest_address: DestAddress,
    pub legacy_src_address: LegacyAddress,
    pub legacy_public_key: LegacyPublicKey,
    #[serde(with = "hex_bytes", default)]
    pub legacy_signature: Vec<u8>,
}

impl ClaimAccount {
    pub fn new(dest_address: DestAddress, legacy_public_key: LegacyPublicKey) -> Self {
        Self {
            dest_address,
            legacy_src_address: legacy_public_key.address(),
            legacy_public_key,
            legacy_signature: Vec::new(),
        }
    }
}

/// Redeems an account staked as an application and restakes it on the
/// destination ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimApplication {
    pub dest_address: DestAddress,
    pub legacy_src_address: LegacyAddress,
    pub legacy_public_key: LegacyPublicKey,
    pub service_id: String,
    /// Overrides the recorded application stake when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stake: Option<Amount>,
    #[serde(with = "hex_bytes", default)]
    pub legacy_signature: Vec<u8>,
}

impl ClaimApplication {
    pub fn new(
        dest_address: DestAddress,
        legacy_public_key: LegacyPublicKey,
        service_id: impl Into<String>,
        stake: Option<Amount>,
    ) -> Self {
        Self {
            dest_address,
            legacy_src_address: legacy_public_key.address(),
            legacy_public_key,
            service_id: service_id.into(),
            stake,
            legacy_signature: Vec::new(),
        }
    }
}

/// Redeems a node-staked account. The signer is either the node key itself
/// or the key behind the node's recorded output address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimSupplier {
    pub owner_dest_address: DestAddress,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator_dest_address: Option<DestAddress>,
    pub legacy_src_address: LegacyAddress,
    pub legacy_signer_public_key: LegacyPublicKey,
    #[serde(default)]
    pub services: Vec<String>,
    #[serde(with = "hex_bytes", default)]
    pub legacy_signature: Vec<u8>,
}

impl ClaimSupplier {
    pub fn new(
        owner_dest_address: DestAddress,
        operator_dest_address: Option<DestAddress>,
        legacy_node_address: LegacyAddress,
        legacy_signer_public_key: LegacyPublicKey,
        services: Vec<String>,
    ) -> Self {
        Self {
            owner_dest_address,
            operator_dest_address,
            legacy_src_address: legacy_node_address,
            legacy_signer_public_key,
            services,
            legacy_signature: Vec::new(),
        }
    }

    /// Destination that receives the payout; the owner unless an operator is named.
    pub fn operator_dest(&self) -> &DestAddress {
        self.operator_dest_address
            .as_ref()
            .unwrap_or(&self.owner_dest_address)
    }

    pub fn signer_address(&self) -> LegacyAddress {
        self.legacy_signer_public_key.address()
    }
}

/// Redeems an account controlled by several keys. All keys sign; signatures
/// are concatenated in the order of `legacy_public_keys`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimMultiSig {
    pub dest_address: DestAddress,
    pub legacy_src_address: LegacyAddress,
    pub legacy_public_keys: Vec<LegacyPublicKey>,
    #[serde(with = "hex_bytes", default)]
    pub legacy_signature: Vec<u8>,
}

impl ClaimMultiSig {
    pub fn new(
        dest_address: DestAddress,
        legacy_public_keys: Vec<LegacyPublicKey>,
    ) -> StateBridgeResult<Self> {
        let legacy_src_address = multisig_address(&legacy_public_keys)?;
        Ok(Self {
            dest_address,
            legacy_src_address,
            legacy_public_keys,
            legacy_signature: Vec::new(),
        })
    }
}

/// Identity of a multisig account: the ordered key list, hashed under its own
/// domain so it never collides with a single key's address.
pub fn multisig_address(keys: &[LegacyPublicKey]) -> StateBridgeResult<LegacyAddress> {
    if keys.is_empty() {
        return Err(StateBridgeError::InvalidArgument(
            "multisig key list is empty".into(),
        ));
    }
    let count = u32::try_from(keys.len())
        .map_err(|_| StateBridgeError::InvalidArgument("too many multisig keys".into()))?;
    let mut hasher = Sha256::new();
    hasher.update(DOMAIN_MULTISIG_ADDRESS_V1);
    hasher.update(count.to_be_bytes());
    for key in keys {
        hasher.update(key.as_bytes());
    }
    LegacyAddress::from_digest(&hasher.finalize())
}

fn signing_payload<T: Serialize>(kind: ClaimKind, unsigned: &T) -> StateBridgeResult<Vec<u8>> {
    let body = canonical_json(unsigned)?;
    let domain = kind.domain();
    let mut out = Vec::with_capacity(domain.len() + body.len());
    out.extend_from_slice(domain);
    out.extend_from_slice(&body);
    Ok(out)
}

macro_rules! impl_claim {
    ($ty:ty, $kind:expr, $dest:ident) => {
        impl Claim for $ty {
            fn kind(&self) -> ClaimKind {
                $kind
            }

            fn dest_address(&self) -> &DestAddress {
                &self.$dest
            }

            fn src_address(&self) -> LegacyAddress {
                self.legacy_src_address
            }

            fn signature(&self) -> &[u8] {
                &self.legacy_signature
            }

            fn signing_bytes(&self) -> StateBridgeResult<Vec<u8>> {
                let mut unsigned = self.clone();
                unsigned.legacy_signature.clear();
                signing_payload($kind, &unsigned)
            }
        }
    };
}

impl_claim!(ClaimAccount, ClaimKind::Account, dest_address);
impl_claim!(ClaimApplication, ClaimKind::Application, dest_address);
impl_claim!(ClaimSupplier, ClaimKind::Supplier, owner_dest_address);
impl_claim!(ClaimMultiSig, ClaimKind::MultiSig, dest_address);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClaimMessage {
    Account(ClaimAccount),
    Application(ClaimApplication),
    Supplier(ClaimSupplier),
    #[serde(rename = "multisig")]
    MultiSig(ClaimMultiSig),
}

impl ClaimMessage {
    fn as_claim(&self) -> &dyn Claim {
        match self {
            ClaimMessage::Account(m) => m,
            ClaimMessage::Application(m) => m,
            ClaimMessage::Supplier(m) => m,
            ClaimMessage::MultiSig(m) => m,
        }
    }

    pub fn load(path: &Path) -> StateBridgeResult<Self> {
        let bytes = std::fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub fn to_json_pretty(&self) -> StateBridgeResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl Claim for ClaimMessage {
    fn kind(&self) -> ClaimKind {
        self.as_claim().kind()
    }

    fn dest_address(&self) -> &DestAddress {
        self.as_claim().dest_address()
    }

    fn src_address(&self) -> LegacyAddress {
        self.as_claim().src_address()
    }

    fn signature(&self) -> &[u8] {
        self.as_claim().signature()
    }

    fn signing_bytes(&self) -> StateBridgeResult<Vec<u8>> {
        self.as_claim().signing_bytes()
    }
}

impl From<ClaimAccount> for ClaimMessage {
    fn from(m: ClaimAccount) -> Self {
        ClaimMessage::Account(m)
    }
}

impl From<ClaimApplication> for ClaimMessage {
    fn from(m: ClaimApplication) -> Self {
        ClaimMessage::Application(m)
    }
}

impl From<ClaimSupplier> for ClaimMessage {
    fn from(m: ClaimSupplier) -> Self {
        ClaimMessage::Supplier(m)
    }
}

impl From<ClaimMultiSig> for ClaimMessage {
    fn from(m: ClaimMultiSig) -> Self {
        ClaimMessage::MultiSig(m)
    }
}

/// Signs a single-key claim, replacing any existing signature.
pub fn sign(message: ClaimMessage, key: &SigningKey) -> StateBridgeResult<ClaimMessage> {
    let bytes = message.signing_bytes()?;
    let signature = key.sign(&bytes).to_bytes().to_vec();
    match message {
        ClaimMessage::Account(mut m) => {
            m.legacy_signature = signature;
            Ok(m.into())
        }
        ClaimMessage::Application(mut m) => {
            m.legacy_signature = signature;
            Ok(m.into())
        }
        ClaimMessage::Supplier(mut m) => {
            m.legacy_signature = signature;
            Ok(m.into())
        }
        ClaimMessage::MultiSig(_) => Err(StateBridgeError::InvalidArgument(
            "multisig claims are signed with sign_multi".into(),
        )),
    }
}

/// Signs a multisig claim with every key, in the order of the carried key list.
pub fn sign_multi(
    mut message: ClaimMultiSig,
    keys: &[SigningKey],
) -> StateBridgeResult<ClaimMultiSig> {
    if keys.len() != message.legacy_public_keys.len() {
        return Err(StateBridgeError::InvalidArgument(format!(
            "{} signing keys for {} public keys",
            keys.len(),
            message.legacy_public_keys.len()
        )));
    }
    for (idx, (key, public)) in keys.iter().zip(&message.legacy_public_keys).enumerate() {
        if LegacyPublicKey::from(key.verifying_key()) != *public {
            return Err(StateBridgeError::InvalidArgument(format!(
                "signing key {idx} does not match public key {public}"
            )));
        }
    }
    let bytes = message.signing_bytes()?;
    let mut signature = Vec::with_capacity(SIGNATURE_LEN * keys.len());
    for key in keys {
        signature.extend_from_slice(&key.sign(&bytes).to_bytes());
    }
    message.legacy_signature = signature;
    Ok(message)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(seed: u8) -> SigningKey {
        SigningKey::from_bytes(&[seed; 32])
    }

    fn public(seed: u8) -> LegacyPublicKey {
        LegacyPublicKey::from(key(seed).verifying_key())
    }

    fn dest() -> DestAddress {
        DestAddress::parse("dest1qpzry9x8gf2tvdw0s3jn54khce6mua7l").expect("dest")
    }

    #[test]
    fn signing_bytes_exclude_signature() {
        let unsigned: ClaimMessage = ClaimAccount::new(dest(), public(1)).into();
        let signed = sign(unsigned.clone(), &key(1)).expect("sign");
        assert_eq!(signed.signature().len(), SIGNATURE_LEN);
        assert_eq!(
            unsigned.signing_bytes().expect("bytes"),
            signed.signing_bytes().expect("bytes")
        );
    }

    #[test]
    fn signing_bytes_are_domain_separated() {
        let account: ClaimMessage = ClaimAccount::new(dest(), public(1)).into();
        let app: ClaimMessage = ClaimApplication::new(dest(), public(1), "svc", None).into();
        let a = account.signing_bytes().expect("bytes");
        let b = app.signing_bytes().expect("bytes");
        assert!(a.starts_with(DOMAIN_CLAIM_ACCOUNT_V1));
        assert!(b.starts_with(DOMAIN_CLAIM_APPLICATION_V1));
    }

    #[test]
    fn multisig_address_depends_on_key_order() {
        let forward = multisig_address(&[public(1), public(2)]).expect("addr");
        let reversed = multisig_address(&[public(2), public(1)]).expect("addr");
        assert_ne!(forward, reversed);
        assert_ne!(forward, public(1).address());
        assert!(multisig_address(&[]).is_err());
    }

    #[test]
    fn sign_multi_concatenates_in_key_order() {
        let msg = ClaimMultiSig::new(dest(), vec![public(1), public(2), public(3)]).expect("msg");
        let signed = sign_multi(msg, &[key(1), key(2), key(3)]).expect("sign");
        assert_eq!(signed.legacy_signature.len(), 3 * SIGNATURE_LEN);
        let bytes = signed.signing_bytes().expect("bytes");
        assert_eq!(
            &signed.legacy_signature[SIGNATURE_LEN..2 * SIGNATURE_LEN],
            &key(2).sign(&bytes).to_bytes()[..]
        );
    }

    #[test]
    fn sign_multi_rejects_misordered_keys() {
        let msg = ClaimMultiSig::new(dest(), vec![public(1), public(2)]).expect("msg");
        assert!(sign_multi(msg.clone(), &[key(2), key(1)]).is_err());
        assert!(sign_multi(msg, &[key(1)]).is_err());
    }

    #[test]
    fn single_key_signer_refuses_multisig() {
        let msg: ClaimMessage = ClaimMultiSig::new(dest(), vec![public(1)])
            .expect("msg")
            .into();
        assert!(sign(msg, &key(1)).is_err());
    }

    #[test]
    fn claim_json_is_tagged() {
        let msg: ClaimMessage = ClaimMultiSig::new(dest(), vec![public(1)])
            .expect("msg")
            .into();
        let json = serde_json::to_value(&msg).expect("json");
        assert_eq!(json["type"], "multisig");
        let back: ClaimMessage = serde_json::from_value(json).expect("back");
        assert_eq!(back, msg);
    }

    #[test]
    fn supplier_payout_defaults_to_owner() {
        let owner = dest();
        let msg = ClaimSupplier::new(owner.clone(), None, public(4).address(), public(4), vec![]);
        assert_eq!(msg.operator_dest(), &owner);
        assert_eq!(msg.dest_address(), &owner);
    }
}
