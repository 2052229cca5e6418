// Copyright (c) 2026 Joseph Verdicchio and EvidenceOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Schema of the legacy ledger state export consumed by the collector.

use crate::address::{LegacyAddress, LegacyPublicKey};
use crate::amount::Coin;
use crate::error::{StateBridgeError, StateBridgeResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::Path;

pub const EXTERNALLY_OWNED_ACCOUNT_TYPE: &str = "posmint/Account";
pub const MODULE_ACCOUNT_TYPE: &str = "posmint/ModuleAccount";

pub const APPLICATION_STAKE_POOL: &str = "application_stake_tokens_pool";
pub const NODE_STAKE_POOL: &str = "staked_tokens_pool";

/// Module accounts whose balances mirror stakes already counted from the
/// application and node sections.
pub fn stake_pool_module_accounts() -> BTreeSet<&'static str> {
    [APPLICATION_STAKE_POOL, NODE_STAKE_POOL].into_iter().collect()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StateExport {
    #[serde(default)]
    pub accounts: Vec<ExportAuthAccount>,
    #[serde(default)]
    pub applications: Vec<ExportApplication>,
    #[serde(default)]
    pub nodes: Vec<ExportNode>,
}

impl StateExport {
    pub fn load(path: &Path) -> StateBridgeResult<Self> {
        let bytes = std::fs::read(path)?;
        Self::from_slice(&bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> StateBridgeResult<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| StateBridgeError::MalformedExport(e.to_string()))
    }
}

/// Account entry as it appears in the export; the payload shape depends on `type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportAuthAccount {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportAccount {
    pub address: String,
    #[serde(default)]
    pub coins: Vec<Coin>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportModuleAccount {
    pub name: String,
    pub account: ExportAccount,
}

/// Typed view of an [`ExportAuthAccount`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthAccountKind {
    ExternallyOwned(ExportAccount),
    Module(ExportModuleAccount),
    Unknown(String),
}

impl ExportAuthAccount {
    pub fn externally_owned(account: ExportAccount) -> StateBridgeResult<Self> {
        Ok(Self {
            kind: EXTERNALLY_OWNED_ACCOUNT_TYPE.to_string(),
            value: serde_json::to_value(account)?,
        })
    }

    pub fn module(name: &str, account: ExportAccount) -> StateBridgeResult<Self> {
        Ok(Self {
            kind: MODULE_ACCOUNT_TYPE.to_string(),
            value: serde_json::to_value(ExportModuleAccount {
                name: name.to_string(),
                account,
            })?,
        })
    }

    pub fn classify(&self) -> StateBridgeResult<AuthAccountKind> {
        let decode_err = |e: serde_json::Error| {
            StateBridgeError::MalformedExport(format!("{} entry: {e}", self.kind))
        };
        match self.kind.as_str() {
            EXTERNALLY_OWNED_ACCOUNT_TYPE => serde_json::from_value(self.value.clone())
                .map(AuthAccountKind::ExternallyOwned)
                .map_err(decode_err),
            MODULE_ACCOUNT_TYPE => serde_json::from_value(self.value.clone())
                .map(AuthAccountKind::Module)
                .map_err(decode_err),
            other => Ok(AuthAccountKind::Unknown(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportApplication {
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
    pub staked_tokens: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unstaking_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportNode {
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
    pub staked_tokens: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unstaking_time: Option<DateTime<Utc>>,
}

/// Legacy exports encode "not unbonding" as the zero timestamp.
pub fn effective_unbonding_time(raw: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
    raw.filter(|t| t.timestamp() > 0)
}

/// Parses an export address, and when a key is given checks that it derives the address.
pub fn parse_identity(
    address: &str,
    public_key: Option<&str>,
) -> StateBridgeResult<(LegacyAddress, Option<LegacyPublicKey>)> {
    let addr: LegacyAddress = address.parse()?;
    let key = match public_key {
        Some(raw) if !raw.is_empty() => {
            let key = LegacyPublicKey::from_hex(raw)?;
            if key.address() != addr {
                return Err(StateBridgeError::PublicKeyMismatch {
                    address: addr.to_hex(),
                });
            }
            Some(key)
        }
        _ => None,
    };
    Ok((addr, key))
}
