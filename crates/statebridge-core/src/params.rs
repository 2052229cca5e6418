// Copyright (c) 2026 Joseph Verdicchio and EvidenceOS Contributors
// SPDX-License-Identifier: Apache-2.0

use crate::error::{StateBridgeError, StateBridgeResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_SIG_VERIFY_COST: u64 = 1_000;
pub const DEFAULT_NUM_BLOCKS_PER_SESSION: u64 = 10;

/// Ledger-side parameters of the claim handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MigrationParams {
    /// Grant the fee waiver to transactions made only of claims.
    pub waive_claim_gas_fees: bool,
    /// Gas charged after the fact when a waived claim was spam.
    pub sig_verify_cost: u64,
    pub num_blocks_per_session: u64,
}

impl Default for MigrationParams {
    fn default() -> Self {
        Self {
            waive_claim_gas_fees: true,
            sig_verify_cost: DEFAULT_SIG_VERIFY_COST,
            num_blocks_per_session: DEFAULT_NUM_BLOCKS_PER_SESSION,
        }
    }
}

impl MigrationParams {
    /// Defaults overridden by `STATEBRIDGE_*` environment variables.
    pub fn from_env() -> StateBridgeResult<Self> {
        Self::default().with_env_overrides()
    }

    pub fn load(path: &Path) -> StateBridgeResult<Self> {
        let bytes = std::fs::read(path)?;
        let params: Self = serde_json::from_slice(&bytes)?;
        params.validate()?;
        Ok(params)
    }

    pub fn with_env_overrides(self) -> StateBridgeResult<Self> {
        let params = Self {
            waive_claim_gas_fees: read_env_bool(
                "STATEBRIDGE_WAIVE_CLAIM_GAS_FEES",
                self.waive_claim_gas_fees,
            ),
            sig_verify_cost: read_env_u64("STATEBRIDGE_SIG_VERIFY_COST", self.sig_verify_cost),
            num_blocks_per_session: read_env_u64(
                "STATEBRIDGE_NUM_BLOCKS_PER_SESSION",
                self.num_blocks_per_session,
            ),
        };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> StateBridgeResult<()> {
        if self.num_blocks_per_session == 0 {
            return Err(StateBridgeError::InvalidArgument(
                "num_blocks_per_session must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Last block of the session containing `height`; stake created by a
    /// claim becomes active after it.
    pub fn session_end_height(&self, height: u64) -> u64 {
        let n = self.num_blocks_per_session.max(1);
        if height == 0 {
            return 0;
        }
        let start = height - (height - 1) % n;
        start.saturating_add(n - 1)
    }
}

fn read_env_u64(key: &str, default_value: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.parse::<u64>().ok())
        .unwrap_or(default_value)
}

fn read_env_bool(key: &str, default_value: bool) -> bool {
    std::env::var(key)
        .ok()
        .and_then(|raw| match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        })
        .unwrap_or(default_value)
}
