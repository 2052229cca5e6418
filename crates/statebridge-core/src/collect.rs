// Copyright (c) 2026 Joseph Verdicchio and EvidenceOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! State consolidation: folds a legacy export into one claimable record per
//! address.
//!
//! Three passes run per export, in a fixed order: externally owned account
//! balances, then application stakes, then node stakes. Every contribution
//! is added to the record for its address, so the output conserves the sum of
//! all inputs. The accumulator is an explicit [`Workspace`] value; output is
//! ordered by address, which makes the result (and its integrity hash) a pure
//! function of the export bytes.

use crate::address::{LegacyAddress, LegacyPublicKey};
use crate::amount::{Amount, LEGACY_DENOM};
use crate::error::{StateBridgeError, StateBridgeResult};
use crate::export::{
    effective_unbonding_time, parse_identity, stake_pool_module_accounts, AuthAccountKind,
    ExportAccount, StateExport,
};
use crate::state::{ClaimableAccount, ConsolidatedState};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, Default)]
pub struct CollectorOptions {
    /// Emit a progress line every N records of a section; 0 disables.
    pub num_accounts_per_debug_log: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Section {
    Accounts,
    Applications,
    Nodes,
}

impl Section {
    fn label(self) -> &'static str {
        match self {
            Section::Accounts => "account",
            Section::Applications => "application",
            Section::Nodes => "node",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CollectionStats {
    pub num_accounts: u64,
    pub num_applications: u64,
    pub num_nodes: u64,
    pub num_module_accounts: u64,
    pub skipped_stake_pool_accounts: u64,
    pub skipped_unknown_accounts: u64,
    pub accounts_without_coins: u64,
    pub cross_section_merges: u64,
    pub same_section_duplicates: u64,
    pub total_balance: Amount,
    pub total_app_stake: Amount,
    pub total_node_stake: Amount,
}

impl CollectionStats {
    pub fn grand_total(&self) -> Amount {
        &(&self.total_balance + &self.total_app_stake) + &self.total_node_stake
    }
}

/// Running accumulator threaded through every pass.
#[derive(Debug, Default)]
pub struct Workspace {
    records: BTreeMap<LegacyAddress, ClaimableAccount>,
    stats: CollectionStats,
    options: CollectorOptions,
}

impl Workspace {
    pub fn new(options: CollectorOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// Folds one export into the workspace.
    pub fn include(&mut self, export: &StateExport) -> StateBridgeResult<()> {
        let mut seen = SectionTracker::default();

        tracing::info!(count = export.accounts.len(), "collecting account balances");
        self.collect_account_balances(export, &mut seen)?;

        tracing::info!(count = export.applications.len(), "collecting application stakes");
        self.collect_application_stakes(export, &mut seen)?;

        tracing::info!(count = export.nodes.len(), "collecting node stakes");
        self.collect_node_stakes(export, &mut seen)
    }

    pub fn finish(self) -> (ConsolidatedState, CollectionStats) {
        let accounts = self.records.into_values().collect();
        (ConsolidatedState { accounts }, self.stats)
    }

    fn collect_account_balances(
        &mut self,
        export: &StateExport,
        seen: &mut SectionTracker,
    ) -> StateBridgeResult<()> {
        let stake_pools = stake_pool_module_accounts();
        for (idx, entry) in export.accounts.iter().enumerate() {
            let (account, module_name) = match entry.classify()? {
                AuthAccountKind::ExternallyOwned(account) => (account, None),
                AuthAccountKind::Module(module) => {
                    if stake_pools.contains(module.name.as_str()) {
                        self.stats.skipped_stake_pool_accounts += 1;
                        tracing::debug!(name = %module.name, "excluding stake pool module account");
                        continue;
                    }
                    (module.account, Some(module.name))
                }
                AuthAccountKind::Unknown(kind) => {
                    self.stats.skipped_unknown_accounts += 1;
                    tracing::warn!(kind = %kind, "ignoring unknown account type");
                    continue;
                }
            };

            let (addr, key) = parse_identity(&account.address, account.public_key.as_deref())?;
            self.touch(addr, key, Section::Accounts, seen);
            if let Some(name) = module_name {
                self.stats.num_module_accounts += 1;
                if let Some(record) = self.records.get_mut(&addr) {
                    record.module_name = Some(name);
                }
            }

            let Some(balance) = single_denom_balance(&addr, &account)? else {
                self.stats.accounts_without_coins += 1;
                tracing::warn!(address = %addr, "account has no coins; skipping balance");
                continue;
            };
            if let Some(record) = self.records.get_mut(&addr) {
                record.unstaked_balance += &balance;
            }
            self.stats.total_balance += &balance;

            if self.should_log_progress(idx) {
                tracing::debug!(
                    account_idx = idx,
                    num_accounts = self.records.len(),
                    total_balance = %self.stats.total_balance,
                    grand_total = %self.stats.grand_total(),
                    "processing account balances"
                );
            }
        }
        Ok(())
    }

    fn collect_application_stakes(
        &mut self,
        export: &StateExport,
        seen: &mut SectionTracker,
    ) -> StateBridgeResult<()> {
        for (idx, app) in export.applications.iter().enumerate() {
            let (addr, key) = parse_identity(&app.address, app.public_key.as_deref())?;
            let stake = parse_stake("application stake", &addr, &app.staked_tokens)?;
            self.touch(addr, key, Section::Applications, seen);

            if let Some(record) = self.records.get_mut(&addr) {
                record.app_stake += &stake;
                if let Some(t) = effective_unbonding_time(app.unstaking_time) {
                    record.unbonding_end_time = Some(t);
                }
            }
            self.stats.total_app_stake += &stake;
            self.stats.num_applications += 1;

            if self.should_log_progress(idx) {
                tracing::debug!(
                    application_idx = idx,
                    num_accounts = self.records.len(),
                    num_applications = self.stats.num_applications,
                    total_app_stake = %self.stats.total_app_stake,
                    grand_total = %self.stats.grand_total(),
                    "processing application stakes"
                );
            }
        }
        Ok(())
    }

    fn collect_node_stakes(
        &mut self,
        export: &StateExport,
        seen: &mut SectionTracker,
    ) -> StateBridgeResult<()> {
        for (idx, node) in export.nodes.iter().enumerate() {
            let (addr, key) = parse_identity(&node.address, node.public_key.as_deref())?;
            let stake = parse_stake("node stake", &addr, &node.staked_tokens)?;
            let output = match node.output_address.as_deref() {
                Some(raw) if !raw.is_empty() => Some(raw.parse::<LegacyAddress>()?),
                _ => None,
            };
            self.touch(addr, key, Section::Nodes, seen);

            if let Some(record) = self.records.get_mut(&addr) {
                record.node_stake += &stake;
                if output.is_some() {
                    record.output_address = output;
                }
                if let Some(t) = effective_unbonding_time(node.unstaking_time) {
                    record.unbonding_end_time = Some(t);
                }
            }
            self.stats.total_node_stake += &stake;
            self.stats.num_nodes += 1;

            if self.should_log_progress(idx) {
                tracing::debug!(
                    node_idx = idx,
                    num_accounts = self.records.len(),
                    num_nodes = self.stats.num_nodes,
                    total_node_stake = %self.stats.total_node_stake,
                    grand_total = %self.stats.grand_total(),
                    "processing node stakes"
                );
            }
        }
        Ok(())
    }

    /// Ensures a record exists for `addr` and classifies repeat sightings.
    fn touch(
        &mut self,
        addr: LegacyAddress,
        key: Option<LegacyPublicKey>,
        section: Section,
        seen: &mut SectionTracker,
    ) {
        let first_in_section = seen.insert(section, addr);
        match self.records.get_mut(&addr) {
            Some(record) => {
                if !first_in_section {
                    self.stats.same_section_duplicates += 1;
                    tracing::warn!(
                        address = %addr,
                        section = section.label(),
                        "address repeated within one export section; contributions will be summed"
                    );
                } else if section == Section::Accounts {
                    tracing::warn!(
                        address = %addr,
                        "account already exists; stakes and balances will be summed"
                    );
                } else {
                    self.stats.cross_section_merges += 1;
                    tracing::trace!(
                        address = %addr,
                        section = section.label(),
                        "merging stake into account"
                    );
                }
                if record.legacy_public_key.is_none() {
                    record.legacy_public_key = key;
                }
            }
            None => {
                if section != Section::Accounts {
                    tracing::debug!(
                        address = %addr,
                        section = section.label(),
                        "no account found for staked actor; creating one"
                    );
                }
                let mut record = ClaimableAccount::new(addr);
                record.legacy_public_key = key;
                self.records.insert(addr, record);
                self.stats.num_accounts += 1;
            }
        }
    }

    fn should_log_progress(&self, idx: usize) -> bool {
        let every = self.options.num_accounts_per_debug_log;
        every > 0 && idx % every == 0
    }
}

#[derive(Debug, Default)]
struct SectionTracker {
    seen: BTreeSet<(Section, LegacyAddress)>,
}

impl SectionTracker {
    fn insert(&mut self, section: Section, addr: LegacyAddress) -> bool {
        self.seen.insert((section, addr))
    }
}

fn single_denom_balance(
    addr: &LegacyAddress,
    account: &ExportAccount,
) -> StateBridgeResult<Option<Amount>> {
    match account.coins.as_slice() {
        [] => Ok(None),
        [coin] if coin.denom == LEGACY_DENOM => Ok(Some(coin.amount.clone())),
        [coin] => Err(StateBridgeError::UnsupportedDenom {
            address: addr.to_hex(),
            denom: coin.denom.clone(),
        }),
        coins => Err(StateBridgeError::MultipleDenoms {
            address: addr.to_hex(),
            count: coins.len(),
        }),
    }
}

fn parse_stake(kind: &'static str, addr: &LegacyAddress, raw: &str) -> StateBridgeResult<Amount> {
    raw.parse().map_err(|_| StateBridgeError::InvalidAmount {
        kind,
        address: addr.to_hex(),
        value: raw.to_string(),
    })
}

/// Consolidates a single export.
pub fn consolidate(
    export: &StateExport,
    options: CollectorOptions,
) -> StateBridgeResult<(ConsolidatedState, CollectionStats)> {
    consolidate_all(std::slice::from_ref(export), options)
}

/// Folds several exports (e.g. two legacy networks) into one table.
pub fn consolidate_all(
    exports: &[StateExport],
    options: CollectorOptions,
) -> StateBridgeResult<(ConsolidatedState, CollectionStats)> {
    let mut workspace = Workspace::new(options);
    for export in exports {
        workspace.include(export)?;
    }
    let (state, stats) = workspace.finish();
    tracing::info!(
        num_accounts = stats.num_accounts,
        num_applications = stats.num_applications,
        num_nodes = stats.num_nodes,
        total_balance = %stats.total_balance,
        total_app_stake = %stats.total_app_stake,
        total_node_stake = %stats.total_node_stake,
        grand_total = %stats.grand_total(),
        "collection complete"
    );
    Ok((state, stats))
}
