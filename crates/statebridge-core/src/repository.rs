// Copyright (c) 2026 Joseph Verdicchio and EvidenceOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Keyed storage for claimable-account records.

use crate::address::LegacyAddress;
use crate::error::{StateBridgeError, StateBridgeResult};
use crate::state::ClaimableAccount;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Record store keyed by legacy address. `iterate_all` yields records in
/// address order.
pub trait Repository {
    fn get(&self, address: &LegacyAddress) -> StateBridgeResult<Option<ClaimableAccount>>;
    fn set(&mut self, account: ClaimableAccount) -> StateBridgeResult<()>;

    /// Writes every record or none of them.
    fn set_all(&mut self, accounts: Vec<ClaimableAccount>) -> StateBridgeResult<()>;

    fn iterate_all(&self) -> StateBridgeResult<Vec<ClaimableAccount>>;

    fn len(&self) -> StateBridgeResult<usize> {
        Ok(self.iterate_all()?.len())
    }

    fn is_empty(&self) -> StateBridgeResult<bool> {
        Ok(self.len()? == 0)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryRepository {
    records: BTreeMap<LegacyAddress, ClaimableAccount>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Repository for MemoryRepository {
    fn get(&self, address: &LegacyAddress) -> StateBridgeResult<Option<ClaimableAccount>> {
        Ok(self.records.get(address).cloned())
    }

    fn set(&mut self, account: ClaimableAccount) -> StateBridgeResult<()> {
        self.records.insert(account.legacy_address, account);
        Ok(())
    }

    fn set_all(&mut self, accounts: Vec<ClaimableAccount>) -> StateBridgeResult<()> {
        self.records.extend(accounts.into_iter().map(|a| (a.legacy_address, a)));
        Ok(())
    }

    fn iterate_all(&self) -> StateBridgeResult<Vec<ClaimableAccount>> {
        Ok(self.records.values().cloned().collect())
    }

    fn len(&self) -> StateBridgeResult<usize> {
        Ok(self.records.len())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RecordsFile {
    accounts: Vec<ClaimableAccount>,
}

/// Records persisted as one JSON file, rewritten atomically once per `set`
/// or `set_all`.
#[derive(Debug)]
pub struct JsonFileRepository {
    path: PathBuf,
    records: BTreeMap<LegacyAddress, ClaimableAccount>,
}

impl JsonFileRepository {
    pub const FILE_NAME: &'static str = "claimable_accounts.json";

    pub fn open(data_dir: &Path) -> StateBridgeResult<Self> {
        fs::create_dir_all(data_dir)?;
        let path = data_dir.join(Self::FILE_NAME);
        let records = if path.exists() {
            let file: RecordsFile = serde_json::from_slice(&fs::read(&path)?)?;
            file.accounts
                .into_iter()
                .map(|a| (a.legacy_address, a))
                .collect()
        } else {
            BTreeMap::new()
        };
        Ok(Self { path, records })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> StateBridgeResult<()> {
        let payload = serde_json::to_vec_pretty(&RecordsFile {
            accounts: self.records.values().cloned().collect(),
        })?;
        write_file_atomic_durable(&self.path, &payload)
    }
}

impl Repository for JsonFileRepository {
    fn get(&self, address: &LegacyAddress) -> StateBridgeResult<Option<ClaimableAccount>> {
        Ok(self.records.get(address).cloned())
    }

    fn set(&mut self, account: ClaimableAccount) -> StateBridgeResult<()> {
        self.set_all(vec![account])
    }

    fn set_all(&mut self, accounts: Vec<ClaimableAccount>) -> StateBridgeResult<()> {
        if accounts.is_empty() {
            return Ok(());
        }
        let mut previous = Vec::with_capacity(accounts.len());
        for account in accounts {
            let address = account.legacy_address;
            previous.push((address, self.records.insert(address, account)));
        }
        if let Err(err) = self.persist() {
            for (address, prev) in previous.into_iter().rev() {
                match prev {
                    Some(prev) => self.records.insert(address, prev),
                    None => self.records.remove(&address),
                };
            }
            return Err(err);
        }
        Ok(())
    }

    fn iterate_all(&self) -> StateBridgeResult<Vec<ClaimableAccount>> {
        Ok(self.records.values().cloned().collect())
    }

    fn len(&self) -> StateBridgeResult<usize> {
        Ok(self.records.len())
    }
}

#[cfg(unix)]
fn sync_directory(path: &Path) -> StateBridgeResult<()> {
    File::open(path)?.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
fn sync_directory(_path: &Path) -> StateBridgeResult<()> {
    Ok(())
}

fn write_file_atomic_durable(path: &Path, bytes: &[u8]) -> StateBridgeResult<()> {
    let parent = path
        .parent()
        .ok_or_else(|| StateBridgeError::InvalidArgument("path parent missing".into()))?;
    let tmp = path.with_extension("tmp");
    let mut f = File::create(&tmp)?;
    f.write_all(bytes)?;
    f.sync_all()?;
    fs::rename(&tmp, path)?;
    sync_directory(parent)
}

/// Write overlay over another repository. Writes stay local until `commit`;
/// dropping the overlay discards them.
pub struct StagedRepository<'a, R: Repository> {
    base: &'a mut R,
    pending: BTreeMap<LegacyAddress, ClaimableAccount>,
}

impl<'a, R: Repository> StagedRepository<'a, R> {
    pub fn new(base: &'a mut R) -> Self {
        Self {
            base,
            pending: BTreeMap::new(),
        }
    }

    /// Hands every staged record to the base in one batch write.
    pub fn commit(self) -> StateBridgeResult<()> {
        self.base.set_all(self.pending.into_values().collect())
    }
}

impl<R: Repository> Repository for StagedRepository<'_, R> {
    fn get(&self, address: &LegacyAddress) -> StateBridgeResult<Option<ClaimableAccount>> {
        match self.pending.get(address) {
            Some(account) => Ok(Some(account.clone())),
            None => self.base.get(address),
        }
    }

    fn set(&mut self, account: ClaimableAccount) -> StateBridgeResult<()> {
        self.pending.insert(account.legacy_address, account);
        Ok(())
    }

    fn set_all(&mut self, accounts: Vec<ClaimableAccount>) -> StateBridgeResult<()> {
        self.pending.extend(accounts.into_iter().map(|a| (a.legacy_address, a)));
        Ok(())
    }

    fn iterate_all(&self) -> StateBridgeResult<Vec<ClaimableAccount>> {
        let mut merged: BTreeMap<LegacyAddress, ClaimableAccount> = self
            .base
            .iterate_all()?
            .into_iter()
            .map(|a| (a.legacy_address, a))
            .collect();
        for (address, account) in &self.pending {
            merged.insert(*address, account.clone());
        }
        Ok(merged.into_values().collect())
    }
}
