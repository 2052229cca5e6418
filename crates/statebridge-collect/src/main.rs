// Copyright (c) 2026 Joseph Verdicchio and EvidenceOS Contributors
// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde_json::json;
use statebridge_core::collect::{consolidate_all, CollectionStats, CollectorOptions};
use statebridge_core::export::StateExport;
use statebridge_core::state::ImportBundle;
use statebridge_core::StateBridgeError;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "statebridge-collect")]
#[command(about = "Consolidate a legacy state export into a claimable-account import bundle")]
struct Args {
    /// Legacy state export (JSON).
    #[arg(long)]
    export: PathBuf,

    /// Destination of the import bundle.
    #[arg(long)]
    out: PathBuf,

    /// Additional exports folded into the same bundle, in order.
    #[arg(long = "merge-state")]
    merge_state: Vec<PathBuf>,

    #[arg(long, default_value_t = 500)]
    num_accounts_per_debug_log: usize,

    /// Fail when an address repeats within one export section.
    #[arg(long)]
    strict_duplicates: bool,

    #[arg(long, default_value = "info")]
    log: String,
}

fn main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&args.log))
        .init();

    let (bundle, stats) = run(&args)?;
    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "out": args.out.display().to_string(),
            "state_hash": bundle.state_hash_hex,
            "num_records": bundle.account_state.accounts.len(),
            "stats": stats,
        }))?
    );
    Ok(())
}

fn run(args: &Args) -> Result<(ImportBundle, CollectionStats)> {
    let mut paths = vec![args.export.clone()];
    paths.extend(args.merge_state.iter().cloned());
    let exports = paths
        .iter()
        .map(|p| load_export(p))
        .collect::<Result<Vec<_>>>()?;

    let options = CollectorOptions {
        num_accounts_per_debug_log: args.num_accounts_per_debug_log,
    };
    let (state, stats) = consolidate_all(&exports, options).context("consolidation failed")?;

    if stats.same_section_duplicates > 0 {
        if args.strict_duplicates {
            bail!(StateBridgeError::SameSectionDuplicates {
                count: stats.same_section_duplicates
            });
        }
        tracing::warn!(
            count = stats.same_section_duplicates,
            "duplicate addresses within a single export section were summed"
        );
    }

    let bundle = ImportBundle::new(state).context("failed to hash consolidated state")?;
    bundle
        .write(&args.out)
        .with_context(|| format!("failed to write bundle: {}", args.out.display()))?;
    tracing::info!(
        out = %args.out.display(),
        state_hash = %bundle.state_hash_hex,
        "wrote import bundle"
    );
    Ok((bundle, stats))
}

fn load_export(path: &Path) -> Result<StateExport> {
    tracing::info!(path = %path.display(), "reading legacy state export");
    StateExport::load(path).with_context(|| format!("failed to load export: {}", path.display()))
}
