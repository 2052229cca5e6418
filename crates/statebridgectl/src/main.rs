// Copyright (c) 2026 Joseph Verdicchio and EvidenceOS Contributors
// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use ed25519_dalek::SigningKey;
use serde::{Deserialize, Serialize};
use serde_json::json;
use statebridge_core::claim::{ClaimAccount, ClaimApplication, ClaimMultiSig, ClaimSupplier};
use statebridge_core::{
    sign, sign_multi, verify, Amount, Claim, ClaimMessage, ClaimTx, DestAddress, ImportBundle,
    JsonFileRepository, LegacyAddress, LegacyPublicKey, MigrationParams, Repository, TxMessage,
};
use tracing_subscriber::EnvFilter;

const EXIT_HASH_MISMATCH: i32 = 1;
const EXIT_MISSING_ADDRESSES: i32 = 2;

#[derive(Parser)]
#[command(name = "statebridgectl", about = "Legacy state bridge operator and claim tool")]
struct Cli {
    #[arg(long, default_value = "info", global = true)]
    log: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Recompute a bundle's hash and look up addresses in it.
    Validate {
        bundle: PathBuf,
        addresses: Vec<String>,
    },
    ClaimAccount {
        #[arg(long)]
        dest: String,
        #[arg(long)]
        private_key_hex: String,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    ClaimApplication {
        #[arg(long)]
        dest: String,
        #[arg(long)]
        private_key_hex: String,
        #[arg(long)]
        service_id: String,
        /// Overrides the recorded application stake.
        #[arg(long)]
        stake: Option<String>,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    ClaimSupplier {
        #[arg(long)]
        owner_dest: String,
        #[arg(long)]
        operator_dest: Option<String>,
        /// Node being claimed; defaults to the signing key's address.
        #[arg(long)]
        node_address: Option<String>,
        /// Node key or the node's output-address key.
        #[arg(long)]
        private_key_hex: String,
        #[arg(long = "service")]
        services: Vec<String>,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    ClaimMultisig {
        #[arg(long)]
        dest: String,
        /// Repeat once per key, in key order.
        #[arg(long = "private-key-hex", required = true)]
        private_keys_hex: Vec<String>,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Sign one account claim per legacy key into a single transaction.
    ClaimAccounts {
        /// JSON array of hex keys, or of `{private_key_hex, destination}` objects.
        #[arg(long)]
        input_file: PathBuf,
        /// Legacy-to-destination mapping report.
        #[arg(long)]
        output_file: PathBuf,
        /// Destination for entries that do not name their own.
        #[arg(long)]
        destination: Option<String>,
        /// Claimable-account store; missing and claimed addresses are skipped.
        #[arg(long)]
        data_dir: Option<PathBuf>,
        #[arg(long)]
        tx_out: Option<PathBuf>,
    },
    /// Check a claim's signature(s) offline.
    Verify { claim: PathBuf },
    /// Print ledger parameters after `STATEBRIDGE_*` overrides.
    Params {
        #[arg(long)]
        file: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cli.log))
        .with_writer(std::io::stderr)
        .init();

    let code = run(cli.command)?;
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

fn run(command: Commands) -> Result<i32> {
    match command {
        Commands::Validate { bundle, addresses } => {
            let report = validate(&bundle, &addresses)?;
            for record in &report.found {
                println!("{}", serde_json::to_string_pretty(record)?);
            }
            Ok(report.exit_code())
        }
        Commands::ClaimAccount {
            dest,
            private_key_hex,
            out,
        } => {
            let key = parse_signing_key(&private_key_hex)?;
            let msg = ClaimAccount::new(parse_dest(&dest)?, public_key(&key));
            emit(&sign(msg.into(), &key)?, out.as_deref())
        }
        Commands::ClaimApplication {
            dest,
            private_key_hex,
            service_id,
            stake,
            out,
        } => {
            let key = parse_signing_key(&private_key_hex)?;
            let stake = stake
                .map(|raw| {
                    raw.parse::<Amount>()
                        .map_err(|e| anyhow!("invalid stake {raw:?}: {e}"))
                })
                .transpose()?;
            let msg =
                ClaimApplication::new(parse_dest(&dest)?, public_key(&key), service_id, stake);
            emit(&sign(msg.into(), &key)?, out.as_deref())
        }
        Commands::ClaimSupplier {
            owner_dest,
            operator_dest,
            node_address,
            private_key_hex,
            services,
            out,
        } => {
            let key = parse_signing_key(&private_key_hex)?;
            let signer = public_key(&key);
            let node = match node_address {
                Some(raw) => raw.parse::<LegacyAddress>()?,
                None => signer.address(),
            };
            let operator_dest = operator_dest.as_deref().map(parse_dest).transpose()?;
            let msg =
                ClaimSupplier::new(parse_dest(&owner_dest)?, operator_dest, node, signer, services);
            emit(&sign(msg.into(), &key)?, out.as_deref())
        }
        Commands::ClaimMultisig {
            dest,
            private_keys_hex,
            out,
        } => {
            let keys = private_keys_hex
                .iter()
                .map(|raw| parse_signing_key(raw))
                .collect::<Result<Vec<_>>>()?;
            let publics = keys.iter().map(public_key).collect();
            let msg = ClaimMultiSig::new(parse_dest(&dest)?, publics)?;
            emit(&ClaimMessage::from(sign_multi(msg, &keys)?), out.as_deref())
        }
        Commands::ClaimAccounts {
            input_file,
            output_file,
            destination,
            data_dir,
            tx_out,
        } => {
            let (tx, report) =
                claim_accounts(&input_file, destination.as_deref(), data_dir.as_deref())?;
            fs::write(&output_file, serde_json::to_vec_pretty(&report)?).with_context(|| {
                format!("failed to write mapping: {}", output_file.display())
            })?;
            if tx.messages.is_empty() {
                bail!(
                    "0/{} keys produced a claim; see {}",
                    report.mappings.len(),
                    output_file.display()
                );
            }
            tracing::info!(
                num_messages = tx.messages.len(),
                mapping = %output_file.display(),
                "built bulk account claim transaction"
            );
            write_output(&serde_json::to_string_pretty(&tx)?, tx_out.as_deref())
        }
        Commands::Params { file } => {
            let params = effective_params(file.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&params)?);
            Ok(0)
        }
        Commands::Verify { claim } => {
            let msg = ClaimMessage::load(&claim)
                .with_context(|| format!("failed to read claim: {}", claim.display()))?;
            let verified = verify(&msg).map_err(|e| anyhow!("claim rejected: {e}"))?;
            println!(
                "{}",
                json!({
                    "kind": msg.kind().to_string(),
                    "legacy_src_address": verified.src_address.to_hex(),
                    "signer_address": verified.signer_address.to_hex(),
                })
            );
            Ok(0)
        }
    }
}

#[derive(Debug, Default)]
struct ValidationReport {
    hash_matches: bool,
    found: Vec<statebridge_core::ClaimableAccount>,
    missing: Vec<String>,
}

impl ValidationReport {
    fn exit_code(&self) -> i32 {
        let mut code = 0;
        if !self.hash_matches {
            code |= EXIT_HASH_MISMATCH;
        }
        if !self.missing.is_empty() {
            code |= EXIT_MISSING_ADDRESSES;
        }
        code
    }
}

/// Read-only: never writes the bundle.
fn validate(path: &Path, addresses: &[String]) -> Result<ValidationReport> {
    let bundle = ImportBundle::load(path)
        .with_context(|| format!("failed to load bundle: {}", path.display()))?;
    let check = bundle.check_hash()?;
    let hash_matches = check.matches();
    if hash_matches {
        tracing::info!(state_hash = %check.computed_hex, "state hash matches");
    } else {
        tracing::error!(
            expected = %check.expected_hex,
            computed = %check.computed_hex,
            "STATE HASH MISMATCH: bundle content differs from its published hash"
        );
    }

    let index: BTreeMap<LegacyAddress, &statebridge_core::ClaimableAccount> = bundle
        .account_state
        .accounts
        .iter()
        .map(|a| (a.legacy_address, a))
        .collect();

    let mut report = ValidationReport {
        hash_matches,
        ..ValidationReport::default()
    };
    for raw in addresses {
        let wanted = raw.to_uppercase();
        match wanted.parse::<LegacyAddress>() {
            Ok(addr) => match index.get(&addr) {
                Some(record) => {
                    tracing::info!(address = %addr, "address found");
                    report.found.push((*record).clone());
                }
                None => {
                    tracing::warn!(address = %addr, "address not found in bundle");
                    report.missing.push(wanted);
                }
            },
            Err(err) => {
                tracing::warn!(address = %raw, error = %err, "address not parseable");
                report.missing.push(wanted);
            }
        }
    }
    Ok(report)
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum BulkKeyEntry {
    Key(String),
    WithDestination {
        private_key_hex: String,
        destination: String,
    },
}

#[derive(Debug, Default, Serialize)]
struct BulkMapping {
    legacy_address: String,
    dest_address: Option<String>,
    claim_message: Option<ClaimMessage>,
    /// Empty when the entry made it into the transaction.
    error: String,
}

#[derive(Debug, Default, Serialize)]
struct BulkClaimReport {
    mappings: Vec<BulkMapping>,
    num_messages: usize,
}

/// Entries that fail are reported in the mapping and left out of the
/// transaction; the rest are signed in input order.
fn claim_accounts(
    input: &Path,
    destination: Option<&str>,
    data_dir: Option<&Path>,
) -> Result<(ClaimTx, BulkClaimReport)> {
    let bytes =
        fs::read(input).with_context(|| format!("failed to read keys: {}", input.display()))?;
    let entries: Vec<BulkKeyEntry> = serde_json::from_slice(&bytes)
        .with_context(|| format!("malformed key file: {}", input.display()))?;
    let default_dest = destination.map(parse_dest).transpose()?;
    let repo = data_dir.map(JsonFileRepository::open).transpose()?;

    let mut tx = ClaimTx::default();
    let mut report = BulkClaimReport::default();
    let mut seen = BTreeSet::new();
    for entry in &entries {
        let (raw_key, raw_dest) = match entry {
            BulkKeyEntry::Key(key) => (key.as_str(), None),
            BulkKeyEntry::WithDestination {
                private_key_hex,
                destination,
            } => (private_key_hex.as_str(), Some(destination.as_str())),
        };
        let mut mapping = BulkMapping::default();
        match build_account_claim(raw_key, raw_dest, default_dest.as_ref(), &mut mapping) {
            Ok(msg) => {
                let address = msg.src_address();
                if let Some(reason) = skip_reason(repo.as_ref(), &seen, address)? {
                    tracing::warn!(address = %address, reason = %reason, "skipping legacy key");
                    mapping.error = reason;
                } else {
                    seen.insert(address);
                    tx.messages.push(TxMessage::Claim(msg.clone()));
                    mapping.claim_message = Some(msg);
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "legacy key will not be claimed");
                mapping.error = format!("{err:#}");
            }
        }
        report.mappings.push(mapping);
    }
    report.num_messages = tx.messages.len();
    Ok((tx, report))
}

fn build_account_claim(
    raw_key: &str,
    raw_dest: Option<&str>,
    default_dest: Option<&DestAddress>,
    mapping: &mut BulkMapping,
) -> Result<ClaimMessage> {
    let key = parse_signing_key(raw_key)?;
    let public = public_key(&key);
    mapping.legacy_address = public.address().to_hex();
    let dest = match (raw_dest, default_dest) {
        (Some(raw), _) => parse_dest(raw)?,
        (None, Some(dest)) => dest.clone(),
        (None, None) => bail!("no destination: pass --destination or set one on the entry"),
    };
    mapping.dest_address = Some(dest.to_string());
    Ok(sign(ClaimAccount::new(dest, public).into(), &key)?)
}

fn skip_reason(
    repo: Option<&JsonFileRepository>,
    seen: &BTreeSet<LegacyAddress>,
    address: LegacyAddress,
) -> Result<Option<String>> {
    if seen.contains(&address) {
        return Ok(Some("duplicate key in input".into()));
    }
    let Some(repo) = repo else {
        return Ok(None);
    };
    Ok(match repo.get(&address)? {
        None => Some("no claimable account for this address".into()),
        Some(record) if record.is_claimed() => Some(format!(
            "already claimed at height {}",
            record.claimed_at_height
        )),
        Some(_) => None,
    })
}

fn effective_params(file: Option<&Path>) -> Result<MigrationParams> {
    let Some(path) = file else {
        return Ok(MigrationParams::from_env()?);
    };
    let params = MigrationParams::load(path)
        .with_context(|| format!("failed to load params: {}", path.display()))?;
    Ok(params.with_env_overrides()?)
}

fn parse_dest(raw: &str) -> Result<DestAddress> {
    Ok(DestAddress::parse(raw)?)
}

/// Accepts a 32-byte seed, or the 64-byte seed-plus-public-key form.
fn parse_signing_key(raw: &str) -> Result<SigningKey> {
    let bytes = hex::decode(raw.trim()).map_err(|_| anyhow!("private key is not hex"))?;
    match bytes.len() {
        32 | 64 => {
            let mut seed = [0u8; 32];
            seed.copy_from_slice(&bytes[..32]);
            let key = SigningKey::from_bytes(&seed);
            if bytes.len() == 64 && key.verifying_key().to_bytes()[..] != bytes[32..] {
                bail!("private key suffix does not match its public key");
            }
            Ok(key)
        }
        n => bail!("private key must be 32 or 64 bytes, got {n}"),
    }
}

fn public_key(key: &SigningKey) -> LegacyPublicKey {
    LegacyPublicKey::from(key.verifying_key())
}

fn emit(msg: &ClaimMessage, out: Option<&Path>) -> Result<i32> {
    write_output(&msg.to_json_pretty()?, out)
}

fn write_output(body: &str, out: Option<&Path>) -> Result<i32> {
    match out {
        Some(path) => {
            fs::write(path, body)
                .with_context(|| format!("failed to write output: {}", path.display()))?;
            tracing::info!(path = %path.display(), "wrote signed claims");
        }
        None => println!("{body}"),
    }
    Ok(0)
}
