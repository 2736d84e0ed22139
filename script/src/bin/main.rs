//! Prepares a multi-chain Permit3 batch for a single signature.
//!
//! Reads a JSON batch of permits, computes the unhinged root and the EIP-712 digest the owner
//! signs, then builds and self-checks the redemption proof for every chain.
//!
//! You can run this script using the following command:
//! ```shell
//! RUST_LOG=info cargo run --release -- --input script/input/batch.json
//! ```
//! or, for the proof of a single chain:
//! ```shell
//! RUST_LOG=info cargo run --release -- --input script/input/batch.json --chain 8453
//! ```

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use alloy_primitives::aliases::{U160, U48};
use alloy_primitives::{Address, B256, U256};
use alloy_sol_types::SolValue;
use anyhow::{anyhow, bail, Context};
use clap::Parser;
use dotenv::dotenv;
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;
use unhinged_lib::{
    encode_leaves, get_unhinged_proof_for_chain, group_by_chain, permit3_domain, signing_hash,
    unhinged_root, AllowanceOrTransfer, ChainPermits, ChainProof, SignedUnhingedPermit3,
    SubtreeSizing, DEFAULT_AUTO_SUBTREE_CAP, PERMIT3_ADDRESS,
};

/// A batch of permits as produced by the wallet front end.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PermitBatch {
    owner: Address,
    salt: B256,
    deadline: u64,
    timestamp: u64,
    permits: Vec<PermitEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PermitEntry {
    chain_id: u64,
    token: Address,
    account: Address,
    /// Decimal or `0x` prefixed.
    amount_delta: String,
    // 0 is transfer mode
    #[serde(default)]
    mode_or_expiration: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct UnhingedPermitFixture {
    unhinged_root: B256,
    signing_hash: B256,
    signing_chain_id: u64,
    verifying_contract: Address,
    owner: Address,
    salt: B256,
    deadline: u64,
    timestamp: u64,
    leaves: Vec<B256>,
    proofs: Vec<ChainProofFixture>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChainProofFixture {
    chain_id: u64,
    leaf_index: usize,
    leaf: B256,
    permits: Vec<PermitFixture>,
    nodes: Vec<B256>,
    counts: B256,
    proof: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct PermitFixture {
    mode_or_expiration: u64,
    token: Address,
    account: Address,
    amount_delta: String,
}

/// The arguments for the command.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// JSON batch of permits to sign.
    #[clap(long)]
    input: PathBuf,

    /// Leaves per balanced subtree, a power of two; 0 picks one automatically.
    #[clap(long, env = "UNHINGED_LEAFS_PER_SUBTREE", default_value = "0")]
    leafs_per_subtree: usize,

    #[clap(long, env = "UNHINGED_AUTO_SUBTREE_CAP", default_value_t = DEFAULT_AUTO_SUBTREE_CAP)]
    auto_subtree_cap: usize,

    /// Chain id of the EIP-712 signing domain.
    #[clap(long, env = "PERMIT3_SIGNING_CHAIN_ID", default_value = "1")]
    signing_chain_id: u64,

    #[clap(long, env = "PERMIT3_ADDRESS", default_value_t = PERMIT3_ADDRESS)]
    permit3_address: Address,

    #[clap(long, default_value = "fixtures")]
    out: PathBuf,

    /// Only emit the proof for this chain.
    #[clap(long)]
    chain: Option<u64>,
}

fn to_uint48(field: &str, value: u64) -> anyhow::Result<U48> {
    U48::try_from(value)
        .ok()
        .ok_or_else(|| anyhow!("{field} {value} exceeds uint48"))
}

impl PermitEntry {
    fn into_permit(self) -> anyhow::Result<(u64, AllowanceOrTransfer)> {
        let amount_delta = U160::from_str(&self.amount_delta)
            .map_err(|err| anyhow!("invalid amountDelta {:?}: {err}", self.amount_delta))?;
        let mode_or_expiration = to_uint48("modeOrExpiration", self.mode_or_expiration)?;

        Ok((
            self.chain_id,
            AllowanceOrTransfer {
                modeOrExpiration: mode_or_expiration,
                token: self.token,
                account: self.account,
                amountDelta: amount_delta,
            },
        ))
    }
}

impl From<&AllowanceOrTransfer> for PermitFixture {
    fn from(permit: &AllowanceOrTransfer) -> Self {
        Self {
            mode_or_expiration: permit.modeOrExpiration.to::<u64>(),
            token: permit.token,
            account: permit.account,
            amount_delta: permit.amountDelta.to_string(),
        }
    }
}

impl From<ChainProof> for ChainProofFixture {
    fn from(proof: ChainProof) -> Self {
        let encoded = proof.payload.abi_encode();
        let ChainPermits {
            chainId: chain_id,
            permits,
        } = proof.payload.permits;

        Self {
            chain_id,
            leaf_index: proof.leaf_index,
            leaf: proof.leaf,
            permits: permits.iter().map(PermitFixture::from).collect(),
            nodes: proof.payload.unhingedProof.nodes,
            counts: proof.payload.unhingedProof.counts,
            proof: format!("0x{}", hex::encode(encoded)),
        }
    }
}

fn setup_logger() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn load_batch(path: &Path) -> anyhow::Result<PermitBatch> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read permit batch {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse permit batch {}", path.display()))
}

/// Build the proofs for `chains` concurrently, one blocking task per chain.
pub async fn get_proofs(
    leaves: Arc<Vec<B256>>,
    chains: Vec<ChainPermits>,
    sizing: SubtreeSizing,
) -> anyhow::Result<Vec<ChainProof>> {
    let proof_futures = chains.into_iter().map(|chain| {
        let leaves = Arc::clone(&leaves);
        tokio::task::spawn_blocking(move || get_unhinged_proof_for_chain(&leaves, chain, sizing))
    });

    try_join_all(proof_futures)
        .await?
        .into_iter()
        .map(|proof| proof.map_err(anyhow::Error::from))
        .collect::<anyhow::Result<Vec<_>>>()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    // Setup the logger.
    setup_logger();

    // Parse the command line arguments.
    let args = Args::parse();
    let sizing = SubtreeSizing {
        leafs_per_subtree: args.leafs_per_subtree,
        auto_cap: args.auto_subtree_cap,
    };

    let batch = load_batch(&args.input)?;
    let entries = batch
        .permits
        .into_iter()
        .map(PermitEntry::into_permit)
        .collect::<anyhow::Result<Vec<_>>>()?;
    if entries.is_empty() {
        bail!("permit batch {} contains no permits", args.input.display());
    }

    // Canonical leaf order: ascending chain id.
    let chains = group_by_chain(entries);
    let leaves = Arc::new(encode_leaves(&chains));
    tracing::info!(chains = chains.len(), "encoded chain leaves");

    let root = tracing::info_span!("compute unhinged root")
        .in_scope(|| unhinged_root(&leaves, sizing))?;

    let message = SignedUnhingedPermit3 {
        owner: batch.owner,
        salt: batch.salt,
        deadline: U256::from(batch.deadline),
        timestamp: to_uint48("timestamp", batch.timestamp)?,
        unhingedRoot: root,
    };
    let domain = permit3_domain(args.signing_chain_id, args.permit3_address);
    let digest = signing_hash(&message, &domain);

    let selected = chains
        .iter()
        .filter(|chain| args.chain.map_or(true, |id| chain.chainId == id))
        .cloned()
        .collect::<Vec<_>>();
    if selected.is_empty() {
        bail!("no permits found for chain {}", args.chain.unwrap_or_default());
    }

    let proofs = get_proofs(Arc::clone(&leaves), selected, sizing).await?;
    for proof in &proofs {
        if proof.root != root {
            bail!(
                "proof for chain {} rebuilds root {} instead of the signed root {}",
                proof.payload.permits.chainId,
                proof.root,
                root
            );
        }
        tracing::info!(
            chain_id = proof.payload.permits.chainId,
            leaf_index = proof.leaf_index,
            nodes = proof.payload.unhingedProof.nodes.len(),
            "verified chain proof"
        );
    }

    let fixture = UnhingedPermitFixture {
        unhinged_root: root,
        signing_hash: digest,
        signing_chain_id: args.signing_chain_id,
        verifying_contract: args.permit3_address,
        owner: batch.owner,
        salt: batch.salt,
        deadline: batch.deadline,
        timestamp: batch.timestamp,
        leaves: leaves.to_vec(),
        proofs: proofs.into_iter().map(ChainProofFixture::from).collect(),
    };

    write_fixture(&fixture, &args.out)
}

fn write_fixture(fixture: &UnhingedPermitFixture, out: &Path) -> anyhow::Result<()> {
    println!("\n--------------------------------------------------------------------------------------\n");
    println!("Unhinged permit batch:");

    // The root the owner commits to; it is embedded in the signed message.
    println!("Unhinged Root: {}", fixture.unhinged_root);

    // The EIP-712 digest a wallet signs for this batch.
    println!("Signing Hash: {}", fixture.signing_hash);

    for proof in &fixture.proofs {
        println!(
            "Chain {}: leaf {} at index {}, {} proof nodes, counts {}",
            proof.chain_id,
            proof.leaf,
            proof.leaf_index,
            proof.nodes.len(),
            proof.counts
        );
    }

    // Save the fixture to a file.
    std::fs::create_dir_all(out)
        .with_context(|| format!("failed to create fixture path {}", out.display()))?;
    let fixture_file = out.join(format!("unhinged-fixture-{}.json", fixture.unhinged_root));
    std::fs::write(&fixture_file, serde_json::to_string_pretty(fixture)?)
        .with_context(|| format!("failed to write fixture {}", fixture_file.display()))?;

    tracing::info!(path = %fixture_file.display(), "wrote fixture");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(json: &str) -> PermitEntry {
        serde_json::from_str(json).unwrap()
    }

    fn entry_with(amount_delta: &str, mode_or_expiration: u64) -> PermitEntry {
        PermitEntry {
            chain_id: 10,
            token: Address::repeat_byte(0x11),
            account: Address::repeat_byte(0x22),
            amount_delta: amount_delta.to_string(),
            mode_or_expiration,
        }
    }

    #[test]
    fn parses_decimal_amount() {
        let (chain_id, permit) = entry_with("25000000", 0).into_permit().unwrap();

        assert_eq!(chain_id, 10);
        assert_eq!(permit.amountDelta, U160::from(25_000_000u64));
        assert_eq!(permit.token, Address::repeat_byte(0x11));
        assert_eq!(permit.account, Address::repeat_byte(0x22));
    }

    #[test]
    fn parses_hex_amount() {
        let (_, permit) = entry_with("0x4c4b40", 0).into_permit().unwrap();
        assert_eq!(permit.amountDelta, U160::from(5_000_000u64));
    }

    #[test]
    fn missing_mode_defaults_to_transfer() {
        let entry = entry(
            r#"{
                "chainId": 8453,
                "token": "0x1111111111111111111111111111111111111111",
                "account": "0x2222222222222222222222222222222222222222",
                "amountDelta": "1"
            }"#,
        );
        assert_eq!(entry.mode_or_expiration, 0);

        let (chain_id, permit) = entry.into_permit().unwrap();
        assert_eq!(chain_id, 8453);
        assert_eq!(permit.modeOrExpiration, U48::ZERO);
    }

    #[test]
    fn keeps_largest_uint48_mode() {
        let (_, permit) = entry_with("1", (1 << 48) - 1).into_permit().unwrap();
        assert_eq!(permit.modeOrExpiration.to::<u64>(), (1 << 48) - 1);
    }

    #[test]
    fn rejects_mode_wider_than_uint48() {
        let err = entry_with("1", 1 << 48).into_permit().unwrap_err();
        assert!(err.to_string().contains("modeOrExpiration"));
    }

    #[test]
    fn rejects_amount_wider_than_uint160() {
        // 2^160
        let too_wide = format!("0x1{}", "0".repeat(40));
        assert!(entry_with(&too_wide, 0).into_permit().is_err());

        let widest = format!("0x{}", "f".repeat(40));
        let (_, permit) = entry_with(&widest, 0).into_permit().unwrap();
        assert_eq!(permit.amountDelta, U160::MAX);
    }

    #[test]
    fn rejects_malformed_amount() {
        assert!(entry_with("twelve", 0).into_permit().is_err());
    }

    #[test]
    fn timestamp_must_fit_uint48() {
        assert_eq!(
            to_uint48("timestamp", 1_767_225_600).unwrap(),
            U48::from(1_767_225_600u64)
        );
        let err = to_uint48("timestamp", u64::MAX).unwrap_err();
        assert!(err.to_string().contains("timestamp"));
    }

    #[test]
    fn loads_example_batch() {
        let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("input/batch.json");
        let batch = load_batch(&path).unwrap();

        assert_eq!(batch.permits.len(), 4);
        let entries = batch
            .permits
            .into_iter()
            .map(PermitEntry::into_permit)
            .collect::<anyhow::Result<Vec<_>>>()
            .unwrap();
        assert_eq!(group_by_chain(entries).len(), 3);
    }
}
