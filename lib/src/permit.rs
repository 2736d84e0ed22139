use std::collections::BTreeMap;

use alloy_dyn_abi::DynSolValue;
use alloy_primitives::{b256, B256, U256};
use alloy_sol_types::SolValue;

use crate::error::{Error, Result};
use crate::{keccak256, AllowanceOrTransfer, ChainPermits};

/// Canonical type string of the per-chain permit batch, as declared by the verifying contract.
pub const CHAIN_PERMITS_TYPE: &str = "ChainPermits(uint64 chainId,AllowanceOrTransfer[] permits)AllowanceOrTransfer(uint48 transferOrExpiration,address token,address spender,uint160 amountDelta)";

/// `keccak256(CHAIN_PERMITS_TYPE)`
pub const CHAIN_PERMITS_TYPEHASH: B256 =
    b256!("d99e9314320a2f250c82ec176bcdc5b9d3636189bc81a91c483b5a2ded83e4da");

pub type PermissionRecord = AllowanceOrTransfer;

/// Hash a single permit as the ABI encoding of its four fields.
pub fn hash_permission(record: &AllowanceOrTransfer) -> B256 {
    B256::from(keccak256(record.abi_encode()))
}

/// Encode one chain's permits into the leaf committed to by the unhinged root.
pub fn encode_chain_leaf(chain_id: U256, records: &[AllowanceOrTransfer]) -> B256 {
    let permit_hashes = DynSolValue::Array(
        records
            .iter()
            .map(|record| DynSolValue::FixedBytes(hash_permission(record), 32))
            .collect(),
    )
    .abi_encode_packed();

    let leaf = DynSolValue::Tuple(vec![
        DynSolValue::FixedBytes(CHAIN_PERMITS_TYPEHASH, 32),
        DynSolValue::Uint(chain_id, 256),
        DynSolValue::FixedBytes(B256::from(keccak256(permit_hashes)), 32),
    ])
    .abi_encode_packed();

    B256::from(keccak256(leaf))
}

impl ChainPermits {
    pub fn leaf(&self) -> B256 {
        encode_chain_leaf(U256::from(self.chainId), &self.permits)
    }
}

/// Group `(chain_id, permit)` pairs into one batch per chain.
///
/// Batches come out in ascending chain id order, which is the leaf order used both when the
/// root is signed and when a chain's proof is built. Permits keep their relative order.
pub fn group_by_chain<I>(entries: I) -> Vec<ChainPermits>
where
    I: IntoIterator<Item = (u64, AllowanceOrTransfer)>,
{
    let mut by_chain: BTreeMap<u64, Vec<AllowanceOrTransfer>> = BTreeMap::new();
    for (chain_id, permit) in entries {
        by_chain.entry(chain_id).or_default().push(permit);
    }

    by_chain
        .into_iter()
        .map(|(chain_id, permits)| ChainPermits {
            chainId: chain_id,
            permits,
        })
        .collect()
}

pub fn encode_leaves(chains: &[ChainPermits]) -> Vec<B256> {
    chains.iter().map(ChainPermits::leaf).collect()
}

/// Locate the leaf for `chain` among the signed leaves.
pub fn find_leaf_index(leaves: &[B256], chain: &ChainPermits) -> Result<usize> {
    let leaf = chain.leaf();
    leaves
        .iter()
        .position(|candidate| *candidate == leaf)
        .ok_or(Error::LeafNotFound {
            chain_id: chain.chainId,
        })
}
