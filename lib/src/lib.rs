//! Single-signature, multi-chain Permit3 batches.
//!
//! Each chain's permits hash to one leaf. The leaves, in ascending chain id order, are committed
//! to by an unhinged root that the owner signs once; every chain then redeems with only its own
//! permits and an [`UnhingedProof`] linking its leaf to that root.

mod counts;
mod error;
mod merkletree;
mod permit;
mod signing;
mod unhinged;

use alloy_primitives::B256;
use alloy_sol_types::sol;
use tiny_keccak::{Hasher, Keccak};

pub use counts::{pack_counts, unpack_counts, ProofCounts, MAX_COUNT};
pub use error::{Error, MalformedProofError, Result};
pub use merkletree::{verify_balanced_subtree, verify_proof, BalancedMerkleTree};
pub use permit::{
    encode_chain_leaf, encode_leaves, find_leaf_index, group_by_chain, hash_permission,
    PermissionRecord, CHAIN_PERMITS_TYPE, CHAIN_PERMITS_TYPEHASH,
};
pub use signing::{
    permit3_domain, signing_hash, SignedUnhingedPermit3, PERMIT3_ADDRESS, PERMIT3_DOMAIN_NAME,
    PERMIT3_DOMAIN_VERSION,
};
pub use unhinged::{
    calculate_root, create_unhinged_proof, create_unhinged_proof_with, create_unhinged_root,
    hash_link, resolve_leafs_per_subtree, unhinged_root, verify_unhinged_proof, ProofWithRoot,
    SubtreeSizing, DEFAULT_AUTO_SUBTREE_CAP,
};

sol! {
    /// A single allowance change or transfer, as understood by the Permit3 contract.
    #[derive(Debug, PartialEq, Eq)]
    struct AllowanceOrTransfer {
        uint48 modeOrExpiration;
        address token;
        address account;
        uint160 amountDelta;
    }

    /// Every permit of the batch that is redeemed on one chain.
    #[derive(Debug, PartialEq, Eq)]
    struct ChainPermits {
        uint64 chainId;
        AllowanceOrTransfer[] permits;
    }

    #[derive(Debug, PartialEq, Eq)]
    struct UnhingedProof {
        bytes32[] nodes;
        bytes32 counts;
    }

    /// What a single chain receives at redemption time.
    #[derive(Debug, PartialEq, Eq)]
    struct UnhingedPermitProof {
        ChainPermits permits;
        UnhingedProof unhingedProof;
    }
}

pub(crate) fn keccak256<T: AsRef<[u8]>>(bytes: T) -> [u8; 32] {
    let mut output = [0u8; 32];
    let mut hasher = Keccak::v256();
    hasher.update(bytes.as_ref());
    hasher.finalize(&mut output);
    output
}

/// A chain's redemption payload together with where its leaf sits in the batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainProof {
    pub leaf_index: usize,
    pub leaf: B256,
    pub payload: UnhingedPermitProof,
    pub root: B256,
}

/// Compute the root the owner signs for a batch of per-chain permits.
pub fn build_unhinged_root(chains: &[ChainPermits], sizing: SubtreeSizing) -> Result<B256> {
    unhinged_root(&encode_leaves(chains), sizing)
}

/// Build the redemption payload for `chain` against the signed `leaves`.
pub fn get_unhinged_proof_for_chain(
    leaves: &[B256],
    chain: ChainPermits,
    sizing: SubtreeSizing,
) -> Result<ChainProof> {
    let leaf_index = find_leaf_index(leaves, &chain)?;
    let ProofWithRoot { proof, root } = create_unhinged_proof_with(leaves, leaf_index, sizing)?;

    Ok(ChainProof {
        leaf_index,
        leaf: leaves[leaf_index],
        payload: UnhingedPermitProof {
            permits: chain,
            unhingedProof: proof,
        },
        root,
    })
}
