//! The unhinged tree: balanced subtrees over fixed-size chunks of leaves, chained together in
//! order by a plain hash link.
//!
//! A proof for one leaf carries the folded root of every chunk before its own (the pre-hash),
//! the leaf's sibling path inside its chunk, and the root of every chunk after it.

use alloy_primitives::{Keccak256, B256};
use tracing::debug;

use crate::counts::ProofCounts;
use crate::error::{Error, MalformedProofError, Result};
use crate::merkletree::{verify_balanced_subtree, BalancedMerkleTree};
use crate::UnhingedProof;

/// Upper bound on the automatically selected subtree size.
pub const DEFAULT_AUTO_SUBTREE_CAP: usize = 16;

/// How leaves are chunked into balanced subtrees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubtreeSizing {
    /// Leaves per subtree, a power of two, or 0 to pick one from the leaf count.
    pub leafs_per_subtree: usize,
    pub auto_cap: usize,
}

impl Default for SubtreeSizing {
    fn default() -> Self {
        Self {
            leafs_per_subtree: 0,
            auto_cap: DEFAULT_AUTO_SUBTREE_CAP,
        }
    }
}

impl SubtreeSizing {
    pub fn fixed(leafs_per_subtree: usize) -> Self {
        Self {
            leafs_per_subtree,
            ..Self::default()
        }
    }

    pub fn resolve(&self, leaf_count: usize) -> Result<usize> {
        resolve_leafs_per_subtree(leaf_count, self.leafs_per_subtree, self.auto_cap)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofWithRoot {
    pub proof: UnhingedProof,
    pub root: B256,
}

/// Append `current` to the chain ending in `previous`. Order matters.
pub fn hash_link(previous: &B256, current: &B256) -> B256 {
    let mut hasher = Keccak256::new();
    hasher.update(previous);
    hasher.update(current);
    hasher.finalize()
}

/// Fold subtree roots, in canonical order, into a single unhinged root.
pub fn create_unhinged_root(subtree_roots: &[B256]) -> B256 {
    let Some((first, rest)) = subtree_roots.split_first() else {
        return B256::ZERO;
    };

    rest.iter().fold(*first, |chain, root| hash_link(&chain, root))
}

/// Pick the chunk size for `leaf_count` leaves.
///
/// A zero request selects the smallest power of two covering `min(leaf_count, auto_cap)`.
pub fn resolve_leafs_per_subtree(
    leaf_count: usize,
    requested: usize,
    auto_cap: usize,
) -> Result<usize> {
    if requested == 0 {
        return Ok(leaf_count.min(auto_cap).next_power_of_two());
    }
    if !requested.is_power_of_two() {
        return Err(Error::InvalidSubtreeSize(requested));
    }
    Ok(requested)
}

// `leafs_per_subtree` is nonzero once resolved.
fn chunk_roots(leaves: &[B256], leafs_per_subtree: usize) -> Vec<B256> {
    leaves
        .chunks(leafs_per_subtree)
        .map(|chunk| BalancedMerkleTree::new(chunk).root)
        .collect()
}

impl UnhingedProof {
    /// Lay out the proof nodes and pack their counts. A zero `pre_hash` means there is none.
    pub fn assemble(
        pre_hash: B256,
        subtree_proof: Vec<B256>,
        following_hashes: Vec<B256>,
    ) -> Result<Self> {
        let has_pre_hash = pre_hash != B256::ZERO;

        let counts = ProofCounts {
            subtree_proof_count: subtree_proof.len() as u128,
            following_hashes_count: following_hashes.len() as u128,
            has_pre_hash,
        }
        .pack()?;

        let mut nodes = Vec::with_capacity(
            usize::from(has_pre_hash) + subtree_proof.len() + following_hashes.len(),
        );
        if has_pre_hash {
            nodes.push(pre_hash);
        }
        nodes.extend(subtree_proof);
        nodes.extend(following_hashes);

        Ok(Self { nodes, counts })
    }

    pub fn unpacked_counts(&self) -> Result<ProofCounts> {
        ProofCounts::unpack(self.counts)
    }
}

/// Build the proof for `leaves[target_index]` and the root it proves against.
///
/// `leafs_per_subtree` of 0 selects the size automatically, capped at
/// [`DEFAULT_AUTO_SUBTREE_CAP`].
pub fn create_unhinged_proof(
    leaves: &[B256],
    target_index: usize,
    leafs_per_subtree: usize,
) -> Result<ProofWithRoot> {
    create_unhinged_proof_with(leaves, target_index, SubtreeSizing::fixed(leafs_per_subtree))
}

pub fn create_unhinged_proof_with(
    leaves: &[B256],
    target_index: usize,
    sizing: SubtreeSizing,
) -> Result<ProofWithRoot> {
    if target_index >= leaves.len() {
        return Err(Error::IndexOutOfBounds {
            index: target_index,
            len: leaves.len(),
        });
    }

    let leafs_per_subtree = sizing.resolve(leaves.len())?;
    let subtree_start = target_index / leafs_per_subtree * leafs_per_subtree;
    let subtree_end = subtree_start
        .saturating_add(leafs_per_subtree)
        .min(leaves.len());

    debug!(
        target_index,
        leafs_per_subtree, subtree_start, subtree_end, "assembling unhinged proof"
    );

    let subtree = BalancedMerkleTree::new(&leaves[subtree_start..subtree_end]);
    let subtree_proof = subtree.generate_proof(target_index - subtree_start)?;

    let pre_hash = create_unhinged_root(&chunk_roots(&leaves[..subtree_start], leafs_per_subtree));
    let following_hashes = chunk_roots(&leaves[subtree_end..], leafs_per_subtree);

    let proof = UnhingedProof::assemble(pre_hash, subtree_proof, following_hashes)?;
    let root = calculate_root(leaves[target_index], &proof)?;

    Ok(ProofWithRoot { proof, root })
}

/// The root committed to by `leaves`, i.e. the value that gets signed.
pub fn unhinged_root(leaves: &[B256], sizing: SubtreeSizing) -> Result<B256> {
    create_unhinged_proof_with(leaves, 0, sizing).map(|proven| proven.root)
}

/// Recompute the unhinged root from `leaf` and its proof.
///
/// A wrong proof just yields a different root. Errors are reserved for proofs whose node array
/// does not match their counts.
pub fn calculate_root(leaf: B256, proof: &UnhingedProof) -> Result<B256> {
    let counts = proof.unpacked_counts()?;

    if counts.has_pre_hash && proof.nodes.is_empty() {
        return Err(MalformedProofError::HasPreHashButEmptyNodes.into());
    }

    let expected = counts.node_count();
    if proof.nodes.len() as u128 != expected {
        return Err(MalformedProofError::InvalidNodeArrayLength {
            expected,
            got: proof.nodes.len(),
        }
        .into());
    }

    if counts.has_pre_hash && proof.nodes[0] == B256::ZERO {
        return Err(MalformedProofError::InconsistentPreHashFlag.into());
    }

    // Both counts are bounded by nodes.len() here.
    let subtree_proof_start = usize::from(counts.has_pre_hash);
    let following_hashes_start = subtree_proof_start + counts.subtree_proof_count as usize;

    let subtree_root = verify_balanced_subtree(
        leaf,
        &proof.nodes[subtree_proof_start..following_hashes_start],
    );

    let root = if counts.has_pre_hash {
        hash_link(&proof.nodes[0], &subtree_root)
    } else {
        subtree_root
    };

    Ok(proof.nodes[following_hashes_start..]
        .iter()
        .fold(root, |chain, following| hash_link(&chain, following)))
}

pub fn verify_unhinged_proof(
    leaf: B256,
    proof: &UnhingedProof,
    expected_root: B256,
) -> Result<bool> {
    Ok(calculate_root(leaf, proof)? == expected_root)
}
