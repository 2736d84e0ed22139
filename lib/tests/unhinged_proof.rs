use alloy_primitives::{keccak256, B256};
use proptest::prelude::*;
use unhinged_lib::{
    calculate_root, create_unhinged_proof, pack_counts, unpack_counts, verify_balanced_subtree,
    BalancedMerkleTree, ProofCounts, MAX_COUNT,
};

fn leaves(seed: u64, n: usize) -> Vec<B256> {
    (0..n as u64)
        .map(|i| keccak256([seed.to_be_bytes(), i.to_be_bytes()].concat()))
        .collect()
}

fn subtree_size() -> impl Strategy<Value = usize> {
    prop_oneof![Just(0usize), (0u32..6).prop_map(|shift| 1usize << shift)]
}

proptest! {
    #[test]
    fn prop_counts_round_trip(
        subtree_proof_count in 0..=MAX_COUNT,
        following_hashes_count in 0..=MAX_COUNT,
        has_pre_hash in any::<bool>(),
    ) {
        let packed =
            pack_counts(subtree_proof_count, following_hashes_count, has_pre_hash).unwrap();

        prop_assert_eq!(
            unpack_counts(packed).unwrap(),
            ProofCounts { subtree_proof_count, following_hashes_count, has_pre_hash }
        );
    }

    #[test]
    fn prop_subtree_proofs_rebuild_root(seed in any::<u64>(), n in 1usize..=64) {
        let leaves = leaves(seed, n);
        let tree = BalancedMerkleTree::new(&leaves);

        for (i, leaf) in leaves.iter().enumerate() {
            let proof = tree.generate_proof(i).unwrap();
            prop_assert_eq!(verify_balanced_subtree(*leaf, &proof), tree.root);
        }
    }

    #[test]
    fn prop_every_target_proves_the_same_root(
        seed in any::<u64>(),
        n in 1usize..=80,
        leafs_per_subtree in subtree_size(),
    ) {
        let leaves = leaves(seed, n);
        let root = create_unhinged_proof(&leaves, 0, leafs_per_subtree).unwrap().root;

        for (i, leaf) in leaves.iter().enumerate() {
            let proven = create_unhinged_proof(&leaves, i, leafs_per_subtree).unwrap();
            prop_assert_eq!(proven.root, root);
            prop_assert_eq!(calculate_root(*leaf, &proven.proof).unwrap(), root);

            let counts = proven.proof.unpacked_counts().unwrap();
            prop_assert_eq!(counts.node_count(), proven.proof.nodes.len() as u128);
        }
    }

    #[test]
    fn prop_swapping_leaves_changes_root(
        seed in any::<u64>(),
        n in 2usize..=48,
        a in any::<prop::sample::Index>(),
        b in any::<prop::sample::Index>(),
        leafs_per_subtree in subtree_size(),
    ) {
        let leaves = leaves(seed, n);
        let (a, b) = (a.index(n), b.index(n));
        prop_assume!(a != b);

        let mut swapped = leaves.clone();
        swapped.swap(a, b);

        // Leaves sharing the same two-leaf pair hash identically in either order.
        let lps = unhinged_lib::resolve_leafs_per_subtree(n, leafs_per_subtree, 16).unwrap();
        prop_assume!(!(lps >= 2 && a / 2 == b / 2 && a / lps == b / lps));

        prop_assert_ne!(
            create_unhinged_proof(&leaves, 0, leafs_per_subtree).unwrap().root,
            create_unhinged_proof(&swapped, 0, leafs_per_subtree).unwrap().root
        );
    }
}

#[test]
fn single_leaf_scenario() {
    let leaf = B256::repeat_byte(0x42);
    let proven = create_unhinged_proof(&[leaf], 0, 0).unwrap();

    assert_eq!(proven.root, leaf);
    assert!(proven.proof.nodes.is_empty());
    assert_eq!(proven.proof.counts, B256::ZERO);
}

#[test]
fn twenty_leaf_scenario() {
    let leaves = leaves(7, 20);
    let proven = create_unhinged_proof(&leaves, 10, 4).unwrap();
    let counts = proven.proof.unpacked_counts().unwrap();

    assert!(counts.has_pre_hash);
    assert_eq!(counts.subtree_proof_count, 2);
    assert_eq!(counts.following_hashes_count, 2);
    assert_eq!(
        &proven.proof.nodes[3..],
        &[
            BalancedMerkleTree::new(&leaves[12..16]).root,
            BalancedMerkleTree::new(&leaves[16..20]).root,
        ]
    );
}
