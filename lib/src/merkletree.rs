// Copyright 2023-2024 LightDotSo.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// Copyright 2023-2024 Pia Park.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// From: https://github.com/rkdud007/alloy-merkle-tree/blob/de47ec9e67ce62d6bb8981051f94f2d8296f51da/src/tree.rs
// License: Apache-2.0
// Thank you to `rkdud007` for the original implementation!

use alloy_primitives::{Keccak256, B256};
use tracing::trace;

use crate::error::{Error, Result};

// -----------------------------------------------------------------------------
// Structs
// -----------------------------------------------------------------------------

/// A balanced binary merkle tree over a contiguous run of leaves.
///
/// `layers[0]` holds the leaves in caller order and `layers[last]` holds the root alone. Every
/// layer below the root has even length: an odd layer is stored with its last node duplicated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BalancedMerkleTree {
    pub layers: Vec<Vec<B256>>,
    pub root: B256,
}

// -----------------------------------------------------------------------------
// Implementation
// -----------------------------------------------------------------------------

impl BalancedMerkleTree {
    /// Build the tree bottom-up.
    ///
    /// No leaves gives an empty tree with a zero root, and a single leaf is its own root.
    pub fn new(leaves: &[B256]) -> Self {
        match leaves {
            [] => return Self::default(),
            [leaf] => {
                return Self {
                    layers: vec![vec![*leaf]],
                    root: *leaf,
                }
            }
            _ => {}
        }

        let mut layers = Vec::new();
        let mut current_layer = leaves.to_vec();

        while current_layer.len() > 1 {
            // Pair the last node with itself
            if current_layer.len() % 2 != 0 {
                let last = current_layer[current_layer.len() - 1];
                current_layer.push(last);
            }

            let new_layer = current_layer
                .chunks(2)
                .map(|pair| hash_sorted_pair(&pair[0], &pair[1]))
                .collect::<Vec<_>>();

            trace!(
                depth = layers.len(),
                width = current_layer.len(),
                "built balanced layer"
            );
            layers.push(current_layer);
            current_layer = new_layer;
        }

        let root = current_layer[0];
        layers.push(current_layer);

        Self { layers, root }
    }

    /// Number of leaf slots in the bottom layer, duplicated padding included.
    pub fn width(&self) -> usize {
        self.layers.first().map_or(0, Vec::len)
    }

    /// Create the sibling path from the leaf at `leaf_index` up to the root.
    pub fn generate_proof(&self, leaf_index: usize) -> Result<Vec<B256>> {
        let width = self.width();
        if leaf_index >= width {
            return Err(Error::IndexOutOfBounds {
                index: leaf_index,
                len: width,
            });
        }

        let mut index = leaf_index;
        let mut siblings = Vec::with_capacity(self.layers.len() - 1);

        for layer in &self.layers[..self.layers.len() - 1] {
            let sibling_index = if index % 2 == 0 { index + 1 } else { index - 1 };
            if let Some(sibling) = layer.get(sibling_index) {
                siblings.push(*sibling);
            }
            index /= 2;
        }

        Ok(siblings)
    }
}

// From: https://github.com/OpenZeppelin/openzeppelin-contracts/blob/c01a0fa27fb2d1546958be5d2cbbdd3fb565e4fa/contracts/utils/cryptography/Hashes.sol#L10-L13
// License: MIT
/// Hash two nodes together, smaller value first.
pub(crate) fn hash_sorted_pair(left: &B256, right: &B256) -> B256 {
    let (first, second) = if left <= right {
        (left, right)
    } else {
        (right, left)
    };

    let mut hasher = Keccak256::new();
    hasher.update(first);
    hasher.update(second);
    hasher.finalize()
}

/// Fold `leaf` with each proof element in order, returning the subtree root it implies.
pub fn verify_balanced_subtree(leaf: B256, proof: &[B256]) -> B256 {
    proof
        .iter()
        .fold(leaf, |computed, sibling| hash_sorted_pair(&computed, sibling))
}

/// Check a balanced proof against a known subtree root.
pub fn verify_proof(leaf: B256, proof: &[B256], root: B256) -> bool {
    verify_balanced_subtree(leaf, proof) == root
}
