//! Bit packing of the unhinged proof metadata word.
//!
//! Layout, bit 0 being least significant:
//!
//! | bits      | field                    |
//! |-----------|--------------------------|
//! | 136..=255 | `subtree_proof_count`    |
//! | 16..=135  | `following_hashes_count` |
//! | 1..=15    | reserved, always zero    |
//! | 0         | `has_pre_hash`           |

use alloy_primitives::{B256, U256};

use crate::error::{Error, MalformedProofError, Result};

/// Largest value either count may take.
pub const MAX_COUNT: u128 = (1 << 120) - 1;

const SUBTREE_PROOF_COUNT_SHIFT: usize = 136;
const FOLLOWING_HASHES_COUNT_SHIFT: usize = 16;
const RESERVED_MASK: u16 = 0xfffe;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ProofCounts {
    pub subtree_proof_count: u128,
    pub following_hashes_count: u128,
    pub has_pre_hash: bool,
}

impl ProofCounts {
    pub fn pack(&self) -> Result<B256> {
        if self.subtree_proof_count > MAX_COUNT {
            return Err(Error::CountOverflow {
                field: "subtree proof",
                count: self.subtree_proof_count,
            });
        }
        if self.following_hashes_count > MAX_COUNT {
            return Err(Error::CountOverflow {
                field: "following hashes",
                count: self.following_hashes_count,
            });
        }

        let mut packed = U256::from(self.subtree_proof_count) << SUBTREE_PROOF_COUNT_SHIFT;
        packed |= U256::from(self.following_hashes_count) << FOLLOWING_HASHES_COUNT_SHIFT;
        if self.has_pre_hash {
            packed |= U256::from(1u8);
        }

        Ok(B256::from(packed.to_be_bytes::<32>()))
    }

    /// Decode a counts word. Nonzero reserved bits are rejected.
    pub fn unpack(counts: B256) -> Result<Self> {
        let value = U256::from_be_bytes(counts.0);

        let reserved = (value & U256::from(RESERVED_MASK)).to::<u16>();
        if reserved != 0 {
            return Err(MalformedProofError::ReservedBitsSet { bits: reserved }.into());
        }

        Ok(Self {
            subtree_proof_count: (value >> SUBTREE_PROOF_COUNT_SHIFT).to::<u128>(),
            following_hashes_count: ((value >> FOLLOWING_HASHES_COUNT_SHIFT)
                & U256::from(MAX_COUNT))
            .to::<u128>(),
            has_pre_hash: value.bit(0),
        })
    }

    /// The exact number of nodes a proof with these counts carries.
    pub fn node_count(&self) -> u128 {
        u128::from(self.has_pre_hash) + self.subtree_proof_count + self.following_hashes_count
    }
}

pub fn pack_counts(
    subtree_proof_count: u128,
    following_hashes_count: u128,
    has_pre_hash: bool,
) -> Result<B256> {
    ProofCounts {
        subtree_proof_count,
        following_hashes_count,
        has_pre_hash,
    }
    .pack()
}

pub fn unpack_counts(counts: B256) -> Result<ProofCounts> {
    ProofCounts::unpack(counts)
}

#[cfg(test)]
mod tests {
    use alloy_primitives::b256;

    use super::*;

    #[test]
    fn packs_into_fixed_layout() {
        let packed = pack_counts(3, 5, true).unwrap();
        assert_eq!(
            packed,
            b256!("0000000000000000000000000000030000000000000000000000000000050001")
        );
        assert_eq!(
            unpack_counts(packed).unwrap(),
            ProofCounts {
                subtree_proof_count: 3,
                following_hashes_count: 5,
                has_pre_hash: true,
            }
        );
    }

    #[test]
    fn zero_counts_pack_to_zero_word() {
        assert_eq!(pack_counts(0, 0, false).unwrap(), B256::ZERO);
        assert_eq!(unpack_counts(B256::ZERO).unwrap(), ProofCounts::default());
    }

    #[test]
    fn max_counts_fill_their_fields() {
        let packed = pack_counts(MAX_COUNT, MAX_COUNT, false).unwrap();
        let counts = unpack_counts(packed).unwrap();

        assert_eq!(counts.subtree_proof_count, MAX_COUNT);
        assert_eq!(counts.following_hashes_count, MAX_COUNT);
        assert!(!counts.has_pre_hash);
        // Only the reserved bits and the flag stay clear.
        assert_eq!(packed[30], 0);
        assert_eq!(packed[31], 0);
    }

    #[test]
    fn rejects_overflowing_counts() {
        assert_eq!(
            pack_counts(MAX_COUNT + 1, 0, false),
            Err(Error::CountOverflow {
                field: "subtree proof",
                count: MAX_COUNT + 1,
            })
        );
        assert!(matches!(
            pack_counts(0, u128::MAX, true),
            Err(Error::CountOverflow {
                field: "following hashes",
                ..
            })
        ));
    }

    #[test]
    fn rejects_reserved_bits() {
        let mut word = B256::ZERO;
        word[31] = 0x03;

        assert_eq!(
            unpack_counts(word),
            Err(Error::MalformedProof(MalformedProofError::ReservedBitsSet {
                bits: 0x0002
            }))
        );
    }

    #[test]
    fn node_count_includes_pre_hash() {
        let counts = ProofCounts {
            subtree_proof_count: 2,
            following_hashes_count: 4,
            has_pre_hash: true,
        };
        assert_eq!(counts.node_count(), 7);
    }
}
