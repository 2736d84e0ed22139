use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Leaf index {index} is out of bounds for {len} leaves")]
    IndexOutOfBounds { index: usize, len: usize },
    #[error("{field} count {count} overflows the 120-bit packing limit")]
    CountOverflow { field: &'static str, count: u128 },
    #[error("leafs per subtree must be a power of 2, got {0}")]
    InvalidSubtreeSize(usize),
    #[error("Malformed unhinged proof: {0}")]
    MalformedProof(#[from] MalformedProofError),
    #[error("No leaf matches the permits for chain {chain_id}")]
    LeafNotFound { chain_id: u64 },
}

/// Structural problems found while decoding an [`UnhingedProof`](crate::UnhingedProof).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MalformedProofError {
    #[error("has-pre-hash flag set but no nodes present")]
    HasPreHashButEmptyNodes,
    #[error("invalid node array length: expected {expected}, got {got}")]
    InvalidNodeArrayLength { expected: u128, got: usize },
    #[error("inconsistent pre-hash flag: flagged pre-hash is zero")]
    InconsistentPreHashFlag,
    #[error("reserved counts bits are set: {bits:#06x}")]
    ReservedBitsSet { bits: u16 },
}
