//! Errors

use crate::tree::Hash;

/// Errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Key absent from the tree
    #[error("key not found: {0}")]
    NotFound(&'static str),

    /// Rejected input on the checked batch path
    #[error("invalid batch: {0}")]
    InvalidBatch(&'static str),

    /// A stored node failed to decode or holds impossible field values
    #[error("corrupt node: {0}")]
    CorruptNode(String),

    /// A self-check discovered a broken tree invariant. Always a bug.
    #[error("invariant violated: {0}")]
    InvariantViolated(String),

    /// Error from the backing store
    #[cfg(feature = "full")]
    #[error("backing store error: {0}")]
    BackingStore(#[from] mast_storage::Error),

    /// A proof could not be constructed
    #[error("proof creation error: {0}")]
    ProofCreation(String),

    /// A proof failed to decode or broke the token grammar
    #[error("invalid proof: {0}")]
    InvalidProof(String),

    /// The reconstructed root hash does not match the expected root hash
    #[error("proof root mismatch: expected {}, got {}", hex_fmt(.expected), hex_fmt(.actual))]
    ProofRootMismatch {
        /// Root hash the verifier trusted
        expected: Hash,
        /// Root hash the proof reconstructed
        actual: Hash,
    },

    /// A proof token popped from an empty verification stack
    #[error("proof stack underflow")]
    ProofUnderflow,

    /// A proof token attached a child to an occupied slot
    #[error("proof child overwrite: {0}")]
    ProofChildOverwrite(&'static str),

    /// The proof ended with other than one stack element
    #[error("unfinished proof: ended with {0} stack elements")]
    ProofUnfinished(usize),

    /// A range proof does not cover the requested range
    #[error("proof range gap: {0}")]
    ProofRangeGap(&'static str),

    /// The caller cancelled a suspended operation
    #[error("operation cancelled")]
    Cancelled,
}

fn hex_fmt(hash: &Hash) -> String {
    hash.iter().map(|byte| format!("{byte:02x}")).collect()
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
