//! MAST — a Merkle AVL search tree.
//!
//! An authenticated key/value store: a balanced binary search tree whose
//! every node carries a cryptographic hash, making the root hash a compact
//! commitment to the entire dataset. Mutations are applied as atomic
//! batches; inclusion (and absence) of keys and contiguous key ranges can
//! be proven to third parties against the root hash alone.
//!
//! With default features the crate bundles the full store over a
//! [`mast_storage`] backing store. Building without default features leaves
//! just the proof verification surface, suitable for light clients.

/// Error and Result types.
pub mod error;
/// The top-level store API.
#[cfg(feature = "full")]
mod mast;
/// Provides a container type that allows temporarily taking ownership of a
/// value.
#[cfg(feature = "full")]
pub mod owner;
/// Algorithms for generating and verifying Merkle proofs.
pub mod proofs;
/// The node store: namespacing and transactions over the backing store.
#[cfg(feature = "full")]
pub mod store;
/// Various helpers useful for tests or benchmarks.
#[cfg(feature = "full")]
pub mod test_utils;
/// The core tree data structure.
pub mod tree;

pub use error::{Error, Result};
pub use proofs::query::{verify_keys, verify_range, Query, QueryItem};
pub use tree::{Hash, HASH_LENGTH, NULL_HASH};

#[cfg(feature = "full")]
pub use crate::mast::{ChunkProducer, KVIterator, Mast, Restorer};
#[cfg(feature = "full")]
pub use tree::{Batch, BatchEntry, Op, PanicSource};
