//! Rebuilding a store from replication chunks.

use mast_storage::Storage;
use tracing::debug;

use super::Mast;
use crate::error::{Error, Result};
use crate::proofs::tree::execute;
use crate::proofs::{Decoder, Node};
use crate::tree::{BatchEntry, Hash, Op, NULL_HASH};

/// Verifies and replays chunks produced by
/// [`super::chunks::ChunkProducer`] into a fresh store.
///
/// Every chunk is checked against the trusted root hash before any of its
/// entries touch the store, and `finalize` checks that the rebuilt tree
/// reproduces that root hash exactly — a missing or forged chunk cannot go
/// unnoticed.
pub struct Restorer<S: Storage> {
    mast: Mast<S>,
    expected_root: Option<Hash>,
    last_key: Option<Vec<u8>>,
    chunks_processed: usize,
}

impl<S: Storage> Restorer<S> {
    /// Creates a restorer writing into the given (empty) storage, expecting
    /// the tree to hash to `expected_root` once all chunks are processed.
    /// `None` means the source tree was empty and no chunks are expected.
    pub fn new(storage: S, expected_root: Option<Hash>) -> Result<Self> {
        let mast = Mast::open(storage)?;
        if mast.root_hash().is_some() {
            return Err(Error::InvalidBatch("restore target store is not empty"));
        }

        Ok(Restorer {
            mast,
            expected_root,
            last_key: None,
            chunks_processed: 0,
        })
    }

    /// Verifies a chunk against the expected root hash and applies its
    /// entries. Chunks must be fed in production order. Returns the number
    /// of entries applied.
    pub fn process_chunk(&mut self, chunk_bytes: &[u8]) -> Result<usize> {
        let expected = self.expected_root.ok_or_else(|| {
            Error::InvalidProof("no chunks expected for an empty tree".into())
        })?;

        let mut entries: Vec<(Vec<u8>, Vec<u8>)> = Vec::new();
        let tree = execute(Decoder::new(chunk_bytes), true, |node| {
            if let Node::KV(key, value) = node {
                entries.push((key.clone(), value.clone()));
            }
            Ok(())
        })?;

        // every chunk commits to the same root as the source tree
        let actual = tree.hash();
        if actual != expected {
            return Err(Error::ProofRootMismatch { expected, actual });
        }

        // neighboring chunks overlap at their boundary entries; skip what
        // the previous chunk already applied
        let batch: Vec<BatchEntry<Vec<u8>>> = entries
            .into_iter()
            .filter(|(key, _)| match &self.last_key {
                Some(last_key) => key > last_key,
                None => true,
            })
            .map(|(key, value)| (key, Op::Put(value)))
            .collect();

        if let Some((key, _)) = batch.last() {
            self.last_key = Some(key.clone());
        }

        let applied = batch.len();
        unsafe { self.mast.apply_unchecked(&batch)? };
        self.chunks_processed += 1;
        debug!(chunk = self.chunks_processed, entries = applied, "restored chunk");

        Ok(applied)
    }

    /// Number of chunks successfully processed so far.
    pub fn chunks_processed(&self) -> usize {
        self.chunks_processed
    }

    /// Checks the rebuilt tree against the expected root hash and returns
    /// the restored store.
    pub fn finalize(self) -> Result<Mast<S>> {
        if self.mast.root_hash() != self.expected_root {
            return Err(Error::ProofRootMismatch {
                expected: self.expected_root.unwrap_or(NULL_HASH),
                actual: self.mast.root_hash().unwrap_or(NULL_HASH),
            });
        }
        Ok(self.mast)
    }
}
