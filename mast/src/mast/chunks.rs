//! Chunked replication: slicing the store into verifiable pieces.
//!
//! Each chunk is an encoded range proof over a contiguous run of keys, so a
//! receiver can verify every chunk against the trusted root hash before
//! applying it. See [`super::restore::Restorer`] for the receiving side.

use mast_storage::Storage;
use tracing::debug;

use super::Mast;
use crate::error::{Error, Result};

/// Splits a store into consecutive range proofs of at most `chunk_size`
/// entries each. An empty store produces no chunks.
///
/// Chunks are produced in key order against the live store; the producer
/// should be drained before the next mutation commits.
pub struct ChunkProducer<'a, S: Storage> {
    mast: &'a Mast<S>,
    chunk_size: usize,
    next_start: Option<Vec<u8>>,
}

impl<'a, S: Storage> ChunkProducer<'a, S> {
    pub(crate) fn new(mast: &'a Mast<S>, chunk_size: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::ProofCreation("chunk size must be nonzero".into()));
        }

        let next_start = match mast.iter_from(b"").next() {
            None => None,
            Some(entry) => Some(entry?.0),
        };
        debug!(chunk_size, empty = next_start.is_none(), "producing chunks");

        Ok(ChunkProducer {
            mast,
            chunk_size,
            next_start,
        })
    }
}

impl<'a, S: Storage> Iterator for ChunkProducer<'a, S> {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        let start = self.next_start.take()?;

        let mut end = start.clone();
        let mut follow = None;
        for (index, entry) in self.mast.iter_from(&start).enumerate() {
            let (key, _) = match entry {
                Ok(entry) => entry,
                Err(err) => return Some(Err(err)),
            };
            if index == self.chunk_size {
                follow = Some(key);
                break;
            }
            end = key;
        }

        self.next_start = follow;
        Some(self.mast.prove_range(start..=end))
    }
}

#[cfg(test)]
mod test {
    use mast_storage::MemStorage;

    use super::*;
    use crate::proofs::tree::execute;
    use crate::proofs::{Decoder, Node};
    use crate::test_utils::make_batch_seq;

    fn populated(count: u64) -> Mast<MemStorage> {
        let mut mast = Mast::open(MemStorage::new()).unwrap();
        unsafe { mast.apply_unchecked(&make_batch_seq(0..count)).unwrap() };
        mast
    }

    #[test]
    fn empty_store_has_no_chunks() {
        let mast = Mast::open(MemStorage::new()).unwrap();
        let mut chunks = mast.chunks(10).expect("chunks failed");
        assert!(chunks.next().is_none());
    }

    #[test]
    fn zero_chunk_size_rejected() {
        let mast = populated(5);
        assert!(matches!(
            mast.chunks(0),
            Err(Error::ProofCreation(_))
        ));
    }

    #[test]
    fn chunks_cover_everything_once() {
        let mast = populated(25);
        let root_hash = mast.root_hash().unwrap();

        // chunks may re-expose a boundary entry of a neighboring chunk, so
        // compare coverage as a set
        let mut all = std::collections::BTreeSet::new();
        for chunk in mast.chunks(10).expect("chunks failed") {
            let bytes = chunk.expect("chunk failed");
            let tree = execute(Decoder::new(&bytes), true, |node| {
                if let Node::KV(key, _) = node {
                    all.insert(key.clone());
                }
                Ok(())
            })
            .expect("chunk did not execute");
            // every chunk commits to the same root
            assert_eq!(tree.hash(), root_hash);
        }

        let expected: std::collections::BTreeSet<_> =
            make_batch_seq(0..25).into_iter().map(|(key, _)| key).collect();
        assert_eq!(all, expected);
    }

    #[test]
    fn last_partial_chunk_included() {
        let mast = populated(7);
        let count = mast.chunks(3).expect("chunks failed").count();
        assert_eq!(count, 3);
    }
}
