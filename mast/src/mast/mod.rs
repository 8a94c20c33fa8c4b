//! The top-level store API.

pub mod chunks;
mod iter;
pub mod restore;

use std::collections::LinkedList;
use std::ops::RangeInclusive;

use mast_storage::{Snapshot, Storage};
use tracing::debug;

use crate::error::{Error, Result};
use crate::proofs::query::{Query, QueryItem};
use crate::proofs::{encode_into, tree as proof_tree, Decoder};
use crate::store::{NodeStore, SnapshotStore, Tx};
use crate::tree::{Batch, BatchEntry, Commit, Fetch, Hash, Link, Node, Op, RefWalker, Walker};

pub use chunks::ChunkProducer;
pub use iter::KVIterator;
pub use restore::Restorer;

/// How many levels of the tree, counted from the root, stay materialized in
/// memory between operations. Everything deeper is pruned back to reference
/// links after each commit and reloaded on demand.
const RETAINED_LEVELS: u8 = 100;

/// A handle to a Merkle AVL key/value store.
///
/// Mutating methods take `&mut self` — the exclusive borrow is the write
/// lock, so mutations are serialized one at a time. Readers take `&self`
/// and run against read-consistent snapshots of the backing store, so they
/// never block the writer.
pub struct Mast<S: Storage> {
    tree: Option<Node>,
    storage: S,
}

impl<S: Storage> Mast<S> {
    /// Opens a store over the given backing storage, loading the root node
    /// if one was persisted.
    pub fn open(storage: S) -> Result<Self> {
        let mut mast = Mast {
            tree: None,
            storage,
        };
        mast.load_root()?;
        Ok(mast)
    }

    /// Returns a reference to the backing storage.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Consumes the store and returns the backing storage.
    pub fn into_storage(self) -> S {
        self.storage
    }

    /// Gets the value for the given key, or `None` if the key is absent.
    ///
    /// Since nodes are addressed by their key, this is a single
    /// backing-store lookup with no tree descent.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let snapshot = self.storage.snapshot();
        let store = SnapshotStore::new(&snapshot);
        Ok(store.get(key)?.map(|node| node.value().to_vec()))
    }

    /// Returns the root hash of the tree, a compact commitment to the entire
    /// dataset which proofs can be checked against. Returns `None` for an
    /// empty tree.
    pub fn root_hash(&self) -> Option<Hash> {
        self.tree.as_ref().map(|tree| *tree.hash())
    }

    /// Returns the key of the root node, or `None` for an empty tree.
    pub fn root_key(&self) -> Option<&[u8]> {
        self.tree.as_ref().map(|tree| tree.key())
    }

    /// Puts a single key/value pair. Convenience for a one-element batch.
    pub fn put(&mut self, key: Vec<u8>, value: Vec<u8>) -> Result<()> {
        self.apply(&[(key, Op::Put(value))])
    }

    /// Deletes a single key. Fails with [`Error::NotFound`] if the key is
    /// absent.
    pub fn delete(&mut self, key: Vec<u8>) -> Result<()> {
        self.apply(&[(key, Op::Delete)])
    }

    /// Applies a batch of operations (puts and deletes) to the tree,
    /// atomically: either every operation is committed to the backing store
    /// or none is.
    ///
    /// This is the checked path: the batch is sorted here and rejected with
    /// [`Error::InvalidBatch`] on duplicate or empty keys. If you are sure
    /// your batch is sorted and unique, `apply_unchecked` skips that work.
    pub fn apply<K: AsRef<[u8]> + Sync>(&mut self, batch: &Batch<K>) -> Result<()> {
        let mut sorted: Vec<BatchEntry<Vec<u8>>> = batch
            .iter()
            .map(|(key, op)| (key.as_ref().to_vec(), op.clone()))
            .collect();
        sorted.sort_by(|a, b| a.0.cmp(&b.0));

        for (key, _) in sorted.iter() {
            if key.is_empty() {
                return Err(Error::InvalidBatch("empty key"));
            }
        }
        for pair in sorted.windows(2) {
            if pair[0].0 == pair[1].0 {
                return Err(Error::InvalidBatch("duplicate key in batch"));
            }
        }

        unsafe { self.apply_unchecked(&sorted) }
    }

    /// Applies a batch of operations to the tree without sorting or
    /// validating it first.
    ///
    /// # Safety
    /// The keys in `batch` must be sorted, unique and non-empty — if they
    /// are not, the tree will end up in an undefined state.
    pub unsafe fn apply_unchecked<K: AsRef<[u8]> + Sync>(
        &mut self,
        batch: &Batch<K>,
    ) -> Result<()> {
        debug!(ops = batch.len(), "applying batch");

        let source = MastSource {
            storage: &self.storage,
        };
        let maybe_walker = self.tree.take().map(|tree| Walker::new(tree, source));

        match Walker::apply_to(maybe_walker, batch) {
            Ok((maybe_tree, deleted_keys)) => {
                self.tree = maybe_tree;
                if let Err(err) = self.write_commit(deleted_keys) {
                    self.load_root()?;
                    return Err(err);
                }
                Ok(())
            }
            Err(err) => {
                // restore the pre-mutation root from the committed state
                self.load_root()?;
                Err(err)
            }
        }
    }

    /// Creates a Merkle proof for the given keys. For each key in the query,
    /// if the key exists in the store its value will be proven to be in the
    /// tree; if it does not, its absence will be proven by including
    /// boundary keys.
    ///
    /// The proof is returned in the encoded format accepted by
    /// [`crate::proofs::query::verify_keys`]. The keys need not be sorted.
    pub fn prove_keys(&self, keys: &[Vec<u8>]) -> Result<Vec<u8>> {
        let mut query = Query::new();
        for key in keys {
            query.insert_key(key.clone());
        }
        self.prove(query)
    }

    /// Creates a Merkle proof for the contiguous range of keys
    /// `[from, to]`, verifiable with
    /// [`crate::proofs::query::verify_range`].
    pub fn prove_range(&self, range: RangeInclusive<Vec<u8>>) -> Result<Vec<u8>> {
        let mut query = Query::new();
        query.insert_range_inclusive(range);
        self.prove(query)
    }

    /// Creates a Merkle proof for the given query against a read snapshot of
    /// the store.
    pub fn prove(&self, query: Query) -> Result<Vec<u8>> {
        let query_vec: Vec<QueryItem> = query.into();

        let snapshot = self.storage.snapshot();
        let store = SnapshotStore::new(&snapshot);
        let root_key = store.root_key()?.ok_or_else(|| {
            Error::ProofCreation("cannot create a proof for an empty tree".into())
        })?;
        let mut root = store.get(&root_key)?.ok_or_else(|| {
            Error::CorruptNode(format!("root node {root_key:?} is missing"))
        })?;

        let source = SnapshotSource {
            snapshot: &snapshot,
        };
        let mut walker = RefWalker::new(&mut root, source);
        let (proof, _) = walker.create_proof(query_vec.as_slice())?;

        let mut bytes = Vec::with_capacity(128);
        encode_into(proof.iter(), &mut bytes);
        Ok(bytes)
    }

    /// Returns the sparse proof tree for the range `[from, to]`: the minimal
    /// subtree containing every in-range entry, with all other subtrees
    /// collapsed into their hashes. The returned tree is checked against the
    /// current root hash.
    pub fn branch_range(&self, range: RangeInclusive<Vec<u8>>) -> Result<proof_tree::Tree> {
        let expected = self.root_hash().ok_or_else(|| {
            Error::ProofCreation("cannot create a proof for an empty tree".into())
        })?;
        let bytes = self.prove_range(range)?;
        let tree = proof_tree::execute(Decoder::new(&bytes), false, |_| Ok(()))?;
        proof_tree::check_root(&tree, expected)?;
        Ok(tree)
    }

    /// Returns a lazy iterator over the key/value pairs of the store in
    /// ascending key order, starting at the least key `>= start`. It rides
    /// the backing store's ordered cursor, so it observes a consistent view
    /// as of its creation and can be recreated at any key to restart.
    pub fn iter_from(&self, start: &[u8]) -> KVIterator<S::RawIterator<'_>> {
        KVIterator::new(self.storage.raw_iter(), start)
    }

    /// Returns a producer of replication chunks; each chunk is a
    /// self-verifying range proof. See [`chunks::ChunkProducer`].
    pub fn chunks(&self, chunk_size: usize) -> Result<ChunkProducer<S>> {
        ChunkProducer::new(self, chunk_size)
    }

    /// Forces pending backing-store writes to durable media.
    pub fn flush(&self) -> Result<()> {
        Ok(self.storage.flush()?)
    }

    fn load_root(&mut self) -> Result<()> {
        let store = NodeStore::new(&self.storage);
        self.tree = match store.root_key()? {
            Some(root_key) => {
                let root = store.get(&root_key)?.ok_or_else(|| {
                    Error::CorruptNode(format!("root node {root_key:?} is missing"))
                })?;
                Some(root)
            }
            None => None,
        };
        debug!(root = ?self.tree.as_ref().map(|tree| tree.key()), "loaded root");
        Ok(())
    }

    /// Stages every modified node, the deleted records and the new root
    /// reference in one transaction and commits it atomically. A failure
    /// leaves the persisted tree untouched.
    fn write_commit(&mut self, deleted_keys: LinkedList<Vec<u8>>) -> Result<()> {
        let mut tx = Tx::new(&self.storage);
        let deleted_count = deleted_keys.len();

        if let Some(tree) = &mut self.tree {
            let source = MastSource {
                storage: &self.storage,
            };
            let height = tree.height();
            let mut committer = MastCommitter {
                tx: &mut tx,
                height,
                levels: RETAINED_LEVELS,
                writes: 0,
            };
            tree.commit(&mut committer, &source, None)?;
            let writes = committer.writes;
            tx.set_root(Some(tree.key()));
            debug!(writes, deleted = deleted_count, "committing transaction");
        } else {
            tx.set_root(None);
            debug!(deleted = deleted_count, "committing empty tree");
        }

        for key in deleted_keys {
            tx.delete_node(&key);
        }

        tx.commit()
    }
}

/// Fetches committed nodes directly from the backing storage.
pub struct MastSource<'a, S: Storage> {
    storage: &'a S,
}

impl<'a, S: Storage> Clone for MastSource<'a, S> {
    fn clone(&self) -> Self {
        MastSource {
            storage: self.storage,
        }
    }
}

impl<'a, S: Storage> Fetch for MastSource<'a, S> {
    fn fetch(&self, link: &Link) -> Result<Node> {
        NodeStore::new(self.storage)
            .get(link.key())?
            .ok_or_else(|| {
                Error::CorruptNode(format!("missing node for link {:?}", link.key()))
            })
    }
}

/// Fetches committed nodes from a storage snapshot.
pub struct SnapshotSource<'a, P: Snapshot> {
    snapshot: &'a P,
}

impl<'a, P: Snapshot> Clone for SnapshotSource<'a, P> {
    fn clone(&self) -> Self {
        SnapshotSource {
            snapshot: self.snapshot,
        }
    }
}

impl<'a, P: Snapshot> Fetch for SnapshotSource<'a, P> {
    fn fetch(&self, link: &Link) -> Result<Node> {
        SnapshotStore::new(self.snapshot)
            .get(link.key())?
            .ok_or_else(|| {
                Error::CorruptNode(format!("missing node for link {:?}", link.key()))
            })
    }
}

struct MastCommitter<'a, 'db, S: Storage> {
    tx: &'a mut Tx<'db, S>,
    height: u8,
    levels: u8,
    writes: usize,
}

impl<'a, 'db, S: Storage> Commit for MastCommitter<'a, 'db, S> {
    fn write(&mut self, node: &Node) -> Result<()> {
        self.tx.put_node(node);
        self.writes += 1;
        Ok(())
    }

    fn prune(&self, node: &Node) -> (bool, bool) {
        // keep the N top levels of the tree in memory
        let prune = (self.height - node.height()) >= self.levels;
        (prune, prune)
    }
}

#[cfg(test)]
mod test {
    use mast_storage::MemStorage;

    use super::*;
    use crate::test_utils::{assert_store_invariants, make_batch_rand, make_batch_seq};

    fn open_mem() -> Mast<MemStorage> {
        Mast::open(MemStorage::new()).expect("failed to open")
    }

    #[test]
    fn open_empty() {
        let mast = open_mem();
        assert_eq!(mast.root_hash(), None);
        assert_eq!(mast.get(b"foo").unwrap(), None);
    }

    #[test]
    fn simple_put_get() {
        let mut mast = open_mem();
        mast.put(b"foo".to_vec(), b"bar".to_vec()).unwrap();
        assert_eq!(mast.get(b"foo").unwrap(), Some(b"bar".to_vec()));
        assert_eq!(mast.get(b"baz").unwrap(), None);
    }

    #[test]
    fn simple_insert_apply() {
        let batch_size = 20;
        let mut mast = open_mem();

        let batch = make_batch_seq(0..batch_size);
        unsafe { mast.apply_unchecked(&batch).expect("apply failed") };

        assert!(mast.root_hash().is_some());
        assert_store_invariants(&mast).expect("invariants violated");
    }

    #[test]
    fn insert_uncached() {
        let batch_size = 20;
        let mut mast = open_mem();

        let batch = make_batch_seq(0..batch_size);
        unsafe { mast.apply_unchecked(&batch).expect("apply failed") };
        assert_store_invariants(&mast).expect("invariants violated");

        let batch = make_batch_seq(batch_size..(batch_size * 2));
        unsafe { mast.apply_unchecked(&batch).expect("apply failed") };
        assert_store_invariants(&mast).expect("invariants violated");
    }

    #[test]
    fn insert_rand() {
        let tree_size = 40;
        let batch_size = 4;
        let mut mast = open_mem();

        for i in 0..(tree_size / batch_size) {
            let batch = make_batch_rand(batch_size, i);
            unsafe { mast.apply_unchecked(&batch).expect("apply failed") };
            assert_store_invariants(&mast).expect("invariants violated");
        }
    }

    #[test]
    fn actual_deletes() {
        let mut mast = open_mem();

        let batch = make_batch_rand(10, 1);
        unsafe { mast.apply_unchecked(&batch).expect("apply failed") };

        let key = batch.first().unwrap().0.clone();
        mast.delete(key.clone()).expect("delete failed");

        assert_eq!(mast.get(&key).unwrap(), None);
        // the record is gone from the backing store, not just unreachable
        assert_eq!(
            mast.storage()
                .get(&crate::store::node_db_key(&key))
                .unwrap(),
            None
        );
        assert_store_invariants(&mast).expect("invariants violated");
    }

    #[test]
    fn delete_non_existent_errors() {
        let mut mast = open_mem();
        mast.put(b"a".to_vec(), b"1".to_vec()).unwrap();
        let root_before = mast.root_hash();

        let result = mast.delete(b"b".to_vec());
        assert!(matches!(result, Err(Error::NotFound(_))));
        // failed mutation is a no-op on persisted state
        assert_eq!(mast.root_hash(), root_before);
        assert_eq!(mast.get(b"a").unwrap(), Some(b"1".to_vec()));
    }

    #[test]
    fn checked_apply_sorts() {
        let mut mast = open_mem();
        let batch = vec![
            (b"c".to_vec(), Op::Put(b"3".to_vec())),
            (b"a".to_vec(), Op::Put(b"1".to_vec())),
            (b"b".to_vec(), Op::Put(b"2".to_vec())),
        ];
        mast.apply(&batch).expect("apply failed");
        assert_eq!(mast.get(b"a").unwrap(), Some(b"1".to_vec()));
        assert_eq!(mast.get(b"b").unwrap(), Some(b"2".to_vec()));
        assert_eq!(mast.get(b"c").unwrap(), Some(b"3".to_vec()));
    }

    #[test]
    fn checked_apply_rejects_duplicates() {
        let mut mast = open_mem();
        mast.put(b"x".to_vec(), b"0".to_vec()).unwrap();
        let root_before = mast.root_hash();

        let batch = vec![
            (b"a".to_vec(), Op::Put(b"1".to_vec())),
            (b"a".to_vec(), Op::Put(b"2".to_vec())),
        ];
        let result = mast.apply(&batch);
        assert!(matches!(result, Err(Error::InvalidBatch(_))));
        assert_eq!(mast.root_hash(), root_before);
        assert_eq!(mast.get(b"a").unwrap(), None);
    }

    #[test]
    fn checked_apply_rejects_empty_key() {
        let mut mast = open_mem();
        let batch = vec![(vec![], Op::Put(b"1".to_vec()))];
        let result = mast.apply(&batch);
        assert!(matches!(result, Err(Error::InvalidBatch(_))));
    }

    #[test]
    fn reopen_restores_root() {
        let storage = {
            let mut mast = open_mem();
            let batch = make_batch_seq(0..50);
            unsafe { mast.apply_unchecked(&batch).expect("apply failed") };
            mast.into_storage()
        };

        let mast = Mast::open(storage).expect("failed to reopen");
        assert!(mast.root_hash().is_some());
        assert_store_invariants(&mast).expect("invariants violated");

        let mut count = 0;
        for entry in mast.iter_from(b"") {
            entry.expect("iteration failed");
            count += 1;
        }
        assert_eq!(count, 50);
    }

    #[test]
    fn root_hash_ignores_history() {
        // two op sequences ending in the same dataset produce the same root
        let mut a = open_mem();
        let mut b = open_mem();

        unsafe {
            a.apply_unchecked(&make_batch_seq(0..30)).unwrap();
            a.apply_unchecked(&[(make_batch_seq(5..6)[0].0.clone(), Op::Delete)])
                .unwrap();

            b.apply_unchecked(&make_batch_seq(0..5)).unwrap();
            b.apply_unchecked(&make_batch_seq(6..30)).unwrap();
        }

        assert_eq!(a.root_hash(), b.root_hash());
    }

    #[test]
    fn prove_and_verify_keys() {
        let mut mast = open_mem();
        let batch = make_batch_seq(0..20);
        unsafe { mast.apply_unchecked(&batch).expect("apply failed") };

        let keys: Vec<Vec<u8>> = batch.iter().take(3).map(|(key, _)| key.clone()).collect();
        let proof = mast.prove_keys(&keys).expect("prove failed");
        let result =
            crate::proofs::query::verify_keys(&proof, &keys, mast.root_hash().unwrap())
                .expect("verify failed");
        for value in result {
            assert!(value.is_some());
        }
    }

    #[test]
    fn prove_empty_tree_fails() {
        let mast = open_mem();
        let result = mast.prove_keys(&[b"foo".to_vec()]);
        assert!(matches!(result, Err(Error::ProofCreation(_))));
    }

    #[test]
    fn branch_range_returns_sparse_tree() {
        let mut mast = open_mem();
        let batch = make_batch_seq(0..20);
        unsafe { mast.apply_unchecked(&batch).expect("apply failed") };

        let from = batch[5].0.clone();
        let to = batch[10].0.clone();
        let tree = mast.branch_range(from..=to).expect("branch_range failed");

        let mut keys = vec![];
        tree.visit_nodes(&mut |node| {
            if let crate::proofs::Node::KV(key, _) = node {
                keys.push(key);
            }
        });
        let expected: Vec<Vec<u8>> =
            batch[5..=10].iter().map(|(key, _)| key.clone()).collect();
        for key in &expected {
            assert!(keys.contains(key));
        }
    }
}
