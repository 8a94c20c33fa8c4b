//! Thin layer between the tree engine and the backing key/value store.
//!
//! Backing-store keys are namespaced with a single-byte ASCII prefix: `n`
//! for node records and `:` for meta keys. The only meta key is `:root`,
//! which holds the key of the current root node.

use std::collections::HashMap;

use mast_storage::{Batch, Snapshot, Storage};

use crate::error::{Error, Result};
use crate::tree::Node;

/// Prefix byte of node records.
pub const NODE_PREFIX: u8 = b'n';

/// Prefix byte of meta keys.
pub const META_PREFIX: u8 = b':';

/// Meta key holding the current root node's key.
pub const ROOT_META_KEY: &[u8] = b":root";

/// Maps a node key to its backing-store key.
pub fn node_db_key(key: &[u8]) -> Vec<u8> {
    let mut db_key = Vec::with_capacity(1 + key.len());
    db_key.push(NODE_PREFIX);
    db_key.extend_from_slice(key);
    db_key
}

fn decode_record(key: &[u8], bytes: &[u8]) -> Result<Node> {
    let node = Node::decode(bytes)?;
    if node.key() != key {
        return Err(Error::CorruptNode(format!(
            "node record at {key:?} contains key {:?}",
            node.key()
        )));
    }
    Ok(node)
}

/// Resolves committed node records from a [`Storage`].
pub struct NodeStore<'a, S: Storage> {
    storage: &'a S,
}

impl<'a, S: Storage> NodeStore<'a, S> {
    pub fn new(storage: &'a S) -> Self {
        NodeStore { storage }
    }

    /// Reads and decodes the node stored under `key`. Returns `None` if the
    /// key has no record.
    pub fn get(&self, key: &[u8]) -> Result<Option<Node>> {
        self.storage
            .get(&node_db_key(key))?
            .map(|bytes| decode_record(key, &bytes))
            .transpose()
    }

    /// Reads the key of the current root node, if the tree is non-empty.
    pub fn root_key(&self) -> Result<Option<Vec<u8>>> {
        Ok(self.storage.get(ROOT_META_KEY)?)
    }
}

/// Resolves committed node records from a storage [`Snapshot`].
pub struct SnapshotStore<'a, P: Snapshot> {
    snapshot: &'a P,
}

impl<'a, P: Snapshot> SnapshotStore<'a, P> {
    pub fn new(snapshot: &'a P) -> Self {
        SnapshotStore { snapshot }
    }

    /// Reads and decodes the node stored under `key`. Returns `None` if the
    /// key has no record.
    pub fn get(&self, key: &[u8]) -> Result<Option<Node>> {
        self.snapshot
            .get(&node_db_key(key))?
            .map(|bytes| decode_record(key, &bytes))
            .transpose()
    }

    /// Reads the key of the current root node, if the tree is non-empty.
    pub fn root_key(&self) -> Result<Option<Vec<u8>>> {
        Ok(self.snapshot.get(ROOT_META_KEY)?)
    }
}

/// An atomic transaction of node writes against the backing store.
///
/// Writes are staged in a backing-store batch plus an overlay map, so reads
/// through the transaction observe its own staged writes. `commit` applies
/// the batch atomically; dropping the transaction without committing rolls
/// everything back (nothing has touched the store).
pub struct Tx<'a, S: Storage> {
    storage: &'a S,
    batch: S::Batch,
    staged: HashMap<Vec<u8>, Option<Vec<u8>>>,
}

impl<'a, S: Storage> Tx<'a, S> {
    /// Starts a new transaction against the given storage.
    pub fn new(storage: &'a S) -> Self {
        Tx {
            storage,
            batch: storage.new_batch(),
            staged: HashMap::new(),
        }
    }

    /// Reads a node through the transaction: staged writes shadow committed
    /// records.
    pub fn get_node(&self, key: &[u8]) -> Result<Option<Node>> {
        let db_key = node_db_key(key);
        match self.staged.get(&db_key) {
            Some(Some(bytes)) => Ok(Some(decode_record(key, bytes)?)),
            Some(None) => Ok(None),
            None => self
                .storage
                .get(&db_key)?
                .map(|bytes| decode_record(key, &bytes))
                .transpose(),
        }
    }

    /// Stages a write of the node's record.
    pub fn put_node(&mut self, node: &Node) {
        let bytes = node.encode();
        let db_key = node_db_key(node.key());
        self.batch.put(&db_key, &bytes);
        self.staged.insert(db_key, Some(bytes));
    }

    /// Stages a delete of the record under the given node key.
    pub fn delete_node(&mut self, key: &[u8]) {
        let db_key = node_db_key(key);
        self.batch.delete(&db_key);
        self.staged.insert(db_key, None);
    }

    /// Stages an update of the `:root` meta key.
    pub fn set_root(&mut self, key: Option<&[u8]>) {
        match key {
            Some(key) => {
                self.batch.put(ROOT_META_KEY, key);
                self.staged.insert(ROOT_META_KEY.to_vec(), Some(key.to_vec()));
            }
            None => {
                self.batch.delete(ROOT_META_KEY);
                self.staged.insert(ROOT_META_KEY.to_vec(), None);
            }
        }
    }

    /// Atomically applies all staged writes to the backing store.
    pub fn commit(self) -> Result<()> {
        Ok(self.storage.commit_batch(self.batch)?)
    }

    /// Discards all staged writes. Equivalent to dropping the transaction.
    pub fn rollback(self) {}
}
