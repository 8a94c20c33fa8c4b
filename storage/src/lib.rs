//! Backing key/value storage for the MAST store.
//!
//! The store core only assumes an ordered byte-keyed map with point reads,
//! atomic batch writes, forward iteration and read-consistent snapshots.
//! [`RocksDbStorage`] is the production implementation; [`MemStorage`] keeps
//! everything in an ordered map and is useful for tests and examples.

/// Error type shared by all storage implementations.
pub mod error;
/// In-memory storage implementation.
pub mod memory;
/// RocksDB-backed storage implementation.
#[cfg(feature = "rocksdb_storage")]
pub mod rocksdb_storage;

pub use error::Error;
pub use memory::MemStorage;
#[cfg(feature = "rocksdb_storage")]
pub use rocksdb_storage::RocksDbStorage;

/// `Storage` is able to store and retrieve arbitrary bytes by key.
///
/// Writes are staged in a [`Batch`] and applied atomically by
/// `commit_batch` — either every operation in the batch becomes visible or
/// none does. Implementations must be shareable across threads since tree
/// operations fan out reads.
pub trait Storage: Send + Sync {
    /// Staged-write batch type
    type Batch: Batch;

    /// Raw iterator type (to iterate over storage without supplying a key)
    type RawIterator<'a>: RawIterator
    where
        Self: 'a;

    /// Read-consistent snapshot type
    type Snapshot<'a>: Snapshot
    where
        Self: 'a;

    /// Get entry by `key`
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, Error>;

    /// Put `value` under `key`, outside of any batch
    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), Error>;

    /// Delete the entry under `key`, outside of any batch
    fn delete(&self, key: &[u8]) -> Result<(), Error>;

    /// Initialize a new write batch
    fn new_batch(&self) -> Self::Batch;

    /// Atomically commit a batch. All-or-nothing: a batch that is dropped
    /// instead of committed has no effect.
    fn commit_batch(&self, batch: Self::Batch) -> Result<(), Error>;

    /// Get a raw iterator over storage. The iterator observes a consistent
    /// view of the data as of its creation.
    fn raw_iter(&self) -> Self::RawIterator<'_>;

    /// Get a read-consistent snapshot of the storage
    fn snapshot(&self) -> Self::Snapshot<'_>;

    /// Force pending writes to durable media
    fn flush(&self) -> Result<(), Error>;
}

/// A set of staged writes, applied atomically by
/// [`Storage::commit_batch`].
pub trait Batch {
    /// Stage a put operation
    fn put(&mut self, key: &[u8], value: &[u8]);

    /// Stage a delete operation
    fn delete(&mut self, key: &[u8]);
}

/// Cursor over the ordered key space of a storage.
pub trait RawIterator {
    /// Move the iterator to the first valid record
    fn seek_to_first(&mut self);

    /// Move the iterator to the first record with key `>= key`
    fn seek(&mut self, key: &[u8]);

    /// Move the iterator to the last record with key `<= key`
    fn seek_for_prev(&mut self, key: &[u8]);

    /// Move the iterator to the next record
    fn next(&mut self);

    /// Move the iterator to the previous record
    fn prev(&mut self);

    /// Key of the record the iterator points at, if valid
    fn key(&self) -> Option<&[u8]>;

    /// Value of the record the iterator points at, if valid
    fn value(&self) -> Option<&[u8]>;

    /// Whether the iterator points at a valid record
    fn valid(&self) -> bool;
}

/// A read-consistent view of a storage as of a commit point.
pub trait Snapshot {
    /// Raw iterator type over the snapshot
    type RawIterator<'a>: RawIterator
    where
        Self: 'a;

    /// Get entry by `key` from the snapshot
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, Error>;

    /// Get a raw iterator over the snapshot
    fn raw_iter(&self) -> Self::RawIterator<'_>;
}
