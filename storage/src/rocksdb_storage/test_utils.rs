//! Useful tools for mocking

use std::ops::Deref;

use tempfile::TempDir;

use crate::{Error, RocksDbStorage, Storage};

/// RocksDB storage in a temporary directory, deleted once it goes out of
/// scope.
pub struct TempStorage {
    _dir: TempDir,
    storage: RocksDbStorage,
}

impl TempStorage {
    /// Creates a storage in a temporary directory.
    pub fn new() -> Self {
        let dir = TempDir::new().expect("cannot create tempdir");
        let storage =
            RocksDbStorage::open(dir.path().join("db")).expect("cannot open rocksdb storage");
        TempStorage { _dir: dir, storage }
    }
}

impl Default for TempStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for TempStorage {
    type Target = RocksDbStorage;

    fn deref(&self) -> &RocksDbStorage {
        &self.storage
    }
}

impl Storage for TempStorage {
    type Batch = <RocksDbStorage as Storage>::Batch;
    type RawIterator<'a>
        = <RocksDbStorage as Storage>::RawIterator<'a>
    where
        Self: 'a;
    type Snapshot<'a>
        = <RocksDbStorage as Storage>::Snapshot<'a>
    where
        Self: 'a;

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, Error> {
        self.storage.get(key)
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), Error> {
        self.storage.put(key, value)
    }

    fn delete(&self, key: &[u8]) -> Result<(), Error> {
        self.storage.delete(key)
    }

    fn new_batch(&self) -> Self::Batch {
        self.storage.new_batch()
    }

    fn commit_batch(&self, batch: Self::Batch) -> Result<(), Error> {
        self.storage.commit_batch(batch)
    }

    fn raw_iter(&self) -> Self::RawIterator<'_> {
        self.storage.raw_iter()
    }

    fn snapshot(&self) -> Self::Snapshot<'_> {
        self.storage.snapshot()
    }

    fn flush(&self) -> Result<(), Error> {
        self.storage.flush()
    }
}
