//! RocksDB-backed storage.

/// Helpers for tests that need a throwaway RocksDB instance.
pub mod test_utils;

use std::path::{Path, PathBuf};

use rocksdb::checkpoint::Checkpoint;

use crate::{Batch, Error, RawIterator, Snapshot, Storage};

/// A [`Storage`] over a RocksDB database.
pub struct RocksDbStorage {
    db: rocksdb::DB,
    path: PathBuf,
}

impl RocksDbStorage {
    /// Opens the database at the given file path, creating it if missing.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        Self::open_opt(path, Self::default_db_opts())
    }

    /// Opens the database at the given file path with the given options.
    pub fn open_opt<P: AsRef<Path>>(path: P, opts: rocksdb::Options) -> Result<Self, Error> {
        let mut path_buf = PathBuf::new();
        path_buf.push(path);
        let db = rocksdb::DB::open(&opts, &path_buf)?;
        Ok(RocksDbStorage { db, path: path_buf })
    }

    /// Default tuned RocksDB options.
    pub fn default_db_opts() -> rocksdb::Options {
        let mut opts = rocksdb::Options::default();
        opts.create_if_missing(true);
        let parallelism = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        opts.increase_parallelism(parallelism as i32);
        opts.set_allow_mmap_writes(true);
        opts.set_allow_mmap_reads(true);
        opts.set_atomic_flush(true);
        opts
    }

    /// The file path the database was opened at.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Creates a RocksDB checkpoint of the current state at `path` and opens
    /// it as a separate storage.
    pub fn checkpoint<P: AsRef<Path>>(&self, path: P) -> Result<Self, Error> {
        Checkpoint::new(&self.db)?.create_checkpoint(&path)?;
        Self::open(path)
    }

    /// Closes the database and deletes all data from disk.
    pub fn destroy(self) -> Result<(), Error> {
        let opts = Self::default_db_opts();
        let path = self.path.clone();
        drop(self);
        rocksdb::DB::destroy(&opts, path)?;
        Ok(())
    }
}

impl Storage for RocksDbStorage {
    type Batch = rocksdb::WriteBatch;
    type RawIterator<'a>
        = rocksdb::DBRawIterator<'a>
    where
        Self: 'a;
    type Snapshot<'a>
        = RocksDbSnapshot<'a>
    where
        Self: 'a;

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, Error> {
        Ok(self.db.get(key)?)
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), Error> {
        Ok(self.db.put(key, value)?)
    }

    fn delete(&self, key: &[u8]) -> Result<(), Error> {
        Ok(self.db.delete(key)?)
    }

    fn new_batch(&self) -> Self::Batch {
        rocksdb::WriteBatch::default()
    }

    fn commit_batch(&self, batch: Self::Batch) -> Result<(), Error> {
        Ok(self.db.write(batch)?)
    }

    fn raw_iter(&self) -> Self::RawIterator<'_> {
        self.db.raw_iterator()
    }

    fn snapshot(&self) -> Self::Snapshot<'_> {
        RocksDbSnapshot {
            inner: self.db.snapshot(),
        }
    }

    fn flush(&self) -> Result<(), Error> {
        Ok(self.db.flush()?)
    }
}

impl Batch for rocksdb::WriteBatch {
    fn put(&mut self, key: &[u8], value: &[u8]) {
        rocksdb::WriteBatch::put(self, key, value)
    }

    fn delete(&mut self, key: &[u8]) {
        rocksdb::WriteBatch::delete(self, key)
    }
}

impl RawIterator for rocksdb::DBRawIterator<'_> {
    fn seek_to_first(&mut self) {
        rocksdb::DBRawIterator::seek_to_first(self)
    }

    fn seek(&mut self, key: &[u8]) {
        rocksdb::DBRawIterator::seek(self, key)
    }

    fn seek_for_prev(&mut self, key: &[u8]) {
        rocksdb::DBRawIterator::seek_for_prev(self, key)
    }

    fn next(&mut self) {
        rocksdb::DBRawIterator::next(self)
    }

    fn prev(&mut self) {
        rocksdb::DBRawIterator::prev(self)
    }

    fn key(&self) -> Option<&[u8]> {
        rocksdb::DBRawIterator::key(self)
    }

    fn value(&self) -> Option<&[u8]> {
        rocksdb::DBRawIterator::value(self)
    }

    fn valid(&self) -> bool {
        rocksdb::DBRawIterator::valid(self)
    }
}

/// A read-consistent snapshot of a [`RocksDbStorage`].
pub struct RocksDbSnapshot<'db> {
    inner: rocksdb::Snapshot<'db>,
}

impl<'db> Snapshot for RocksDbSnapshot<'db> {
    type RawIterator<'a>
        = rocksdb::DBRawIterator<'a>
    where
        Self: 'a;

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, Error> {
        Ok(self.inner.get(key)?)
    }

    fn raw_iter(&self) -> Self::RawIterator<'_> {
        self.inner.raw_iterator()
    }
}
