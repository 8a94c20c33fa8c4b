//! Storage errors

/// Storage and underlying errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Storage error
    #[error("storage error: {0}")]
    StorageError(String),

    /// RocksDB error
    #[cfg(feature = "rocksdb_storage")]
    #[error("rocksdb error: {0}")]
    RocksDBError(#[from] rocksdb::Error),
}
