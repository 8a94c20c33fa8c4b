use super::hash::{kv_hash, Hash};

/// A key/value pair together with the hash committing to it.
pub struct KV {
    pub(crate) key: Vec<u8>,
    pub(crate) value: Vec<u8>,
    pub(crate) hash: Hash,
}

impl KV {
    #[inline]
    pub fn new(key: Vec<u8>, value: Vec<u8>) -> Self {
        let hash = kv_hash(key.as_slice(), value.as_slice());
        KV { key, value, hash }
    }

    /// Creates a `KV` with the given hash, without hashing the pair. The
    /// caller is responsible for the hash being correct.
    #[inline]
    pub fn from_fields(key: Vec<u8>, value: Vec<u8>, hash: Hash) -> Self {
        KV { key, value, hash }
    }

    #[inline]
    pub fn with_value(mut self, value: Vec<u8>) -> Self {
        self.value = value;
        self.hash = kv_hash(self.key(), self.value());
        self
    }

    #[inline]
    pub fn key(&self) -> &[u8] {
        self.key.as_slice()
    }

    #[inline]
    pub fn take_key(self) -> Vec<u8> {
        self.key
    }

    #[inline]
    pub fn value(&self) -> &[u8] {
        self.value.as_slice()
    }

    #[inline]
    pub fn hash(&self) -> &Hash {
        &self.hash
    }
}
