use integer_encoding::VarInt;

/// The length of a `Hash` (in bytes).
pub const HASH_LENGTH: usize = 32;

/// A zero-filled `Hash`, used as the digest of a missing child.
pub const NULL_HASH: Hash = [0; HASH_LENGTH];

/// A cryptographic hash digest.
pub type Hash = [u8; HASH_LENGTH];

/// Hashes arbitrary bytes.
pub fn hash(bytes: &[u8]) -> Hash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(bytes);
    finalize(hasher)
}

/// Hashes a key/value pair.
///
/// Both the key and the value are prefixed with their varint-encoded length
/// so that the concatenation is injective.
pub fn kv_hash(key: &[u8], value: &[u8]) -> Hash {
    let mut hasher = blake3::Hasher::new();

    hasher.update(key.len().encode_var_vec().as_slice());
    hasher.update(key);

    hasher.update(value.len().encode_var_vec().as_slice());
    hasher.update(value);

    finalize(hasher)
}

/// Hashes a node based on the hash of its left child (if any), the hash of
/// its right child (if any), and the hash of its key/value pair. A missing
/// child contributes [`NULL_HASH`].
pub fn node_hash(left: &Hash, right: &Hash, kv: &Hash) -> Hash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(left);
    hasher.update(right);
    hasher.update(kv);
    finalize(hasher)
}

fn finalize(hasher: blake3::Hasher) -> Hash {
    let res = hasher.finalize();
    let mut hash: Hash = Default::default();
    hash.copy_from_slice(res.as_bytes());
    hash
}
