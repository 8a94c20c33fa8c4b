//! Deterministic binary encoding of tree nodes.
//!
//! Layout, byte for byte:
//!
//! ```text
//! node_hash (32) ∥ kv_hash (32) ∥ left_height (u8) ∥ right_height (u8)
//! ∥ varlen(key) ∥ varlen(value)
//! ∥ varlen(left_ref) ∥ varlen(right_ref) ∥ varlen(parent_ref)
//! ```
//!
//! where `varlen(x)` is a varint length followed by the raw bytes, and a
//! zero-length ref encodes a missing child or parent (keys are never empty).

use std::io::{Cursor, Read, Write};

use ed::{Decode, Encode};
use integer_encoding::{VarInt, VarIntReader, VarIntWriter};

use super::{Link, Node};
use crate::error::{Error, Result};
use crate::tree::{Hash, HASH_LENGTH};

impl Node {
    /// Encodes the node into bytes. Panics if the node has a modified child
    /// link, since its heights and hash would be stale.
    #[inline]
    pub fn encode(&self) -> Vec<u8> {
        // the heap write cannot fail
        Encode::encode(self).unwrap()
    }

    /// Encodes the node into the destination buffer.
    #[inline]
    pub fn encode_into(&self, dest: &mut Vec<u8>) {
        Encode::encode_into(self, dest).unwrap()
    }

    /// Returns the length of the node's encoding.
    #[inline]
    pub fn encoding_length(&self) -> usize {
        Encode::encoding_length(self).unwrap()
    }

    /// Decodes a node record, validating field consistency.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(bytes);
        let node: Node = Decode::decode(&mut cursor)
            .map_err(|err| Error::CorruptNode(format!("failed to decode node: {err:?}")))?;

        if cursor.position() != bytes.len() as u64 {
            return Err(Error::CorruptNode(format!(
                "{} trailing bytes after node record",
                bytes.len() as u64 - cursor.position()
            )));
        }
        if node.key().is_empty() {
            return Err(Error::CorruptNode("empty key in node record".into()));
        }

        Ok(node)
    }
}

fn write_bytes<W: Write>(dest: &mut W, bytes: &[u8]) -> ed::Result<()> {
    dest.write_varint(bytes.len() as u64)?;
    dest.write_all(bytes)?;
    Ok(())
}

fn read_bytes<R: Read>(input: &mut R) -> ed::Result<Vec<u8>> {
    let len: u64 = input.read_varint()?;
    // don't trust the claimed length for preallocation
    let mut bytes = Vec::with_capacity(len.min(4096) as usize);
    let read = input.take(len).read_to_end(&mut bytes)?;
    if read as u64 != len {
        return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into());
    }
    Ok(bytes)
}

fn bytes_len(bytes: &[u8]) -> usize {
    (bytes.len() as u64).required_space() + bytes.len()
}

fn link_key(link: Option<&Link>) -> &[u8] {
    match link {
        None => &[],
        Some(Link::Modified { .. }) => panic!("No encoding for Link::Modified"),
        Some(link) => link.key(),
    }
}

impl Encode for Node {
    fn encode_into<W: Write>(&self, dest: &mut W) -> ed::Result<()> {
        dest.write_all(self.hash())?;
        dest.write_all(self.kv_hash())?;
        dest.write_all(&[self.child_height(true), self.child_height(false)])?;
        write_bytes(dest, self.key())?;
        write_bytes(dest, self.value())?;
        write_bytes(dest, link_key(self.link(true)))?;
        write_bytes(dest, link_key(self.link(false)))?;
        write_bytes(dest, self.parent_key().unwrap_or(&[]))?;
        Ok(())
    }

    fn encoding_length(&self) -> ed::Result<usize> {
        Ok(HASH_LENGTH
            + HASH_LENGTH
            + 2
            + bytes_len(self.key())
            + bytes_len(self.value())
            + bytes_len(link_key(self.link(true)))
            + bytes_len(link_key(self.link(false)))
            + bytes_len(self.parent_key().unwrap_or(&[])))
    }
}

impl Decode for Node {
    fn decode<R: Read>(mut input: R) -> ed::Result<Self> {
        let mut hash: Hash = Default::default();
        input.read_exact(&mut hash)?;
        let mut kv_hash: Hash = Default::default();
        input.read_exact(&mut kv_hash)?;

        let mut heights = [0u8; 2];
        input.read_exact(&mut heights)?;
        let (left_height, right_height) = (heights[0], heights[1]);

        let key = read_bytes(&mut input)?;
        let value = read_bytes(&mut input)?;
        let left_key = read_bytes(&mut input)?;
        let right_key = read_bytes(&mut input)?;
        let parent_key = read_bytes(&mut input)?;

        let left = decode_link(left_key, left_height)?;
        let right = decode_link(right_key, right_height)?;
        let parent_key = if parent_key.is_empty() {
            None
        } else {
            Some(parent_key)
        };

        Ok(Node::from_fields(
            key, value, kv_hash, hash, left, right, parent_key,
        ))
    }
}

fn decode_link(key: Vec<u8>, height: u8) -> ed::Result<Option<Link>> {
    match (key.is_empty(), height) {
        (true, 0) => Ok(None),
        // a ref without a height, or a height without a ref
        (true, height) => Err(ed::Error::UnexpectedByte(height)),
        (false, 0) => Err(ed::Error::UnexpectedByte(0)),
        (false, height) => Ok(Some(Link::Reference { key, height })),
    }
}
