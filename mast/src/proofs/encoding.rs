//! Binary encoding of proof operators.

use std::io::{Cursor, Read, Write};

use ed::{Decode, Encode};
use integer_encoding::{VarInt, VarIntReader, VarIntWriter};

use super::{Node, Op};
use crate::error::{Error, Result};
use crate::tree::{Hash, HASH_LENGTH};

impl Encode for Op {
    fn encode_into<W: Write>(&self, dest: &mut W) -> ed::Result<()> {
        match self {
            Op::Push(Node::Hash(hash)) => {
                dest.write_all(&[0x01])?;
                dest.write_all(hash)?;
            }
            Op::Push(Node::KVHash(kv_hash)) => {
                dest.write_all(&[0x02])?;
                dest.write_all(kv_hash)?;
            }
            Op::Push(Node::KV(key, value)) => {
                dest.write_all(&[0x03])?;
                dest.write_varint(key.len() as u64)?;
                dest.write_all(key)?;
                dest.write_varint(value.len() as u64)?;
                dest.write_all(value)?;
            }
            Op::Parent => dest.write_all(&[0x10])?,
            Op::Child => dest.write_all(&[0x11])?,
        };
        Ok(())
    }

    fn encoding_length(&self) -> ed::Result<usize> {
        Ok(match self {
            Op::Push(Node::Hash(_)) => 1 + HASH_LENGTH,
            Op::Push(Node::KVHash(_)) => 1 + HASH_LENGTH,
            Op::Push(Node::KV(key, value)) => {
                1 + (key.len() as u64).required_space()
                    + key.len()
                    + (value.len() as u64).required_space()
                    + value.len()
            }
            Op::Parent => 1,
            Op::Child => 1,
        })
    }
}

impl Decode for Op {
    fn decode<R: Read>(mut input: R) -> ed::Result<Self> {
        let variant: u8 = Decode::decode(&mut input)?;

        Ok(match variant {
            0x01 => {
                let mut hash: Hash = Default::default();
                input.read_exact(&mut hash)?;
                Op::Push(Node::Hash(hash))
            }
            0x02 => {
                let mut hash: Hash = Default::default();
                input.read_exact(&mut hash)?;
                Op::Push(Node::KVHash(hash))
            }
            0x03 => {
                let key = read_bytes(&mut input)?;
                let value = read_bytes(&mut input)?;
                Op::Push(Node::KV(key, value))
            }
            0x10 => Op::Parent,
            0x11 => Op::Child,
            byte => return Err(ed::Error::UnexpectedByte(byte)),
        })
    }
}

/// Reads a varint-length-prefixed byte string without trusting the claimed
/// length for preallocation, so a corrupt prefix cannot ask for an absurd
/// buffer.
fn read_bytes<R: Read>(input: &mut R) -> ed::Result<Vec<u8>> {
    let len: u64 = input.read_varint()?;
    let mut bytes = Vec::with_capacity(len.min(4096) as usize);
    let read = input.take(len).read_to_end(&mut bytes)?;
    if read as u64 != len {
        return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into());
    }
    Ok(bytes)
}

/// Encodes a sequence of proof operators into the output buffer.
pub fn encode_into<'a, T: Iterator<Item = &'a Op>>(ops: T, output: &mut Vec<u8>) {
    for op in ops {
        op.encode_into(output).unwrap();
    }
}

/// Returns the total encoded length of a sequence of proof operators.
pub fn encoding_length<'a, T: Iterator<Item = &'a Op>>(ops: T) -> usize {
    ops.map(|op| op.encoding_length().unwrap()).sum()
}

/// A lazy decoder of encoded proof bytes, yielding one operator at a time.
pub struct Decoder<'a> {
    offset: usize,
    bytes: &'a [u8],
}

impl<'a> Decoder<'a> {
    /// Creates a decoder over the given encoded proof.
    pub fn new(proof_bytes: &'a [u8]) -> Self {
        Decoder {
            offset: 0,
            bytes: proof_bytes,
        }
    }
}

impl<'a> Iterator for Decoder<'a> {
    type Item = Result<Op>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.bytes.len() {
            return None;
        }

        let mut cursor = Cursor::new(&self.bytes[self.offset..]);
        let result = Decode::decode(&mut cursor)
            .map_err(|err| Error::InvalidProof(format!("failed to decode proof op: {err:?}")));

        match result {
            Ok(op) => {
                self.offset += cursor.position() as usize;
                Some(Ok(op))
            }
            Err(err) => {
                // fuse the iterator
                self.offset = self.bytes.len();
                Some(Err(err))
            }
        }
    }
}
