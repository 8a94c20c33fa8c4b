mod encoding;
pub mod query;
pub mod tree;

use crate::tree::Hash;
pub use encoding::{encode_into, encoding_length, Decoder};

/// A proof operator, executed to verify the data in a proof.
#[derive(Debug, PartialEq, Eq)]
pub enum Op {
    /// Pushes a node on the stack.
    Push(Node),

    /// Pops the top stack item as `parent`, then pops the next top stack
    /// item as `child`, then attaches `child` as the left child of `parent`
    /// and pushes the updated `parent` back on the stack.
    Parent,

    /// Pops the top stack item as `child`, then pops the next top stack item
    /// as `parent`, then attaches `child` as the right child of `parent` and
    /// pushes the updated `parent` back on the stack.
    Child,
}

/// A selected piece of data about a single tree node, to be contained in a
/// `Push` operator in a proof.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Node {
    /// The hash of an entire unopened subtree.
    Hash(Hash),

    /// The hash of the node's key/value pair; the key and value themselves
    /// are not exposed.
    KVHash(Hash),

    /// The full key and value of the node.
    KV(Vec<u8>, Vec<u8>),
}
