#[cfg(feature = "full")]
mod commit;
#[cfg(feature = "full")]
mod debug;
#[cfg(feature = "full")]
mod encoding;
mod hash;
#[cfg(feature = "full")]
mod kv;
#[cfg(feature = "full")]
mod link;
#[cfg(feature = "full")]
mod ops;
#[cfg(feature = "full")]
mod walk;

#[cfg(feature = "full")]
use std::cmp::max;

pub use hash::{hash, kv_hash, node_hash, Hash, HASH_LENGTH, NULL_HASH};

#[cfg(feature = "full")]
pub use commit::{Commit, NoopCommit};
#[cfg(feature = "full")]
pub use kv::KV;
#[cfg(feature = "full")]
pub use link::Link;
#[cfg(feature = "full")]
pub use ops::{Batch, BatchEntry, Op, PanicSource};
#[cfg(feature = "full")]
pub use walk::{Fetch, RefWalker, Walker};

/// The fields of the [`Node`] type, stored on the heap.
#[cfg(feature = "full")]
pub struct NodeInner {
    pub(crate) kv: KV,
    pub(crate) hash: Hash,
    pub(crate) left: Option<Link>,
    pub(crate) right: Option<Link>,
    pub(crate) parent_key: Option<Vec<u8>>,
}

/// A node of the Merkle AVL tree together with the subtree hanging off it.
///
/// Inner fields are stored on the heap so that nodes can recursively link to
/// each other, and so nodes can be detached from their parents and
/// reattached without moving the allocation.
///
/// The `hash` field is the node's stored commitment
/// (`H(left ∥ right ∥ kv_hash)`); it goes stale while the node sits under a
/// [`Link::Modified`] and is recomputed at commit time. The `parent_key`
/// field is likewise refreshed by the committing ancestor, so persisted
/// records always carry a correct parent back-reference.
#[cfg(feature = "full")]
pub struct Node {
    inner: Box<NodeInner>,
}

#[cfg(feature = "full")]
impl Node {
    /// Creates a new leaf `Node` with the given key and value and no
    /// children. Both the kv hash and the node hash are computed, so a fresh
    /// leaf is immediately consistent.
    pub fn new(key: Vec<u8>, value: Vec<u8>) -> Self {
        let kv = KV::new(key, value);
        let hash = node_hash(&NULL_HASH, &NULL_HASH, kv.hash());
        Node {
            inner: Box::new(NodeInner {
                kv,
                hash,
                left: None,
                right: None,
                parent_key: None,
            }),
        }
    }

    /// Creates a `Node` by supplying all raw struct fields (mainly useful for
    /// testing and decoding). Hashes and links are not checked for
    /// consistency.
    pub fn from_fields(
        key: Vec<u8>,
        value: Vec<u8>,
        kv_hash: Hash,
        hash: Hash,
        left: Option<Link>,
        right: Option<Link>,
        parent_key: Option<Vec<u8>>,
    ) -> Self {
        Node {
            inner: Box::new(NodeInner {
                kv: KV::from_fields(key, value, kv_hash),
                hash,
                left,
                right,
                parent_key,
            }),
        }
    }

    /// Returns the node's key as a slice.
    #[inline]
    pub fn key(&self) -> &[u8] {
        self.inner.kv.key()
    }

    /// Consumes the node and returns its key without cloning.
    #[inline]
    pub fn take_key(self) -> Vec<u8> {
        self.inner.kv.take_key()
    }

    /// Returns the node's value as a slice.
    #[inline]
    pub fn value(&self) -> &[u8] {
        self.inner.kv.value()
    }

    /// Returns the hash of the node's key/value pair.
    #[inline]
    pub fn kv_hash(&self) -> &Hash {
        self.inner.kv.hash()
    }

    /// Returns the node's stored hash. Only valid for committed nodes — the
    /// field is stale while the node sits under a modified link.
    #[inline]
    pub fn hash(&self) -> &Hash {
        &self.inner.hash
    }

    /// Returns the key of this node's parent, if it has one. Refreshed at
    /// commit time; the root has no parent.
    #[inline]
    pub fn parent_key(&self) -> Option<&[u8]> {
        self.inner.parent_key.as_deref()
    }

    /// Returns a reference to the link on the given side, if any.
    #[inline]
    pub fn link(&self, left: bool) -> Option<&Link> {
        if left {
            self.inner.left.as_ref()
        } else {
            self.inner.right.as_ref()
        }
    }

    /// Returns a reference to the child node on the given side, if it is
    /// retained in memory.
    #[inline]
    pub fn child(&self, left: bool) -> Option<&Self> {
        match self.link(left) {
            None => None,
            Some(link) => link.tree(),
        }
    }

    /// Returns a mutable reference to the child node on the given side, if it
    /// is retained in memory.
    #[inline]
    pub fn child_mut(&mut self, left: bool) -> Option<&mut Self> {
        match self.slot_mut(left).as_mut() {
            None => None,
            Some(Link::Reference { .. }) => None,
            Some(Link::Modified { tree }) => Some(tree),
            Some(Link::Loaded { tree }) => Some(tree),
        }
    }

    /// Returns the height of the child subtree on the given side, or 0 if
    /// there is no child.
    #[inline]
    pub fn child_height(&self, left: bool) -> u8 {
        self.link(left).map_or(0, |link| link.height())
    }

    /// Returns `(left_height, right_height)`.
    #[inline]
    pub fn child_heights(&self) -> (u8, u8) {
        (self.child_height(true), self.child_height(false))
    }

    /// Returns the height of this subtree. A lone node has height 1.
    #[inline]
    pub fn height(&self) -> u8 {
        1 + max(self.child_height(true), self.child_height(false))
    }

    /// Returns the balance factor: right height minus left height.
    #[inline]
    pub fn balance_factor(&self) -> i8 {
        let left_height = self.child_height(true) as i8;
        let right_height = self.child_height(false) as i8;
        right_height - left_height
    }

    /// Attaches the child (if any) to the node on the given side, creating a
    /// `Link::Modified`.
    ///
    /// Panics if there is already a child on the given side.
    #[inline]
    pub fn attach(mut self, left: bool, maybe_child: Option<Self>) -> Self {
        debug_assert_ne!(
            Some(self.key()),
            maybe_child.as_ref().map(|c| c.key()),
            "Tried to attach tree with same key"
        );

        let slot = self.slot_mut(left);

        assert!(
            slot.is_none(),
            "Tried to attach to {} tree slot, but it is already Some",
            side_to_str(left)
        );

        *slot = Link::maybe_from_modified_tree(maybe_child);

        self
    }

    /// Detaches the child on the given side (if it is retained in memory) and
    /// returns `(node, maybe_child)`. A pruned child detaches as `None`; use
    /// [`Walker`] to fetch it through a data source instead.
    #[inline]
    pub fn detach(mut self, left: bool) -> (Self, Option<Self>) {
        let maybe_child = match self.slot_mut(left).take() {
            None => None,
            Some(Link::Reference { .. }) => None,
            Some(Link::Modified { tree }) => Some(tree),
            Some(Link::Loaded { tree }) => Some(tree),
        };

        (self, maybe_child)
    }

    /// Detaches the child on the given side and passes it into `f`, which
    /// must return a new child (either the same child, a new child to take
    /// its place, or `None` to explicitly keep the slot empty).
    #[inline]
    pub fn walk<F>(self, left: bool, f: F) -> Self
    where
        F: FnOnce(Option<Self>) -> Option<Self>,
    {
        let (tree, maybe_child) = self.detach(left);
        tree.attach(left, f(maybe_child))
    }

    /// Returns a mutable reference to the child slot for the given side.
    #[inline]
    pub(crate) fn slot_mut(&mut self, left: bool) -> &mut Option<Link> {
        if left {
            &mut self.inner.left
        } else {
            &mut self.inner.right
        }
    }

    /// Replaces the node's value (recomputing the kv hash) and returns the
    /// modified node.
    #[inline]
    pub fn with_value(mut self, value: Vec<u8>) -> Self {
        self.inner.kv = self.inner.kv.with_value(value);
        self
    }

    /// Fetches the pruned child on the given side using the given data
    /// source, upgrading the link from `Link::Reference` to `Link::Loaded`.
    #[inline]
    pub fn load<S: Fetch>(&mut self, left: bool, source: &S) -> crate::error::Result<()> {
        let slot = self.slot_mut(left);
        match slot {
            Some(link @ Link::Reference { .. }) => {
                let tree = source.fetch(link)?;
                debug_assert_eq!(tree.key(), link.key());
                *slot = Some(Link::Loaded { tree });
                Ok(())
            }
            Some(_) => Ok(()),
            None => Err(crate::error::Error::InvariantViolated(format!(
                "no {} child to load",
                side_to_str(left)
            ))),
        }
    }
}

#[cfg(feature = "full")]
pub(crate) fn side_to_str(left: bool) -> &'static str {
    if left {
        "left"
    } else {
        "right"
    }
}
