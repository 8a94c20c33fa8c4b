use super::Node;

/// Represents a reference to a child tree node. Links may or may not contain
/// the child's [`Node`] instance (storing its key and subtree height if not).
pub enum Link {
    /// A child which has been pruned from memory. Only its key and subtree
    /// height are retained — exactly the fields the parent's stored record
    /// carries. The child node can always be fetched from the backing store
    /// by its key when necessary.
    Reference {
        /// Key of the referenced node
        key: Vec<u8>,
        /// Height of the referenced subtree (1 for a leaf)
        height: u8,
    },

    /// A child which has been modified since the last commit. Its stored
    /// hash is stale until the next commit recomputes it.
    Modified {
        /// The child node
        tree: Node,
    },

    /// A child which is retained in memory and whose stored hash is
    /// up-to-date.
    Loaded {
        /// The child node
        tree: Node,
    },
}

impl Link {
    /// Creates a `Link::Modified` from the given node.
    #[inline]
    pub fn from_modified_tree(tree: Node) -> Self {
        Link::Modified { tree }
    }

    /// Creates a `Link::Modified` from the given node, if any. If `None`,
    /// returns `None`.
    pub fn maybe_from_modified_tree(maybe_tree: Option<Node>) -> Option<Self> {
        maybe_tree.map(Link::from_modified_tree)
    }

    /// Returns `true` if the link is of the `Link::Reference` variant.
    #[inline]
    pub fn is_reference(&self) -> bool {
        matches!(self, Link::Reference { .. })
    }

    /// Returns `true` if the link is of the `Link::Modified` variant.
    #[inline]
    pub fn is_modified(&self) -> bool {
        matches!(self, Link::Modified { .. })
    }

    /// Returns `true` if the link is of the `Link::Loaded` variant.
    #[inline]
    pub fn is_stored(&self) -> bool {
        matches!(self, Link::Loaded { .. })
    }

    /// Returns the key of the node referenced by this link, as a slice.
    #[inline]
    pub fn key(&self) -> &[u8] {
        match self {
            Link::Reference { key, .. } => key.as_slice(),
            Link::Modified { tree } => tree.key(),
            Link::Loaded { tree } => tree.key(),
        }
    }

    /// Returns the `Node` instance referenced by the link, if it is retained
    /// in memory.
    #[inline]
    pub fn tree(&self) -> Option<&Node> {
        match self {
            Link::Reference { .. } => None,
            Link::Modified { tree } => Some(tree),
            Link::Loaded { tree } => Some(tree),
        }
    }

    /// Returns the height of the subtree referenced by the link.
    #[inline]
    pub fn height(&self) -> u8 {
        match self {
            Link::Reference { height, .. } => *height,
            Link::Modified { tree } => tree.height(),
            Link::Loaded { tree } => tree.height(),
        }
    }

    /// Consumes the link and converts to variant `Link::Reference`. Panics if
    /// the link is of variant `Link::Modified`, since its hash has not been
    /// recomputed yet and pruning it would lose the pending change.
    #[inline]
    pub fn into_reference(self) -> Self {
        match self {
            Link::Reference { .. } => self,
            Link::Modified { .. } => panic!("Cannot prune Modified tree"),
            Link::Loaded { tree } => {
                let height = tree.height();
                Link::Reference {
                    key: tree.take_key(),
                    height,
                }
            }
        }
    }
}
