use super::super::{Link, Node};
use super::Fetch;
use crate::error::Result;

/// Allows read-only traversal of a `Node`, fetching from the given source
/// when traversing to a pruned node, detaching nothing. Used by the proof
/// generator, which needs to materialize paths without restructuring the
/// tree.
pub struct RefWalker<'a, S>
where
    S: Fetch + Sized + Clone,
{
    tree: &'a mut Node,
    source: S,
}

impl<'a, S> RefWalker<'a, S>
where
    S: Fetch + Sized + Clone,
{
    /// Creates a `RefWalker` with the given tree and source.
    pub fn new(tree: &'a mut Node, source: S) -> Self {
        RefWalker { tree, source }
    }

    /// Returns an immutable reference to the walked tree.
    pub fn tree(&self) -> &Node {
        self.tree
    }

    /// Traverses to the child on the given side (if any), fetching from the
    /// source and upgrading the link if the child is pruned.
    pub fn walk(&mut self, left: bool) -> Result<Option<RefWalker<S>>> {
        match self.tree.link(left) {
            None => return Ok(None),
            Some(Link::Modified { .. }) => {
                panic!("Cannot traverse Link::Modified")
            }
            Some(Link::Reference { .. }) => {
                self.tree.load(left, &self.source)?;
            }
            Some(Link::Loaded { .. }) => {}
        }

        let source = self.source.clone();
        Ok(self
            .tree
            .child_mut(left)
            .map(move |tree| RefWalker { tree, source }))
    }

    /// Returns the stored hash of the subtree on the given side, fetching
    /// the child record if it is pruned. Returns `None` if there is no
    /// child.
    pub fn child_hash(&mut self, left: bool) -> Result<Option<crate::tree::Hash>> {
        match self.tree.link(left) {
            None => Ok(None),
            Some(Link::Modified { .. }) => panic!("Cannot read hash of Link::Modified"),
            Some(Link::Loaded { tree }) => Ok(Some(*tree.hash())),
            Some(Link::Reference { .. }) => {
                self.tree.load(left, &self.source)?;
                Ok(self.tree.child(left).map(|tree| *tree.hash()))
            }
        }
    }
}
