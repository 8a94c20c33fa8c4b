use std::collections::LinkedList;
use std::fmt;

use Op::*;

use super::{Fetch, Link, Node, Walker};
use crate::error::{Error, Result};

/// An operation to be applied to a key in the store.
#[derive(Clone, PartialEq, Eq)]
pub enum Op {
    Put(Vec<u8>),
    Delete,
}

impl fmt::Debug for Op {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Put(value) => format!("Put({value:?})"),
                Delete => "Delete".to_string(),
            }
        )
    }
}

/// A single `(key, operation)` pair.
pub type BatchEntry<K> = (K, Op);

/// A mapping of keys and operations. Keys must be sorted and unique.
pub type Batch<K> = [BatchEntry<K>];

/// Keys removed from the tree during a batch, to be deleted from the backing
/// store at commit.
type DeletedKeys = LinkedList<Vec<u8>>;

/// A source of data which panics when called. Useful when creating a store
/// which always keeps the state in memory.
#[derive(Clone)]
pub struct PanicSource {}

impl Fetch for PanicSource {
    fn fetch(&self, _link: &Link) -> Result<Node> {
        unreachable!("'fetch' should not have been called")
    }
}

impl<S> Walker<S>
where
    S: Fetch + Sized + Clone + Send,
{
    /// Applies a batch of operations, possibly creating a new tree if
    /// `maybe_tree` is `None`. Returns the successor tree (if any remains)
    /// together with the keys of removed nodes.
    ///
    /// Keys in batch must be sorted and unique.
    pub fn apply_to<K: AsRef<[u8]> + Sync>(
        maybe_tree: Option<Self>,
        batch: &Batch<K>,
    ) -> Result<(Option<Node>, DeletedKeys)> {
        let (maybe_walker, deleted_keys) = if batch.is_empty() {
            (maybe_tree, LinkedList::new())
        } else {
            match maybe_tree {
                None => return Self::build(batch).map(|tree| (tree, LinkedList::new())),
                Some(tree) => tree.apply_sorted(batch)?,
            }
        };

        Ok((maybe_walker.map(|walker| walker.into_inner()), deleted_keys))
    }

    /// Builds a `Node` from a batch of operations. All operations must be
    /// `Put`s since there is nothing to delete yet.
    ///
    /// Keys in batch must be sorted and unique.
    fn build<K: AsRef<[u8]> + Sync>(batch: &Batch<K>) -> Result<Option<Node>> {
        if batch.is_empty() {
            return Ok(None);
        }

        let mid_index = batch.len() / 2;
        let (mid_key, mid_op) = &batch[mid_index];
        let mid_value = match mid_op {
            Delete => return Err(Error::NotFound("tried to delete non-existent key")),
            Put(value) => value,
        };

        // the tree being built is entirely in memory, so nothing can fetch
        let mid_tree = Node::new(mid_key.as_ref().to_vec(), mid_value.to_vec());
        let mid_walker = Walker::new(mid_tree, PanicSource {});
        Ok(mid_walker
            .recurse(batch, mid_index, true)?
            .0
            .map(|walker| walker.into_inner()))
    }

    /// Applies a batch of operations to an existing tree.
    ///
    /// Keys in batch must be sorted and unique.
    fn apply_sorted<K: AsRef<[u8]> + Sync>(
        self,
        batch: &Batch<K>,
    ) -> Result<(Option<Self>, DeletedKeys)> {
        // binary search to see if this node's key is in the batch, and to
        // split into left and right batches
        let search = batch.binary_search_by(|(key, _op)| key.as_ref().cmp(self.tree().key()));

        let tree = if let Ok(index) = search {
            // a key matches this node's key, apply op to this node
            match &batch[index].1 {
                Put(value) => self.with_value(value.to_vec()),
                Delete => {
                    let source = self.clone_source();
                    let wrap = |maybe_tree: Option<Node>| {
                        maybe_tree.map(|tree| Self::new(tree, source.clone()))
                    };
                    let key = self.tree().key().to_vec();

                    let maybe_walker = self.remove()?;
                    let (maybe_tree, mut deleted_keys) =
                        Self::apply_to(maybe_walker, &batch[..index])?;
                    let maybe_walker = wrap(maybe_tree);
                    let (maybe_tree, mut deleted_right) =
                        Self::apply_to(maybe_walker, &batch[index + 1..])?;

                    deleted_keys.append(&mut deleted_right);
                    deleted_keys.push_back(key);
                    return Ok((wrap(maybe_tree), deleted_keys));
                }
            }
        } else {
            self
        };

        let (mid, exclusive) = match search {
            Ok(index) => (index, true),
            Err(index) => (index, false),
        };

        tree.recurse(batch, mid, exclusive)
    }

    /// Recursively applies the left and right slices of the batch to the
    /// respective subtrees, then rebalances.
    ///
    /// The two slices address disjoint key ranges bounded by this node's
    /// key, and so do the two subtrees — the recursions share no node and
    /// run in parallel.
    fn recurse<K: AsRef<[u8]> + Sync>(
        self,
        batch: &Batch<K>,
        mid: usize,
        exclusive: bool,
    ) -> Result<(Option<Self>, DeletedKeys)> {
        let left_batch = &batch[..mid];
        let right_batch = if exclusive {
            &batch[mid + 1..]
        } else {
            &batch[mid..]
        };

        let mut deleted_keys = LinkedList::new();

        let tree = match (left_batch.is_empty(), right_batch.is_empty()) {
            (true, true) => self,

            (false, true) => self.walk(true, |maybe_left| {
                let (maybe_left, mut deleted) = Self::apply_to(maybe_left, left_batch)?;
                deleted_keys.append(&mut deleted);
                Ok(maybe_left)
            })?,

            (true, false) => self.walk(false, |maybe_right| {
                let (maybe_right, mut deleted) = Self::apply_to(maybe_right, right_batch)?;
                deleted_keys.append(&mut deleted);
                Ok(maybe_right)
            })?,

            (false, false) => {
                let (tree, maybe_left) = unsafe { self.detach(true)? };
                let (tree, maybe_right) = unsafe { tree.detach(false)? };

                let (left_res, right_res) = rayon::join(
                    move || Self::apply_to(maybe_left, left_batch),
                    move || Self::apply_to(maybe_right, right_batch),
                );
                let (maybe_left, mut deleted_left) = left_res?;
                let (maybe_right, mut deleted_right) = right_res?;
                deleted_keys.append(&mut deleted_left);
                deleted_keys.append(&mut deleted_right);

                tree.attach(true, maybe_left).attach(false, maybe_right)
            }
        };

        let tree = tree.maybe_balance()?;

        Ok((Some(tree), deleted_keys))
    }

    #[inline]
    fn balance_factor(&self) -> i8 {
        self.tree().balance_factor()
    }

    /// Checks if the node is unbalanced and if so, applies AVL tree rotations
    /// to rebalance it and its subtrees. Returns the root node of the
    /// balanced subtree.
    fn maybe_balance(self) -> Result<Self> {
        let balance_factor = self.balance_factor();
        if balance_factor.abs() <= 1 {
            return Ok(self);
        }

        let left = balance_factor < 0;

        // maybe do a double rotation, based on the child's balance factor
        let tree = self.walk_expect(left, |child| {
            if left == (child.balance_factor() > 0) {
                Ok(Some(child.rotate(!left)?))
            } else {
                Ok(Some(child))
            }
        })?;

        tree.rotate(left)
    }

    /// Applies an AVL tree rotation, a constant-time operation which only
    /// needs to swap pointers in order to rebalance a tree.
    fn rotate(self, left: bool) -> Result<Self> {
        unsafe {
            let (tree, child) = self.detach_expect(left)?;
            let (child, maybe_grandchild) = child.detach(!left)?;

            // attach grandchild to self
            let tree = tree.attach(left, maybe_grandchild).maybe_balance()?;

            // attach self to child, return child
            child.attach(!left, Some(tree)).maybe_balance()
        }
    }

    /// Removes the root node of the subtree. For nodes with two children,
    /// promotes the edge node of the taller child (ties break left), which
    /// minimizes follow-up rotations.
    pub fn remove(self) -> Result<Option<Self>> {
        let tree = self.tree();
        let has_left = tree.link(true).is_some();
        let has_right = tree.link(false).is_some();
        let left = tree.child_height(true) >= tree.child_height(false);

        let maybe_tree = unsafe {
            if has_left && has_right {
                // two children, promote edge of taller child
                let (tree, tall_child) = self.detach_expect(left)?;
                let (_, short_child) = tree.detach_expect(!left)?;
                Some(tall_child.promote_edge(!left, short_child)?)
            } else if has_left || has_right {
                // single child, promote it
                Some(self.detach_expect(left)?.1)
            } else {
                // no child
                None
            }
        };

        Ok(maybe_tree)
    }

    /// Splices the edge node of the subtree on the given side into the
    /// removed node's position, reparenting the other subtree under it.
    fn promote_edge(self, left: bool, attach: Self) -> Result<Self> {
        let (edge, maybe_child) = self.remove_edge(left)?;
        edge.attach(!left, maybe_child)
            .attach(left, Some(attach))
            .maybe_balance()
    }

    /// Detaches the extreme node on the given side of the subtree. Returns
    /// `(edge_node, remaining_subtree)`.
    fn remove_edge(self, left: bool) -> Result<(Self, Option<Self>)> {
        if self.tree().link(left).is_some() {
            // this node is not the edge, recurse
            let (tree, child) = unsafe { self.detach_expect(left)? };
            let (edge, maybe_child) = child.remove_edge(left)?;
            let tree = tree.attach(left, maybe_child).maybe_balance()?;
            Ok((edge, Some(tree)))
        } else {
            // this node is the edge, detach its child if present
            unsafe { self.detach(!left) }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_utils::{assert_tree_invariants, del_entry, make_tree_seq, put_entry};

    #[test]
    fn simple_insert() {
        let batch = [(b"foo2".to_vec(), Op::Put(b"bar2".to_vec()))];
        let tree = Node::new(b"foo".to_vec(), b"bar".to_vec());
        let (maybe_tree, deleted) =
            Walker::new(tree, PanicSource {}).apply_sorted(&batch).expect("apply errored");
        let walker = maybe_tree.expect("should be Some");
        assert_eq!(walker.tree().key(), b"foo");
        assert_eq!(walker.into_inner().child(false).unwrap().key(), b"foo2");
        assert!(deleted.is_empty());
    }

    #[test]
    fn simple_update() {
        let batch = [(b"foo".to_vec(), Op::Put(b"bar2".to_vec()))];
        let tree = Node::new(b"foo".to_vec(), b"bar".to_vec());
        let walker = Walker::new(tree, PanicSource {})
            .apply_sorted(&batch)
            .expect("apply errored")
            .0
            .expect("should be Some");
        assert_eq!(walker.tree().key(), b"foo");
        assert_eq!(walker.tree().value(), b"bar2");
        assert!(walker.tree().link(true).is_none());
        assert!(walker.tree().link(false).is_none());
    }

    #[test]
    fn simple_delete() {
        let batch = [(b"foo2".to_vec(), Op::Delete)];
        let tree = Node::new(b"foo".to_vec(), b"bar".to_vec())
            .attach(false, Some(Node::new(b"foo2".to_vec(), b"bar2".to_vec())));
        let (maybe_tree, deleted) = Walker::new(tree, PanicSource {})
            .apply_sorted(&batch)
            .expect("apply errored");
        let walker = maybe_tree.expect("should be Some");
        assert_eq!(walker.tree().key(), b"foo");
        assert_eq!(walker.tree().value(), b"bar");
        assert!(walker.tree().link(true).is_none());
        assert!(walker.tree().link(false).is_none());
        assert_eq!(deleted, LinkedList::from([b"foo2".to_vec()]));
    }

    #[test]
    fn delete_non_existent() {
        let batch = [(b"foo2".to_vec(), Op::Delete)];
        let tree = Node::new(b"foo".to_vec(), b"bar".to_vec());
        let result = Walker::new(tree, PanicSource {}).apply_sorted(&batch);
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[test]
    fn delete_only_node() {
        let batch = [(b"foo".to_vec(), Op::Delete)];
        let tree = Node::new(b"foo".to_vec(), b"bar".to_vec());
        let (maybe_tree, deleted) = Walker::new(tree, PanicSource {})
            .apply_sorted(&batch)
            .expect("apply errored");
        assert!(maybe_tree.is_none());
        assert_eq!(deleted, LinkedList::from([b"foo".to_vec()]));
    }

    #[test]
    fn delete_deep() {
        let tree = make_tree_seq(50);
        let batch = [del_entry(5)];
        let (maybe_tree, deleted) = Walker::new(tree, PanicSource {})
            .apply_sorted(&batch)
            .expect("apply errored");
        let walker = maybe_tree.expect("should be Some");
        assert_tree_invariants(walker.tree());
        assert_eq!(deleted.len(), 1);
    }

    #[test]
    fn delete_recursive() {
        let tree = make_tree_seq(50);
        let batch = [del_entry(29), del_entry(34)];
        let (maybe_tree, deleted) = Walker::new(tree, PanicSource {})
            .apply_sorted(&batch)
            .expect("apply errored");
        assert_tree_invariants(maybe_tree.expect("should be Some").tree());
        assert_eq!(deleted.len(), 2);
    }

    #[test]
    fn insert_and_delete_mixed() {
        let tree = make_tree_seq(10);
        let batch = [put_entry(500), del_entry(7), del_entry(9)];
        let mut batch = batch;
        batch.sort_by(|a, b| a.0.cmp(&b.0));
        let (maybe_tree, deleted) = Walker::new(tree, PanicSource {})
            .apply_sorted(&batch)
            .expect("apply errored");
        assert_tree_invariants(maybe_tree.expect("should be Some").tree());
        assert_eq!(deleted.len(), 2);
    }

    #[test]
    fn apply_empty_none() {
        let (maybe_tree, deleted) =
            Walker::<PanicSource>::apply_to::<Vec<u8>>(None, &[]).expect("apply_to failed");
        assert!(maybe_tree.is_none());
        assert!(deleted.is_empty());
    }

    #[test]
    fn build_from_batch() {
        let batch: Vec<_> = (0..100u64).map(put_entry).collect();
        let (maybe_tree, _) =
            Walker::<PanicSource>::apply_to(None, &batch).expect("apply_to failed");
        let tree = maybe_tree.expect("should be Some");
        assert_tree_invariants(&tree);
    }
}
