use super::{node_hash, Fetch, Hash, Link, Node, NULL_HASH};
use crate::error::{Error, Result};

/// Consumer of finalized nodes during a commit. Implementations typically
/// stage each node's encoding into a backing-store transaction.
pub trait Commit {
    /// Called for every node whose record must be (re)written.
    fn write(&mut self, node: &Node) -> Result<()>;

    /// Decides whether to prune the node's children from memory after
    /// writing. Return value is `(prune_left, prune_right)`.
    fn prune(&self, _node: &Node) -> (bool, bool) {
        (true, true)
    }
}

/// A `Commit` which does nothing and retains all nodes in memory. Useful for
/// tests which work on in-memory trees.
pub struct NoopCommit {}

impl Commit for NoopCommit {
    fn write(&mut self, _node: &Node) -> Result<()> {
        Ok(())
    }

    fn prune(&self, _node: &Node) -> (bool, bool) {
        (false, false)
    }
}

impl Node {
    /// Finalizes modifications to the subtree: recurses into modified
    /// children bottom-up, recomputes stored hashes, refreshes each written
    /// node's parent back-reference, hands every rewritten node to the
    /// `Commit` object, and prunes children back to reference links where
    /// the committer asks for it.
    ///
    /// A modified node whose other child is still pruned needs that child's
    /// stored hash to recompute its own; `source` supplies it with one
    /// backing-store read.
    pub fn commit<C: Commit, S: Fetch>(
        &mut self,
        c: &mut C,
        source: &S,
        parent_key: Option<&[u8]>,
    ) -> Result<()> {
        if let Some(Link::Modified { .. }) = self.inner.left {
            if let Some(Link::Modified { mut tree }) = self.inner.left.take() {
                tree.commit(c, source, Some(self.key()))?;
                self.inner.left = Some(Link::Loaded { tree });
            } else {
                unreachable!()
            }
        }

        if let Some(Link::Modified { .. }) = self.inner.right {
            if let Some(Link::Modified { mut tree }) = self.inner.right.take() {
                tree.commit(c, source, Some(self.key()))?;
                self.inner.right = Some(Link::Loaded { tree });
            } else {
                unreachable!()
            }
        }

        let left_hash = self.committed_child_hash(true, source)?;
        let right_hash = self.committed_child_hash(false, source)?;
        self.inner.hash = node_hash(&left_hash, &right_hash, self.kv_hash());
        self.inner.parent_key = parent_key.map(|key| key.to_vec());

        c.write(self)?;

        let (prune_left, prune_right) = c.prune(self);
        if prune_left {
            self.inner.left = self.inner.left.take().map(Link::into_reference);
        }
        if prune_right {
            self.inner.right = self.inner.right.take().map(Link::into_reference);
        }

        Ok(())
    }

    fn committed_child_hash<S: Fetch>(&self, left: bool, source: &S) -> Result<Hash> {
        match self.link(left) {
            None => Ok(NULL_HASH),
            Some(Link::Loaded { tree }) => Ok(*tree.hash()),
            Some(link @ Link::Reference { .. }) => Ok(*source.fetch(link)?.hash()),
            Some(Link::Modified { .. }) => Err(Error::InvariantViolated(format!(
                "modified link survived commit at node {:?}",
                self.key()
            ))),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::tree::kv_hash;
    use crate::tree::PanicSource;

    #[test]
    fn commit_computes_hashes_bottom_up() {
        let mut tree = Node::new(vec![5], vec![5])
            .attach(true, Some(Node::new(vec![3], vec![3])))
            .attach(false, Some(Node::new(vec![7], vec![7])));
        tree.commit(&mut NoopCommit {}, &PanicSource {}, None)
            .expect("commit failed");

        let leaf_hash = |key: &[u8], value: &[u8]| {
            node_hash(&NULL_HASH, &NULL_HASH, &kv_hash(key, value))
        };
        let expected = node_hash(
            &leaf_hash(&[3], &[3]),
            &leaf_hash(&[7], &[7]),
            &kv_hash(&[5], &[5]),
        );
        assert_eq!(tree.hash(), &expected);
    }

    #[test]
    fn commit_refreshes_parent_keys() {
        let mut tree = Node::new(vec![5], vec![5])
            .attach(true, Some(Node::new(vec![3], vec![3])))
            .attach(false, Some(Node::new(vec![7], vec![7])));
        tree.commit(&mut NoopCommit {}, &PanicSource {}, None)
            .expect("commit failed");

        assert_eq!(tree.parent_key(), None);
        assert_eq!(
            tree.child(true).unwrap().parent_key(),
            Some(vec![5].as_slice())
        );
        assert_eq!(
            tree.child(false).unwrap().parent_key(),
            Some(vec![5].as_slice())
        );
    }

    #[test]
    fn commit_writes_every_modified_node() {
        struct Counter {
            written: Vec<Vec<u8>>,
        }
        impl Commit for Counter {
            fn write(&mut self, node: &Node) -> Result<()> {
                self.written.push(node.key().to_vec());
                Ok(())
            }

            fn prune(&self, _node: &Node) -> (bool, bool) {
                (false, false)
            }
        }

        let mut tree = Node::new(vec![5], vec![5])
            .attach(true, Some(Node::new(vec![3], vec![3])))
            .attach(false, Some(Node::new(vec![7], vec![7])));
        let mut committer = Counter { written: vec![] };
        tree.commit(&mut committer, &PanicSource {}, None)
            .expect("commit failed");

        // children first, then the root
        assert_eq!(committer.written, vec![vec![3], vec![7], vec![5]]);
    }

    #[test]
    fn prune_produces_references() {
        struct PruneAll {}
        impl Commit for PruneAll {
            fn write(&mut self, _node: &Node) -> Result<()> {
                Ok(())
            }
        }

        let mut tree = Node::new(vec![5], vec![5]).attach(true, Some(Node::new(vec![3], vec![3])));
        tree.commit(&mut PruneAll {}, &PanicSource {}, None)
            .expect("commit failed");
        assert!(tree.link(true).unwrap().is_reference());
    }
}
