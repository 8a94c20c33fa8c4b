//! Stack-based execution of proofs.

use super::{Node, Op};
use crate::error::{Error, Result};
use crate::tree::{kv_hash, node_hash, Hash, NULL_HASH};

/// Contains a tree's child node and its hash. The hash can always be assumed
/// to be up-to-date.
#[derive(Debug)]
pub struct Child {
    /// The child node
    pub tree: Box<Tree>,
    /// Hash of the child subtree
    pub hash: Hash,
}

/// A sparse binary tree representing the select subset of a store that a
/// proof commits to. Subtrees the proof does not open are collapsed into
/// their hashes.
#[derive(Debug)]
pub struct Tree {
    /// The node's exposed data
    pub node: Node,
    /// Left child, if opened by the proof
    pub left: Option<Child>,
    /// Right child, if opened by the proof
    pub right: Option<Child>,
}

impl From<Node> for Tree {
    /// Creates a childless tree with the target node as the `node` field.
    fn from(node: Node) -> Self {
        Tree {
            node,
            left: None,
            right: None,
        }
    }
}

impl PartialEq for Tree {
    /// Checks equality for the root hashes of the two trees.
    fn eq(&self, other: &Self) -> bool {
        self.hash() == other.hash()
    }
}

impl Tree {
    /// Gets or computes the hash for this tree node.
    pub fn hash(&self) -> Hash {
        fn compute_hash(tree: &Tree, kv_hash: Hash) -> Hash {
            node_hash(&tree.child_hash(true), &tree.child_hash(false), &kv_hash)
        }

        match &self.node {
            Node::Hash(hash) => *hash,
            Node::KVHash(kv_hash) => compute_hash(self, *kv_hash),
            Node::KV(key, value) => {
                let kv_hash = kv_hash(key.as_slice(), value.as_slice());
                compute_hash(self, kv_hash)
            }
        }
    }

    /// Returns an immutable reference to the child on the given side, if any.
    pub fn child(&self, left: bool) -> Option<&Child> {
        if left {
            self.left.as_ref()
        } else {
            self.right.as_ref()
        }
    }

    /// Returns a mutable reference to the child on the given side, if any.
    fn child_mut(&mut self, left: bool) -> &mut Option<Child> {
        if left {
            &mut self.left
        } else {
            &mut self.right
        }
    }

    /// Attaches the child to the `Tree`'s given side. Fails if there is
    /// already a child attached to this side.
    fn attach(&mut self, left: bool, child: Tree) -> Result<()> {
        if self.child(left).is_some() {
            return Err(Error::ProofChildOverwrite(if left {
                "tried to attach left child, but it is already present"
            } else {
                "tried to attach right child, but it is already present"
            }));
        }

        let hash = child.hash();
        let tree = Box::new(child);
        *self.child_mut(left) = Some(Child { tree, hash });

        Ok(())
    }

    /// Returns the already-computed hash for this tree node's child on the
    /// given side, if any. If there is no child, returns the null hash
    /// (zero-filled).
    #[inline]
    fn child_hash(&self, left: bool) -> Hash {
        self.child(left).map_or(NULL_HASH, |c| c.hash)
    }

    /// Consumes the tree node, calculates its hash, and returns a
    /// `Node::Hash` variant.
    fn into_hash(self) -> Tree {
        Node::Hash(self.hash()).into()
    }

    /// Consumes the `Tree` and does an in-order traversal over all the nodes
    /// in the tree, calling `visit_node` for each.
    pub fn visit_nodes<F: FnMut(Node)>(mut self, visit_node: &mut F) {
        if let Some(child) = self.left.take() {
            child.tree.visit_nodes(visit_node);
        }

        let maybe_right_child = self.right.take();
        visit_node(self.node);

        if let Some(child) = maybe_right_child {
            child.tree.visit_nodes(visit_node);
        }
    }
}

/// Executes a proof by stepping through its operators, modifying the
/// verification stack as it goes. The final stack item is returned.
///
/// If the `collapse` option is set to `true`, attached children are hashed
/// and pruned from memory during execution, keeping memory usage at
/// `O(stack depth)`. If `false`, the returned `Tree` will contain the entire
/// subtree contained in the proof.
///
/// `visit_node` is called once for every push operation in the proof, in key
/// order. If `visit_node` returns an `Err` result, execution halts and
/// `execute` returns the error.
pub fn execute<I, F>(ops: I, collapse: bool, mut visit_node: F) -> Result<Tree>
where
    I: IntoIterator<Item = Result<Op>>,
    F: FnMut(&Node) -> Result<()>,
{
    let mut stack: Vec<Tree> = Vec::with_capacity(32);
    let mut maybe_last_key = None;

    fn try_pop(stack: &mut Vec<Tree>) -> Result<Tree> {
        match stack.pop() {
            None => Err(Error::ProofUnderflow),
            Some(tree) => Ok(tree),
        }
    }

    for op in ops {
        match op? {
            Op::Parent => {
                let (mut parent, child) = (try_pop(&mut stack)?, try_pop(&mut stack)?);
                parent.attach(true, if collapse { child.into_hash() } else { child })?;
                stack.push(parent);
            }
            Op::Child => {
                let (child, mut parent) = (try_pop(&mut stack)?, try_pop(&mut stack)?);
                parent.attach(false, if collapse { child.into_hash() } else { child })?;
                stack.push(parent);
            }
            Op::Push(node) => {
                if let Node::KV(key, _) = &node {
                    // keys must always increase
                    if let Some(last_key) = &maybe_last_key {
                        if key <= last_key {
                            return Err(Error::InvalidProof(
                                "incorrect key ordering in proof".into(),
                            ));
                        }
                    }

                    maybe_last_key = Some(key.clone());
                }

                visit_node(&node)?;

                let tree: Tree = node.into();
                stack.push(tree);
            }
        }
    }

    if stack.len() != 1 {
        return Err(Error::ProofUnfinished(stack.len()));
    }

    Ok(stack.pop().unwrap())
}

/// Checks the reconstructed root hash against the expected one.
pub(crate) fn check_root(root: &Tree, expected_hash: Hash) -> Result<()> {
    let actual = root.hash();
    if actual != expected_hash {
        return Err(Error::ProofRootMismatch {
            expected: expected_hash,
            actual,
        });
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    fn make_7_node_prooftree() -> Tree {
        let make_node = |i| -> Tree { Node::KV(vec![i], vec![]).into() };

        let mut tree = make_node(3);
        let mut left = make_node(1);
        left.attach(true, make_node(0)).unwrap();
        left.attach(false, make_node(2)).unwrap();
        let mut right = make_node(5);
        right.attach(true, make_node(4)).unwrap();
        right.attach(false, make_node(6)).unwrap();
        tree.attach(true, left).unwrap();
        tree.attach(false, right).unwrap();

        tree
    }

    #[test]
    fn visit_nodes_in_order() {
        let tree = make_7_node_prooftree();

        let mut visited = vec![];
        tree.visit_nodes(&mut |node| match node {
            Node::KV(key, _) => visited.push(key[0]),
            _ => unreachable!(),
        });
        assert_eq!(visited, vec![0, 1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn execute_underflow() {
        let ops = [Ok(Op::Parent)];
        let result = execute(ops, true, |_| Ok(()));
        assert!(matches!(result, Err(Error::ProofUnderflow)));
    }

    #[test]
    fn execute_unfinished() {
        let ops = [
            Ok(Op::Push(Node::KV(vec![1], vec![1]))),
            Ok(Op::Push(Node::KV(vec![2], vec![2]))),
        ];
        let result = execute(ops, true, |_| Ok(()));
        assert!(matches!(result, Err(Error::ProofUnfinished(2))));
    }

    #[test]
    fn execute_child_overwrite() {
        let ops = [
            Ok(Op::Push(Node::KVHash([1; 32]))),
            Ok(Op::Push(Node::KVHash([2; 32]))),
            Ok(Op::Parent),
            Ok(Op::Push(Node::KVHash([3; 32]))),
            Ok(Op::Child),
            Ok(Op::Push(Node::KVHash([4; 32]))),
            Ok(Op::Child),
        ];
        let result = execute(ops, true, |_| Ok(()));
        assert!(matches!(result, Err(Error::ProofChildOverwrite(_))));
    }

    #[test]
    fn execute_key_ordering() {
        let ops = [
            Ok(Op::Push(Node::KV(vec![2], vec![2]))),
            Ok(Op::Push(Node::KV(vec![1], vec![1]))),
        ];
        let result = execute(ops, true, |_| Ok(()));
        assert!(matches!(result, Err(Error::InvalidProof(_))));
    }

    #[test]
    fn execute_single_node() {
        let tree = execute(
            [Ok(Op::Push(Node::KV(vec![1], vec![2])))],
            true,
            |_| Ok(()),
        )
        .expect("execute failed");
        let expected = node_hash(
            &NULL_HASH,
            &NULL_HASH,
            &kv_hash(vec![1].as_slice(), vec![2].as_slice()),
        );
        assert_eq!(tree.hash(), expected);
    }
}
