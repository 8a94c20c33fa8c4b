mod fetch;
mod ref_walker;

pub use fetch::Fetch;
pub use ref_walker::RefWalker;

use super::{Link, Node};
use crate::error::Result;
use crate::owner::Owner;

/// Allows traversing `Node`s, fetching from the given source when traversing
/// to a pruned node, detaching children as they are traversed.
pub struct Walker<S>
where
    S: Fetch + Sized + Clone + Send,
{
    tree: Owner<Node>,
    source: S,
}

impl<S> Walker<S>
where
    S: Fetch + Sized + Clone + Send,
{
    /// Creates a `Walker` with the given tree and source.
    pub fn new(tree: Node, source: S) -> Self {
        Walker {
            tree: Owner::new(tree),
            source,
        }
    }

    /// Similar to `Node::detach`, but fetches from the backing data source
    /// if pruned. Returns a tuple containing the updated walker, and a
    /// walker possessing the child.
    ///
    /// # Safety
    /// The caller must reattach (or otherwise account for) the detached
    /// child before the tree is committed, or the child subtree is lost.
    pub unsafe fn detach(mut self, left: bool) -> Result<(Self, Option<Self>)> {
        let link = match self.tree.link(left) {
            None => return Ok((self, None)),
            Some(link) => link,
        };

        let child = if link.tree().is_some() {
            match self.tree.own_return(|t| t.detach(left)) {
                Some(child) => child,
                _ => unreachable!("Expected Some"),
            }
        } else {
            let link = self.tree.slot_mut(left).take();
            match link {
                Some(Link::Reference { .. }) => (),
                _ => unreachable!("Expected Some(Link::Reference)"),
            }
            self.source.fetch(&link.unwrap())?
        };

        let child = self.wrap(child);
        Ok((self, Some(child)))
    }

    /// Similar to `detach`, but panics if there is no child on the given
    /// side.
    ///
    /// # Safety
    /// Same contract as [`Walker::detach`].
    pub unsafe fn detach_expect(self, left: bool) -> Result<(Self, Self)> {
        let (walker, maybe_child) = self.detach(left)?;
        if let Some(child) = maybe_child {
            Ok((walker, child))
        } else {
            panic!(
                "Expected {} child, got None",
                super::side_to_str(left)
            );
        }
    }

    /// Detaches the child on the given side (fetching if necessary) and
    /// passes it into `f`, reattaching whatever `f` returns.
    pub fn walk<F, T>(self, left: bool, f: F) -> Result<Self>
    where
        F: FnOnce(Option<Self>) -> Result<Option<T>>,
        T: Into<Node>,
    {
        let (mut walker, maybe_child) = unsafe { self.detach(left)? };
        let new_child = f(maybe_child)?.map(|t| t.into());
        walker.tree.own(|t| t.attach(left, new_child));
        Ok(walker)
    }

    /// Like `walk`, but panics if there is no child on the given side.
    pub fn walk_expect<F, T>(self, left: bool, f: F) -> Result<Self>
    where
        F: FnOnce(Self) -> Result<Option<T>>,
        T: Into<Node>,
    {
        let (mut walker, child) = unsafe { self.detach_expect(left)? };
        let new_child = f(child)?.map(|t| t.into());
        walker.tree.own(|t| t.attach(left, new_child));
        Ok(walker)
    }

    /// Returns an immutable reference to the walked tree.
    pub fn tree(&self) -> &Node {
        &self.tree
    }

    /// Consumes the walker and returns the tree it was walking.
    pub fn into_inner(self) -> Node {
        self.tree.into_inner()
    }

    fn wrap(&self, tree: Node) -> Self {
        Walker::new(tree, self.source.clone())
    }

    /// Returns a clone of the walker's data source.
    pub fn clone_source(&self) -> S {
        self.source.clone()
    }

    /// Similar to `Node::attach`.
    pub fn attach<T>(mut self, left: bool, maybe_child: Option<T>) -> Self
    where
        T: Into<Node>,
    {
        self.tree
            .own(|t| t.attach(left, maybe_child.map(|t| t.into())));
        self
    }

    /// Similar to `Node::with_value`.
    pub fn with_value(mut self, value: Vec<u8>) -> Self {
        self.tree.own(|t| t.with_value(value));
        self
    }
}

impl<S> From<Walker<S>> for Node
where
    S: Fetch + Sized + Clone + Send,
{
    fn from(walker: Walker<S>) -> Node {
        walker.into_inner()
    }
}

#[cfg(test)]
mod test {
    use super::super::NoopCommit;
    use super::*;

    #[derive(Clone)]
    struct MockSource {}

    impl Fetch for MockSource {
        fn fetch(&self, link: &Link) -> Result<Node> {
            Ok(Node::new(link.key().to_vec(), b"foo".to_vec()))
        }
    }

    #[test]
    fn walk_modified() {
        let tree = Node::new(b"test".to_vec(), b"abc".to_vec())
            .attach(true, Some(Node::new(b"foo".to_vec(), b"bar".to_vec())));

        let source = MockSource {};
        let walker = Walker::new(tree, source);

        let walker = walker
            .walk(true, |child| -> Result<Option<Node>> {
                assert_eq!(child.expect("should have child").tree().key(), b"foo");
                Ok(None)
            })
            .expect("walk failed");
        assert!(walker.into_inner().child(true).is_none());
    }

    #[test]
    fn walk_stored() {
        let mut tree = Node::new(b"test".to_vec(), b"abc".to_vec())
            .attach(true, Some(Node::new(b"foo".to_vec(), b"bar".to_vec())));
        tree.commit(&mut NoopCommit {}, &MockSource {}, None)
            .expect("commit failed");

        let source = MockSource {};
        let walker = Walker::new(tree, source);

        let walker = walker
            .walk(true, |child| -> Result<Option<Node>> {
                assert_eq!(child.expect("should have child").tree().key(), b"foo");
                Ok(None)
            })
            .expect("walk failed");
        assert!(walker.into_inner().child(true).is_none());
    }

    #[test]
    fn walk_pruned() {
        let tree = Node::from_fields(
            b"test".to_vec(),
            b"abc".to_vec(),
            Default::default(),
            Default::default(),
            Some(Link::Reference {
                key: b"foo".to_vec(),
                height: 1,
            }),
            None,
            None,
        );

        let source = MockSource {};
        let walker = Walker::new(tree, source);

        let walker = walker
            .walk_expect(true, |child| -> Result<Option<Node>> {
                assert_eq!(child.tree().key(), b"foo");
                Ok(None)
            })
            .expect("walk failed");
        assert!(walker.into_inner().child(true).is_none());
    }

    #[test]
    fn walk_none() {
        let tree = Node::new(b"test".to_vec(), b"abc".to_vec());

        let source = MockSource {};
        let walker = Walker::new(tree, source);

        walker
            .walk(true, |child| -> Result<Option<Node>> {
                assert!(child.is_none());
                Ok(None)
            })
            .expect("walk failed");
    }
}
