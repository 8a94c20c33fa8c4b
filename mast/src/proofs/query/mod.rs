//! Proof generation for key sets and key ranges, and the matching
//! verification entry points.

#[cfg(feature = "full")]
use std::collections::LinkedList;

use std::cmp::{max, min, Ordering};
use std::collections::BTreeSet;
use std::ops::{Range, RangeInclusive};

use super::tree::{check_root, execute};
use super::{Decoder, Node, Op};
use crate::error::{Error, Result};
use crate::tree::Hash;
#[cfg(feature = "full")]
use crate::tree::{Fetch, RefWalker};

/// `Query` represents one or more keys or ranges of keys, which can be used
/// to resolve a proof which will include all of the requested values.
#[derive(Debug, Default)]
pub struct Query {
    items: BTreeSet<QueryItem>,
}

impl Query {
    /// Creates a new query which contains no items.
    pub fn new() -> Self {
        Default::default()
    }

    /// Number of non-overlapping items in the query.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the query contains no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Adds an individual key to the query, so that its value (or its
    /// absence) in the tree will be included in the resulting proof.
    ///
    /// If the key or a range including the key already exists in the query,
    /// this will have no effect.
    pub fn insert_key(&mut self, key: Vec<u8>) {
        self.items.insert(QueryItem::Key(key));
    }

    /// Adds a range to the query, so that all the entries in the tree with
    /// keys in the range will be included in the resulting proof.
    pub fn insert_range(&mut self, range: Range<Vec<u8>>) {
        self.insert_item(QueryItem::Range(range));
    }

    /// Adds an inclusive range to the query, so that all the entries in the
    /// tree with keys in the range will be included in the resulting proof.
    pub fn insert_range_inclusive(&mut self, range: RangeInclusive<Vec<u8>>) {
        self.insert_item(QueryItem::RangeInclusive(range));
    }

    /// Adds the `QueryItem` to the query, first checking to see if it
    /// collides with any existing ranges or keys. All colliding items will
    /// be removed then merged together so that the query includes the
    /// minimum number of items (with no items covering any duplicate parts
    /// of keyspace) while still including every key or range that has been
    /// added to the query.
    pub fn insert_item(&mut self, mut item: QueryItem) {
        // since `QueryItem::eq` considers items equal if they collide at all
        // (including keys within ranges or ranges which partially overlap),
        // `items.take` will remove the first item which collides
        while let Some(existing) = self.items.take(&item) {
            item = item.merge(existing);
        }

        self.items.insert(item);
    }
}

impl<Q: Into<QueryItem>> From<Vec<Q>> for Query {
    fn from(other: Vec<Q>) -> Self {
        let items = other.into_iter().map(Into::into).collect();
        Query { items }
    }
}

impl From<Query> for Vec<QueryItem> {
    fn from(q: Query) -> Vec<QueryItem> {
        q.into_iter().collect()
    }
}

impl IntoIterator for Query {
    type Item = QueryItem;
    type IntoIter = <BTreeSet<QueryItem> as IntoIterator>::IntoIter;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

/// A `QueryItem` represents a key or range of keys to be included in a
/// proof.
#[derive(Clone, Debug)]
pub enum QueryItem {
    Key(Vec<u8>),
    Range(Range<Vec<u8>>),
    RangeInclusive(RangeInclusive<Vec<u8>>),
}

impl QueryItem {
    /// The least key the item covers.
    pub fn lower_bound(&self) -> &[u8] {
        match self {
            QueryItem::Key(key) => key.as_slice(),
            QueryItem::Range(range) => range.start.as_ref(),
            QueryItem::RangeInclusive(range) => range.start().as_ref(),
        }
    }

    /// The greatest key the item covers, and whether that bound is
    /// inclusive.
    pub fn upper_bound(&self) -> (&[u8], bool) {
        match self {
            QueryItem::Key(key) => (key.as_slice(), true),
            QueryItem::Range(range) => (range.end.as_ref(), false),
            QueryItem::RangeInclusive(range) => (range.end().as_ref(), true),
        }
    }

    /// Whether the item covers the given key.
    pub fn contains(&self, key: &[u8]) -> bool {
        let (bound, inclusive) = self.upper_bound();
        key >= self.lower_bound() && (key < bound || (key == bound && inclusive))
    }

    fn merge(self, other: QueryItem) -> QueryItem {
        let start = min(self.lower_bound(), other.lower_bound()).to_vec();
        let end = max(self.upper_bound(), other.upper_bound());
        if end.1 {
            QueryItem::RangeInclusive(RangeInclusive::new(start, end.0.to_vec()))
        } else {
            QueryItem::Range(Range {
                start,
                end: end.0.to_vec(),
            })
        }
    }
}

impl PartialEq for QueryItem {
    fn eq(&self, other: &QueryItem) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueryItem {}

impl Ord for QueryItem {
    /// Items compare equal whenever they collide at all, so that a `BTreeSet`
    /// of items can find overlaps via `take`.
    fn cmp(&self, other: &QueryItem) -> Ordering {
        let cmp_lu = self.lower_bound().cmp(other.upper_bound().0);
        let cmp_ul = self.upper_bound().0.cmp(other.lower_bound());
        let self_inclusive = self.upper_bound().1;
        let other_inclusive = other.upper_bound().1;

        match (cmp_lu, cmp_ul) {
            (Ordering::Less, Ordering::Less) => Ordering::Less,
            (Ordering::Less, Ordering::Equal) => match self_inclusive {
                true => Ordering::Equal,
                false => Ordering::Less,
            },
            (Ordering::Less, Ordering::Greater) => Ordering::Equal,
            (Ordering::Equal, _) => match other_inclusive {
                true => Ordering::Equal,
                false => Ordering::Greater,
            },
            (Ordering::Greater, _) => Ordering::Greater,
        }
    }
}

impl PartialOrd for QueryItem {
    fn partial_cmp(&self, other: &QueryItem) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl From<Vec<u8>> for QueryItem {
    fn from(key: Vec<u8>) -> Self {
        QueryItem::Key(key)
    }
}

#[cfg(feature = "full")]
impl<'a, S> RefWalker<'a, S>
where
    S: Fetch + Sized + Clone,
{
    /// Creates a `Node::KV` from the key/value pair of the walked node.
    pub(crate) fn to_kv_node(&self) -> Node {
        Node::KV(self.tree().key().to_vec(), self.tree().value().to_vec())
    }

    /// Creates a `Node::KVHash` from the hash of the key/value pair of the
    /// walked node.
    pub(crate) fn to_kvhash_node(&self) -> Node {
        Node::KVHash(*self.tree().kv_hash())
    }

    /// Generates a proof for the list of queried items. Returns a tuple
    /// containing the generated proof operators, and a tuple representing
    /// whether any queried keys fell short of the left edge or past the
    /// right edge of this subtree, respectively.
    pub(crate) fn create_proof(
        &mut self,
        query: &[QueryItem],
    ) -> Result<(LinkedList<Op>, (bool, bool))> {
        let node_key = QueryItem::Key(self.tree().key().to_vec());
        let search = query.binary_search_by(|key| key.cmp(&node_key));

        let (left_items, right_items) = match search {
            Ok(index) => {
                let item = &query[index];
                let left_bound = item.lower_bound();
                let right_bound = item.upper_bound().0;

                // if the item is a range starting before this node's key,
                // include it in the left child's query
                let left_query = if left_bound < self.tree().key() {
                    &query[..=index]
                } else {
                    &query[..index]
                };

                // if the item is a range ending after this node's key,
                // include it in the right child's query
                let right_query = if right_bound > self.tree().key() {
                    &query[index..]
                } else {
                    &query[index + 1..]
                };

                (left_query, right_query)
            }
            Err(index) => (&query[..index], &query[index..]),
        };

        let (mut proof, left_absence) = self.create_child_proof(true, left_items)?;
        let (mut right_proof, right_absence) = self.create_child_proof(false, right_items)?;

        let (has_left, has_right) = (!proof.is_empty(), !right_proof.is_empty());

        proof.push_back(match search {
            Ok(_) => Op::Push(self.to_kv_node()),
            Err(_) => {
                if left_absence.1 || right_absence.0 {
                    Op::Push(self.to_kv_node())
                } else {
                    Op::Push(self.to_kvhash_node())
                }
            }
        });

        if has_left {
            proof.push_back(Op::Parent);
        }

        if has_right {
            proof.append(&mut right_proof);
            proof.push_back(Op::Child);
        }

        Ok((proof, (left_absence.0, right_absence.1)))
    }

    /// Similar to `create_proof`. Recurses into the child on the given side
    /// and generates a proof for the queried items.
    fn create_child_proof(
        &mut self,
        left: bool,
        query: &[QueryItem],
    ) -> Result<(LinkedList<Op>, (bool, bool))> {
        Ok(if !query.is_empty() {
            if let Some(mut child) = self.walk(left)? {
                child.create_proof(query)?
            } else {
                (LinkedList::new(), (true, true))
            }
        } else if let Some(hash) = self.child_hash(left)? {
            let mut proof = LinkedList::new();
            proof.push_back(Op::Push(Node::Hash(hash)));
            (proof, (false, false))
        } else {
            (LinkedList::new(), (false, false))
        })
    }
}

/// Verifies the encoded proof against the given list of queried keys and the
/// expected root hash.
///
/// Every key in `keys` is checked to either have a key/value pair in the
/// proof, or to have its absence in the tree proven.
///
/// Returns `Err` if the proof is invalid, or a list of proven values
/// associated with `keys`. Keys proven to be absent in the tree will have an
/// entry of `None`, keys that have a proven value will have an entry of
/// `Some(value)`.
///
/// `keys` must be sorted and unique.
pub fn verify_keys(
    bytes: &[u8],
    keys: &[Vec<u8>],
    expected_hash: Hash,
) -> Result<Vec<Option<Vec<u8>>>> {
    let mut key_index = 0;
    let mut last_push = None;
    let mut output = Vec::with_capacity(keys.len());

    let ops = Decoder::new(bytes);

    let root = execute(ops, true, |node| {
        if let Node::KV(key, value) = node {
            loop {
                if key_index >= keys.len() || *key < keys[key_index] {
                    break;
                } else if key == &keys[key_index] {
                    // KV for queried key
                    output.push(Some(value.clone()));
                } else if *key > keys[key_index] {
                    match &last_push {
                        // the previous push was a boundary (global edge or
                        // lower key), so the absence is proven
                        None | Some(Node::KV(_, _)) => {
                            output.push(None);
                        }
                        // the proof is abridged around the queried key
                        _ => {
                            return Err(Error::InvalidProof(
                                "absence of a queried key is not provable".into(),
                            ))
                        }
                    }
                }

                key_index += 1;
            }
        }

        last_push = Some(node.clone());

        Ok(())
    })?;

    // absence proofs for the right edge of the tree
    if key_index < keys.len() {
        if let Some(Node::KV(_, _)) = last_push {
            for _ in 0..(keys.len() - key_index) {
                output.push(None);
            }
        } else {
            return Err(Error::InvalidProof(
                "absence of a queried key is not provable".into(),
            ));
        }
    }

    check_root(&root, expected_hash)?;

    Ok(output)
}

/// Verifies the encoded proof as a contiguous range proof over
/// `[from, to]` and the expected root hash.
///
/// Returns the proven in-range key/value pairs in ascending key order.
/// Fails with [`Error::ProofRangeGap`] if the proof does not establish that
/// every tree entry in the range is present: the node preceding the first
/// in-range key and the node following the last one must be opened (as a
/// key/value or kv-hash push) rather than folded into a subtree hash.
pub fn verify_range(
    bytes: &[u8],
    range: RangeInclusive<Vec<u8>>,
    expected_hash: Hash,
) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
    let (from, to) = (range.start(), range.end());
    let mut output: Vec<(Vec<u8>, Vec<u8>)> = Vec::new();
    let mut last_push: Option<Node> = None;
    let mut in_range = false;
    let mut passed_end = false;

    let ops = Decoder::new(bytes);

    let root = execute(ops, true, |node| {
        if let Node::KV(key, value) = node {
            if !passed_end && key >= from {
                if key > to {
                    // stepped past the upper bound; the range is complete
                    passed_end = true;
                    in_range = false;
                } else {
                    if !in_range && key > from {
                        // first in-range key falls past the lower bound; the
                        // preceding node must be opened or the left edge is
                        // unproven
                        match &last_push {
                            None | Some(Node::KV(_, _)) | Some(Node::KVHash(_)) => {}
                            Some(Node::Hash(_)) => {
                                return Err(Error::ProofRangeGap(
                                    "first key greater than beginning of range",
                                ))
                            }
                        }
                    }

                    output.push((key.clone(), value.clone()));
                    // the upper bound itself completes the range
                    in_range = key < to;
                    passed_end = !in_range;
                }
            }
        } else if in_range {
            // a node strictly inside the range was abridged
            return Err(Error::ProofRangeGap("proof is missing data for range"));
        }

        last_push = Some(node.clone());

        Ok(())
    })?;

    if !passed_end {
        // we never saw a key past the upper bound, so the rightmost proof
        // node must be opened or the right edge is unproven
        match &last_push {
            None | Some(Node::KV(_, _)) | Some(Node::KVHash(_)) => {}
            Some(Node::Hash(_)) => {
                return Err(Error::ProofRangeGap("last key less than end of range"))
            }
        }
    }

    check_root(&root, expected_hash)?;

    Ok(output)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn query_merges_overlapping_items() {
        let mut query = Query::new();
        query.insert_range(vec![2]..vec![5]);
        query.insert_range(vec![4]..vec![7]);
        assert_eq!(query.len(), 1);

        let items: Vec<QueryItem> = query.into();
        assert_eq!(items[0].lower_bound(), &[2]);
        assert_eq!(items[0].upper_bound(), (vec![7].as_slice(), false));
    }

    #[test]
    fn query_key_absorbed_by_range() {
        let mut query = Query::new();
        query.insert_key(vec![3]);
        query.insert_range_inclusive(vec![2]..=vec![5]);
        assert_eq!(query.len(), 1);
    }

    #[test]
    fn query_distinct_items_kept() {
        let mut query = Query::new();
        query.insert_key(vec![0]);
        query.insert_range_inclusive(vec![2]..=vec![5]);
        query.insert_key(vec![9]);
        assert_eq!(query.len(), 3);
    }

    #[test]
    fn query_item_contains() {
        let item = QueryItem::RangeInclusive(vec![2]..=vec![5]);
        assert!(!item.contains(&[1]));
        assert!(item.contains(&[2]));
        assert!(item.contains(&[5]));
        assert!(!item.contains(&[5, 0]));

        let item = QueryItem::Range(vec![2]..vec![5]);
        assert!(item.contains(&[4]));
        assert!(!item.contains(&[5]));
    }
}

#[cfg(all(test, feature = "full"))]
mod proof_test {
    use super::super::encode_into;
    use super::*;
    use crate::tree::{NoopCommit, Node as TreeNode, PanicSource, RefWalker};

    fn commit(tree: &mut TreeNode) {
        tree.commit(&mut NoopCommit {}, &PanicSource {}, None)
            .expect("commit failed");
    }

    fn make_3_node_tree() -> TreeNode {
        let mut tree = TreeNode::new(vec![5], vec![5])
            .attach(true, Some(TreeNode::new(vec![3], vec![3])))
            .attach(false, Some(TreeNode::new(vec![7], vec![7])));
        commit(&mut tree);
        tree
    }

    /// The 11-node tree used in the proof examples: keys 1..11 with root 5.
    fn make_11_node_tree() -> TreeNode {
        let left = TreeNode::new(vec![2], vec![2])
            .attach(true, Some(TreeNode::new(vec![1], vec![1])))
            .attach(
                false,
                Some(
                    TreeNode::new(vec![4], vec![4])
                        .attach(true, Some(TreeNode::new(vec![3], vec![3]))),
                ),
            );
        let right = TreeNode::new(vec![9], vec![9])
            .attach(
                true,
                Some(
                    TreeNode::new(vec![7], vec![7])
                        .attach(true, Some(TreeNode::new(vec![6], vec![6])))
                        .attach(false, Some(TreeNode::new(vec![8], vec![8]))),
                ),
            )
            .attach(
                false,
                Some(
                    TreeNode::new(vec![11], vec![11])
                        .attach(true, Some(TreeNode::new(vec![10], vec![10]))),
                ),
            );
        let mut tree = TreeNode::new(vec![5], vec![5])
            .attach(true, Some(left))
            .attach(false, Some(right));
        commit(&mut tree);
        tree
    }

    fn prove(tree: &mut TreeNode, query: &[QueryItem]) -> (Vec<u8>, (bool, bool)) {
        let mut walker = RefWalker::new(tree, PanicSource {});
        let (proof, absence) = walker.create_proof(query).expect("create_proof errored");
        let mut bytes = vec![];
        encode_into(proof.iter(), &mut bytes);
        (bytes, absence)
    }

    #[test]
    fn empty_proof() {
        let mut tree = make_3_node_tree();
        let left_hash = *tree.child(true).unwrap().hash();
        let right_hash = *tree.child(false).unwrap().hash();
        let root_kv_hash = *tree.kv_hash();
        let mut walker = RefWalker::new(&mut tree, PanicSource {});

        let (proof, absence) = walker.create_proof(&[]).expect("create_proof errored");

        let mut iter = proof.iter();
        assert_eq!(iter.next(), Some(&Op::Push(Node::Hash(left_hash))));
        assert_eq!(iter.next(), Some(&Op::Push(Node::KVHash(root_kv_hash))));
        assert_eq!(iter.next(), Some(&Op::Parent));
        assert_eq!(iter.next(), Some(&Op::Push(Node::Hash(right_hash))));
        assert_eq!(iter.next(), Some(&Op::Child));
        assert!(iter.next().is_none());
        assert_eq!(absence, (false, false));
    }

    #[test]
    fn root_proof() {
        let mut tree = make_3_node_tree();
        let root_hash = *tree.hash();
        let (bytes, absence) = prove(&mut tree, &[QueryItem::Key(vec![5])]);
        assert_eq!(absence, (false, false));

        let result =
            verify_keys(&bytes, &[vec![5]], root_hash).expect("verify failed");
        assert_eq!(result, vec![Some(vec![5])]);
    }

    #[test]
    fn leaf_proof() {
        let mut tree = make_3_node_tree();
        let root_hash = *tree.hash();
        let (bytes, _) = prove(&mut tree, &[QueryItem::Key(vec![3])]);

        let result =
            verify_keys(&bytes, &[vec![3]], root_hash).expect("verify failed");
        assert_eq!(result, vec![Some(vec![3])]);
    }

    #[test]
    fn double_leaf_proof() {
        let mut tree = make_3_node_tree();
        let root_hash = *tree.hash();
        let (bytes, _) = prove(
            &mut tree,
            &[QueryItem::Key(vec![3]), QueryItem::Key(vec![7])],
        );

        let result = verify_keys(&bytes, &[vec![3], vec![7]], root_hash)
            .expect("verify failed");
        assert_eq!(result, vec![Some(vec![3]), Some(vec![7])]);
    }

    #[test]
    fn absence_proofs() {
        let mut tree = make_3_node_tree();
        let root_hash = *tree.hash();

        // inner absence
        let (bytes, _) = prove(&mut tree, &[QueryItem::Key(vec![6])]);
        let result =
            verify_keys(&bytes, &[vec![6]], root_hash).expect("verify failed");
        assert_eq!(result, vec![None]);

        // left edge absence
        let (bytes, absence) = prove(&mut tree, &[QueryItem::Key(vec![2])]);
        assert_eq!(absence, (true, false));
        let result =
            verify_keys(&bytes, &[vec![2]], root_hash).expect("verify failed");
        assert_eq!(result, vec![None]);

        // right edge absence
        let (bytes, absence) = prove(&mut tree, &[QueryItem::Key(vec![8])]);
        assert_eq!(absence, (false, true));
        let result =
            verify_keys(&bytes, &[vec![8]], root_hash).expect("verify failed");
        assert_eq!(result, vec![None]);
    }

    #[test]
    fn absent_and_present() {
        let mut tree = make_3_node_tree();
        let root_hash = *tree.hash();
        let (bytes, _) = prove(
            &mut tree,
            &[QueryItem::Key(vec![5]), QueryItem::Key(vec![6])],
        );
        let result = verify_keys(&bytes, &[vec![5], vec![6]], root_hash)
            .expect("verify failed");
        assert_eq!(result, vec![Some(vec![5]), None]);
    }

    #[test]
    fn doc_proof_tokens() {
        let mut tree = make_11_node_tree();
        let root_kv_hash = *tree.kv_hash();
        let right_hash = *tree.child(false).unwrap().hash();
        let root_hash = *tree.hash();
        let mut walker = RefWalker::new(&mut tree, PanicSource {});

        let query = [
            QueryItem::Key(vec![1]),
            QueryItem::Key(vec![2]),
            QueryItem::Key(vec![3]),
            QueryItem::Key(vec![4]),
        ];
        let (proof, absence) = walker.create_proof(&query).expect("create_proof errored");

        let mut iter = proof.iter();
        assert_eq!(iter.next(), Some(&Op::Push(Node::KV(vec![1], vec![1]))));
        assert_eq!(iter.next(), Some(&Op::Push(Node::KV(vec![2], vec![2]))));
        assert_eq!(iter.next(), Some(&Op::Parent));
        assert_eq!(iter.next(), Some(&Op::Push(Node::KV(vec![3], vec![3]))));
        assert_eq!(iter.next(), Some(&Op::Push(Node::KV(vec![4], vec![4]))));
        assert_eq!(iter.next(), Some(&Op::Parent));
        assert_eq!(iter.next(), Some(&Op::Child));
        assert_eq!(iter.next(), Some(&Op::Push(Node::KVHash(root_kv_hash))));
        assert_eq!(iter.next(), Some(&Op::Parent));
        assert_eq!(iter.next(), Some(&Op::Push(Node::Hash(right_hash))));
        assert_eq!(iter.next(), Some(&Op::Child));
        assert!(iter.next().is_none());
        assert_eq!(absence, (false, false));

        let mut bytes = vec![];
        encode_into(proof.iter(), &mut bytes);
        let result = verify_keys(
            &bytes,
            &[vec![1], vec![2], vec![3], vec![4]],
            root_hash,
        )
        .expect("verify failed");
        assert_eq!(
            result,
            vec![
                Some(vec![1]),
                Some(vec![2]),
                Some(vec![3]),
                Some(vec![4])
            ]
        );
    }

    #[test]
    fn range_proof() {
        let mut tree = make_11_node_tree();
        let root_hash = *tree.hash();
        let (bytes, _) = prove(
            &mut tree,
            &[QueryItem::RangeInclusive(vec![3]..=vec![7])],
        );

        let result =
            verify_range(&bytes, vec![3]..=vec![7], root_hash).expect("verify failed");
        assert_eq!(
            result,
            vec![
                (vec![3], vec![3]),
                (vec![4], vec![4]),
                (vec![5], vec![5]),
                (vec![6], vec![6]),
                (vec![7], vec![7]),
            ]
        );
    }

    #[test]
    fn range_proof_over_edges() {
        let mut tree = make_3_node_tree();
        let root_hash = *tree.hash();
        let (bytes, _) = prove(
            &mut tree,
            &[QueryItem::RangeInclusive(vec![0]..=vec![9])],
        );

        let result =
            verify_range(&bytes, vec![0]..=vec![9], root_hash).expect("verify failed");
        assert_eq!(
            result,
            vec![(vec![3], vec![3]), (vec![5], vec![5]), (vec![7], vec![7])]
        );
    }

    #[test]
    fn range_proof_with_abridged_boundary_fails() {
        // handcrafted: the lower range bound is hidden behind a subtree hash
        let ops = [
            Op::Push(Node::Hash([1; 32])),
            Op::Push(Node::KV(vec![4], vec![4])),
            Op::Parent,
        ];
        let mut bytes = vec![];
        encode_into(ops.iter(), &mut bytes);

        let result = verify_range(&bytes, vec![2]..=vec![4], [0; 32]);
        assert!(matches!(result, Err(Error::ProofRangeGap(_))));
    }

    #[test]
    fn range_proof_with_abridged_right_edge_fails() {
        let ops = [
            Op::Push(Node::KV(vec![2], vec![2])),
            Op::Push(Node::Hash([1; 32])),
            Op::Child,
        ];
        let mut bytes = vec![];
        encode_into(ops.iter(), &mut bytes);

        let result = verify_range(&bytes, vec![2]..=vec![4], [0; 32]);
        assert!(matches!(result, Err(Error::ProofRangeGap(_))));
    }

    #[test]
    fn range_proof_with_missing_inner_key_fails() {
        // a node strictly inside the range is abridged to its kv hash
        let ops = [
            Op::Push(Node::KV(vec![2], vec![2])),
            Op::Push(Node::KVHash([7; 32])),
            Op::Parent,
            Op::Push(Node::KV(vec![5], vec![5])),
            Op::Child,
        ];
        let mut bytes = vec![];
        encode_into(ops.iter(), &mut bytes);

        let result = verify_range(&bytes, vec![2]..=vec![5], [0; 32]);
        assert!(matches!(result, Err(Error::ProofRangeGap(_))));
    }

    #[test]
    fn verify_rejects_wrong_root() {
        let mut tree = make_3_node_tree();
        let (bytes, _) = prove(&mut tree, &[QueryItem::Key(vec![3])]);

        let result = verify_keys(&bytes, &[vec![3]], [42; 32]);
        assert!(matches!(result, Err(Error::ProofRootMismatch { .. })));
    }
}
