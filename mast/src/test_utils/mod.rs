//! Various helpers useful for tests or benchmarks.

use mast_storage::Storage;
use rand::prelude::*;

use crate::error::{Error, Result};
use crate::mast::Mast;
use crate::store::NodeStore;
use crate::tree::{
    kv_hash, node_hash, BatchEntry, Hash, Node, NoopCommit, Op, PanicSource, Walker, NULL_HASH,
};

/// Big-endian encoding of a sequence number, used as a fixed-width key.
pub const fn seq_key(n: u64) -> [u8; 8] {
    n.to_be_bytes()
}

/// A `Put` batch entry with a sequential key and a fixed-size value.
pub fn put_entry(n: u64) -> BatchEntry<Vec<u8>> {
    (seq_key(n).to_vec(), Op::Put(vec![123; 60]))
}

/// A `Delete` batch entry with a sequential key.
pub fn del_entry(n: u64) -> BatchEntry<Vec<u8>> {
    (seq_key(n).to_vec(), Op::Delete)
}

/// Builds a sorted `Put` batch over the given range of sequential keys.
pub fn make_batch_seq(range: std::ops::Range<u64>) -> Vec<BatchEntry<Vec<u8>>> {
    range.map(put_entry).collect()
}

/// Builds a sorted, deduplicated `Put` batch of `size` random keys,
/// deterministic in `seed`.
pub fn make_batch_rand(size: u64, seed: u64) -> Vec<BatchEntry<Vec<u8>>> {
    let mut rng: SmallRng = SeedableRng::seed_from_u64(seed);
    let mut batch = Vec::with_capacity(size as usize);
    for _ in 0..size {
        let key = rng.gen::<u128>().to_be_bytes().to_vec();
        batch.push((key, Op::Put(vec![123; 60])));
    }
    batch.sort_by(|a, b| a.0.cmp(&b.0));
    batch.dedup_by(|a, b| a.0 == b.0);
    batch
}

/// Builds an in-memory tree of `count` sequential entries.
pub fn make_tree_seq(count: u64) -> Node {
    let batch = make_batch_seq(0..count);
    let (maybe_tree, _) =
        Walker::<PanicSource>::apply_to(None, &batch).expect("apply_to failed");
    let mut tree = maybe_tree.expect("expected tree");
    tree.commit(&mut NoopCommit {}, &PanicSource {}, None)
        .expect("commit failed");
    tree
}

/// Checks the BST and AVL invariants of an in-memory tree.
pub fn assert_tree_invariants(tree: &Node) {
    assert!(tree.balance_factor().abs() < 2);

    let maybe_left = tree.link(true);
    if let Some(left) = maybe_left {
        assert!(left.key() < tree.key());
    }

    let maybe_right = tree.link(false);
    if let Some(right) = maybe_right {
        assert!(right.key() > tree.key());
    }

    if let Some(left) = tree.child(true) {
        assert_tree_invariants(left);
    }
    if let Some(right) = tree.child(false) {
        assert_tree_invariants(right);
    }
}

/// Validates every persisted invariant of the store: BST order, AVL
/// balance, height consistency, hash recurrences, parent back-references,
/// reachability of every record from the root, and key uniqueness.
pub fn assert_store_invariants<S: Storage>(mast: &Mast<S>) -> Result<()> {
    let store = NodeStore::new(mast.storage());

    let reachable = match store.root_key()? {
        None => 0,
        Some(root_key) => {
            let (_, root_hash, count) =
                check_subtree(&store, &root_key, None, None, None)?;
            if mast.root_hash() != Some(root_hash) {
                return Err(Error::InvariantViolated(format!(
                    "cached root hash does not match recomputation for root {root_key:?}"
                )));
            }
            count
        }
    };

    let mut stored = 0;
    for entry in mast.iter_from(b"") {
        entry?;
        stored += 1;
    }
    if stored != reachable {
        return Err(Error::InvariantViolated(format!(
            "{stored} node records in store, {reachable} reachable from root"
        )));
    }

    Ok(())
}

/// Recursively checks a persisted subtree; returns its height, hash and
/// node count.
fn check_subtree<S: Storage>(
    store: &NodeStore<S>,
    key: &[u8],
    lower: Option<&[u8]>,
    upper: Option<&[u8]>,
    parent: Option<&[u8]>,
) -> Result<(u8, Hash, u64)> {
    let violated = |what: &str| Error::InvariantViolated(format!("{what} at node {key:?}"));

    let node = store
        .get(key)?
        .ok_or_else(|| violated("unreachable child reference"))?;

    if let Some(lower) = lower {
        if node.key() <= lower {
            return Err(violated("BST order broken against subtree lower bound"));
        }
    }
    if let Some(upper) = upper {
        if node.key() >= upper {
            return Err(violated("BST order broken against subtree upper bound"));
        }
    }
    if node.parent_key() != parent {
        return Err(violated("parent back-reference does not match actual parent"));
    }
    if node.kv_hash() != &kv_hash(node.key(), node.value()) {
        return Err(violated("kv hash does not match key and value"));
    }

    let child = |left: bool| -> Result<(u8, Hash, u64)> {
        match node.link(left) {
            None => Ok((0, NULL_HASH, 0)),
            Some(link) => {
                let (lower, upper) = if left {
                    (lower, Some(node.key()))
                } else {
                    (Some(node.key()), upper)
                };
                let (height, hash, count) =
                    check_subtree(store, link.key(), lower, upper, Some(node.key()))?;
                if height != link.height() {
                    return Err(violated("stored child height does not match subtree"));
                }
                Ok((height, hash, count))
            }
        }
    };

    let (left_height, left_hash, left_count) = child(true)?;
    let (right_height, right_hash, right_count) = child(false)?;

    if (right_height as i8 - left_height as i8).abs() > 1 {
        return Err(violated("AVL balance broken"));
    }
    let expected_hash = node_hash(&left_hash, &right_hash, node.kv_hash());
    if node.hash() != &expected_hash {
        return Err(violated("node hash does not match recurrence"));
    }

    let height = 1 + left_height.max(right_height);
    Ok((height, expected_hash, 1 + left_count + right_count))
}
