//! End-to-end coverage over the RocksDB backing store.

use mast::test_utils::{assert_store_invariants, make_batch_seq};
use mast::{verify_keys, Mast};
use mast_storage::rocksdb_storage::test_utils::TempStorage;

#[test]
fn rocksdb_roundtrip() {
    let mut mast = Mast::open(TempStorage::new()).expect("failed to open");

    let batch = make_batch_seq(0..500);
    mast.apply(&batch).expect("apply failed");
    assert_store_invariants(&mast).expect("invariants violated");

    let keys = vec![batch[0].0.clone(), batch[499].0.clone()];
    let proof = mast.prove_keys(&keys).expect("prove failed");
    let result =
        verify_keys(&proof, &keys, mast.root_hash().unwrap()).expect("verify failed");
    assert_eq!(result.len(), 2);
    assert!(result.iter().all(|value| value.is_some()));

    mast.delete(batch[123].0.clone()).expect("delete failed");
    assert_eq!(mast.get(&batch[123].0).unwrap(), None);
    assert_store_invariants(&mast).expect("invariants violated");
}

#[test]
fn rocksdb_reopen_preserves_state() {
    let storage = {
        let mut mast = Mast::open(TempStorage::new()).expect("failed to open");
        mast.apply(&make_batch_seq(0..100)).expect("apply failed");
        mast.flush().expect("flush failed");
        mast.into_storage()
    };

    let mast = Mast::open(storage).expect("failed to reopen");
    assert!(mast.root_hash().is_some());
    assert_eq!(mast.iter_from(b"").count(), 100);
    assert_store_invariants(&mast).expect("invariants violated");
}
