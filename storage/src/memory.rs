//! An ordered in-memory storage.
//!
//! Backed by a `BTreeMap` behind a read/write lock. Snapshots and iterators
//! copy the current entries, which keeps them trivially read-consistent at
//! the price of memory — acceptable for tests, examples and small datasets.

use std::collections::BTreeMap;
use std::sync::RwLock;

use crate::{Batch, Error, RawIterator, Snapshot, Storage};

type Entries = BTreeMap<Vec<u8>, Vec<u8>>;

/// In-memory [`Storage`] implementation.
#[derive(Default)]
pub struct MemStorage {
    entries: RwLock<Entries>,
}

impl MemStorage {
    /// Creates an empty in-memory storage.
    pub fn new() -> Self {
        Default::default()
    }

    /// Returns the number of entries currently stored.
    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    /// Returns `true` if the storage holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.read().unwrap().is_empty()
    }
}

impl Storage for MemStorage {
    type Batch = MemBatch;
    type RawIterator<'a>
        = MemRawIterator
    where
        Self: 'a;
    type Snapshot<'a>
        = MemSnapshot
    where
        Self: 'a;

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, Error> {
        Ok(self.entries.read().unwrap().get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), Error> {
        self.entries
            .write()
            .unwrap()
            .insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<(), Error> {
        self.entries.write().unwrap().remove(key);
        Ok(())
    }

    fn new_batch(&self) -> Self::Batch {
        MemBatch { ops: Vec::new() }
    }

    fn commit_batch(&self, batch: Self::Batch) -> Result<(), Error> {
        let mut entries = self.entries.write().unwrap();
        for (key, maybe_value) in batch.ops {
            match maybe_value {
                Some(value) => entries.insert(key, value),
                None => entries.remove(&key),
            };
        }
        Ok(())
    }

    fn raw_iter(&self) -> Self::RawIterator<'_> {
        MemRawIterator::new(&self.entries.read().unwrap())
    }

    fn snapshot(&self) -> Self::Snapshot<'_> {
        MemSnapshot {
            entries: self.entries.read().unwrap().clone(),
        }
    }

    fn flush(&self) -> Result<(), Error> {
        Ok(())
    }
}

/// Staged writes against a [`MemStorage`].
pub struct MemBatch {
    ops: Vec<(Vec<u8>, Option<Vec<u8>>)>,
}

impl Batch for MemBatch {
    fn put(&mut self, key: &[u8], value: &[u8]) {
        self.ops.push((key.to_vec(), Some(value.to_vec())));
    }

    fn delete(&mut self, key: &[u8]) {
        self.ops.push((key.to_vec(), None));
    }
}

/// A read-consistent copy of a [`MemStorage`].
pub struct MemSnapshot {
    entries: Entries,
}

impl Snapshot for MemSnapshot {
    type RawIterator<'a>
        = MemRawIterator
    where
        Self: 'a;

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, Error> {
        Ok(self.entries.get(key).cloned())
    }

    fn raw_iter(&self) -> Self::RawIterator<'_> {
        MemRawIterator::new(&self.entries)
    }
}

/// Cursor over a copied set of entries.
pub struct MemRawIterator {
    entries: Vec<(Vec<u8>, Vec<u8>)>,
    pos: Option<usize>,
}

impl MemRawIterator {
    fn new(entries: &Entries) -> Self {
        MemRawIterator {
            entries: entries
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            pos: None,
        }
    }
}

impl RawIterator for MemRawIterator {
    fn seek_to_first(&mut self) {
        self.pos = if self.entries.is_empty() { None } else { Some(0) };
    }

    fn seek(&mut self, key: &[u8]) {
        let index = self.entries.partition_point(|(k, _)| k.as_slice() < key);
        self.pos = (index < self.entries.len()).then_some(index);
    }

    fn seek_for_prev(&mut self, key: &[u8]) {
        let index = self.entries.partition_point(|(k, _)| k.as_slice() <= key);
        self.pos = index.checked_sub(1);
    }

    fn next(&mut self) {
        self.pos = match self.pos {
            Some(pos) if pos + 1 < self.entries.len() => Some(pos + 1),
            _ => None,
        };
    }

    fn prev(&mut self) {
        self.pos = self.pos.and_then(|pos| pos.checked_sub(1));
    }

    fn key(&self) -> Option<&[u8]> {
        self.pos.map(|pos| self.entries[pos].0.as_slice())
    }

    fn value(&self) -> Option<&[u8]> {
        self.pos.map(|pos| self.entries[pos].1.as_slice())
    }

    fn valid(&self) -> bool {
        self.pos.is_some()
    }
}
