use mast_storage::RawIterator;

use crate::error::{Error, Result};
use crate::store::{node_db_key, NODE_PREFIX};
use crate::tree::Node;

/// A lazy iterator over the store's key/value pairs in ascending key order.
///
/// Rides the backing store's ordered cursor over the node namespace, so it
/// needs no tree traversal and observes a consistent view as of its
/// creation. Restartable: create a new one at any key.
pub struct KVIterator<I: RawIterator> {
    raw: I,
    done: bool,
}

impl<I: RawIterator> KVIterator<I> {
    pub(crate) fn new(mut raw: I, start: &[u8]) -> Self {
        raw.seek(&node_db_key(start));
        KVIterator { raw, done: false }
    }
}

impl<I: RawIterator> Iterator for KVIterator<I> {
    type Item = Result<(Vec<u8>, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || !self.raw.valid() {
            self.done = true;
            return None;
        }

        let db_key = self.raw.key().expect("valid iterator must have a key");
        if db_key.first() != Some(&NODE_PREFIX) {
            // walked past the node namespace
            self.done = true;
            return None;
        }

        let entry = (|| {
            let bytes = self.raw.value().expect("valid iterator must have a value");
            let node = Node::decode(bytes)?;
            if node_db_key(node.key()) != db_key {
                return Err(Error::CorruptNode(format!(
                    "node record at {db_key:?} contains key {:?}",
                    node.key()
                )));
            }
            Ok((node.key().to_vec(), node.value().to_vec()))
        })();

        match entry {
            Ok(entry) => {
                self.raw.next();
                Some(Ok(entry))
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}
