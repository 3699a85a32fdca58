//! Streaming write-log reconstruction.

use crate::db::NodeDb;
use crate::error::Error;
use crate::store::{ReadTxn, Store};
use sapwood_types::{
    HashedLogEntry, HashedWriteLog, LogEntry, Namespace, NodePointer, Root, TypedHash,
};

/// Lazily streams a reconstructed write log between two roots.
///
/// The iterator owns the read snapshot the log chain was discovered in and
/// releases it on drop. Stored entries carry leaf hashes instead of values;
/// each is rehydrated on the fly by fetching the leaf node under the hop's
/// root. The first error ends the stream.
pub struct WriteLogIterator<'db, S: Store> {
    db: &'db NodeDb<S>,
    txn: S::ReadTxn<'db>,

    namespace: Namespace,
    version: u64,

    /// Remaining log chunks in replay order: the stored key of each hop's
    /// log together with the hop's resulting root, oldest hop first.
    chunks: std::vec::IntoIter<(Vec<u8>, TypedHash)>,
    current: std::vec::IntoIter<HashedLogEntry>,
    current_root: Root,

    done: bool,
}

impl<'db, S: Store> WriteLogIterator<'db, S> {
    pub(crate) fn new(
        db: &'db NodeDb<S>,
        txn: S::ReadTxn<'db>,
        namespace: Namespace,
        version: u64,
        chunks: Vec<(Vec<u8>, TypedHash)>,
    ) -> Self {
        Self {
            db,
            txn,
            namespace,
            version,
            chunks: chunks.into_iter(),
            current: Vec::new().into_iter(),
            current_root: Root::default(),
            done: false,
        }
    }

    /// Load the next hop's log. Returns false when the chain is exhausted.
    fn next_chunk(&mut self) -> Result<bool, Error> {
        let Some((log_key, new_root)) = self.chunks.next() else {
            return Ok(false);
        };

        let Some(data) = self.txn.get(&log_key)? else {
            // Found during path discovery in this very snapshot.
            return Err(Error::WriteLogNotFound);
        };
        let log: HashedWriteLog = serde_cbor::from_slice(&data)
            .unwrap_or_else(|err| panic!("node database: corrupted write log: {err}"));

        self.current = log.into_iter();
        self.current_root = Root::new(
            self.namespace,
            self.version,
            new_root.root_type(),
            new_root.hash(),
        );
        Ok(true)
    }

    fn rehydrate(&self, entry: HashedLogEntry) -> Result<LogEntry, Error> {
        let Some(hash) = entry.inserted_hash else {
            return Ok(LogEntry {
                key: entry.key,
                value: None,
            });
        };

        let node = self
            .db
            .get_node(self.current_root, &NodePointer::new(hash))?;
        let value = node
            .leaf_value()
            .unwrap_or_else(|| panic!("node database: write log references a non-leaf node"))
            .to_vec();
        Ok(LogEntry {
            key: entry.key,
            value: Some(value),
        })
    }
}

impl<'db, S: Store> Iterator for WriteLogIterator<'db, S> {
    type Item = Result<LogEntry, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            if let Some(entry) = self.current.next() {
                match self.rehydrate(entry) {
                    Ok(entry) => return Some(Ok(entry)),
                    Err(err) => {
                        self.done = true;
                        return Some(Err(err));
                    }
                }
            }

            match self.next_chunk() {
                Ok(true) => {}
                Ok(false) => {
                    self.done = true;
                    return None;
                }
                Err(err) => {
                    self.done = true;
                    return Some(Err(err));
                }
            }
        }
    }
}
