//! The in-memory managed-timestamp store.

use im::OrdMap;
use parking_lot::RwLock;
use sapwood_nodedb::{GcWorker, ReadTxn, RwTxn, Store, StoreError, WriteBatch};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;
use tracing::debug;

/// How often the background worker compacts discarded versions.
const GC_INTERVAL: Duration = Duration::from_millis(500);

/// One committed write of a key.
#[derive(Clone)]
struct VersionedValue {
    /// Commit timestamp.
    ts: u64,
    /// The written value, or `None` for a tombstone.
    value: Option<Arc<[u8]>>,
}

/// All committed writes of a key, ascending by timestamp.
type VersionChain = Vec<VersionedValue>;

/// Resolve the version visible at `ts`.
fn visible(chain: &[VersionedValue], ts: u64) -> Option<&VersionedValue> {
    chain.iter().rev().find(|v| v.ts <= ts)
}

struct Inner {
    map: RwLock<OrdMap<Vec<u8>, VersionChain>>,
    discard_ts: AtomicU64,
}

impl Inner {
    /// Apply a set of writes atomically at their given timestamps.
    ///
    /// A rewrite at an existing timestamp replaces that version, matching
    /// managed-mode stores where same-timestamp writes are idempotent
    /// overwrites.
    fn apply(&self, ops: Vec<(Vec<u8>, Option<Vec<u8>>, u64)>) {
        let mut map = self.map.write();
        for (key, value, ts) in ops {
            let mut chain = map.get(&key).cloned().unwrap_or_default();
            chain.retain(|v| v.ts != ts);
            let pos = chain.partition_point(|v| v.ts < ts);
            chain.insert(
                pos,
                VersionedValue {
                    ts,
                    value: value.map(Arc::from),
                },
            );
            map.insert(key, chain);
        }
    }

    /// Drop versions no reader can observe anymore.
    ///
    /// A version is unreachable once a newer version exists at or below the
    /// discard timestamp; a tombstone that is itself the newest version at
    /// or below the bound goes too.
    fn compact(&self) {
        let discard_ts = self.discard_ts.load(Ordering::Acquire);
        if discard_ts == 0 {
            return;
        }

        let mut map = self.map.write();
        let keys: Vec<Vec<u8>> = map.keys().cloned().collect();
        let mut removed = 0usize;
        for key in keys {
            let Some(chain) = map.get(&key) else { continue };
            let cutoff = chain.partition_point(|v| v.ts <= discard_ts);
            if cutoff == 0 {
                continue;
            }

            let mut chain = chain.clone();
            // Keep the newest version at or below the bound only if it
            // still holds a value.
            let keep_from = if chain[cutoff - 1].value.is_some() {
                cutoff - 1
            } else {
                cutoff
            };
            if keep_from == 0 {
                continue;
            }

            removed += keep_from;
            chain.drain(..keep_from);
            if chain.is_empty() {
                map.remove(&key);
            } else {
                map.insert(key, chain);
            }
        }
        if removed > 0 {
            debug!(removed, discard_ts, "compacted discarded versions");
        }
    }

    fn size(&self) -> u64 {
        let map = self.map.read();
        map.iter()
            .map(|(key, chain)| {
                let values: usize = chain
                    .iter()
                    .map(|v| v.value.as_ref().map_or(0, |data| data.len()))
                    .sum();
                (key.len() + values) as u64
            })
            .sum()
    }
}

/// Compute the exclusive end key for a prefix scan.
///
/// Returns `None` if the prefix is all `0xFF` bytes (no valid exclusive
/// upper bound). In practice this never happens with tagged storage keys.
fn next_prefix(prefix: &[u8]) -> Option<Vec<u8>> {
    debug_assert!(!prefix.is_empty(), "next_prefix called with empty prefix");
    let mut next = prefix.to_vec();
    for i in (0..next.len()).rev() {
        if next[i] < 255 {
            next[i] += 1;
            return Some(next);
        }
        next[i] = 0;
    }
    None
}

/// Collect the entries visible at `ts` under `prefix` from a snapshot.
fn scan_prefix(
    snapshot: &OrdMap<Vec<u8>, VersionChain>,
    prefix: &[u8],
    ts: u64,
) -> Vec<(Vec<u8>, Vec<u8>)> {
    let items: Vec<(Vec<u8>, VersionChain)> = match next_prefix(prefix) {
        Some(end) => snapshot
            .range(prefix.to_vec()..end)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
        None => snapshot
            .range(prefix.to_vec()..)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
    };

    items
        .into_iter()
        .filter_map(|(key, chain)| {
            let value = visible(&chain, ts)?.value.as_ref()?;
            Some((key, value.to_vec()))
        })
        .collect()
}

/// In-memory managed-timestamp store.
///
/// Cheap to clone; clones share the same underlying data, which lets tests
/// reopen a database over the "same" store after closing it.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                map: RwLock::new(OrdMap::new()),
                discard_ts: AtomicU64::new(0),
            }),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot read transaction at a fixed timestamp.
pub struct MemoryReadTxn {
    snapshot: OrdMap<Vec<u8>, VersionChain>,
    ts: u64,
}

impl ReadTxn for MemoryReadTxn {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self
            .snapshot
            .get(key)
            .and_then(|chain| visible(chain, self.ts))
            .and_then(|v| v.value.as_ref().map(|data| data.to_vec())))
    }

    fn get_with_ts(&self, key: &[u8]) -> Result<Option<(Vec<u8>, u64)>, StoreError> {
        Ok(self
            .snapshot
            .get(key)
            .and_then(|chain| visible(chain, self.ts))
            .and_then(|v| v.value.as_ref().map(|data| (data.to_vec(), v.ts))))
    }

    fn iter_prefix(&self, prefix: &[u8]) -> Box<dyn Iterator<Item = (Vec<u8>, Vec<u8>)> + '_> {
        Box::new(scan_prefix(&self.snapshot, prefix, self.ts).into_iter())
    }
}

/// Read-write transaction: snapshot reads merged with buffered writes.
pub struct MemoryRwTxn {
    inner: Arc<Inner>,
    snapshot: OrdMap<Vec<u8>, VersionChain>,
    read_ts: u64,
    pending: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

impl ReadTxn for MemoryRwTxn {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        if let Some(value) = self.pending.get(key) {
            return Ok(value.clone());
        }
        Ok(self
            .snapshot
            .get(key)
            .and_then(|chain| visible(chain, self.read_ts))
            .and_then(|v| v.value.as_ref().map(|data| data.to_vec())))
    }

    fn get_with_ts(&self, key: &[u8]) -> Result<Option<(Vec<u8>, u64)>, StoreError> {
        if let Some(value) = self.pending.get(key) {
            // Uncommitted writes read back at the read timestamp.
            return Ok(value.clone().map(|data| (data, self.read_ts)));
        }
        Ok(self
            .snapshot
            .get(key)
            .and_then(|chain| visible(chain, self.read_ts))
            .and_then(|v| v.value.as_ref().map(|data| (data.to_vec(), v.ts))))
    }

    fn iter_prefix(&self, prefix: &[u8]) -> Box<dyn Iterator<Item = (Vec<u8>, Vec<u8>)> + '_> {
        let mut merged: BTreeMap<Vec<u8>, Vec<u8>> =
            scan_prefix(&self.snapshot, prefix, self.read_ts)
                .into_iter()
                .collect();
        for (key, value) in self.pending.range(prefix.to_vec()..) {
            if !key.starts_with(prefix) {
                break;
            }
            match value {
                Some(data) => {
                    merged.insert(key.clone(), data.clone());
                }
                None => {
                    merged.remove(key);
                }
            }
        }
        Box::new(merged.into_iter())
    }
}

impl RwTxn for MemoryRwTxn {
    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.pending.insert(key.to_vec(), Some(value.to_vec()));
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<(), StoreError> {
        self.pending.insert(key.to_vec(), None);
        Ok(())
    }

    fn commit_at(self, ts: u64) -> Result<(), StoreError> {
        let ops = self
            .pending
            .into_iter()
            .map(|(key, value)| (key, value, ts))
            .collect();
        self.inner.apply(ops);
        Ok(())
    }
}

/// Buffered writes applied atomically at flush time.
pub struct MemoryWriteBatch {
    inner: Arc<Inner>,
    default_ts: u64,
    ops: Vec<(Vec<u8>, Option<Vec<u8>>, u64)>,
}

impl WriteBatch for MemoryWriteBatch {
    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.ops
            .push((key.to_vec(), Some(value.to_vec()), self.default_ts));
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<(), StoreError> {
        self.ops.push((key.to_vec(), None, self.default_ts));
        Ok(())
    }

    fn delete_at(&mut self, key: &[u8], ts: u64) -> Result<(), StoreError> {
        self.ops.push((key.to_vec(), None, ts));
        Ok(())
    }

    fn flush(self) -> Result<(), StoreError> {
        self.inner.apply(self.ops);
        Ok(())
    }
}

/// Background worker compacting versions below the discard timestamp.
pub struct MemoryGcWorker {
    stop_tx: mpsc::Sender<()>,
    handle: thread::JoinHandle<()>,
}

impl GcWorker for MemoryGcWorker {
    fn stop(self: Box<Self>) {
        // The worker also exits on a disconnected channel.
        let _ = self.stop_tx.send(());
        let _ = self.handle.join();
    }
}

impl Store for MemoryStore {
    type ReadTxn<'a> = MemoryReadTxn;
    type RwTxn<'a> = MemoryRwTxn;
    type WriteBatch<'a> = MemoryWriteBatch;

    fn read_at(&self, ts: u64) -> MemoryReadTxn {
        MemoryReadTxn {
            snapshot: self.inner.map.read().clone(),
            ts,
        }
    }

    fn write_at(&self, ts: u64) -> MemoryRwTxn {
        MemoryRwTxn {
            inner: Arc::clone(&self.inner),
            snapshot: self.inner.map.read().clone(),
            read_ts: ts,
            pending: BTreeMap::new(),
        }
    }

    fn write_batch_at(&self, ts: u64) -> MemoryWriteBatch {
        MemoryWriteBatch {
            inner: Arc::clone(&self.inner),
            default_ts: ts,
            ops: Vec::new(),
        }
    }

    fn set_discard_timestamp(&self, ts: u64) {
        self.inner.discard_ts.store(ts, Ordering::Release);
    }

    fn start_gc(&self) -> Box<dyn GcWorker> {
        let inner = Arc::clone(&self.inner);
        let (stop_tx, stop_rx) = mpsc::channel();
        let handle = thread::spawn(move || loop {
            match stop_rx.recv_timeout(GC_INTERVAL) {
                Err(mpsc::RecvTimeoutError::Timeout) => inner.compact(),
                Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => return,
            }
        });
        Box::new(MemoryGcWorker { stop_tx, handle })
    }

    fn size(&self) -> Result<u64, StoreError> {
        Ok(self.inner.size())
    }

    fn sync(&self) -> Result<(), StoreError> {
        Ok(())
    }

    fn close(&self) {
        // Data stays alive for as long as a clone of the store exists, so
        // tests can reopen a database over the same contents.
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mvcc_visibility() {
        let store = MemoryStore::new();

        let mut batch = store.write_batch_at(5);
        batch.set(b"k", b"v5").unwrap();
        batch.flush().unwrap();

        let mut batch = store.write_batch_at(8);
        batch.set(b"k", b"v8").unwrap();
        batch.flush().unwrap();

        assert_eq!(store.read_at(4).get(b"k").unwrap(), None);
        assert_eq!(store.read_at(5).get(b"k").unwrap(), Some(b"v5".to_vec()));
        assert_eq!(store.read_at(7).get(b"k").unwrap(), Some(b"v5".to_vec()));
        assert_eq!(store.read_at(8).get(b"k").unwrap(), Some(b"v8".to_vec()));
        assert_eq!(store.read_at(100).get(b"k").unwrap(), Some(b"v8".to_vec()));
    }

    #[test]
    fn test_get_with_ts_reports_commit_timestamp() {
        let store = MemoryStore::new();

        let mut batch = store.write_batch_at(3);
        batch.set(b"k", b"v").unwrap();
        batch.flush().unwrap();

        let (value, ts) = store.read_at(9).get_with_ts(b"k").unwrap().unwrap();
        assert_eq!(value, b"v".to_vec());
        assert_eq!(ts, 3);
    }

    #[test]
    fn test_tombstone_hides_value() {
        let store = MemoryStore::new();

        let mut batch = store.write_batch_at(2);
        batch.set(b"k", b"v").unwrap();
        batch.flush().unwrap();

        let mut batch = store.write_batch_at(6);
        batch.delete(b"k").unwrap();
        batch.flush().unwrap();

        assert_eq!(store.read_at(5).get(b"k").unwrap(), Some(b"v".to_vec()));
        assert_eq!(store.read_at(6).get(b"k").unwrap(), None);
    }

    #[test]
    fn test_same_timestamp_rewrite_replaces() {
        let store = MemoryStore::new();

        let mut batch = store.write_batch_at(1);
        batch.set(b"k", b"old").unwrap();
        batch.flush().unwrap();

        let mut batch = store.write_batch_at(1);
        batch.set(b"k", b"new").unwrap();
        batch.flush().unwrap();

        assert_eq!(store.read_at(1).get(b"k").unwrap(), Some(b"new".to_vec()));
        assert_eq!(store.inner.map.read().get(&b"k"[..].to_vec()).unwrap().len(), 1);
    }

    #[test]
    fn test_snapshot_isolation() {
        let store = MemoryStore::new();

        let mut batch = store.write_batch_at(2);
        batch.set(b"k", b"old").unwrap();
        batch.flush().unwrap();

        let txn = store.read_at(10);

        let mut batch = store.write_batch_at(5);
        batch.set(b"k", b"new").unwrap();
        batch.flush().unwrap();

        // The snapshot predates the second write.
        assert_eq!(txn.get(b"k").unwrap(), Some(b"old".to_vec()));
        assert_eq!(store.read_at(10).get(b"k").unwrap(), Some(b"new".to_vec()));
    }

    #[test]
    fn test_rw_txn_reads_own_writes() {
        let store = MemoryStore::new();

        let mut txn = store.write_at(4);
        txn.set(b"a", b"1").unwrap();
        assert_eq!(txn.get(b"a").unwrap(), Some(b"1".to_vec()));

        // Nothing visible until commit.
        assert_eq!(store.read_at(100).get(b"a").unwrap(), None);

        txn.commit_at(1).unwrap();
        assert_eq!(store.read_at(1).get(b"a").unwrap(), Some(b"1".to_vec()));
    }

    #[test]
    fn test_rw_txn_iter_merges_pending() {
        let store = MemoryStore::new();

        let mut batch = store.write_batch_at(2);
        batch.set(b"p/a", b"1").unwrap();
        batch.set(b"p/b", b"2").unwrap();
        batch.set(b"q/x", b"3").unwrap();
        batch.flush().unwrap();

        let mut txn = store.write_at(5);
        txn.delete(b"p/a").unwrap();
        txn.set(b"p/c", b"4").unwrap();

        let items: Vec<_> = txn.iter_prefix(b"p/").collect();
        assert_eq!(
            items,
            vec![
                (b"p/b".to_vec(), b"2".to_vec()),
                (b"p/c".to_vec(), b"4".to_vec()),
            ]
        );
    }

    #[test]
    fn test_prefix_scan_is_ordered_and_bounded() {
        let store = MemoryStore::new();

        let mut batch = store.write_batch_at(2);
        batch.set(b"a/2", b"y").unwrap();
        batch.set(b"a/1", b"x").unwrap();
        batch.set(b"b/1", b"z").unwrap();
        batch.flush().unwrap();

        let txn = store.read_at(10);
        let items: Vec<_> = txn.iter_prefix(b"a/").collect();
        assert_eq!(
            items,
            vec![
                (b"a/1".to_vec(), b"x".to_vec()),
                (b"a/2".to_vec(), b"y".to_vec()),
            ]
        );
    }

    #[test]
    fn test_delete_at_uses_explicit_timestamp() {
        let store = MemoryStore::new();

        let mut batch = store.write_batch_at(1);
        batch.set(b"k", b"v").unwrap();
        batch.flush().unwrap();

        let mut batch = store.write_batch_at(9);
        batch.delete_at(b"k", 4).unwrap();
        batch.flush().unwrap();

        assert_eq!(store.read_at(3).get(b"k").unwrap(), Some(b"v".to_vec()));
        assert_eq!(store.read_at(4).get(b"k").unwrap(), None);
    }

    #[test]
    fn test_compact_drops_shadowed_versions() {
        let store = MemoryStore::new();

        for ts in [2u64, 3, 4] {
            let mut batch = store.write_batch_at(ts);
            batch.set(b"k", format!("v{ts}").as_bytes()).unwrap();
            batch.flush().unwrap();
        }

        store.set_discard_timestamp(4);
        store.inner.compact();

        let chain_len = store.inner.map.read().get(&b"k"[..].to_vec()).unwrap().len();
        assert_eq!(chain_len, 1);
        assert_eq!(store.read_at(10).get(b"k").unwrap(), Some(b"v4".to_vec()));
    }

    #[test]
    fn test_compact_drops_dead_tombstones() {
        let store = MemoryStore::new();

        let mut batch = store.write_batch_at(2);
        batch.set(b"k", b"v").unwrap();
        batch.flush().unwrap();

        let mut batch = store.write_batch_at(3);
        batch.delete(b"k").unwrap();
        batch.flush().unwrap();

        store.set_discard_timestamp(5);
        store.inner.compact();

        assert!(store.inner.map.read().get(&b"k"[..].to_vec()).is_none());
    }

    #[test]
    fn test_gc_worker_stops() {
        let store = MemoryStore::new();
        let worker = store.start_gc();
        worker.stop();
    }
}
