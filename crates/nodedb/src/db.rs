//! The node database engine.

use crate::batch::Batch;
use crate::error::Error;
use crate::keys;
use crate::gc::GcHandle;
use crate::meta::{Metadata, MetadataValue, RootsMetadata, UpdatedNode, DB_VERSION};
use crate::store::{ReadTxn, RwTxn, Store, WriteBatch};
use crate::writelog::WriteLogIterator;
use crate::{ts_to_version, version_to_ts, MULTIPART_VERSION_NONE, TS_METADATA};
use parking_lot::Mutex;
use sapwood_types::{
    Hash, Namespace, NodeCodec, NodePointer, Root, RootType, TreeNode, TypedHash,
};
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, instrument, Level};

/// Node database configuration.
pub struct Config {
    /// Namespace the database is bound to.
    pub namespace: Namespace,
    /// Refuse all mutations.
    pub read_only: bool,
    /// Do not store write logs; `get_write_log` always reports absence.
    pub discard_write_logs: bool,
    /// Codec supplied by the tree layer, used to follow child pointers
    /// during pruning and to pull leaf values when rehydrating write logs.
    pub codec: Arc<dyn NodeCodec>,
}

/// In-memory multipart restore state, guarded by the metadata lock.
pub(crate) struct MultipartState {
    pub version: u64,
}

/// A versioned, content-addressed Merkle node database over a
/// managed-timestamp backing store.
pub struct NodeDb<S: Store> {
    pub(crate) store: S,
    pub(crate) codec: Arc<dyn NodeCodec>,

    pub(crate) namespace: Namespace,
    pub(crate) read_only: bool,
    pub(crate) discard_write_logs: bool,

    pub(crate) meta: Metadata,

    /// Must be held at any point where data at the metadata timestamp is
    /// read and updated. All metadata writes share one timestamp, so the
    /// backing store cannot detect conflicts between them. The payload is
    /// the in-memory multipart restore state, which follows the same rule.
    pub(crate) meta_update_lock: Mutex<MultipartState>,

    gc: GcHandle,
    closed: AtomicBool,
}

impl<S: Store> std::fmt::Debug for NodeDb<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeDb")
            .field("namespace", &self.namespace)
            .field("read_only", &self.read_only)
            .field("discard_write_logs", &self.discard_write_logs)
            .finish_non_exhaustive()
    }
}

impl<S: Store> NodeDb<S> {
    /// Open the database over the given backing store.
    ///
    /// Loads (or initializes) the metadata record, verifies the engine
    /// version and namespace, recovers from an interrupted multipart
    /// restore, and starts the background GC worker.
    pub fn open(store: S, config: Config) -> Result<Self, Error> {
        // Invalid and superseded metadata may be discarded right away.
        store.set_discard_timestamp(TS_METADATA);

        let value = match Self::load(&store, &config) {
            Ok(value) => value,
            Err(err) => {
                store.close();
                return Err(err);
            }
        };

        let db = Self {
            codec: config.codec,
            namespace: config.namespace,
            read_only: config.read_only,
            discard_write_logs: config.discard_write_logs,
            meta: Metadata::new(value),
            meta_update_lock: Mutex::new(MultipartState {
                version: MULTIPART_VERSION_NONE,
            }),
            gc: GcHandle::new(),
            closed: AtomicBool::new(false),
            store,
        };

        // Clean up any multipart restore remnants; they cannot be resumed.
        {
            let mut multipart = db.meta_update_lock.lock();
            if let Err(err) = db.clean_multipart_locked(&mut multipart, true) {
                drop(multipart);
                db.close();
                return Err(err);
            }
        }

        db.gc.start(&db.store);

        info!(namespace = %db.namespace, "node database opened");
        Ok(db)
    }

    fn load(store: &S, config: &Config) -> Result<MetadataValue, Error> {
        let mut txn = store.write_at(TS_METADATA);

        // Check first if the database is even usable.
        if txn.get(&keys::migration_metadata_key())?.is_some() {
            return Err(Error::UpgradeInProgress);
        }

        match txn.get(&keys::metadata_key())? {
            Some(data) => {
                // Metadata already exists; verify it is compatible.
                let value: MetadataValue = serde_cbor::from_slice(&data)
                    .unwrap_or_else(|err| panic!("node database: corrupted metadata: {err}"));
                if value.version != DB_VERSION {
                    return Err(Error::IncompatibleVersion {
                        expected: DB_VERSION,
                        actual: value.version,
                    });
                }
                if value.namespace != config.namespace {
                    return Err(Error::BadNamespace);
                }
                Ok(value)
            }
            None => {
                // No metadata exists, create some.
                let value = MetadataValue {
                    version: DB_VERSION,
                    namespace: config.namespace,
                    earliest_version: 0,
                    last_finalized_version: None,
                    multipart_version: MULTIPART_VERSION_NONE,
                };
                Metadata::save(&value, &mut txn)?;
                txn.commit_at(TS_METADATA)?;
                Ok(value)
            }
        }
    }

    pub(crate) fn sanity_check_namespace(&self, namespace: &Namespace) -> Result<(), Error> {
        if *namespace != self.namespace {
            return Err(Error::BadNamespace);
        }
        Ok(())
    }

    pub(crate) fn check_root<T: ReadTxn>(&self, txn: &T, root: &Root) -> Result<(), Error> {
        let th = root.typed_hash();
        if txn.get(&keys::root_node_key(&th))?.is_none() {
            return Err(Error::RootNotFound);
        }
        Ok(())
    }

    /// Remove multipart-restore remnants. Assumes the metadata lock is held.
    ///
    /// With `remove_nodes` the logged nodes and root markers themselves are
    /// deleted (abort/crash recovery); without it only the log entries go
    /// (the restore was finalized and the nodes are now owned by roots).
    fn clean_multipart_locked(
        &self,
        multipart: &mut MultipartState,
        remove_nodes: bool,
    ) -> Result<(), Error> {
        let version = if multipart.version != MULTIPART_VERSION_NONE {
            multipart.version
        } else {
            self.meta.multipart_version()
        };
        if version == MULTIPART_VERSION_NONE {
            // No multipart in progress; not an error to call anyway.
            return Ok(());
        }

        let txn = self.store.read_at(TS_METADATA);
        let mut batch = self.store.write_batch_at(version_to_ts(version));

        // When rolling back, aborted roots must also disappear from the
        // version's roots metadata and their updated-node records, so that
        // reads cannot tell the restore ever happened.
        let mut roots_meta = if remove_nodes {
            Some(RootsMetadata::load_or_init(&txn, version)?)
        } else {
            None
        };
        let mut removed_roots: Vec<TypedHash> = Vec::new();

        let mut logged = false;
        let entries: Vec<Vec<u8>> = txn
            .iter_prefix(&keys::multipart_log_prefix())
            .map(|(key, _)| key)
            .collect();
        for key in entries {
            if remove_nodes {
                if !logged {
                    info!("removing some nodes from a multipart restore");
                    logged = true;
                }
                let th = keys::decode_multipart_log_key(&key)
                    .unwrap_or_else(|| panic!("node database: bad multipart log key"));
                match th.root_type() {
                    RootType::Invalid => {
                        batch.delete(&keys::node_key(&th.hash()))?;
                    }
                    _ => {
                        batch.delete(&keys::root_node_key(&th))?;
                        if let Some(roots_meta) = roots_meta.as_mut() {
                            if roots_meta.roots.remove(&th).is_some() {
                                removed_roots.push(th);
                            }
                        }
                    }
                }
            }
            // The log entry itself lives at the metadata timestamp.
            batch.delete_at(&key, TS_METADATA)?;
        }

        // Flush the batch first. If the metadata update below fails, stale
        // multipart info in the record is harmless on the next run.
        batch.flush()?;

        let mut meta_txn = self.store.write_at(TS_METADATA);
        if !removed_roots.is_empty() {
            let roots_meta = roots_meta.expect("loaded when removing nodes");
            for th in &removed_roots {
                meta_txn.delete(&keys::root_updated_nodes_key(version, th))?;
            }
            if roots_meta.roots.is_empty() {
                meta_txn.delete(&keys::roots_metadata_key(version))?;
            } else {
                roots_meta.save(&mut meta_txn)?;
            }
        }
        self.meta
            .set_multipart_version(&mut meta_txn, MULTIPART_VERSION_NONE)?;
        meta_txn.commit_at(TS_METADATA)?;

        multipart.version = MULTIPART_VERSION_NONE;
        Ok(())
    }

    /// Fetch and decode the node referenced by `ptr` under `root`.
    ///
    /// # Panics
    ///
    /// Panics if `ptr` is not clean; dereferencing an uncommitted pointer
    /// is a programming error in the tree layer.
    #[instrument(level = Level::DEBUG, skip_all, fields(version = root.version))]
    pub fn get_node(&self, root: Root, ptr: &NodePointer) -> Result<Box<dyn TreeNode>, Error> {
        assert!(
            ptr.clean,
            "node database: attempted to get invalid pointer from node database"
        );
        self.sanity_check_namespace(&root.namespace)?;
        // Earlier than the earliest version means the node was pruned. The
        // key may still be present until the store compacts it.
        if root.version < self.meta.earliest_version() {
            return Err(Error::NodeNotFound);
        }

        let txn = self.store.read_at(version_to_ts(root.version));
        self.check_root(&txn, &root)?;

        let Some(data) = txn.get(&keys::node_key(&ptr.hash))? else {
            return Err(Error::NodeNotFound);
        };
        Ok(self.codec.decode(&data)?)
    }

    /// Reconstruct the write log between two roots of the same version.
    ///
    /// Searches backwards from `end_root` over stored write-log edges. The
    /// two common shapes are a single hop (state update) and two hops (an
    /// I/O tree built empty -> i -> io); anything longer is refused.
    ///
    /// The returned iterator owns a read snapshot which is released when
    /// the iterator is dropped; leaf values are rehydrated lazily while
    /// iterating.
    pub fn get_write_log(
        &self,
        start_root: Root,
        end_root: Root,
    ) -> Result<WriteLogIterator<'_, S>, Error> {
        if self.discard_write_logs {
            return Err(Error::WriteLogNotFound);
        }
        if !end_root.follows(&start_root) {
            return Err(Error::RootMustFollowOld);
        }
        self.sanity_check_namespace(&start_root.namespace)?;
        // Earlier than the earliest version means the roots were pruned.
        if end_root.version < self.meta.earliest_version() {
            return Err(Error::WriteLogNotFound);
        }

        let txn = self.store.read_at(version_to_ts(end_root.version));
        self.check_root(&txn, &end_root)?;

        const MAX_ALLOWED_HOPS: u8 = 2;

        struct WlItem {
            depth: u8,
            end_root: TypedHash,
            log_keys: Vec<Vec<u8>>,
            log_roots: Vec<TypedHash>,
        }

        let start_th = start_root.typed_hash();
        let mut queue = VecDeque::new();
        queue.push_back(WlItem {
            depth: 0,
            end_root: end_root.typed_hash(),
            log_keys: Vec::new(),
            log_roots: Vec::new(),
        });

        let mut path: Option<Vec<(Vec<u8>, TypedHash)>> = None;
        'search: while let Some(cur) = queue.pop_front() {
            // Collect all write logs that result in the current item.
            let prefix = keys::write_log_new_root_prefix(end_root.version, &cur.end_root);
            let edges: Vec<Vec<u8>> = txn.iter_prefix(&prefix).map(|(key, _)| key).collect();

            for key in edges {
                let (_, _, dec_start) = keys::decode_write_log_key(&key)
                    .unwrap_or_else(|| panic!("node database: bad write log key"));

                let mut log_keys = cur.log_keys.clone();
                log_keys.push(key);
                let mut log_roots = cur.log_roots.clone();
                log_roots.push(cur.end_root);
                let next = WlItem {
                    depth: cur.depth + 1,
                    end_root: dec_start,
                    log_keys,
                    log_roots,
                };

                if next.end_root == start_th {
                    // Path found. Stream oldest hop first so the consumer
                    // can replay from start_root forward.
                    path = Some(
                        next.log_keys
                            .into_iter()
                            .zip(next.log_roots)
                            .rev()
                            .collect(),
                    );
                    break 'search;
                }

                if next.depth < MAX_ALLOWED_HOPS {
                    queue.push_back(next);
                }
            }
        }

        match path {
            Some(chunks) => Ok(WriteLogIterator::new(
                self,
                txn,
                end_root.namespace,
                end_root.version,
                chunks,
            )),
            None => Err(Error::WriteLogNotFound),
        }
    }

    /// The last finalized version, if any version has been finalized yet.
    pub fn get_latest_version(&self) -> Option<u64> {
        self.meta.last_finalized_version()
    }

    /// The earliest version with queryable data.
    pub fn get_earliest_version(&self) -> u64 {
        self.meta.earliest_version()
    }

    /// All roots committed at `version`. Empty for pruned versions.
    pub fn get_roots_for_version(&self, version: u64) -> Result<Vec<Root>, Error> {
        if version < self.meta.earliest_version() {
            return Ok(Vec::new());
        }

        let txn = self.store.read_at(TS_METADATA);
        let roots_meta = RootsMetadata::load_or_init(&txn, version)?;

        Ok(roots_meta
            .roots
            .keys()
            .map(|th| Root::new(self.namespace, version, th.root_type(), th.hash()))
            .collect())
    }

    /// Whether `root` exists. The empty root is implicitly present in every
    /// version.
    pub fn has_root(&self, root: Root) -> bool {
        if self.sanity_check_namespace(&root.namespace).is_err() {
            return false;
        }
        if root.hash.is_zero() {
            return true;
        }
        if root.version < self.meta.earliest_version() {
            return false;
        }

        let txn = self.store.read_at(TS_METADATA);
        let roots_meta = RootsMetadata::load_or_init(&txn, root.version)
            .unwrap_or_else(|err| panic!("node database: failed to load roots metadata: {err}"));
        roots_meta.roots.contains_key(&root.typed_hash())
    }

    /// Finalize a version, keeping the given roots and everything they
    /// transitively derive from.
    ///
    /// Roots committed at the version that are not part of the finalized
    /// set are discarded together with their write logs and any nodes not
    /// shared with a finalized root.
    pub fn finalize(&self, roots: &[Root]) -> Result<(), Error> {
        if self.read_only {
            return Err(Error::ReadOnly);
        }
        let Some(first) = roots.first() else {
            return Err(Error::NoRootsToFinalize);
        };
        let version = first.version;

        let mut multipart = self.meta_update_lock.lock();

        if multipart.version != MULTIPART_VERSION_NONE && multipart.version != version {
            return Err(Error::InvalidMultipartVersion);
        }

        // The previous version must be finalized first, unless we are
        // restoring a checkpoint into an arbitrary version.
        let last_finalized = self.meta.last_finalized_version();
        if multipart.version == MULTIPART_VERSION_NONE && version > 0 {
            if let Some(last) = last_finalized {
                if last < version - 1 {
                    return Err(Error::NotFinalized);
                }
            }
        }
        // This version must not already be finalized.
        if let Some(last) = last_finalized {
            if version <= last {
                return Err(Error::AlreadyFinalized);
            }
        }

        // Removals collect at the version timestamp; the transaction reads
        // at it and commits the metadata updates at the metadata timestamp.
        let mut version_batch = self.store.write_batch_at(version_to_ts(version));
        let mut txn = self.store.write_at(version_to_ts(version));

        // Determine the set of finalized roots. Finalization is transitive:
        // if a derived root is finalized, the root it was built on is too.
        let mut finalized: HashSet<TypedHash> = HashSet::new();
        for root in roots {
            if root.version != version {
                return Err(Error::FinalizeVersionMismatch);
            }
            finalized.insert(root.typed_hash());
        }

        let mut roots_meta = RootsMetadata::load_or_init(&txn, version)?;

        let mut updated = true;
        while updated {
            updated = false;
            for (root_hash, derived_roots) in &roots_meta.roots {
                if derived_roots.is_empty() || finalized.contains(root_hash) {
                    continue;
                }
                if derived_roots.iter().any(|next| finalized.contains(next)) {
                    finalized.insert(*root_hash);
                    updated = true;
                }
            }
        }

        // Sanity check the input roots list.
        for th in &finalized {
            if !roots_meta.roots.contains_key(th) && !th.hash().is_zero() {
                return Err(Error::RootNotFound);
            }
        }

        // Go through all roots and prune them based on whether they were
        // finalized or not.
        let mut maybe_lone_nodes: HashSet<Hash> = HashSet::new();
        let mut not_lone_nodes: HashSet<Hash> = HashSet::new();
        let mut roots_changed = false;

        let root_hashes: Vec<TypedHash> = roots_meta.roots.keys().copied().collect();
        for root_hash in root_hashes {
            let updated_nodes_key = keys::root_updated_nodes_key(version, &root_hash);

            let data = txn.get(&updated_nodes_key)?.unwrap_or_else(|| {
                panic!("node database: corrupted/missing root updated nodes index")
            });
            let updated_nodes: Vec<UpdatedNode> =
                serde_cbor::from_slice(&data).unwrap_or_else(|err| {
                    panic!("node database: corrupted root updated nodes index: {err}")
                });

            if finalized.contains(&root_hash) {
                // Make sure not to remove any nodes shared with finalized
                // roots.
                for n in &updated_nodes {
                    if n.removed {
                        maybe_lone_nodes.insert(n.hash);
                    } else {
                        not_lone_nodes.insert(n.hash);
                    }
                }
            } else {
                // The store's version control keeps these nodes visible at
                // later versions if they get resurrected there, so removal
                // at this timestamp is safe as long as they are not shared
                // with a finalized root of the same version.
                for n in &updated_nodes {
                    if !n.removed {
                        maybe_lone_nodes.insert(n.hash);
                    }
                }

                roots_meta.roots.remove(&root_hash);
                roots_changed = true;

                // Remove write logs for the non-finalized root.
                if !self.discard_write_logs {
                    let prefix = keys::write_log_new_root_prefix(version, &root_hash);
                    let log_keys: Vec<Vec<u8>> =
                        txn.iter_prefix(&prefix).map(|(key, _)| key).collect();
                    for key in log_keys {
                        version_batch.delete(&key)?;
                    }
                }
            }

            // The updated-nodes set is no longer needed after finalization.
            txn.delete(&updated_nodes_key)?;
        }

        // Clean any lone nodes.
        for h in &maybe_lone_nodes {
            if not_lone_nodes.contains(h) {
                continue;
            }
            version_batch.delete(&keys::node_key(h))?;
        }

        version_batch.flush()?;

        if roots_changed {
            roots_meta.save(&mut txn)?;
        }
        self.meta.set_last_finalized_version(&mut txn, version)?;
        txn.commit_at(TS_METADATA)?;

        // Clean multipart metadata if there is any. The nodes are now owned
        // by the finalized roots and must be kept.
        if multipart.version != MULTIPART_VERSION_NONE {
            self.clean_multipart_locked(&mut multipart, false)?;
        }

        info!(version, "finalized version");
        Ok(())
    }

    /// Prune all data belonging to the earliest version.
    ///
    /// The version must be finalized, must be the earliest, and must not be
    /// the only finalized version.
    pub fn prune(&self, version: u64) -> Result<(), Error> {
        if self.read_only {
            return Err(Error::ReadOnly);
        }

        let multipart = self.meta_update_lock.lock();
        if multipart.version != MULTIPART_VERSION_NONE {
            return Err(Error::MultipartInProgress);
        }

        let last_finalized = match self.meta.last_finalized_version() {
            Some(last) if last >= version => last,
            _ => return Err(Error::NotFinalized),
        };
        // Pruning the only finalized version would leave nothing queryable.
        if version == last_finalized {
            return Err(Error::CannotPruneLatestVersion);
        }
        if version != self.meta.earliest_version() {
            return Err(Error::NotEarliest);
        }

        let mut batch = self.store.write_batch_at(version_to_ts(version));
        let mut txn = self.store.write_at(version_to_ts(version));

        let roots_meta = RootsMetadata::load_or_init(&txn, version)?;

        for (root_hash, derived_roots) in &roots_meta.roots {
            if !derived_roots.is_empty() {
                // Not a lone root.
                continue;
            }

            // Traverse the tree and delete everything first written at this
            // version; shared nodes from earlier versions stay.
            let root = Root::new(
                self.namespace,
                version,
                root_hash.root_type(),
                root_hash.hash(),
            );
            self.prune_root(&txn, &mut batch, &root)?;

            batch.delete(&keys::root_node_key(root_hash))?;
        }

        // Delete roots metadata.
        txn.delete(&keys::roots_metadata_key(version))?;

        // Prune all write logs in version.
        if !self.discard_write_logs {
            let wtxn = self.store.read_at(version_to_ts(version));
            let log_keys: Vec<Vec<u8>> = wtxn
                .iter_prefix(&keys::write_log_version_prefix(version))
                .map(|(key, _)| key)
                .collect();
            for key in log_keys {
                batch.delete(&key)?;
            }
        }

        batch.flush()?;

        self.meta.set_earliest_version(&mut txn, version + 1)?;
        txn.commit_at(TS_METADATA)?;

        // Discard everything invalidated at or below the pruned version.
        self.store.set_discard_timestamp(version_to_ts(version + 1));

        info!(version, "pruned version");
        Ok(())
    }

    fn prune_root<T: ReadTxn, B: WriteBatch>(
        &self,
        txn: &T,
        batch: &mut B,
        root: &Root,
    ) -> Result<(), Error> {
        if root.hash.is_zero() {
            return Ok(());
        }

        let mut stack = vec![root.hash];
        let mut visited: HashSet<Hash> = HashSet::new();
        while let Some(hash) = stack.pop() {
            if !visited.insert(hash) {
                continue;
            }

            let node_key = keys::node_key(&hash);
            let Some((data, ts)) = txn.get_with_ts(&node_key)? else {
                return Err(Error::NodeNotFound);
            };
            if ts_to_version(ts) == root.version {
                batch.delete(&node_key)?;
            }

            let node = self.codec.decode(&data)?;
            for child in node.children() {
                if !child.is_zero() {
                    stack.push(child);
                }
            }
        }
        Ok(())
    }

    /// Begin a multipart (chunked checkpoint) restore targeting `version`.
    ///
    /// Idempotent when already active at the same version.
    pub fn start_multipart_insert(&self, version: u64) -> Result<(), Error> {
        let mut multipart = self.meta_update_lock.lock();

        if version == MULTIPART_VERSION_NONE {
            return Err(Error::InvalidMultipartVersion);
        }

        if multipart.version != MULTIPART_VERSION_NONE {
            if multipart.version != version {
                return Err(Error::MultipartInProgress);
            }
            // Already initialized at the same version, probably as part of
            // a further checkpoint restore.
            return Ok(());
        }

        let mut txn = self.store.write_at(TS_METADATA);
        self.meta.set_multipart_version(&mut txn, version)?;
        txn.commit_at(TS_METADATA)?;

        multipart.version = version;

        info!(version, "started multipart insert");
        Ok(())
    }

    /// Abort an in-progress multipart restore, deleting everything its
    /// chunks inserted.
    pub fn abort_multipart_insert(&self) -> Result<(), Error> {
        let mut multipart = self.meta_update_lock.lock();
        self.clean_multipart_locked(&mut multipart, true)
    }

    /// Create a batch for committing a new root at `version` on top of
    /// `old_root`.
    ///
    /// While a multipart restore is active every batch must be a `chunk`
    /// batch targeting the restore version; outside a restore `chunk` must
    /// be false.
    pub fn new_batch(
        &self,
        old_root: Root,
        version: u64,
        chunk: bool,
    ) -> Result<Batch<'_, S>, Error> {
        if self.read_only {
            return Err(Error::ReadOnly);
        }

        let multipart = self.meta_update_lock.lock();
        if multipart.version != MULTIPART_VERSION_NONE && multipart.version != version {
            return Err(Error::InvalidMultipartVersion);
        }
        if chunk != (multipart.version != MULTIPART_VERSION_NONE) {
            return Err(Error::MultipartInProgress);
        }

        // The multipart node log lives at the metadata timestamp while the
        // nodes themselves live at the version timestamp, so a chunk batch
        // carries a second write batch plus a read transaction to detect
        // nodes that already exist at the target version.
        let (multipart_nodes, read_txn) = if multipart.version != MULTIPART_VERSION_NONE {
            (
                Some(self.store.write_batch_at(TS_METADATA)),
                Some(self.store.read_at(version_to_ts(version))),
            )
        } else {
            (None, None)
        };

        Ok(Batch::new(
            self,
            self.store.write_batch_at(version_to_ts(version)),
            multipart_nodes,
            read_txn,
            old_root,
            chunk,
        ))
    }

    /// Approximate size of the database in bytes.
    pub fn size(&self) -> Result<u64, Error> {
        Ok(self.store.size()?)
    }

    /// Flush the backing store to stable storage.
    pub fn sync(&self) -> Result<(), Error> {
        Ok(self.store.sync()?)
    }

    /// Stop the GC worker and close the backing store. Idempotent.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.gc.stop();
        self.store.close();
        info!(namespace = %self.namespace, "node database closed");
    }
}

impl<S: Store> Drop for NodeDb<S> {
    fn drop(&mut self) {
        self.close();
    }
}
