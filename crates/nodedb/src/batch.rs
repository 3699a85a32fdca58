//! Atomic commit batches.

use crate::db::NodeDb;
use crate::error::Error;
use crate::keys;
use crate::meta::{RootsMetadata, UpdatedNode};
use crate::store::{ReadTxn, RwTxn, Store, WriteBatch};
use crate::{version_to_ts, MULTIPART_VERSION_NONE, TS_METADATA};
use sapwood_types::{
    hash_write_log, Annotations, NodePointer, Root, RootType, TreeNode, TypedHash, WriteLog,
};

/// A batch groups node writes, pending removals and a write log into one
/// atomic commit that registers a new root.
///
/// Dropping a batch without committing cancels everything. After a
/// [`Batch::reset`] the batch is spent and only good for dropping.
pub struct Batch<'db, S: Store> {
    db: &'db NodeDb<S>,

    batch: Option<S::WriteBatch<'db>>,
    multipart_nodes: Option<S::WriteBatch<'db>>,

    /// Read transaction used to check for node existence during a
    /// multipart restore.
    read_txn: Option<S::ReadTxn<'db>>,

    old_root: Root,
    chunk: bool,

    write_log: Option<(WriteLog, Annotations)>,
    updated_nodes: Vec<UpdatedNode>,
    commit_hooks: Vec<Box<dyn FnOnce(Root) + Send + 'db>>,
}

impl<'db, S: Store> Batch<'db, S> {
    pub(crate) fn new(
        db: &'db NodeDb<S>,
        batch: S::WriteBatch<'db>,
        multipart_nodes: Option<S::WriteBatch<'db>>,
        read_txn: Option<S::ReadTxn<'db>>,
        old_root: Root,
        chunk: bool,
    ) -> Self {
        Self {
            db,
            batch: Some(batch),
            multipart_nodes,
            read_txn,
            old_root,
            chunk,
            write_log: None,
            updated_nodes: Vec::new(),
            commit_hooks: Vec::new(),
        }
    }

    /// Register a hook to run after a successful commit.
    ///
    /// Hooks survive [`Batch::reset`]; a repeated-root no-op commit still
    /// runs them.
    pub fn on_commit(&mut self, hook: impl FnOnce(Root) + Send + 'db) {
        self.commit_hooks.push(Box::new(hook));
    }

    /// Serialize and stage a node write.
    pub fn put_node(&mut self, node: &dyn TreeNode) -> Result<(), Error> {
        let data = node.encode();
        let hash = node.hash();
        self.updated_nodes.push(UpdatedNode {
            removed: false,
            hash,
        });

        let node_key = keys::node_key(&hash);
        if let Some(multipart_nodes) = self.multipart_nodes.as_mut() {
            let read_txn = self
                .read_txn
                .as_ref()
                .expect("chunk batch carries a read transaction");
            // Nodes that already exist at this version keep their current
            // owner; only genuinely new ones go into the restore log.
            if read_txn.get(&node_key)?.is_none() {
                let th = TypedHash::new(RootType::Invalid, hash);
                multipart_nodes.set(&keys::multipart_log_key(&th), &[])?;
            }
        }

        self.spendable().set(&node_key, &data)?;
        Ok(())
    }

    /// Stage logical removals. The nodes are not deleted now; deletion is
    /// deferred to finalization.
    pub fn remove_nodes(&mut self, nodes: &[NodePointer]) -> Result<(), Error> {
        if self.chunk {
            return Err(Error::ChunkModeNotAllowed);
        }

        for ptr in nodes {
            self.updated_nodes.push(UpdatedNode {
                removed: true,
                hash: ptr.hash,
            });
        }
        Ok(())
    }

    /// Stash the write log to be stored on commit.
    pub fn put_write_log(
        &mut self,
        write_log: WriteLog,
        annotations: Annotations,
    ) -> Result<(), Error> {
        if self.chunk {
            return Err(Error::ChunkModeNotAllowed);
        }
        if self.db.discard_write_logs {
            return Ok(());
        }

        self.write_log = Some((write_log, annotations));
        Ok(())
    }

    /// Commit the batch, registering `root` as a new root of its version.
    ///
    /// Committing the same root again is a no-op outside of chunk mode.
    /// The metadata transaction commits last so a failed commit can be
    /// safely retried: node and root bytes are idempotent by content hash.
    pub fn commit(mut self, root: &Root) -> Result<(), Error> {
        let db = self.db;

        let multipart = db.meta_update_lock.lock();
        if multipart.version != MULTIPART_VERSION_NONE && multipart.version != root.version {
            return Err(Error::InvalidMultipartVersion);
        }

        db.sanity_check_namespace(&root.namespace)?;
        if !root.follows(&self.old_root) {
            return Err(Error::RootMustFollowOld);
        }

        // The version being committed into must not be finalized yet.
        if let Some(last_finalized) = db.meta.last_finalized_version() {
            if last_finalized >= root.version {
                return Err(Error::AlreadyFinalized);
            }
        }

        // Update the set of roots for this version.
        let mut txn = db.store.write_at(version_to_ts(root.version));
        let mut roots_meta = RootsMetadata::load_or_init(&txn, root.version)?;

        let root_th = root.typed_hash();
        self.spendable().set(&keys::root_node_key(&root_th), &[])?;
        if let Some(multipart_nodes) = self.multipart_nodes.as_mut() {
            multipart_nodes.set(&keys::multipart_log_key(&root_th), &[])?;
        }

        if roots_meta.roots.contains_key(&root_th) {
            // Root already exists; the hash matches, so everything would be
            // identical and we would just be duplicating work. A chunk
            // import can legitimately commit the same root many times.
            if !self.chunk {
                self.reset();
                self.run_commit_hooks(root);
                return Ok(());
            }
        } else {
            // Create the root with no derived roots.
            roots_meta.roots.insert(root_th, Vec::new());
            roots_meta.save(&mut txn)?;
        }

        if self.chunk {
            // Skip most of the metadata updates when importing chunks; the
            // updated-nodes record is written empty so finalization still
            // finds one.
            let empty: Vec<UpdatedNode> = Vec::new();
            txn.set(
                &keys::root_updated_nodes_key(root.version, &root_th),
                &serde_cbor::to_vec(&empty).expect("updated nodes encoding must succeed"),
            )?;
        } else {
            // Update the root link for the old root.
            let old_th = self.old_root.typed_hash();
            if !self.old_root.hash.is_zero() {
                if self.old_root.version < db.meta.earliest_version()
                    && self.old_root.version != root.version
                {
                    return Err(Error::PreviousVersionMismatch);
                }

                let mut old_roots_meta =
                    RootsMetadata::load_or_init(&txn, self.old_root.version)?;
                let Some(derived) = old_roots_meta.roots.get_mut(&old_th) else {
                    return Err(Error::RootNotFound);
                };
                derived.push(root_th);
                old_roots_meta.save(&mut txn)?;
            }

            // Store updated nodes; only needed until the version is
            // finalized.
            txn.set(
                &keys::root_updated_nodes_key(root.version, &root_th),
                &serde_cbor::to_vec(&self.updated_nodes)
                    .expect("updated nodes encoding must succeed"),
            )?;

            // Store the write log.
            if let Some((write_log, annotations)) = self.write_log.take() {
                let hashed = hash_write_log(&write_log, &annotations);
                let data =
                    serde_cbor::to_vec(&hashed).expect("write log encoding must succeed");
                self.spendable()
                    .set(&keys::write_log_key(root.version, &root_th, &old_th), &data)?;
            }
        }

        // Flush node updates.
        if let Some(multipart_nodes) = self.multipart_nodes.take() {
            multipart_nodes.flush()?;
        }
        self.read_txn = None;
        self.batch
            .take()
            .expect("batch must be live at commit")
            .flush()?;

        // Commit root metadata updates last; on failure the whole commit
        // can be retried.
        txn.commit_at(TS_METADATA)?;

        self.write_log = None;
        self.updated_nodes.clear();
        self.run_commit_hooks(root);
        Ok(())
    }

    /// Cancel the staged writes, discard the read transaction and clear
    /// every stash. Registered commit hooks are kept.
    pub fn reset(&mut self) {
        self.batch = None;
        self.multipart_nodes = None;
        self.read_txn = None;
        self.write_log = None;
        self.updated_nodes.clear();
    }

    fn run_commit_hooks(&mut self, root: &Root) {
        for hook in self.commit_hooks.drain(..) {
            hook(*root);
        }
    }

    fn spendable(&mut self) -> &mut S::WriteBatch<'db> {
        self.batch
            .as_mut()
            .expect("node database: use of a reset batch")
    }
}
