//! Background garbage-collection wiring.

use crate::store::{GcWorker, Store};
use parking_lot::Mutex;

/// Owns the backing store's value-log GC worker for the lifetime of the
/// database.
///
/// The database starts the worker at the end of open and stops it on
/// close; the contract is only that the worker does not run after
/// [`GcHandle::stop`] returns. Stopping twice, or stopping a handle whose
/// worker was never started, is a no-op.
pub(crate) struct GcHandle {
    worker: Mutex<Option<Box<dyn GcWorker>>>,
}

impl GcHandle {
    pub fn new() -> Self {
        Self {
            worker: Mutex::new(None),
        }
    }

    /// Start the store's GC worker and take ownership of it.
    pub fn start<S: Store>(&self, store: &S) {
        *self.worker.lock() = Some(store.start_gc());
    }

    /// Stop the worker and wait for it to exit.
    pub fn stop(&self) {
        if let Some(worker) = self.worker.lock().take() {
            worker.stop();
        }
    }
}
