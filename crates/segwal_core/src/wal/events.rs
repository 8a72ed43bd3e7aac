//! Callbacks raised by the log for its owner.

use parking_lot::RwLock;
use std::sync::Arc;

/// Receives notifications from the flush worker.
///
/// Methods run on the flush worker thread and must not call back into the
/// log's flush path. Default implementations ignore the event.
pub trait WalListener: Send + Sync {
    /// The log asks its owner to checkpoint so old segments can be cut.
    ///
    /// `wal_size` is the current total size of the log in bytes.
    fn on_checkpoint_request(&self, wal_size: u64) {
        let _ = wal_size;
    }

    /// Free space on the storage directory fell below the configured limit.
    fn on_low_disk_space(&self, available: u64, limit: u64) {
        let _ = (available, limit);
    }
}

/// Registered listeners.
#[derive(Default)]
pub(crate) struct Listeners {
    listeners: RwLock<Vec<Arc<dyn WalListener>>>,
}

impl Listeners {
    pub(crate) fn add(&self, listener: Arc<dyn WalListener>) {
        self.listeners.write().push(listener);
    }

    pub(crate) fn remove(&self, listener: &Arc<dyn WalListener>) {
        self.listeners
            .write()
            .retain(|registered| !Arc::ptr_eq(registered, listener));
    }

    pub(crate) fn len(&self) -> usize {
        self.listeners.read().len()
    }

    pub(crate) fn checkpoint_request(&self, wal_size: u64) {
        for listener in self.listeners.read().iter() {
            listener.on_checkpoint_request(wal_size);
        }
    }

    pub(crate) fn low_disk_space(&self, available: u64, limit: u64) {
        for listener in self.listeners.read().iter() {
            listener.on_low_disk_space(available, limit);
        }
    }
}

impl std::fmt::Debug for Listeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listeners")
            .field("count", &self.len())
            .finish()
    }
}
