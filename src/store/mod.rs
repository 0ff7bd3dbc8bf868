//! Document store contract consumed by the pagers.
//!
//! The store owns persistence and networking. Pagers only need three things
//! from it: composable query builders (`limit`, `start_after`) and a push-based
//! snapshot listener that may fire several times per subscription (typically
//! once from a local cache, then once the server confirms).

pub mod memory;

use serde::de::DeserializeOwned;
use std::fmt;

use crate::error::StoreError;

pub use memory::{MemoryDocument, MemoryQuery, MemoryStore, OrderDirection};

/// Callback invoked by the store with a complete, ordered result set or an error.
pub type SnapshotCallback<D> =
    Box<dyn Fn(std::result::Result<Vec<D>, StoreError>) + Send + Sync + 'static>;

/// Handle to an attached snapshot listener.
///
/// The listener is detached by [`ListenerRegistration::remove`] or when the
/// handle is dropped, whichever comes first.
pub struct ListenerRegistration {
    remove: Option<Box<dyn FnOnce() + Send + Sync + 'static>>,
}

impl ListenerRegistration {
    /// Create a registration that runs `remove` exactly once on detach.
    pub fn new<F>(remove: F) -> Self
    where
        F: FnOnce() + Send + Sync + 'static,
    {
        Self {
            remove: Some(Box::new(remove)),
        }
    }

    /// Detach the listener from the store.
    pub fn remove(mut self) {
        self.detach();
    }

    fn detach(&mut self) {
        if let Some(remove) = self.remove.take() {
            remove();
        }
    }
}

impl Drop for ListenerRegistration {
    fn drop(&mut self) {
        self.detach();
    }
}

impl fmt::Debug for ListenerRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistration")
            .field("attached", &self.remove.is_some())
            .finish()
    }
}

/// An ordered, filterable query against a document store.
///
/// Implementations must define a deterministic total order (an explicit
/// ordering or a stable default such as the document id), otherwise cursor
/// continuation through [`Query::start_after`] is undefined.
pub trait Query: Clone + Send + Sync + 'static {
    /// Document type produced by this query. Also used as a resumption cursor.
    type Document: Clone + fmt::Debug + PartialEq + Send + Sync + 'static;

    /// Restrict the query to at most `n` documents.
    fn limit(&self, n: usize) -> Self;

    /// Continue the query strictly after `cursor`.
    fn start_after(&self, cursor: &Self::Document) -> Self;

    /// Attach a listener receiving every snapshot of this query's result set.
    fn add_snapshot_listener(
        &self,
        callback: SnapshotCallback<Self::Document>,
    ) -> ListenerRegistration;
}

/// Documents that can be decoded into typed values.
pub trait ToObject {
    /// Decode this document, returning `None` when it does not fit `T`.
    fn to_object<T: DeserializeOwned>(&self) -> Option<T>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_registration_removes_once() {
        let removed = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&removed);
        let registration = ListenerRegistration::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        registration.remove();
        assert_eq!(removed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_registration_removes_on_drop() {
        let removed = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&removed);
        {
            let _registration = ListenerRegistration::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(removed.load(Ordering::SeqCst), 1);
    }
}
