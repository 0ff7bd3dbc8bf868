//! Snapshot listener bridge.
//!
//! Turns the store's push-based `add_snapshot_listener` callback into a cold
//! [`Stream`] of complete, ordered result sets. The store listener is only
//! attached when the stream is first polled, and is detached as soon as the
//! stream ends or is dropped, so no exit path leaks a registration.

pub mod settle;

use futures::{Stream, StreamExt};
use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tracing::{error, trace};

use crate::error::{Result, StoreError};
use crate::store::{ListenerRegistration, Query, SnapshotCallback, ToObject};

pub use settle::{DEFAULT_SETTLE_EMISSIONS, SettlePolicy, watch_snapshots};

type Snapshot<D> = std::result::Result<Vec<D>, StoreError>;
type StartListener<D> = Box<dyn FnOnce(SnapshotCallback<D>) -> ListenerRegistration + Send>;

/// Lazily-started stream of query snapshots.
///
/// Each item replaces the previous one entirely. A store error is yielded
/// once, after which the stream is finished.
pub struct SnapshotStream<D> {
    start: Option<StartListener<D>>,
    sender: Option<mpsc::UnboundedSender<Snapshot<D>>>,
    receiver: mpsc::UnboundedReceiver<Snapshot<D>>,
    registration: Option<ListenerRegistration>,
    emissions: usize,
    done: bool,
}

// No field is structurally pinned.
impl<D> Unpin for SnapshotStream<D> {}

impl<D: Send + 'static> SnapshotStream<D> {
    fn new(start: StartListener<D>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            start: Some(start),
            sender: Some(sender),
            receiver,
            registration: None,
            emissions: 0,
            done: false,
        }
    }

    /// Number of snapshots yielded so far.
    pub fn emissions(&self) -> usize {
        self.emissions
    }

    /// Whether the store listener is currently attached.
    pub fn is_attached(&self) -> bool {
        self.registration.is_some()
    }

    fn attach(&mut self) {
        let (Some(start), Some(sender)) = (self.start.take(), self.sender.take()) else {
            return;
        };
        let callback: SnapshotCallback<D> = Box::new(move |snapshot| {
            // The receiver is gone once the stream is dropped; late snapshots are moot.
            let _ = sender.send(snapshot);
        });
        self.registration = Some(start(callback));
    }

    fn finish(&mut self) {
        self.done = true;
        self.start = None;
        self.sender = None;
        if let Some(registration) = self.registration.take() {
            registration.remove();
        }
        self.receiver.close();
    }
}

impl<D: Send + 'static> Stream for SnapshotStream<D> {
    type Item = Result<Vec<D>>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }
        this.attach();

        match this.receiver.poll_recv(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Some(Ok(docs))) => {
                this.emissions += 1;
                trace!(
                    emission = this.emissions,
                    documents = docs.len(),
                    "Received snapshot"
                );
                Poll::Ready(Some(Ok(docs)))
            }
            Poll::Ready(Some(Err(e))) => {
                error!("Error while executing document query: {}", e);
                this.finish();
                Poll::Ready(Some(Err(e.into())))
            }
            Poll::Ready(None) => {
                this.finish();
                Poll::Ready(None)
            }
        }
    }
}

impl<D> fmt::Debug for SnapshotStream<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnapshotStream")
            .field("started", &self.start.is_none())
            .field("attached", &self.registration.is_some())
            .field("emissions", &self.emissions)
            .field("done", &self.done)
            .finish()
    }
}

/// Cold stream of snapshots for `query`.
pub fn snapshots<Q: Query>(query: &Q) -> SnapshotStream<Q::Document> {
    let query = query.clone();
    SnapshotStream::new(Box::new(move |callback| {
        query.add_snapshot_listener(callback)
    }))
}

/// Cold stream of snapshots decoded into `T`.
///
/// Documents that do not decode are left out of the snapshot.
pub fn objects<Q, T>(query: &Q) -> impl Stream<Item = Result<Vec<T>>> + Send + 'static
where
    Q: Query,
    Q::Document: ToObject,
    T: serde::de::DeserializeOwned + Send + 'static,
{
    snapshots(query).map(|snapshot| {
        snapshot.map(|docs| docs.iter().filter_map(|doc| doc.to_object()).collect())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DocpagerError;
    use crate::store::MemoryStore;
    use serde::Deserialize;
    use serde_json::json;
    use tokio_test::{assert_pending, assert_ready, task};

    fn store_with(count: usize) -> MemoryStore {
        let store = MemoryStore::new();
        for i in 1..=count {
            store.set("notes", format!("n{i}"), json!({ "rank": i }));
        }
        store
    }

    #[tokio::test]
    async fn test_stream_is_lazy() {
        let store = store_with(2);
        let mut stream = snapshots(&store.collection("notes"));
        assert_eq!(store.listener_count(), 0);
        assert!(!stream.is_attached());

        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(stream.emissions(), 1);
        assert_eq!(store.listener_count(), 1);

        drop(stream);
        assert_eq!(store.listener_count(), 0);
    }

    #[test]
    fn test_stream_pends_until_change() {
        let store = store_with(1);
        let mut stream = task::spawn(snapshots(&store.collection("notes")));

        let first = assert_ready!(stream.poll_next()).unwrap().unwrap();
        assert_eq!(first.len(), 1);
        assert_pending!(stream.poll_next());

        store.set("notes", "n2", json!({ "rank": 2 }));
        assert!(stream.is_woken());
        let second = assert_ready!(stream.poll_next()).unwrap().unwrap();
        assert_eq!(second.len(), 2);
    }

    #[tokio::test]
    async fn test_stream_yields_replacements() {
        let store = store_with(1);
        let mut stream = snapshots(&store.collection("notes"));
        assert_eq!(stream.next().await.unwrap().unwrap().len(), 1);

        store.set("notes", "n2", json!({ "rank": 2 }));
        let second = stream.next().await.unwrap().unwrap();
        assert_eq!(second.len(), 2);
        assert_eq!(second[1].id(), "n2");
    }

    #[tokio::test]
    async fn test_error_ends_stream() {
        let store = store_with(1);
        store.set_failure(Some(StoreError::Unavailable("offline".to_string())));
        let mut stream = snapshots(&store.collection("notes"));

        let err = stream.next().await.unwrap().unwrap_err();
        assert!(matches!(
            err,
            DocpagerError::Store(StoreError::Unavailable(_))
        ));
        assert!(stream.next().await.is_none());
        assert_eq!(store.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_objects_drop_undecodable() {
        #[derive(Debug, Deserialize)]
        struct Note {
            rank: u32,
        }

        let store = store_with(2);
        store.set("notes", "n3", json!({ "label": "no rank" }));
        let mut stream = Box::pin(objects::<_, Note>(&store.collection("notes")));

        let notes = stream.next().await.unwrap().unwrap();
        let ranks: Vec<u32> = notes.iter().map(|note| note.rank).collect();
        assert_eq!(ranks, vec![1, 2]);
    }
}
