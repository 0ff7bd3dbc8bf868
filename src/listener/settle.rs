//! Settling of snapshot listeners.
//!
//! Stores with a local cache typically answer a new listener twice: first
//! from the cache, then once the server confirms. A [`SettlePolicy`] states
//! how many emissions a listener is kept for before it is considered settled
//! and torn down.

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::SnapshotStream;
use crate::error::Result;

/// Number of emissions after which a listener settles by default.
pub const DEFAULT_SETTLE_EMISSIONS: usize = 2;

/// "Settle after N emissions" policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlePolicy {
    emissions: usize,
}

impl SettlePolicy {
    /// Policy settling after `emissions` snapshots (at least one).
    pub const fn new(emissions: usize) -> Self {
        Self {
            emissions: if emissions == 0 { 1 } else { emissions },
        }
    }

    pub const fn emissions(&self) -> usize {
        self.emissions
    }
}

impl Default for SettlePolicy {
    fn default() -> Self {
        Self::new(DEFAULT_SETTLE_EMISSIONS)
    }
}

/// Drive one snapshot listener on behalf of two consumers.
///
/// The first snapshot (or the first error) is sent through the returned
/// receiver. The listener then stays attached until the policy's emission
/// count is reached, at which point it is detached and `on_settled` runs.
///
/// An error after the first snapshot also detaches the listener and runs
/// `on_settled`. An error as the first emission, the end of the stream, or
/// cancellation of `token` detach it without running `on_settled`. If
/// nothing was delivered by then, the receiver observes a closed channel.
pub fn watch_snapshots<D, F>(
    stream: SnapshotStream<D>,
    policy: SettlePolicy,
    token: CancellationToken,
    on_settled: F,
) -> oneshot::Receiver<Result<Vec<D>>>
where
    D: Send + 'static,
    F: FnOnce() + Send + 'static,
{
    let (first_tx, first_rx) = oneshot::channel();

    tokio::spawn(async move {
        let mut stream = stream;
        let mut first = Some(first_tx);

        let settled = loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    trace!("Snapshot watch cancelled");
                    break false;
                }
                item = stream.next() => match item {
                    Some(Ok(docs)) => {
                        if let Some(tx) = first.take() {
                            let _ = tx.send(Ok(docs));
                        }
                        if stream.emissions() >= policy.emissions() {
                            break true;
                        }
                    }
                    Some(Err(e)) => match first.take() {
                        Some(tx) => {
                            let _ = tx.send(Err(e));
                            break false;
                        }
                        // The delivered snapshot is no longer watched.
                        None => break true,
                    },
                    None => break false,
                },
            }
        };

        drop(stream);
        if settled {
            debug!(emissions = policy.emissions(), "Snapshot listener settled");
            on_settled();
        }
    });

    first_rx
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listener::snapshots;
    use crate::store::MemoryStore;
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    async fn wait_for_listeners(store: &MemoryStore, expected: usize) {
        tokio::time::timeout(Duration::from_secs(1), async {
            while store.listener_count() != expected {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("listener count never reached the expected value");
    }

    #[test]
    fn test_policy_clamps_to_one() {
        assert_eq!(SettlePolicy::new(0).emissions(), 1);
        assert_eq!(SettlePolicy::default().emissions(), DEFAULT_SETTLE_EMISSIONS);
    }

    #[tokio::test]
    async fn test_settles_after_second_emission() {
        let store = MemoryStore::new();
        store.set("tasks", "t1", json!({}));
        let settled = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&settled);

        let first = watch_snapshots(
            snapshots(&store.collection("tasks")),
            SettlePolicy::default(),
            CancellationToken::new(),
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
            },
        );

        let docs = first.await.unwrap().unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(settled.load(Ordering::SeqCst), 0);
        assert_eq!(store.listener_count(), 1);

        store.set("tasks", "t2", json!({}));
        wait_for_listeners(&store, 0).await;
        assert_eq!(settled.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_double_delivery_settles_immediately() {
        let store = MemoryStore::new().with_double_delivery(true);
        store.set("tasks", "t1", json!({}));
        let settled = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&settled);

        let first = watch_snapshots(
            snapshots(&store.collection("tasks")),
            SettlePolicy::new(2),
            CancellationToken::new(),
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
            },
        );

        assert_eq!(first.await.unwrap().unwrap().len(), 1);
        wait_for_listeners(&store, 0).await;
        assert_eq!(settled.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancel_detaches_without_settling() {
        let store = MemoryStore::new();
        store.set("tasks", "t1", json!({}));
        let token = CancellationToken::new();
        let settled = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&settled);

        let first = watch_snapshots(
            snapshots(&store.collection("tasks")),
            SettlePolicy::default(),
            token.clone(),
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
            },
        );
        first.await.unwrap().unwrap();
        assert_eq!(store.listener_count(), 1);

        token.cancel();
        wait_for_listeners(&store, 0).await;
        store.set("tasks", "t2", json!({}));
        assert_eq!(settled.load(Ordering::SeqCst), 0);
    }
}
