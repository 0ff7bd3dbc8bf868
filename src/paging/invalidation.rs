use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::info;

type InvalidatedCallback = Box<dyn FnOnce() + Send + 'static>;

/// Invalidation state and cancellation scope of one paging source.
///
/// Cloning yields another handle to the same state, so listener tasks can
/// invalidate the source they were spawned for. Invalidation happens at most
/// once: callbacks run once and the scope is cancelled, which tears down
/// every listener still attached on behalf of the source.
#[derive(Clone)]
pub struct Invalidation {
    inner: Arc<InvalidationInner>,
}

struct InvalidationInner {
    scope: CancellationToken,
    invalid: AtomicBool,
    callbacks: Mutex<Vec<InvalidatedCallback>>,
}

impl Invalidation {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(InvalidationInner {
                scope: CancellationToken::new(),
                invalid: AtomicBool::new(false),
                callbacks: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Mark the source stale. Only the first call has an effect.
    pub fn invalidate(&self) {
        if self.inner.invalid.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("Paging source invalidated");
        self.inner.scope.cancel();

        let callbacks = std::mem::take(
            &mut *self
                .inner
                .callbacks
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        );
        for callback in callbacks {
            callback();
        }
    }

    pub fn is_invalid(&self) -> bool {
        self.inner.invalid.load(Ordering::SeqCst)
    }

    /// Run `callback` once the source is invalidated, or right away if it already is.
    pub fn on_invalidated<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        {
            let mut callbacks = self
                .inner
                .callbacks
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if !self.is_invalid() {
                callbacks.push(Box::new(callback));
                return;
            }
        }
        callback();
    }

    /// Wait until the source is invalidated.
    pub async fn invalidated(&self) {
        self.inner.scope.cancelled().await;
        // A closed scope without invalidation never becomes stale.
        if !self.is_invalid() {
            std::future::pending::<()>().await;
        }
    }

    /// Child scope for work done on behalf of the source.
    pub fn child_scope(&self) -> CancellationToken {
        self.inner.scope.child_token()
    }

    /// Cancel outstanding work without marking the source stale.
    pub(crate) fn close(&self) {
        self.inner.scope.cancel();
    }
}

impl Default for Invalidation {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Invalidation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invalidation")
            .field("invalid", &self.is_invalid())
            .field("closed", &self.inner.scope.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_invalidate_runs_callbacks_once() {
        let invalidation = Invalidation::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        invalidation.on_invalidated(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        invalidation.invalidate();
        invalidation.invalidate();

        assert!(invalidation.is_invalid());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_late_callback_runs_immediately() {
        let invalidation = Invalidation::new();
        invalidation.invalidate();

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        invalidation.on_invalidated(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_invalidate_cancels_children() {
        let invalidation = Invalidation::new();
        let child = invalidation.child_scope();
        invalidation.invalidate();
        assert!(child.is_cancelled());
    }

    #[test]
    fn test_close_keeps_source_valid() {
        let invalidation = Invalidation::new();
        let child = invalidation.child_scope();
        invalidation.close();
        assert!(child.is_cancelled());
        assert!(!invalidation.is_invalid());
    }

    #[tokio::test]
    async fn test_invalidated_resolves() {
        let invalidation = Invalidation::new();
        let handle = invalidation.clone();
        tokio::spawn(async move { handle.invalidate() });
        invalidation.invalidated().await;
        assert!(invalidation.is_invalid());
    }
}
